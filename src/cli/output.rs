//! CI Output Channel
//!
//! Workflow steps consume governor decisions through `$GITHUB_OUTPUT`
//! key=value lines; the same pairs are echoed to stdout so local runs
//! and CI logs show identical information.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::types::Result;

/// Emit key=value pairs to `$GITHUB_OUTPUT` (when set) and to stdout.
pub fn emit_outputs(pairs: &[(&str, String)]) -> Result<()> {
    if let Ok(path) = std::env::var("GITHUB_OUTPUT") {
        append_outputs(Path::new(&path), pairs)?;
    }

    for (key, value) in pairs {
        println!("{}={}", key, value);
    }
    Ok(())
}

fn append_outputs(path: &Path, pairs: &[(&str, String)]) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for (key, value) in pairs {
        writeln!(file, "{}={}", key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_append_outputs_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github-output");
        fs::write(&path, "earlier=1\n").unwrap();

        append_outputs(
            &path,
            &[
                ("proceed", "true".to_string()),
                ("usage_pct", "0.25".to_string()),
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "earlier=1\nproceed=true\nusage_pct=0.25\n");
    }

    #[test]
    fn test_append_outputs_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github-output");

        append_outputs(&path, &[("minutes_used", "123.4".to_string())]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "minutes_used=123.4\n");
    }
}
