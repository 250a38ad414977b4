//! CI Minutes Source
//!
//! Estimates the minutes consumed this month by summing completed
//! workflow-run durations from the GitHub Actions API. The billing API
//! needs elevated scopes a workflow token does not have; the runs list
//! does not, and an estimate is all the governor needs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::governor as governor_constants;
use crate::types::{LexError, Result};

/// Source of the month-to-date CI minutes estimate.
#[async_trait]
pub trait MinutesSource: Send + Sync {
    /// Minutes consumed since `month_start`.
    async fn minutes_this_month(&self, month_start: DateTime<Utc>) -> Result<f64>;
}

/// GitHub Actions implementation, querying `/repos/{repo}/actions/runs`.
pub struct GithubActionsMinutes {
    repository: String,
    /// Workflow token; anonymous queries work on public repos
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for GithubActionsMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubActionsMinutes")
            .field("repository", &self.repository)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GithubActionsMinutes {
    /// `repository` is "owner/repo". The token comes from GITHUB_TOKEN.
    pub fn new(repository: impl Into<String>) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok().map(SecretString::from);
        if token.is_none() {
            warn!("GITHUB_TOKEN not set, querying the runs API anonymously");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("lexibot")
            .build()
            .map_err(|e| LexError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            repository: repository.into(),
            token,
            client,
        })
    }
}

#[async_trait]
impl MinutesSource for GithubActionsMinutes {
    async fn minutes_this_month(&self, month_start: DateTime<Utc>) -> Result<f64> {
        let created = format!(">={}", month_start.format("%Y-%m-%dT%H:%M:%SZ"));
        let mut total_minutes = 0.0;

        for page in 1..=governor_constants::MAX_RUN_PAGES {
            let url = format!("https://api.github.com/repos/{}/actions/runs", self.repository);
            let page_param = page.to_string();
            let mut builder = self
                .client
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .query(&[
                    ("per_page", "100"),
                    ("page", page_param.as_str()),
                    ("created", created.as_str()),
                ]);
            if let Some(token) = &self.token {
                builder = builder.header(
                    "Authorization",
                    format!("Bearer {}", token.expose_secret()),
                );
            }

            let response = builder.send().await.map_err(|e| {
                LexError::GovernorEstimation(format!("runs query failed: {}", e))
            })?;

            if !response.status().is_success() {
                return Err(LexError::GovernorEstimation(format!(
                    "runs query returned HTTP {}",
                    response.status().as_u16()
                )));
            }

            let body: RunsPage = response.json().await.map_err(|e| {
                LexError::GovernorEstimation(format!("failed to decode runs page: {}", e))
            })?;

            let count = body.workflow_runs.len();
            for run in &body.workflow_runs {
                if run.status.as_deref() != Some("completed") {
                    continue;
                }
                if let (Some(start), Some(end)) = (run.run_started_at, run.updated_at) {
                    let secs = (end - start).num_seconds();
                    if secs > 0 {
                        total_minutes += secs as f64 / 60.0;
                    }
                }
            }

            debug!(page, runs = count, total_minutes, "Summed workflow runs page");

            if count < 100 {
                break;
            }
        }

        Ok(total_minutes)
    }
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    status: Option<String>,
    run_started_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_page_decoding() {
        let raw = r#"{
            "total_count": 2,
            "workflow_runs": [
                {
                    "status": "completed",
                    "run_started_at": "2025-06-10T12:00:00Z",
                    "updated_at": "2025-06-10T12:03:30Z"
                },
                {
                    "status": "in_progress",
                    "run_started_at": "2025-06-10T13:00:00Z",
                    "updated_at": null
                }
            ]
        }"#;
        let page: RunsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.workflow_runs.len(), 2);
        assert_eq!(page.workflow_runs[0].status.as_deref(), Some("completed"));
        let start = page.workflow_runs[0].run_started_at.unwrap();
        let end = page.workflow_runs[0].updated_at.unwrap();
        assert_eq!((end - start).num_seconds(), 210);
    }

    #[test]
    fn test_empty_page_decodes() {
        let page: RunsPage = serde_json::from_str(r#"{"total_count": 0}"#).unwrap();
        assert!(page.workflow_runs.is_empty());
    }
}
