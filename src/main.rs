use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lexibot")]
#[command(
    version,
    about = "Automation core for the AI Dictionary: provider routing, budget governing, term verification"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Use a specific config file instead of the resolution chain")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List a profile's providers with live availability
    Providers {
        #[arg(long, short, default_value = "generate", help = "Profile to inspect")]
        profile: String,
    },

    /// Check whether a workflow may run within the CI-minutes budget
    Govern {
        #[arg(default_value = "default", help = "Workflow name to check")]
        workflow: String,
    },

    /// Verify a candidate term against the existing corpus
    Verify {
        #[arg(help = "Candidate term name")]
        term: String,
        #[arg(help = "Path to the candidate's markdown definition")]
        definition: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize project configuration
    Init,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mLexibot encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_file = cli.config.as_deref();

    match cli.command {
        Commands::Providers { profile } => {
            lexibot::cli::commands::providers::run(&profile, config_file)?;
        }
        Commands::Govern { workflow } => {
            let rt = Runtime::new()?;
            let proceed = rt.block_on(lexibot::cli::commands::govern::run(
                &workflow,
                config_file,
            ))?;
            // A denial is the signal downstream workflow steps gate on
            if !proceed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Verify { term, definition } => {
            let rt = Runtime::new()?;
            rt.block_on(lexibot::cli::commands::verify::run(
                &term,
                &definition,
                config_file,
            ))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                lexibot::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                lexibot::cli::commands::config::path()?;
            }
            ConfigAction::Init => {
                lexibot::cli::commands::config::init()?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
