//! pushci CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pushci")]
#[command(about = "Push-triggered lint and test runner", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "PUSHCI_API_URL", default_value = "http://localhost:8001")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect stored job logs
    Logs {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Run the pipeline locally for one commit
    Run {
        /// Repository to clone
        clone_url: String,
        /// Commit to check out
        sha: String,
        /// Ref recorded on the job
        #[arg(long = "ref", default_value = "refs/heads/main")]
        r#ref: String,
        /// Author recorded on the job
        #[arg(long, default_value = "local")]
        author: String,
        /// Toolchain file
        #[arg(long, env = "PUSHCI_TOOLCHAIN")]
        toolchain: Option<PathBuf>,
        /// Directory the finished job is stored in
        #[arg(long, env = "PUSHCI_LOG_DIR", default_value = "logs")]
        log_dir: PathBuf,
    },
    /// Validate a toolchain file
    Validate {
        /// Path to the toolchain file
        #[arg(default_value = "pushci.kdl")]
        path: String,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// List job ids known to the server
    List,
    /// Show one job
    Show {
        /// Job ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Logs { command } => match command {
            LogCommands::List => {
                commands::logs::list(&cli.api_url).await?;
            }
            LogCommands::Show { id } => {
                commands::logs::show(&cli.api_url, &id).await?;
            }
        },
        Commands::Run {
            clone_url,
            sha,
            r#ref,
            author,
            toolchain,
            log_dir,
        } => {
            let options = commands::run::RunOptions {
                clone_url,
                sha,
                r#ref,
                author,
                toolchain,
                log_dir,
            };
            commands::run::run_local(options).await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
