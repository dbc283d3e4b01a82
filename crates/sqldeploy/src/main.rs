//! sqldeploy CLI
//!
//! Deploys a SQL script project, or generates a single deployment script.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use sqldeploy::config::CONFIG_FILE;
use sqldeploy::logging;
use sqldeploy::{DeployerConfig, Runner, RunnerResolution, RunnerSettings};

/// Transactional, phase-ordered deployment of SQL script projects.
#[derive(Parser)]
#[command(name = "sqldeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding project.json and the script files.
    #[arg(short, long)]
    project_folder: PathBuf,

    /// Folder for log files.
    #[arg(short, long, env = "SQLDEPLOY_LOG_FOLDER")]
    log_folder: Option<PathBuf>,

    /// PostgreSQL connection URL.
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        required_unless_present = "unified_script"
    )]
    server: Option<String>,

    /// Write one SQL file (or a file in this folder) instead of executing.
    #[arg(short, long)]
    unified_script: Option<PathBuf>,

    /// Run without a transaction.
    #[arg(long)]
    no_transaction: bool,

    /// Roll back at the end, even if everything succeeded.
    #[arg(long)]
    rollback: bool,

    /// Only load and validate the project. Requires --rollback.
    #[arg(long)]
    check_only: bool,

    /// Skip pattern validation.
    #[arg(long)]
    bypass_check: bool,

    /// Deployer configuration file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_folder.as_deref());

    let runner = match build_runner(cli) {
        Ok(runner) => runner,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(RunnerResolution::ExceptionThrown.exit_code());
        }
    };

    ExitCode::from(runner.go().await.exit_code())
}

fn build_runner(cli: Cli) -> anyhow::Result<Runner> {
    let config = DeployerConfig::load(&cli.config).with_context(|| {
        format!(
            "failed to read deployer configuration {}",
            cli.config.display()
        )
    })?;

    let mut settings = RunnerSettings::new(cli.project_folder, cli.server.unwrap_or_default())
        .use_transaction(!cli.no_transaction)
        .rollback(cli.rollback)
        .check_files_only(cli.check_only)
        .bypass_check(cli.bypass_check);
    if let Some(folder) = cli.log_folder {
        settings = settings.log_folder(folder);
    }
    if let Some(path) = cli.unified_script {
        settings = settings.unified_script_path(path);
    }

    Ok(Runner::new(settings, config)?)
}
