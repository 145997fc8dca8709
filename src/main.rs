use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use remedy::logging::{LogFormat, init_tracing};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "remedy")]
#[command(version, about = "Self-healing remediation orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .remedy/ and check environment preconditions
    Init,
    /// Run the full detect, analyze, repair, verify, commit workflow
    Run {
        /// Do not commit repaired files
        #[arg(long)]
        no_commit: bool,

        /// Plan repairs without applying them
        #[arg(long)]
        dry_run: bool,

        /// Continue an interrupted run from its last phase boundary
        #[arg(long)]
        resume: bool,

        /// Consecutive passing verification runs required per area
        #[arg(long)]
        passes: Option<u32>,
    },
    /// Show the current or most recent run
    Status,
    /// Run the detection phase only
    Detect,
    /// Run detection and analysis only
    Analyze {
        /// Analyze a saved detection-results.json instead of running detectors
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Score project quality dimensions
    Quality,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = project_dir.join(remedy::init::REMEDY_DIR).join("logs");
    let _guard = init_tracing(cli.log_format, cli.verbose, Some(&log_dir));

    let code = match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            no_commit,
            dry_run,
            resume,
            passes,
        } => {
            let args = cmd::RunArgs {
                no_commit: *no_commit,
                dry_run: *dry_run,
                resume: *resume,
                passes: *passes,
            };
            cmd::cmd_run(&cli, project_dir, args).await?
        }
        Commands::Status => {
            cmd::cmd_status(&project_dir)?;
            ExitCode::SUCCESS
        }
        Commands::Detect => cmd::cmd_detect(&project_dir, cli.verbose).await?,
        Commands::Analyze { input } => {
            cmd::cmd_analyze(&project_dir, cli.verbose, input.clone()).await?
        }
        Commands::Quality => {
            cmd::cmd_quality(&project_dir, cli.verbose)?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
