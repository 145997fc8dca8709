//! `remedy run`: the full detect → analyze → repair → verify → commit workflow.

use anyhow::{Context, Result};
use console::style;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use super::super::Cli;

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub no_commit: bool,
    pub dry_run: bool,
    pub resume: bool,
    pub passes: Option<u32>,
}

/// Hold an exclusive advisory lock on `run.lock` for the lifetime of the file.
fn acquire_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;
    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another `remedy run` is active for this project (lock held on {})",
            path.display()
        )
    })?;
    Ok(file)
}

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, args: RunArgs) -> Result<ExitCode> {
    use remedy::artifacts::{EXECUTIVE_SUMMARY, REPORT_JSON, REPORT_MD};
    use remedy::config::Config;
    use remedy::errors::WorkflowError;
    use remedy::orchestrator::{Orchestrator, WorkflowOptions};
    use remedy::ui::WorkflowUI;
    use remedy::ui::icons::{CROSS, PROGRESS, WARN};

    super::check_initialized(&project_dir)?;
    let config = Config::new(project_dir, cli.verbose)?;
    config.ensure_directories()?;
    for warning in config.settings().validate() {
        eprintln!("{}{}", WARN, style(warning).yellow());
    }

    let _lock = acquire_lock(&config.lock_file)?;

    let workflow = &config.settings().workflow;
    let options = WorkflowOptions {
        auto_commit: workflow.auto_commit && !args.no_commit,
        dry_run: args.dry_run,
        resume: args.resume,
        verification_passes: args.passes.unwrap_or(workflow.verification_passes).max(1),
    };

    let mut orchestrator = Orchestrator::from_config(&config);
    orchestrator
        .tracker_mut()
        .register_observer(Arc::new(WorkflowUI::new(cli.verbose)));

    let run = match orchestrator.execute_full_workflow(options).await {
        Ok(run) => run,
        Err(WorkflowError::Fatal {
            phase,
            message,
            error_artifact,
        }) => {
            eprintln!();
            eprintln!(
                "{}{} during {} phase: {}",
                CROSS,
                style("Workflow failed").red().bold(),
                phase,
                message
            );
            if let Some(path) = error_artifact {
                eprintln!("  Error artifact: {}", path.display());
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let tested = run.final_outcomes().iter().filter(|o| o.is_available()).count();
    let remaining = run.remaining_issues().len();
    let fixed = run.issues().len() - remaining;

    println!();
    println!("{}Run {} {}", PROGRESS, &run.id.to_string()[..8], style(run.status).bold());
    println!("  Areas tested:     {}", tested);
    println!("  Issues found:     {}", run.issues().len());
    println!("  Issues fixed:     {}", style(fixed).green());
    println!("  Issues remaining: {}", style(remaining).red());
    println!("  Success rate:     {:.1}%", run.success_rate);
    if let Some(commit) = &run.commit {
        println!("  Commit:           {:?}", commit);
    }
    if let Some(dir) = &run.artifact_dir {
        println!();
        println!("Artifacts:");
        for name in [REPORT_JSON, REPORT_MD, EXECUTIVE_SUMMARY] {
            println!("  {}", dir.join(name).display());
        }
    }

    Ok(if run.success_rate >= 100.0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
