//! `remedy status`.

use anyhow::Result;
use console::style;
use std::path::Path;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use remedy::artifacts::ArtifactStore;
    use remedy::config::Config;
    use remedy::orchestrator::RunStore;

    super::check_initialized(project_dir)?;
    let config = Config::new(project_dir.to_path_buf(), false)?;

    let store = RunStore::new(config.progress_file.clone());
    if let Some(snapshot) = store.load()? {
        let progress = &snapshot.progress;
        println!();
        println!(
            "Run {} ({})",
            style(&snapshot.run.id.to_string()[..8]).cyan(),
            style(snapshot.run.status).bold()
        );
        println!("Started: {}", snapshot.run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(phase) = progress.current_phase {
            println!("Current phase: {}", style(phase).yellow());
        }
        println!("Overall: {}%", progress.overall_percent());
        println!();
        println!("{:<14} {:>5}  Completed", "Phase", "%");
        println!("{:<14} {:>5}  ---------", "--------------", "-----");
        for phase in &progress.phases {
            let completed = phase
                .completed_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<14} {:>5}  {}",
                phase.name.to_string(),
                phase.progress_percent,
                completed
            );
        }
        let summary = &progress.summary;
        println!();
        println!(
            "Errors: {}  Fixes: {} succeeded, {} failed, {} skipped",
            summary.total_errors,
            summary.fixes_successful,
            summary.fixes_failed,
            summary.fixes_skipped
        );
        if snapshot.is_resumable() {
            println!();
            println!("Interrupted run; continue it with `remedy run --resume`.");
        }
        println!();
        return Ok(());
    }

    let artifacts = ArtifactStore::new(&config.runs_dir);
    match artifacts.latest_run()? {
        Some(dir) => {
            let run = ArtifactStore::load_run(&dir)?;
            println!();
            println!(
                "Last run {} ({}), success rate {:.1}%",
                style(&run.id.to_string()[..8]).cyan(),
                style(run.status).bold(),
                run.success_rate
            );
            println!("Artifacts: {}", dir.display());
            println!();
        }
        None => {
            println!();
            println!("No runs recorded yet. Run `remedy run` to start one.");
            println!();
        }
    }
    Ok(())
}
