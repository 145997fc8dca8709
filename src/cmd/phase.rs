//! Single-phase commands for debugging: `detect`, `analyze`, `quality`.

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use remedy::artifacts::{ArtifactStore, phase_file};
use remedy::config::Config;
use remedy::detect::{DetectorOutcome, OutcomeKind};
use remedy::tracker::Phase;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

fn load_config(cli_verbose: bool, project_dir: &Path) -> Result<Config> {
    super::check_initialized(project_dir)?;
    let config = Config::new(project_dir.to_path_buf(), cli_verbose)?;
    config.ensure_directories()?;
    Ok(config)
}

fn print_outcomes(outcomes: &[DetectorOutcome]) {
    println!();
    println!("{:<24} {:<12} {:>8}  Detail", "Area", "Result", "ms");
    println!(
        "{:<24} {:<12} {:>8}  ------",
        "------------------------", "------------", "--------"
    );
    for o in outcomes {
        let kind = format!("{:?}", o.kind).to_lowercase();
        let kind = match o.kind {
            OutcomeKind::Passed => style(kind).green(),
            OutcomeKind::Failed | OutcomeKind::Error => style(kind).red(),
            OutcomeKind::Unavailable => style(kind).dim(),
        };
        let detail: String = o.report.text().lines().next().unwrap_or("").chars().take(60).collect();
        println!("{:<24} {:<12} {:>8}  {}", o.area, kind, o.duration_ms, detail);
    }
    println!();
}

pub async fn cmd_detect(project_dir: &Path, verbose: bool) -> Result<ExitCode> {
    use remedy::orchestrator::Orchestrator;

    let config = load_config(verbose, project_dir)?;
    let orchestrator = Orchestrator::from_config(&config);
    if orchestrator.detectors().is_empty() {
        anyhow::bail!("No detectors configured in .remedy/remedy.toml");
    }

    let outcomes = orchestrator.detect_only().await;
    print_outcomes(&outcomes);

    let artifacts = ArtifactStore::new(&config.runs_dir);
    let dir = artifacts.dir_for(Utc::now(), Uuid::new_v4());
    let path = artifacts.write_json(&dir, phase_file(Phase::Detection), &outcomes)?;
    println!("Wrote {}", path.display());

    Ok(if outcomes.iter().any(|o| o.is_failure()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

pub async fn cmd_analyze(
    project_dir: &Path,
    verbose: bool,
    input: Option<PathBuf>,
) -> Result<ExitCode> {
    use remedy::orchestrator::Orchestrator;

    let config = load_config(verbose, project_dir)?;
    let orchestrator = Orchestrator::from_config(&config);
    let artifacts = ArtifactStore::new(&config.runs_dir);
    let dir = artifacts.dir_for(Utc::now(), Uuid::new_v4());

    let outcomes: Vec<DetectorOutcome> = match input {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse detector outcomes in {}", path.display()))?
        }
        None => {
            if orchestrator.detectors().is_empty() {
                anyhow::bail!("No detectors configured in .remedy/remedy.toml");
            }
            let outcomes = orchestrator.detect_only().await;
            artifacts.write_json(&dir, phase_file(Phase::Detection), &outcomes)?;
            outcomes
        }
    };

    let (analysis, plan) = orchestrator.analyze(&outcomes);

    println!();
    println!(
        "{} issues ({} auto-fixable, {} unclassified)",
        style(analysis.total()).bold(),
        analysis.auto_fixable(),
        analysis.unclassified
    );
    for (category, count) in &analysis.by_category {
        println!("  {:<16} {}", category.to_string(), count);
    }
    if !plan.actions.is_empty() {
        println!();
        println!("Planned repairs:");
        for action in &plan.actions {
            println!("  {:<16} {} ({})", action.category.to_string(), action.target_issue, action.strategy);
        }
    }
    if !plan.manual.is_empty() {
        println!();
        println!("Manual attention:");
        for issue in &plan.manual {
            println!("  {:<16} {}", issue.category().to_string(), issue.location());
        }
    }
    println!();

    let path = artifacts.write_json(&dir, phase_file(Phase::Analysis), &analysis)?;
    println!("Wrote {}", path.display());

    Ok(if analysis.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn cmd_quality(project_dir: &Path, verbose: bool) -> Result<()> {
    use remedy::report::perform_quality_assessment;

    let config = load_config(verbose, project_dir)?;
    let artifacts = ArtifactStore::new(&config.runs_dir);

    // Timings from the last finished run feed the performance dimension.
    let outcomes = match artifacts.latest_run()? {
        Some(dir) => ArtifactStore::load_run(&dir)
            .map(|run| run.final_outcomes().to_vec())
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let score = perform_quality_assessment(&config.quality_inputs(), &outcomes);
    println!();
    println!("{:<16} {:>6}  {:<5} Findings", "Dimension", "Score", "Grade");
    println!("{:<16} {:>6}  {:<5} --------", "----------------", "------", "-----");
    for dim in &score.dimensions {
        println!(
            "{:<16} {:>6.1}  {:<5} {}",
            dim.dimension.to_string(),
            dim.score,
            dim.grade.to_string(),
            dim.findings.join("; ")
        );
    }
    println!();
    println!(
        "Overall {:.1} - grade {}",
        score.overall,
        style(score.grade).bold()
    );
    println!();
    Ok(())
}
