//! Integration tests for remedy
//!
//! The first half drives the library API with scripted detectors and
//! strategies. The second half runs the `remedy` binary against real
//! shell detectors in a temporary project.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use async_trait::async_trait;
use predicates::prelude::*;
use remedy::artifacts::{ArtifactStore, REPORT_JSON, REPORT_MD, RUN_FILE, phase_file};
use remedy::detect::{DetectContext, Detector};
use remedy::errors::{DetectorError, RepairError, TrackerError};
use remedy::orchestrator::{Orchestrator, RunStatus, WorkflowOptions};
use remedy::repair::{RepairContext, RepairExecutor, RepairStrategy, StrategyRegistry};
use remedy::tracker::{Phase, ProgressTracker, TrackerStatus};
use remedy_common::{DetectorReport, Issue, IssueCategory, RepairResult, RepairStatus};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Library helpers
// =============================================================================

/// Reports `before` during detection and `after` on every verification pass.
struct ScriptedArea {
    area: String,
    before: DetectorReport,
    after: DetectorReport,
}

impl ScriptedArea {
    fn healthy(area: &str) -> Arc<dyn Detector> {
        Arc::new(Self {
            area: area.to_string(),
            before: DetectorReport::passed("all pages render"),
            after: DetectorReport::passed("all pages render"),
        })
    }

    fn broken(area: &str, output: &str, after: DetectorReport) -> Arc<dyn Detector> {
        Arc::new(Self {
            area: area.to_string(),
            before: DetectorReport::failed(output),
            after,
        })
    }
}

#[async_trait]
impl Detector for ScriptedArea {
    fn area(&self) -> &str {
        &self.area
    }

    async fn detect(&self, ctx: &DetectContext) -> Result<DetectorReport, DetectorError> {
        Ok(if ctx.pass == 0 {
            self.before.clone()
        } else {
            self.after.clone()
        })
    }
}

struct CountingFix {
    calls: AtomicUsize,
}

impl CountingFix {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RepairStrategy for CountingFix {
    fn name(&self) -> &str {
        "counting-fix"
    }

    async fn apply(
        &self,
        issue: &Issue,
        _ctx: &RepairContext,
    ) -> Result<RepairResult, RepairError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RepairResult::applied(format!("fixed {}", issue.location())))
    }
}

struct AlwaysThrows;

#[async_trait]
impl RepairStrategy for AlwaysThrows {
    fn name(&self) -> &str {
        "restart-api"
    }

    async fn apply(
        &self,
        _issue: &Issue,
        _ctx: &RepairContext,
    ) -> Result<RepairResult, RepairError> {
        Err(RepairError::StrategyFailure {
            strategy: "restart-api".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

fn orchestrator(detectors: Vec<Arc<dyn Detector>>, registry: StrategyRegistry) -> Orchestrator {
    Orchestrator::new(detectors, RepairExecutor::new(registry, Duration::from_secs(5)))
}

fn no_commit() -> WorkflowOptions {
    WorkflowOptions {
        auto_commit: false,
        ..Default::default()
    }
}

// =============================================================================
// End-to-end workflow
// =============================================================================

#[tokio::test]
async fn test_all_areas_passing_completes_without_repairs() {
    let mut orch = orchestrator(
        vec![
            ScriptedArea::healthy("teacher-center"),
            ScriptedArea::healthy("parent-center"),
            ScriptedArea::healthy("student-center"),
        ],
        StrategyRegistry::new(),
    );

    let run = orch.execute_full_workflow(no_commit()).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.success_rate, 100.0);
    assert!(run.issues().is_empty());
    assert!(run.repair_actions().is_empty());
    for phase in [Phase::Fixing, Phase::Verification, Phase::Commit] {
        let state = run.phases.iter().find(|p| p.name == phase).unwrap();
        assert_eq!(state.progress_percent, 100, "{} not fast-forwarded", phase);
    }
}

#[tokio::test]
async fn test_missing_routes_are_repaired_and_verified() {
    let fix = CountingFix::new();
    let mut orch = orchestrator(
        vec![
            ScriptedArea::broken(
                "teacher-center",
                "GET /teacher/grades returned 404",
                DetectorReport::passed("ok"),
            ),
            ScriptedArea::broken(
                "parent-center",
                "GET /parent/messages returned 404",
                DetectorReport::passed("ok"),
            ),
            ScriptedArea::healthy("student-center"),
        ],
        StrategyRegistry::new().with(IssueCategory::MissingRoute, fix.clone()),
    );

    let run = orch.execute_full_workflow(no_commit()).await.unwrap();

    assert_eq!(run.issues().len(), 2);
    assert!(
        run.issues()
            .iter()
            .all(|i| i.category() == IssueCategory::MissingRoute)
    );
    assert_eq!(fix.calls.load(Ordering::SeqCst), 2);
    assert!(
        run.repair_actions()
            .iter()
            .all(|a| a.status == RepairStatus::Succeeded)
    );
    assert!(run.remaining_issues().is_empty());
    assert_eq!(run.success_rate, 100.0);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_throwing_strategy_does_not_block_other_repairs() {
    let fix = CountingFix::new();
    let registry = StrategyRegistry::new()
        .with(IssueCategory::MissingRoute, fix.clone())
        .with(IssueCategory::ServerError, Arc::new(AlwaysThrows));
    let still_down = DetectorReport::failed("500 Internal Server Error");
    let mut orch = orchestrator(
        vec![
            ScriptedArea::broken("teacher-center", "GET /teacher returned 404", DetectorReport::passed("ok")),
            ScriptedArea::broken("api", "500 Internal Server Error", still_down.clone()),
            ScriptedArea::broken("reports-api", "500 Internal Server Error", still_down),
        ],
        registry,
    );

    let run = orch.execute_full_workflow(no_commit()).await.unwrap();

    let actions = run.repair_actions();
    assert_eq!(actions.len(), 3);
    for action in actions {
        let expected = match action.category {
            IssueCategory::MissingRoute => RepairStatus::Succeeded,
            IssueCategory::ServerError => RepairStatus::Failed,
            other => panic!("unexpected category {}", other),
        };
        assert_eq!(action.status, expected, "{}", action.detail);
    }
    assert_eq!(fix.calls.load(Ordering::SeqCst), 1);
    assert_eq!(run.remaining_issues().len(), 2);
    assert_eq!(run.status, RunStatus::Partial);
    assert!((run.success_rate - 33.33).abs() < f64::EPSILON);
}

#[test]
fn test_second_start_run_is_rejected_without_touching_first() {
    let mut tracker = ProgressTracker::new();
    let first = tracker.start_run().unwrap();
    tracker.set_phase_progress(Phase::Detection, 40).unwrap();

    let err = tracker.start_run().unwrap_err();
    assert!(matches!(err, TrackerError::AlreadyRunning { run_id } if run_id == first));

    let progress = tracker.progress().unwrap();
    assert_eq!(progress.run_id, first);
    assert_eq!(progress.status, TrackerStatus::Running);
    assert_eq!(progress.current_phase, Some(Phase::Detection));
    assert_eq!(progress.phase(Phase::Detection).progress_percent, 40);
}

#[tokio::test]
async fn test_report_json_reloads_with_same_summary() {
    let dir = TempDir::new().unwrap();
    let mut orch = orchestrator(
        vec![
            ScriptedArea::broken("teacher-center", "404 Not Found", DetectorReport::passed("ok")),
            ScriptedArea::broken("api", "500 Internal Server Error", DetectorReport::failed("500")),
        ],
        StrategyRegistry::new().with(IssueCategory::MissingRoute, CountingFix::new()),
    )
    .with_artifacts(ArtifactStore::new(dir.path()));

    let run = orch.execute_full_workflow(no_commit()).await.unwrap();
    let run_dir = run.artifact_dir.clone().unwrap();

    for phase in Phase::ALL {
        assert!(run_dir.join(phase_file(phase)).exists(), "missing {}", phase);
    }
    assert!(run_dir.join(REPORT_MD).exists());
    assert!(run_dir.join(RUN_FILE).exists());

    let report = ArtifactStore::load_report(&run_dir.join(REPORT_JSON)).unwrap();
    assert_eq!(report.run_id, run.id);
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.summary.total_errors, 2);
    assert_eq!(report.summary.errors_fixed, 1);
    assert_eq!(report.summary.errors_remaining, 1);
    assert_eq!(report.summary.success_rate, run.success_rate);

    let reloaded = ArtifactStore::load_run(&run_dir).unwrap();
    assert_eq!(reloaded.id, run.id);
    assert_eq!(reloaded.success_rate, run.success_rate);
}

#[tokio::test]
async fn test_independent_orchestrators_do_not_share_runs() {
    let mut a = orchestrator(vec![ScriptedArea::healthy("a")], StrategyRegistry::new());
    let mut b = orchestrator(vec![ScriptedArea::healthy("b")], StrategyRegistry::new());

    let (run_a, run_b) = tokio::join!(
        a.execute_full_workflow(no_commit()),
        b.execute_full_workflow(no_commit())
    );
    let (run_a, run_b) = (run_a.unwrap(), run_b.unwrap());
    assert_ne!(run_a.id, run_b.id);
    assert_eq!(run_a.detection[0].area, "a");
    assert_eq!(run_b.detection[0].area, "b");
}

// =============================================================================
// CLI
// =============================================================================

fn remedy() -> Command {
    cargo_bin_cmd!("remedy")
}

fn init_project(dir: &TempDir) {
    remedy()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

fn write_config(dir: &TempDir, body: &str) {
    fs::write(dir.path().join(".remedy/remedy.toml"), body).unwrap();
}

#[test]
fn test_help_lists_commands() {
    remedy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_init_creates_remedy_dir() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let remedy_dir = dir.path().join(".remedy");
    assert!(remedy_dir.join("remedy.toml").exists());
    assert!(remedy_dir.join("runs").is_dir());
    assert!(remedy_dir.join("logs").is_dir());
}

#[test]
fn test_init_keeps_existing_config() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(&dir, "[workflow]\nauto_commit = false\n");

    init_project(&dir);
    let content = fs::read_to_string(dir.path().join(".remedy/remedy.toml")).unwrap();
    assert_eq!(content, "[workflow]\nauto_commit = false\n");
}

#[test]
fn test_commands_require_init() {
    let dir = TempDir::new().unwrap();
    remedy()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("remedy init"));
}

#[test]
fn test_status_without_runs() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    remedy()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded yet"));
}

#[test]
fn test_run_with_passing_detectors_succeeds() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[workflow]
auto_commit = false

[[detectors]]
area = "home"
command = "true"

[[detectors]]
area = "api"
command = "echo '{\"success\": true, \"output\": \"healthy\"}'"
"#,
    );

    remedy()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Success rate:     100.0%"));

    let runs = fs::read_dir(dir.path().join(".remedy/runs")).unwrap().count();
    assert_eq!(runs, 1);

    remedy()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_run_with_failing_detector_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[[detectors]]
area = "home"
command = "true"

[[detectors]]
area = "grades"
command = "echo 'GET /grades 404'; exit 1"
"#,
    );

    remedy()
        .current_dir(dir.path())
        .args(["run", "--no-commit"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Issues remaining: 1"));
}

#[test]
fn test_required_detector_without_entry_point_fails_run() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[workflow]
auto_commit = false

[[detectors]]
area = "home"
command = "true"

[[detectors]]
area = "parents"
command = "sh tests/parents.sh"
entry_point = "tests/parents.sh"
"#,
    );

    remedy()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Issues remaining: 1"));
}

#[test]
fn test_optional_detector_without_entry_point_is_skipped() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[workflow]
auto_commit = false

[[detectors]]
area = "home"
command = "true"

[[detectors]]
area = "parents"
command = "sh tests/parents.sh"
entry_point = "tests/parents.sh"
optional = true
"#,
    );

    remedy()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Areas tested:     1"));
}

#[test]
fn test_dry_run_writes_no_pages() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[project]
pages_dir = "pages"

[[detectors]]
area = "grades"
command = "echo 'GET /grades 404'; exit 1"
"#,
    );

    remedy()
        .current_dir(dir.path())
        .args(["run", "--dry-run", "--no-commit"])
        .assert()
        .failure();
    assert!(!dir.path().join("pages").exists());
}

#[test]
fn test_detect_writes_detection_results() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write_config(
        &dir,
        r#"
[[detectors]]
area = "home"
command = "true"
"#,
    );

    remedy()
        .current_dir(dir.path())
        .arg("detect")
        .assert()
        .success()
        .stdout(predicate::str::contains("home"));

    let runs: Vec<_> = fs::read_dir(dir.path().join(".remedy/runs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].join("detection-results.json").exists());
}
