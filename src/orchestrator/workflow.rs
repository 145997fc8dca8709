//! The workflow orchestrator: detect → analyze → repair → verify → commit.
//!
//! The orchestrator is the only component that knows the full pipeline
//! shape. Every collaborator is injected, so tests drive it with scripted
//! detectors and strategies and no filesystem at all.

use super::run::{FatalRecord, RunStatus, VerificationOutcome, WorkflowOptions, WorkflowRun};
use super::state::{RunSnapshot, RunStore};
use crate::artifacts::ArtifactStore;
use crate::commit::{CommitOutcome, CommitRequest, Committer, GitCommitter};
use crate::config::Config;
use crate::detect::{Classifier, DetectContext, Detector, DetectorOutcome, ErrorAnalysis, run_detectors};
use crate::errors::{TrackerError, WorkflowError};
use crate::repair::{RepairContext, RepairExecutor, RepairOutcome, RepairPlan, plan_repairs};
use crate::report::{QualityInputs, QualityScore, generate_comprehensive_report, perform_quality_assessment};
use crate::tracker::{Phase, ProgressTracker, RunProgress, TimelineLog, timeline};
use anyhow::{Context, Result};
use chrono::Utc;
use remedy_common::RepairAction;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_CONCURRENCY: usize = 4;

pub struct Orchestrator {
    tracker: ProgressTracker,
    detectors: Vec<Arc<dyn Detector>>,
    classifier: Classifier,
    executor: RepairExecutor,
    committer: Option<Arc<dyn Committer>>,
    store: Option<RunStore>,
    artifacts: Option<ArtifactStore>,
    project_dir: Option<PathBuf>,
    quality: Option<QualityInputs>,
    detector_timeout: Duration,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(detectors: Vec<Arc<dyn Detector>>, executor: RepairExecutor) -> Self {
        Self {
            tracker: ProgressTracker::new(),
            detectors,
            classifier: Classifier::default(),
            executor,
            committer: None,
            store: None,
            project_dir: None,
            artifacts: None,
            quality: None,
            detector_timeout: DEFAULT_DETECTOR_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Wire every collaborator from the project configuration.
    pub fn from_config(config: &Config) -> Self {
        let settings = config.settings();
        let executor = RepairExecutor::new(config.strategies(), config.repair_timeout());
        let tracker =
            ProgressTracker::new().with_timeline_log(TimelineLog::new(&config.timeline_file));

        let mut orchestrator = Self::new(config.detectors(), executor)
            .with_tracker(tracker)
            .with_committer(Arc::new(GitCommitter::new(
                &config.project_dir,
                config.commit_timeout(),
            )))
            .with_artifacts(ArtifactStore::new(&config.runs_dir))
            .with_project_dir(config.project_dir.clone())
            .with_quality_inputs(config.quality_inputs())
            .with_detector_timeout(config.detector_timeout())
            .with_max_concurrency(settings.workflow.max_concurrency);
        if settings.workflow.persist_phase_boundaries {
            orchestrator = orchestrator.with_run_store(RunStore::new(config.progress_file.clone()));
        }
        orchestrator
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_committer(mut self, committer: Arc<dyn Committer>) -> Self {
        self.committer = Some(committer);
        self
    }

    /// Persist a resumable snapshot at every phase boundary.
    pub fn with_run_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Project root handed to repair strategies.
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_quality_inputs(mut self, inputs: QualityInputs) -> Self {
        self.quality = Some(inputs);
        self
    }

    pub fn with_detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// For registering observers before a run.
    pub fn tracker_mut(&mut self) -> &mut ProgressTracker {
        &mut self.tracker
    }

    pub fn detectors(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    /// Run the whole pipeline once.
    ///
    /// Recovered failures (detector crashes, failed repairs, a failed commit)
    /// end up in the returned run. Only an unexpected error inside a phase is
    /// returned as `WorkflowError::Fatal`, after the run has been marked
    /// failed and `error.json` written.
    pub async fn execute_full_workflow(
        &mut self,
        options: WorkflowOptions,
    ) -> Result<WorkflowRun, WorkflowError> {
        if self.detectors.is_empty() {
            return Err(WorkflowError::NoDetectors);
        }

        let mut run = self.begin(options)?;
        match self.drive(&mut run).await {
            Ok(()) => {
                self.finish(&mut run);
                Ok(run)
            }
            Err(e) => Err(self.fail(&mut run, e)),
        }
    }

    /// Detection in isolation, outside any run.
    pub async fn detect_only(&self) -> Vec<DetectorOutcome> {
        let ctx = DetectContext::default();
        run_detectors(
            &self.detectors,
            &ctx,
            self.detector_timeout,
            self.max_concurrency,
            |_, _| {},
        )
        .await
    }

    /// Classification and planning over existing detector outcomes.
    pub fn analyze(&self, outcomes: &[DetectorOutcome]) -> (ErrorAnalysis, RepairPlan) {
        let analysis = self.classifier.analyze(outcomes);
        let plan = plan_repairs(&analysis.issues, self.executor.registry());
        (analysis, plan)
    }

    fn begin(&mut self, options: WorkflowOptions) -> Result<WorkflowRun, WorkflowError> {
        if options.resume
            && let Some(store) = &self.store
        {
            match store.load_resumable() {
                Ok(Some(snapshot)) => {
                    let RunSnapshot { mut run, progress } = snapshot;
                    self.tracker.restore(progress)?;
                    let detail = format!(
                        "resuming at {}",
                        self.tracker
                            .current_phase()
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "end".to_string())
                    );
                    self.tracker
                        .record_timeline_event(None, timeline::RUN_RESUMED, &detail)?;
                    run.options.resume = true;
                    if let Some(progress) = self.tracker.progress() {
                        run.sync_progress(progress);
                    }
                    info!(run_id = %run.id, %detail, "run resumed");
                    return Ok(run);
                }
                Ok(None) => info!("no resumable run found, starting fresh"),
                Err(e) => warn!(error = %e, "ignoring unreadable run snapshot"),
            }
        }

        self.tracker.start_run()?;
        let progress = self.tracker.progress().ok_or(TrackerError::NoActiveRun)?;
        Ok(WorkflowRun::new(progress, options))
    }

    /// Run phases from the tracker's current phase until the run completes.
    async fn drive(&mut self, run: &mut WorkflowRun) -> Result<()> {
        while let Some(phase) = self.tracker.current_phase() {
            if phase == Phase::Fixing && run.analysis.as_ref().is_some_and(|a| a.is_clean()) {
                self.short_circuit(run)?;
            } else {
                match phase {
                    Phase::Detection => self.detection(run).await?,
                    Phase::Analysis => self.analysis(run)?,
                    Phase::Fixing => self.fixing(run).await?,
                    Phase::Verification => self.verification(run).await?,
                    Phase::Commit => self.commit(run).await?,
                }
            }
            self.checkpoint(run)?;
        }
        Ok(())
    }

    async fn detection(&mut self, run: &mut WorkflowRun) -> Result<()> {
        info!(run_id = %run.id, detectors = self.detectors.len(), "detection started");
        let ctx = DetectContext {
            run_id: Some(run.id),
            pass: 0,
        };
        let tracker = &mut self.tracker;
        let outcomes = run_detectors(
            &self.detectors,
            &ctx,
            self.detector_timeout,
            self.max_concurrency,
            |done, total| report_progress(tracker, Phase::Detection, done, total),
        )
        .await;

        let failing = outcomes.iter().filter(|o| o.is_failure()).count();
        info!(areas = outcomes.len(), failing, "detection finished");
        run.detection = outcomes;
        self.write_phase(run, Phase::Detection, &run.detection)?;
        self.tracker.set_phase_progress(Phase::Detection, 100)?;
        Ok(())
    }

    fn analysis(&mut self, run: &mut WorkflowRun) -> Result<()> {
        let (analysis, plan) = self.analyze(&run.detection);
        self.tracker.update_error_statistics(&analysis.issues);
        info!(
            issues = analysis.total(),
            auto_fixable = analysis.auto_fixable(),
            unclassified = analysis.unclassified,
            "analysis finished"
        );
        self.write_phase(run, Phase::Analysis, &analysis)?;
        run.analysis = Some(analysis);
        run.plan = Some(plan);
        self.tracker.set_phase_progress(Phase::Analysis, 100)?;
        Ok(())
    }

    /// No issues: the remaining phases complete immediately and detection
    /// doubles as verification.
    fn short_circuit(&mut self, run: &mut WorkflowRun) -> Result<()> {
        info!(run_id = %run.id, "no issues detected, fast-forwarding");
        self.tracker
            .fast_forward(Phase::Fixing, "No issues detected; nothing to repair")?;
        let verification =
            VerificationOutcome::compute(&run.detection, std::slice::from_ref(&run.detection));
        run.success_rate = verification.success_rate;
        run.verification = Some(verification);
        self.tracker
            .fast_forward(Phase::Verification, "No issues detected; detection stands")?;
        self.tracker
            .fast_forward(Phase::Commit, "No issues detected; nothing to commit")?;
        Ok(())
    }

    async fn fixing(&mut self, run: &mut WorkflowRun) -> Result<()> {
        let planned = run
            .plan
            .clone()
            .context("Fixing phase reached without a repair plan")?;
        // On resume, keep whatever the interrupted attempt already settled.
        let plan = match &run.repair {
            Some(previous) => RepairPlan {
                actions: previous.actions.clone(),
                manual: planned.manual,
            },
            None => planned,
        };
        let issues = run.issues().to_vec();
        let ctx = RepairContext {
            run_id: Some(run.id),
            project_dir: self.project_dir.clone(),
            dry_run: run.options.dry_run,
        };

        let tracker = &mut self.tracker;
        let store = self.store.as_ref();
        let outcome = self
            .executor
            .execute(&plan, &issues, &ctx, |settled, total| {
                report_progress(tracker, Phase::Fixing, settled.len(), total);
                if let Some(store) = store {
                    checkpoint_repairs(store, tracker, run, &plan, settled);
                }
            })
            .await;

        self.tracker.update_fix_statistics(&outcome.actions);
        self.write_phase(run, Phase::Fixing, &outcome)?;
        run.repair = Some(outcome);
        self.tracker.set_phase_progress(Phase::Fixing, 100)?;
        Ok(())
    }

    async fn verification(&mut self, run: &mut WorkflowRun) -> Result<()> {
        let passes = run.options.verification_passes.max(1);
        let total = self.detectors.len();
        let mut results = Vec::with_capacity(passes as usize);

        for pass in 1..=passes {
            let ctx = DetectContext {
                run_id: Some(run.id),
                pass,
            };
            let offset = (pass as usize - 1) * total;
            let tracker = &mut self.tracker;
            let outcomes = run_detectors(
                &self.detectors,
                &ctx,
                self.detector_timeout,
                self.max_concurrency,
                |done, _| {
                    report_progress(tracker, Phase::Verification, offset + done, total * passes as usize)
                },
            )
            .await;
            info!(
                pass,
                passing = outcomes.iter().filter(|o| o.passed()).count(),
                "verification pass finished"
            );
            results.push(outcomes);
        }

        let verification = VerificationOutcome::compute(&run.detection, &results);
        info!(success_rate = verification.success_rate, "verification finished");
        self.write_phase(run, Phase::Verification, &verification)?;
        run.success_rate = verification.success_rate;
        run.verification = Some(verification);
        self.tracker.set_phase_progress(Phase::Verification, 100)?;
        Ok(())
    }

    async fn commit(&mut self, run: &mut WorkflowRun) -> Result<()> {
        let outcome = match &self.committer {
            _ if !run.options.auto_commit => CommitOutcome::Skipped {
                reason: "Auto-commit disabled".to_string(),
            },
            _ if run.options.dry_run => CommitOutcome::Skipped {
                reason: "Dry run".to_string(),
            },
            None => CommitOutcome::Skipped {
                reason: "No committer configured".to_string(),
            },
            Some(committer) => {
                let fixed = run.issues().len() - run.remaining_issues().len();
                committer
                    .commit(&CommitRequest {
                        run_id: run.id,
                        fixed,
                    })
                    .await
            }
        };

        if outcome.is_failure() {
            warn!(?outcome, "commit failed");
        } else {
            info!(?outcome, "commit step finished");
        }
        self.tracker.record_timeline_event(
            Some(Phase::Commit),
            timeline::COMMIT_RESULT,
            &serde_json::to_string(&outcome)?,
        )?;
        self.write_phase(run, Phase::Commit, &outcome)?;
        run.commit = Some(outcome);
        self.tracker.set_phase_progress(Phase::Commit, 100)?;
        Ok(())
    }

    fn write_phase<T: serde::Serialize>(
        &self,
        run: &WorkflowRun,
        phase: Phase,
        value: &T,
    ) -> Result<()> {
        if let Some(artifacts) = &self.artifacts {
            artifacts.write_phase(run, phase, value)?;
        }
        Ok(())
    }

    fn checkpoint(&self, run: &mut WorkflowRun) -> Result<()> {
        let Some(progress) = self.tracker.progress() else {
            return Ok(());
        };
        run.sync_progress(progress);
        if let Some(store) = &self.store {
            store
                .save(&RunSnapshot {
                    run: run.clone(),
                    progress: progress.clone(),
                })
                .context("Failed to persist phase boundary")?;
        }
        Ok(())
    }

    fn finish(&mut self, run: &mut WorkflowRun) {
        let commit_failed = run.commit.as_ref().is_some_and(|c| c.is_failure());
        run.status = if run.success_rate >= 100.0 && !commit_failed {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        };
        run.ended_at = self
            .tracker
            .progress()
            .and_then(|p| p.ended_at)
            .or_else(|| Some(Utc::now()));
        info!(run_id = %run.id, status = %run.status, success_rate = run.success_rate, "run finished");
        self.finalize(run);
    }

    /// Mark the run failed and write the error artifact next to the report.
    fn fail(&mut self, run: &mut WorkflowRun, error: anyhow::Error) -> WorkflowError {
        let phase = failing_phase(self.tracker.progress());
        let message = format!("{:#}", error);
        warn!(run_id = %run.id, %phase, error = %message, "workflow failed");

        if let Err(e) = self.tracker.fail_run(&message) {
            warn!(error = %e, "could not mark tracker failed");
        }
        let record = FatalRecord {
            run_id: run.id,
            phase,
            message: message.clone(),
            chain: error.chain().map(|c| c.to_string()).collect(),
            timestamp: Utc::now(),
        };
        run.status = RunStatus::Failed;
        run.ended_at = Some(record.timestamp);
        run.error = Some(record.clone());

        let error_artifact = self.artifacts.as_ref().and_then(|artifacts| {
            artifacts
                .write_error(run, &record)
                .inspect_err(|e| warn!(error = %e, "failed to write error artifact"))
                .ok()
        });
        self.finalize(run);

        WorkflowError::Fatal {
            phase,
            message,
            error_artifact,
        }
    }

    /// Guaranteed last step for every run: report, final run record and the
    /// terminal snapshot. Write failures are logged, never raised.
    fn finalize(&self, run: &mut WorkflowRun) {
        if let Some(progress) = self.tracker.progress() {
            run.sync_progress(progress);
        }

        let quality = match &self.quality {
            Some(inputs) => perform_quality_assessment(inputs, run.final_outcomes()),
            None => QualityScore::from_dimensions(Vec::new()),
        };

        if let Some(artifacts) = &self.artifacts {
            run.artifact_dir = Some(artifacts.run_dir(run));
            let report = generate_comprehensive_report(run, quality);
            if let Err(e) = artifacts.write_report(run, &report) {
                warn!(error = %e, "failed to write report");
            }
            if let Err(e) = artifacts.write_run(run) {
                warn!(error = %e, "failed to write run record");
            }
        }

        if let (Some(store), Some(progress)) = (&self.store, self.tracker.progress())
            && let Err(e) = store.save(&RunSnapshot {
                run: run.clone(),
                progress: progress.clone(),
            })
        {
            warn!(error = %e, "failed to persist final run snapshot");
        }
    }
}

/// Map `done/total` into the phase's 0..=99 range; 100 is reserved for the
/// merge step that completes the phase.
/// Phase a fatal error is attributed to: the running phase, otherwise the
/// last one that completed.
fn failing_phase(progress: Option<&RunProgress>) -> Phase {
    progress
        .and_then(|p| p.current_phase.or_else(|| p.last_completed_phase()))
        .unwrap_or(Phase::first())
}

/// Persist the settled prefix of the repair batch so a resumed run does not
/// apply those actions again. Failures are logged; the phase boundary
/// checkpoint still decides whether the run is fatal.
fn checkpoint_repairs(
    store: &RunStore,
    tracker: &ProgressTracker,
    run: &mut WorkflowRun,
    plan: &RepairPlan,
    settled: &[RepairAction],
) {
    let Some(progress) = tracker.progress() else {
        return;
    };
    let mut actions = settled.to_vec();
    actions.extend(plan.actions.iter().skip(settled.len()).cloned());
    run.repair = Some(RepairOutcome::from_actions(actions));
    run.sync_progress(progress);
    if let Err(e) = store.save(&RunSnapshot {
        run: run.clone(),
        progress: progress.clone(),
    }) {
        warn!(error = %e, "failed to persist repair progress");
    }
}

fn report_progress(tracker: &mut ProgressTracker, phase: Phase, done: usize, total: usize) {
    let percent = (done * 99 / total.max(1)).min(99) as u8;
    if let Err(e) = tracker.set_phase_progress(phase, percent) {
        warn!(%phase, error = %e, "progress update rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{CrashingDetector, ScriptedDetector};
    use crate::detect::OutcomeKind;
    use crate::orchestrator::AreaStatus;
    use crate::repair::StrategyRegistry;
    use crate::repair::testing::{Behaviour, MockStrategy};
    use crate::tracker::TrackerStatus;
    use async_trait::async_trait;
    use remedy_common::{DetectorReport, IssueCategory, RepairErrorKind, RepairStatus};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn detector(area: &str, script: Vec<DetectorReport>) -> Arc<dyn Detector> {
        Arc::new(ScriptedDetector::new(area, script))
    }

    fn executor(registry: StrategyRegistry) -> RepairExecutor {
        RepairExecutor::new(registry, Duration::from_secs(5))
    }

    fn options() -> WorkflowOptions {
        WorkflowOptions {
            auto_commit: false,
            ..Default::default()
        }
    }

    struct RecordingCommitter {
        outcome: CommitOutcome,
        requests: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Committer for RecordingCommitter {
        async fn commit(&self, request: &CommitRequest) -> CommitOutcome {
            self.requests.lock().unwrap().push(request.fixed);
            self.outcome.clone()
        }
    }

    fn completion_order(run: &WorkflowRun) -> Vec<Phase> {
        let mut phases: Vec<_> = run
            .phases
            .iter()
            .filter_map(|p| p.completed_at.map(|t| (t, p.name)))
            .collect();
        phases.sort_by_key(|(t, _)| *t);
        phases.into_iter().map(|(_, p)| p).collect()
    }

    #[tokio::test]
    async fn test_no_detectors_is_rejected() {
        let mut orch = Orchestrator::new(vec![], executor(StrategyRegistry::new()));
        let err = orch.execute_full_workflow(options()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoDetectors));
        assert!(orch.tracker().progress().is_none());
    }

    #[tokio::test]
    async fn test_clean_run_fast_forwards() {
        let mut orch = Orchestrator::new(
            vec![
                detector("a", vec![DetectorReport::passed("ok")]),
                detector("b", vec![DetectorReport::passed("ok")]),
            ],
            executor(StrategyRegistry::new()),
        );
        let run = orch.execute_full_workflow(options()).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.success_rate, 100.0);
        assert!(run.issues().is_empty());
        assert!(run.phases.iter().all(|p| p.progress_percent == 100));
        assert_eq!(completion_order(&run), Phase::ALL.to_vec());
        let fast_forwarded = run
            .timeline
            .iter()
            .filter(|e| e.event == timeline::FAST_FORWARDED)
            .count();
        assert_eq!(fast_forwarded, 3);
    }

    #[tokio::test]
    async fn test_repairs_then_verifies() {
        let fixer = Arc::new(MockStrategy::new("fixer", Behaviour::Apply));
        let registry = StrategyRegistry::new().with(IssueCategory::MissingRoute, fixer.clone());
        let mut orch = Orchestrator::new(
            vec![
                detector(
                    "a",
                    vec![
                        DetectorReport::failed("GET /a returned 404"),
                        DetectorReport::passed("ok"),
                    ],
                ),
                detector("b", vec![DetectorReport::passed("ok")]),
            ],
            executor(registry),
        );
        let run = orch.execute_full_workflow(options()).await.unwrap();

        assert_eq!(run.issues().len(), 1);
        assert_eq!(run.issues()[0].category(), IssueCategory::MissingRoute);
        assert_eq!(fixer.seen.lock().unwrap().len(), 1);
        assert_eq!(run.repair.as_ref().unwrap().successful, 1);
        assert_eq!(
            run.verification.as_ref().unwrap().area("a").unwrap().status,
            AreaStatus::Fixed
        );
        assert_eq!(run.success_rate, 100.0);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(completion_order(&run), Phase::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_still_failing_area_gives_partial() {
        let mut orch = Orchestrator::new(
            vec![
                detector("a", vec![DetectorReport::failed("500 Internal Server Error")]),
                detector("b", vec![DetectorReport::passed("ok")]),
            ],
            executor(StrategyRegistry::new()),
        );
        let run = orch.execute_full_workflow(options()).await.unwrap();

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.success_rate, 50.0);
        let action = &run.repair.as_ref().unwrap().actions[0];
        assert_eq!(action.status, RepairStatus::Failed);
        assert_eq!(action.error_kind, Some(RepairErrorKind::UnsupportedCategory));
        assert_eq!(run.remaining_issues().len(), 1);
    }

    #[tokio::test]
    async fn test_crashing_detector_becomes_issue() {
        let mut orch = Orchestrator::new(
            vec![Arc::new(CrashingDetector("boom")) as Arc<dyn Detector>],
            executor(StrategyRegistry::new()),
        );
        let run = orch.execute_full_workflow(options()).await.unwrap();
        assert_eq!(run.detection[0].kind, OutcomeKind::Error);
        assert_eq!(run.issues().len(), 1);
        assert_eq!(run.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn test_flaky_detector_needs_all_passes() {
        let mut orch = Orchestrator::new(
            vec![detector(
                "a",
                vec![
                    DetectorReport::failed("404"),
                    DetectorReport::passed("ok"),
                    DetectorReport::failed("404"),
                ],
            )],
            executor(StrategyRegistry::new()),
        );
        let run = orch
            .execute_full_workflow(WorkflowOptions {
                verification_passes: 2,
                ..options()
            })
            .await
            .unwrap();
        let area = run.verification.as_ref().unwrap().area("a").unwrap().clone();
        assert_eq!(area.passes_passed, 1);
        assert_eq!(area.status, AreaStatus::StillFailing);
        assert_eq!(run.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn test_commit_receives_fixed_count_and_failure_is_partial() {
        let committer = Arc::new(RecordingCommitter {
            outcome: CommitOutcome::Failed {
                reason: "index locked".to_string(),
            },
            requests: Mutex::new(Vec::new()),
        });
        let registry = StrategyRegistry::new().with(
            IssueCategory::MissingRoute,
            Arc::new(MockStrategy::new("fixer", Behaviour::Apply)),
        );
        let mut orch = Orchestrator::new(
            vec![detector(
                "a",
                vec![DetectorReport::failed("404"), DetectorReport::passed("ok")],
            )],
            executor(registry),
        )
        .with_committer(committer.clone());

        let run = orch
            .execute_full_workflow(WorkflowOptions::default())
            .await
            .unwrap();
        assert_eq!(*committer.requests.lock().unwrap(), vec![1]);
        assert!(run.commit.as_ref().unwrap().is_failure());
        assert_eq!(run.success_rate, 100.0);
        assert_eq!(run.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn test_dry_run_skips_repairs_and_commit() {
        let fixer = Arc::new(MockStrategy::new("fixer", Behaviour::Apply));
        let committer = Arc::new(RecordingCommitter {
            outcome: CommitOutcome::NothingToCommit,
            requests: Mutex::new(Vec::new()),
        });
        let mut orch = Orchestrator::new(
            vec![detector("a", vec![DetectorReport::failed("404")])],
            executor(StrategyRegistry::new().with(IssueCategory::MissingRoute, fixer.clone())),
        )
        .with_committer(committer.clone());

        let run = orch
            .execute_full_workflow(WorkflowOptions {
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(fixer.seen.lock().unwrap().is_empty());
        assert_eq!(run.repair.as_ref().unwrap().skipped, 1);
        assert!(committer.requests.lock().unwrap().is_empty());
        assert!(matches!(run.commit, Some(CommitOutcome::Skipped { .. })));
    }

    #[tokio::test]
    async fn test_artifacts_and_snapshot_written() {
        let dir = tempdir().unwrap();
        let mut orch = Orchestrator::new(
            vec![detector("a", vec![DetectorReport::failed("404")])],
            executor(StrategyRegistry::new()),
        )
        .with_artifacts(ArtifactStore::new(&dir.path().join("runs")))
        .with_run_store(RunStore::new(dir.path().join("run-progress.json")));

        let run = orch.execute_full_workflow(options()).await.unwrap();
        let run_dir = run.artifact_dir.clone().unwrap();
        for name in [
            "detection-results.json",
            "error-analysis.json",
            "repair-results.json",
            "verification-results.json",
            "commit-result.json",
            "report.json",
            "report.md",
            "executive-summary.md",
            "run.json",
        ] {
            assert!(run_dir.join(name).exists(), "missing {}", name);
        }
        assert!(!run_dir.join("error.json").exists());

        let store = RunStore::new(dir.path().join("run-progress.json"));
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.run.status, RunStatus::Partial);
        assert!(store.load_resumable().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fatal_error_writes_error_artifact() {
        let dir = tempdir().unwrap();
        // A directory where the snapshot file should go makes every save fail.
        let blocked = dir.path().join("run-progress.json");
        std::fs::create_dir_all(&blocked).unwrap();

        let mut orch = Orchestrator::new(
            vec![detector("a", vec![DetectorReport::passed("ok")])],
            executor(StrategyRegistry::new()),
        )
        .with_artifacts(ArtifactStore::new(&dir.path().join("runs")))
        .with_run_store(RunStore::new(blocked));

        let err = orch.execute_full_workflow(options()).await.unwrap_err();
        let WorkflowError::Fatal {
            phase,
            error_artifact,
            ..
        } = err
        else {
            panic!("expected fatal error");
        };
        assert_eq!(phase, Phase::Analysis);
        let artifact = error_artifact.unwrap();
        let record: FatalRecord =
            serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
        assert_eq!(record.phase, Phase::Analysis);
        assert!(record.chain.len() >= 2);
        assert!(artifact.parent().unwrap().join("report.json").exists());
        assert_eq!(
            orch.tracker().progress().unwrap().status,
            TrackerStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_resume_continues_from_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run-progress.json");

        // Simulate a process that died after detection and analysis.
        let mut tracker = ProgressTracker::new();
        tracker.start_run().unwrap();
        tracker.set_phase_progress(Phase::Detection, 100).unwrap();
        let first = Arc::new(ScriptedDetector::new("a", vec![DetectorReport::failed("404")]));
        let interrupted =
            Orchestrator::new(vec![first.clone()], executor(StrategyRegistry::new()));
        let detection = interrupted.detect_only().await;
        let (analysis, plan) = interrupted.analyze(&detection);
        tracker.set_phase_progress(Phase::Analysis, 100).unwrap();
        let progress = tracker.snapshot().unwrap();
        let mut run = WorkflowRun::new(&progress, options());
        run.detection = detection;
        run.analysis = Some(analysis);
        run.plan = Some(plan);
        RunStore::new(path.clone())
            .save(&RunSnapshot {
                run: run.clone(),
                progress,
            })
            .unwrap();

        let fixer = Arc::new(MockStrategy::new("fixer", Behaviour::Apply));
        let second = Arc::new(ScriptedDetector::new("a", vec![DetectorReport::passed("ok")]));
        let mut orch = Orchestrator::new(
            vec![second.clone()],
            executor(StrategyRegistry::new().with(IssueCategory::MissingRoute, fixer.clone())),
        )
        .with_run_store(RunStore::new(path));

        let resumed = orch
            .execute_full_workflow(WorkflowOptions {
                resume: true,
                ..options()
            })
            .await
            .unwrap();
        assert_eq!(resumed.id, run.id);
        assert_eq!(fixer.seen.lock().unwrap().len(), 1);
        // Verification only; detection was not repeated.
        assert_eq!(second.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(resumed.status, RunStatus::Completed);
        assert!(
            resumed
                .timeline
                .iter()
                .any(|e| e.event == timeline::RUN_RESUMED)
        );
    }

    #[tokio::test]
    async fn test_resume_mid_fixing_skips_settled_repairs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run-progress.json");

        // The route fix lands, then the process dies inside the server fix.
        let registry = StrategyRegistry::new()
            .with(
                IssueCategory::MissingRoute,
                Arc::new(MockStrategy::new("route", Behaviour::Apply)),
            )
            .with(
                IssueCategory::ServerError,
                Arc::new(MockStrategy::new("server", Behaviour::Hang)),
            );
        let mut doomed = Orchestrator::new(
            vec![
                detector("a", vec![DetectorReport::failed("404")]),
                detector("b", vec![DetectorReport::failed("500")]),
            ],
            RepairExecutor::new(registry, Duration::from_secs(60)),
        )
        .with_run_store(RunStore::new(path.clone()));
        let killed = tokio::time::timeout(
            Duration::from_secs(1),
            doomed.execute_full_workflow(options()),
        )
        .await;
        assert!(killed.is_err());

        let snapshot = RunStore::new(path.clone())
            .load_resumable()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.progress.current_phase, Some(Phase::Fixing));
        let statuses: Vec<_> = snapshot
            .run
            .repair
            .as_ref()
            .unwrap()
            .actions
            .iter()
            .map(|a| a.status)
            .collect();
        assert_eq!(statuses, vec![RepairStatus::Succeeded, RepairStatus::Planned]);

        let route = Arc::new(MockStrategy::new("route", Behaviour::Apply));
        let server = Arc::new(MockStrategy::new("server", Behaviour::Apply));
        let mut orch = Orchestrator::new(
            vec![
                detector("a", vec![DetectorReport::passed("ok")]),
                detector("b", vec![DetectorReport::passed("ok")]),
            ],
            executor(
                StrategyRegistry::new()
                    .with(IssueCategory::MissingRoute, route.clone())
                    .with(IssueCategory::ServerError, server.clone()),
            ),
        )
        .with_run_store(RunStore::new(path));

        let resumed = orch
            .execute_full_workflow(WorkflowOptions {
                resume: true,
                ..options()
            })
            .await
            .unwrap();
        assert_eq!(resumed.id, snapshot.run.id);
        assert!(route.seen.lock().unwrap().is_empty());
        assert_eq!(server.seen.lock().unwrap().len(), 1);
        assert_eq!(resumed.repair.as_ref().unwrap().successful, 2);
        assert_eq!(resumed.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_strategies_see_run_id_and_project_dir() {
        let fixer = Arc::new(MockStrategy::new("fixer", Behaviour::Apply));
        let mut orch = Orchestrator::new(
            vec![detector(
                "a",
                vec![DetectorReport::failed("404"), DetectorReport::passed("ok")],
            )],
            executor(StrategyRegistry::new().with(IssueCategory::MissingRoute, fixer.clone())),
        )
        .with_project_dir("/srv/app");

        let run = orch.execute_full_workflow(options()).await.unwrap();
        let contexts = fixer.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].run_id, Some(run.id));
        assert_eq!(contexts[0].project_dir, Some(PathBuf::from("/srv/app")));
        assert!(!contexts[0].dry_run);
    }

    #[test]
    fn test_failing_phase_falls_back_to_last_completed() {
        assert_eq!(failing_phase(None), Phase::Detection);

        let mut tracker = ProgressTracker::new();
        tracker.start_run().unwrap();
        tracker.set_phase_progress(Phase::Detection, 100).unwrap();
        tracker.set_phase_progress(Phase::Analysis, 100).unwrap();
        let mut progress = tracker.snapshot().unwrap();
        assert_eq!(failing_phase(Some(&progress)), Phase::Fixing);

        progress.current_phase = None;
        assert_eq!(failing_phase(Some(&progress)), Phase::Analysis);
    }

    #[tokio::test]
    async fn test_orchestrator_can_run_twice() {
        let mut orch = Orchestrator::new(
            vec![detector("a", vec![DetectorReport::passed("ok")])],
            executor(StrategyRegistry::new()),
        );
        let first = orch.execute_full_workflow(options()).await.unwrap();
        let second = orch.execute_full_workflow(options()).await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
