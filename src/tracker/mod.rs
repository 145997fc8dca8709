//! Progress tracker: the phase state machine and the run timeline.
//!
//! The tracker is the single source of truth for "where are we in the
//! pipeline" and "what happened". Observers are pushed a [`TrackerEvent`] on
//! every phase start/completion and on run completion or failure.

pub mod events;
pub mod phase;
pub mod timeline;

pub use events::{ProgressObserver, TrackerEvent};
pub use phase::{Phase, PhaseState, TrackerStatus};
pub use timeline::{TimelineEvent, TimelineLog};

use crate::errors::TrackerError;
use chrono::{DateTime, Utc};
use events::Notifier;
use remedy_common::{Issue, IssueCategory, RepairAction, RepairStatus, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Run-level counters folded in by the aggregation helpers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_errors: usize,
    pub by_category: BTreeMap<IssueCategory, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub auto_fixable: usize,
    pub unclassified: usize,
    pub fixes_total: usize,
    pub fixes_successful: usize,
    pub fixes_failed: usize,
    pub fixes_skipped: usize,
}

/// Everything the tracker knows about one run. Serializable so it can be
/// snapshotted at phase boundaries and restored for resumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: Uuid,
    pub status: TrackerStatus,
    pub current_phase: Option<Phase>,
    pub phases: Vec<PhaseState>,
    pub timeline: Vec<TimelineEvent>,
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunProgress {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: TrackerStatus::Running,
            current_phase: Some(Phase::first()),
            phases: Phase::ALL.iter().map(|p| PhaseState::pending(*p)).collect(),
            timeline: Vec::new(),
            summary: RunSummary::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn phase(&self, phase: Phase) -> &PhaseState {
        &self.phases[phase.index()]
    }

    /// Overall progress across all phases, 0..=100.
    pub fn overall_percent(&self) -> u8 {
        let sum: u32 = self.phases.iter().map(|p| p.progress_percent as u32).sum();
        (sum / Phase::ALL.len() as u32) as u8
    }

    pub fn is_active(&self) -> bool {
        self.status == TrackerStatus::Running
    }

    /// Latest phase in pipeline order that has completed.
    pub fn last_completed_phase(&self) -> Option<Phase> {
        self.phases
            .iter()
            .rev()
            .find(|p| p.completed_at.is_some())
            .map(|p| p.name)
    }
}

pub struct ProgressTracker {
    progress: Option<RunProgress>,
    notifier: Notifier,
    log: Option<TimelineLog>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            progress: None,
            notifier: Notifier::new(),
            log: None,
        }
    }

    /// Mirror every timeline entry into an append-only file.
    pub fn with_timeline_log(mut self, log: TimelineLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn register_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.notifier.register(observer);
    }

    /// Receive events asynchronously; only events sent after subscribing arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.notifier.subscribe()
    }

    pub fn progress(&self) -> Option<&RunProgress> {
        self.progress.as_ref()
    }

    pub fn snapshot(&self) -> Option<RunProgress> {
        self.progress.clone()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.progress.as_ref().and_then(|p| p.current_phase)
    }

    pub fn is_active(&self) -> bool {
        self.progress.as_ref().is_some_and(|p| p.is_active())
    }

    /// Begin a fresh run at the first phase, 0%.
    pub fn start_run(&mut self) -> Result<Uuid, TrackerError> {
        if let Some(p) = &self.progress
            && p.is_active()
        {
            return Err(TrackerError::AlreadyRunning { run_id: p.run_id });
        }

        let run_id = Uuid::new_v4();
        let mut progress = RunProgress::new(run_id);
        let first = Phase::first();
        progress.phases[first.index()].started_at = Some(Utc::now());
        push_timeline(
            &mut progress,
            self.log.as_ref(),
            TimelineEvent::new(None, timeline::RUN_STARTED, format!("run {}", run_id)),
        );
        push_timeline(
            &mut progress,
            self.log.as_ref(),
            TimelineEvent::new(Some(first), timeline::PHASE_STARTED, ""),
        );
        self.progress = Some(progress);

        info!(%run_id, "run started");
        self.notifier.emit(TrackerEvent::RunStarted { run_id });
        self.notifier.emit(TrackerEvent::PhaseStarted {
            run_id,
            phase: first,
        });
        Ok(run_id)
    }

    /// Adopt a previously snapshotted run, e.g. to resume after a crash.
    pub fn restore(&mut self, progress: RunProgress) -> Result<(), TrackerError> {
        if let Some(p) = &self.progress
            && p.is_active()
        {
            return Err(TrackerError::AlreadyRunning { run_id: p.run_id });
        }
        info!(run_id = %progress.run_id, phase = ?progress.current_phase, "run restored");
        self.progress = Some(progress);
        Ok(())
    }

    /// Update the current phase's progress. Reaching 100 completes the phase
    /// and advances to the next one (or completes the run after the last).
    ///
    /// Updates for an already-completed phase are ignored, so repeating a
    /// 100% update never advances twice. Lower values than the recorded
    /// progress are ignored as well.
    pub fn set_phase_progress(&mut self, phase: Phase, percent: u8) -> Result<(), TrackerError> {
        if percent > 100 {
            return Err(TrackerError::ProgressOutOfRange { percent });
        }
        let progress = self.progress.as_mut().ok_or(TrackerError::NoActiveRun)?;

        if progress.phases[phase.index()].is_complete() {
            debug!(%phase, percent, "ignoring progress for completed phase");
            return Ok(());
        }
        if !progress.is_active() {
            return Err(TrackerError::NoActiveRun);
        }
        if progress.current_phase != Some(phase) {
            return Err(TrackerError::InvalidPhaseTransition {
                expected: progress
                    .current_phase
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                got: phase,
            });
        }

        let state = &mut progress.phases[phase.index()];
        if percent <= state.progress_percent {
            return Ok(());
        }
        state.progress_percent = percent;
        let run_id = progress.run_id;
        self.notifier.emit(TrackerEvent::PhaseProgress {
            run_id,
            phase,
            percent,
        });

        if percent == 100 {
            self.complete_current(phase);
        }
        Ok(())
    }

    /// Jump a phase straight to 100% with an explanatory timeline entry.
    pub fn fast_forward(&mut self, phase: Phase, reason: &str) -> Result<(), TrackerError> {
        let progress = self.progress.as_mut().ok_or(TrackerError::NoActiveRun)?;
        if !progress.phases[phase.index()].is_complete() && progress.current_phase == Some(phase)
        {
            push_timeline(
                progress,
                self.log.as_ref(),
                TimelineEvent::new(Some(phase), timeline::FAST_FORWARDED, reason),
            );
        }
        self.set_phase_progress(phase, 100)
    }

    /// Append a free-form entry. Only fails when the persisted log cannot be written.
    pub fn record_timeline_event(
        &mut self,
        phase: Option<Phase>,
        event: &str,
        detail: &str,
    ) -> Result<(), TrackerError> {
        let entry = TimelineEvent::new(phase, event, detail);
        if let Some(log) = &self.log {
            log.append(&entry)?;
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.timeline.push(entry);
        }
        Ok(())
    }

    /// Move the run into the absorbing `failed` state.
    pub fn fail_run(&mut self, message: &str) -> Result<(), TrackerError> {
        let progress = self.progress.as_mut().ok_or(TrackerError::NoActiveRun)?;
        if !progress.is_active() {
            return Err(TrackerError::NoActiveRun);
        }
        let phase = progress.current_phase;
        progress.status = TrackerStatus::Failed;
        progress.ended_at = Some(Utc::now());
        push_timeline(
            progress,
            self.log.as_ref(),
            TimelineEvent::new(phase, timeline::RUN_FAILED, message),
        );
        let run_id = progress.run_id;
        warn!(%run_id, ?phase, reason = message, "run failed");
        self.notifier.emit(TrackerEvent::RunFailed {
            run_id,
            phase,
            message: message.to_string(),
        });
        Ok(())
    }

    /// Fold classified issues into the run summary.
    pub fn update_error_statistics(&mut self, issues: &[Issue]) {
        let Some(progress) = self.progress.as_mut() else {
            return;
        };
        let summary = &mut progress.summary;
        summary.total_errors = issues.len();
        summary.by_category.clear();
        summary.by_severity.clear();
        for issue in issues {
            *summary.by_category.entry(issue.category()).or_default() += 1;
            *summary.by_severity.entry(issue.severity()).or_default() += 1;
        }
        summary.auto_fixable = issues.iter().filter(|i| i.auto_fixable()).count();
        summary.unclassified = issues.iter().filter(|i| i.is_unclassified()).count();
    }

    /// Fold executed repair actions into the run summary.
    pub fn update_fix_statistics(&mut self, actions: &[RepairAction]) {
        let Some(progress) = self.progress.as_mut() else {
            return;
        };
        let count = |status: RepairStatus| actions.iter().filter(|a| a.status == status).count();
        let summary = &mut progress.summary;
        summary.fixes_successful = count(RepairStatus::Succeeded);
        summary.fixes_failed = count(RepairStatus::Failed);
        summary.fixes_skipped = count(RepairStatus::Skipped);
        summary.fixes_total = summary.fixes_successful + summary.fixes_failed;
    }

    fn complete_current(&mut self, phase: Phase) {
        let Some(progress) = self.progress.as_mut() else {
            return;
        };
        let run_id = progress.run_id;
        progress.phases[phase.index()].completed_at = Some(Utc::now());
        push_timeline(
            progress,
            self.log.as_ref(),
            TimelineEvent::new(Some(phase), timeline::PHASE_COMPLETED, ""),
        );
        info!(%run_id, %phase, "phase completed");
        self.notifier
            .emit(TrackerEvent::PhaseCompleted { run_id, phase });

        match phase.next() {
            Some(next) => {
                progress.current_phase = Some(next);
                progress.phases[next.index()].started_at = Some(Utc::now());
                push_timeline(
                    progress,
                    self.log.as_ref(),
                    TimelineEvent::new(Some(next), timeline::PHASE_STARTED, ""),
                );
                self.notifier.emit(TrackerEvent::PhaseStarted {
                    run_id,
                    phase: next,
                });
            }
            None => {
                progress.current_phase = None;
                progress.status = TrackerStatus::Completed;
                progress.ended_at = Some(Utc::now());
                push_timeline(
                    progress,
                    self.log.as_ref(),
                    TimelineEvent::new(None, timeline::TASK_COMPLETED, ""),
                );
                info!(%run_id, "run completed");
                self.notifier.emit(TrackerEvent::RunCompleted { run_id });
            }
        }
    }
}

/// Record an internal transition. Log write failures are reported but never
/// block the state machine.
fn push_timeline(progress: &mut RunProgress, log: Option<&TimelineLog>, event: TimelineEvent) {
    if let Some(log) = log
        && let Err(e) = log.append(&event)
    {
        warn!(error = %e, "failed to persist timeline event");
    }
    progress.timeline.push(event);
}
