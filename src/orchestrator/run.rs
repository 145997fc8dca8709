//! The `WorkflowRun` aggregate and its per-phase payloads.

use crate::commit::CommitOutcome;
use crate::detect::{DetectorOutcome, ErrorAnalysis, OutcomeKind};
use crate::repair::{RepairOutcome, RepairPlan};
use crate::tracker::{Phase, PhaseState, RunProgress, TimelineEvent};
use chrono::{DateTime, Utc};
use remedy_common::{Issue, RepairAction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Knobs for one `execute_full_workflow` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    pub auto_commit: bool,
    /// Plan repairs but record every action as skipped.
    pub dry_run: bool,
    /// Continue a persisted `running` snapshot instead of starting fresh.
    pub resume: bool,
    /// Consecutive passing verification runs required before an area counts
    /// as fixed.
    pub verification_passes: u32,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            auto_commit: true,
            dry_run: false,
            resume: false,
            verification_passes: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    /// Every available area passes at verification.
    Completed,
    /// The pipeline finished but some areas still fail, or the commit failed.
    Partial,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How one area fared between detection and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaStatus {
    /// Passed at detection and at every verification pass.
    Passing,
    /// Failed at detection, passed every verification pass.
    Fixed,
    StillFailing,
    /// Passed at detection, failed at verification.
    Regressed,
    /// Detector unavailable; excluded from the success rate.
    Unknown,
}

impl AreaStatus {
    pub fn is_green(self) -> bool {
        matches!(self, AreaStatus::Passing | AreaStatus::Fixed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaVerification {
    pub area: String,
    pub before: OutcomeKind,
    pub after: OutcomeKind,
    pub passes_required: u32,
    pub passes_passed: u32,
    pub status: AreaStatus,
}

/// Result of the verification phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passes: u32,
    pub areas: Vec<AreaVerification>,
    /// Outcomes of the last pass, sorted by area.
    pub outcomes: Vec<DetectorOutcome>,
    pub success_rate: f64,
}

impl VerificationOutcome {
    /// Compare detection against every verification pass.
    ///
    /// An area is green only when it passed in all passes. The success rate
    /// is green areas over available areas; with no available area it is 0.
    pub fn compute(before: &[DetectorOutcome], passes: &[Vec<DetectorOutcome>]) -> Self {
        let required = passes.len() as u32;
        let areas: Vec<AreaVerification> = before
            .iter()
            .map(|b| {
                let results: Vec<&DetectorOutcome> = passes
                    .iter()
                    .filter_map(|pass| pass.iter().find(|o| o.area == b.area))
                    .collect();
                let passes_passed = results.iter().filter(|o| o.passed()).count() as u32;
                let after = results.last().map(|o| o.kind).unwrap_or(b.kind);
                let all_green = required > 0 && passes_passed == required;

                let status = if !b.is_available() || after == OutcomeKind::Unavailable {
                    AreaStatus::Unknown
                } else if all_green && b.passed() {
                    AreaStatus::Passing
                } else if all_green {
                    AreaStatus::Fixed
                } else if b.passed() {
                    AreaStatus::Regressed
                } else {
                    AreaStatus::StillFailing
                };
                AreaVerification {
                    area: b.area.clone(),
                    before: b.kind,
                    after,
                    passes_required: required,
                    passes_passed,
                    status,
                }
            })
            .collect();

        let available = areas
            .iter()
            .filter(|a| a.status != AreaStatus::Unknown)
            .count();
        let green = areas.iter().filter(|a| a.status.is_green()).count();
        let success_rate = if available == 0 {
            0.0
        } else {
            // Two decimals keep the JSON artifacts stable across reloads.
            (green as f64 / available as f64 * 10_000.0).round() / 100.0
        };

        Self {
            passes: required,
            areas,
            outcomes: passes.last().cloned().unwrap_or_default(),
            success_rate,
        }
    }

    pub fn area(&self, area: &str) -> Option<&AreaVerification> {
        self.areas.iter().find(|a| a.area == area)
    }
}

/// A fatal error captured during a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalRecord {
    pub run_id: Uuid,
    pub phase: Phase,
    pub message: String,
    /// Outermost first.
    pub chain: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The top-level aggregate for one pipeline execution.
///
/// Every phase writes its payload here; the report is generated from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub options: WorkflowOptions,
    pub phases: Vec<PhaseState>,
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub detection: Vec<DetectorOutcome>,
    #[serde(default)]
    pub analysis: Option<ErrorAnalysis>,
    #[serde(default)]
    pub plan: Option<RepairPlan>,
    #[serde(default)]
    pub repair: Option<RepairOutcome>,
    #[serde(default)]
    pub verification: Option<VerificationOutcome>,
    #[serde(default)]
    pub commit: Option<CommitOutcome>,
    pub success_rate: f64,
    #[serde(default)]
    pub error: Option<FatalRecord>,
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
}

impl WorkflowRun {
    pub fn new(progress: &RunProgress, options: WorkflowOptions) -> Self {
        Self {
            id: progress.run_id,
            started_at: progress.started_at,
            ended_at: None,
            status: RunStatus::Running,
            options,
            phases: progress.phases.clone(),
            timeline: progress.timeline.clone(),
            detection: Vec::new(),
            analysis: None,
            plan: None,
            repair: None,
            verification: None,
            commit: None,
            success_rate: 0.0,
            error: None,
            artifact_dir: None,
        }
    }

    /// Copy phase states and the timeline from the tracker.
    pub fn sync_progress(&mut self, progress: &RunProgress) {
        self.phases = progress.phases.clone();
        self.timeline = progress.timeline.clone();
    }

    pub fn issues(&self) -> &[Issue] {
        self.analysis
            .as_ref()
            .map(|a| a.issues.as_slice())
            .unwrap_or(&[])
    }

    /// Executed actions when available, otherwise the planned ones.
    pub fn repair_actions(&self) -> &[RepairAction] {
        match (&self.repair, &self.plan) {
            (Some(r), _) => &r.actions,
            (None, Some(p)) => &p.actions,
            (None, None) => &[],
        }
    }

    pub fn manual_issues(&self) -> &[Issue] {
        self.plan.as_ref().map(|p| p.manual.as_slice()).unwrap_or(&[])
    }

    /// The freshest detector outcomes: the last verification pass, falling
    /// back to detection.
    pub fn final_outcomes(&self) -> &[DetectorOutcome] {
        match &self.verification {
            Some(v) if !v.outcomes.is_empty() => &v.outcomes,
            _ => &self.detection,
        }
    }

    /// Issues whose area is still not green after verification. Without a
    /// verification phase every issue remains.
    pub fn remaining_issues(&self) -> Vec<&Issue> {
        match &self.verification {
            Some(v) => self
                .issues()
                .iter()
                .filter(|i| {
                    v.area(i.source_category())
                        .is_none_or(|a| !a.status.is_green())
                })
                .collect(),
            None => self.issues().iter().collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
