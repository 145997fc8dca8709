//! Pipeline phases and their per-run state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five pipeline stages, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Detection,
    Analysis,
    Fixing,
    Verification,
    Commit,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Detection,
        Phase::Analysis,
        Phase::Fixing,
        Phase::Verification,
        Phase::Commit,
    ];

    pub fn first() -> Phase {
        Phase::Detection
    }

    /// The phase after this one, `None` for the last.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Detection => Some(Phase::Analysis),
            Phase::Analysis => Some(Phase::Fixing),
            Phase::Fixing => Some(Phase::Verification),
            Phase::Verification => Some(Phase::Commit),
            Phase::Commit => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Detection => "detection",
            Phase::Analysis => "analysis",
            Phase::Fixing => "fixing",
            Phase::Verification => "verification",
            Phase::Commit => "commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detection" | "detect" => Ok(Phase::Detection),
            "analysis" | "analyze" => Ok(Phase::Analysis),
            "fixing" | "fix" => Ok(Phase::Fixing),
            "verification" | "verify" => Ok(Phase::Verification),
            "commit" => Ok(Phase::Commit),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: detection, analysis, fixing, verification, commit",
                s
            ),
        }
    }
}

/// Progress of one phase within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub name: Phase,
    pub progress_percent: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseState {
    pub fn pending(name: Phase) -> Self {
        Self {
            name,
            progress_percent: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Tracker-level state machine:
/// `idle → running(phase…) → completed`, with `failed` absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackerStatus::Idle => "idle",
            TrackerStatus::Running => "running",
            TrackerStatus::Completed => "completed",
            TrackerStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
