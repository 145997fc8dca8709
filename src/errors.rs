//! Typed error hierarchy for the remedy orchestrator.
//!
//! Four top-level enums cover the subsystems:
//! - `TrackerError`: misuse of the progress tracker (fatal to the call only)
//! - `DetectorError`: an external detector crashed, timed out or spoke garbage
//! - `RepairError`: a single repair action could not be applied
//! - `WorkflowError`: what `Orchestrator::execute_full_workflow` re-raises
//!
//! Everything except `WorkflowError::Fatal` is recovered locally and folded
//! into issue/repair/report data.

use crate::tracker::Phase;
use remedy_common::{IssueCategory, RepairErrorKind};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the progress tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Run {run_id} is already active on this tracker")]
    AlreadyRunning { run_id: Uuid },

    #[error("Invalid phase transition: current phase is {expected}, got update for {got}")]
    InvalidPhaseTransition { expected: String, got: Phase },

    #[error("No active run")]
    NoActiveRun,

    #[error("Progress {percent}% is outside 0..=100")]
    ProgressOutOfRange { percent: u8 },

    #[error("Failed to append timeline event to {path}: {source}")]
    TimelinePersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from invoking a single detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector for '{area}' timed out after {secs}s")]
    Timeout { area: String, secs: u64 },

    #[error("Failed to spawn detector for '{area}': {source}")]
    Spawn {
        area: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Required detector entry point for '{area}' is missing: {path}")]
    MissingEntryPoint { area: String, path: PathBuf },

    #[error("Detector for '{area}' produced invalid output: {message}")]
    InvalidOutput { area: String, message: String },

    #[error("HTTP check for '{area}' failed: {message}")]
    Http { area: String, message: String },
}

/// Errors from applying a single repair action.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("No repair strategy registered for category {category}")]
    UnsupportedCategory { category: IssueCategory },

    #[error("Strategy '{strategy}' failed: {message}")]
    StrategyFailure { strategy: String, message: String },

    #[error("Strategy '{strategy}' timed out after {secs}s")]
    Timeout { strategy: String, secs: u64 },

    #[error("Strategy '{strategy}' panicked: {message}")]
    Panicked { strategy: String, message: String },
}

impl RepairError {
    pub fn kind(&self) -> RepairErrorKind {
        match self {
            RepairError::UnsupportedCategory { .. } => RepairErrorKind::UnsupportedCategory,
            RepairError::StrategyFailure { .. } => RepairErrorKind::StrategyFailure,
            RepairError::Timeout { .. } => RepairErrorKind::Timeout,
            RepairError::Panicked { .. } => RepairErrorKind::Panicked,
        }
    }
}

/// Errors surfaced by the workflow orchestrator to its caller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No detectors registered; nothing to run")]
    NoDetectors,

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Workflow failed during {phase} phase: {message}")]
    Fatal {
        phase: Phase,
        message: String,
        error_artifact: Option<PathBuf>,
    },
}
