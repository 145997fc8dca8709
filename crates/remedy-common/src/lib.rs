//! Shared domain types for the remedy orchestrator.
//!
//! - [`issue`]: detected defects and their classification taxonomy
//! - [`repair`]: planned/executed repair actions and their status machine
//! - [`contract`]: the result shapes exchanged with external detectors and
//!   repair strategies

pub mod contract;
pub mod issue;
pub mod repair;

pub use contract::{DetectorReport, RepairResult, ReportedFailure};
pub use issue::{Issue, IssueCategory, IssueId, Severity, UNKNOWN_AREA};
pub use repair::{RepairAction, RepairErrorKind, RepairStatus};

use thiserror::Error;

/// Validation errors raised when constructing or mutating model records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Issue field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    #[error("Unknown issue category '{0}'")]
    UnknownCategory(String),

    #[error("Unknown severity '{0}'")]
    UnknownSeverity(String),

    #[error("Repair action for issue {issue} is already {status} and cannot be changed")]
    RepairAlreadySettled { issue: String, status: RepairStatus },
}
