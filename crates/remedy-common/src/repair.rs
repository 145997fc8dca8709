use crate::ModelError;
use crate::issue::{Issue, IssueCategory, IssueId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStatus {
    Planned,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairStatus::Planned => "planned",
            RepairStatus::Succeeded => "succeeded",
            RepairStatus::Failed => "failed",
            RepairStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a repair action failed. Recorded on the action instead of propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairErrorKind {
    UnsupportedCategory,
    StrategyFailure,
    Timeout,
    Panicked,
}

/// One planned-then-executed attempt to resolve a single issue.
///
/// Status moves `planned → succeeded | failed | skipped` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAction {
    pub target_issue: IssueId,
    pub category: IssueCategory,
    pub strategy: String,
    pub status: RepairStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RepairErrorKind>,
}

impl RepairAction {
    pub fn planned(issue: &Issue, strategy: &str) -> Self {
        Self {
            target_issue: issue.id().clone(),
            category: issue.category(),
            strategy: strategy.to_string(),
            status: RepairStatus::Planned,
            detail: format!("Planned {} repair for {}", issue.category(), issue.location()),
            timestamp: Utc::now(),
            error_kind: None,
        }
    }

    pub fn succeed(&mut self, detail: impl Into<String>) -> Result<(), ModelError> {
        self.settle(RepairStatus::Succeeded, detail.into(), None)
    }

    pub fn fail(&mut self, kind: RepairErrorKind, detail: impl Into<String>) -> Result<(), ModelError> {
        self.settle(RepairStatus::Failed, detail.into(), Some(kind))
    }

    pub fn skip(&mut self, detail: impl Into<String>) -> Result<(), ModelError> {
        self.settle(RepairStatus::Skipped, detail.into(), None)
    }

    pub fn is_settled(&self) -> bool {
        self.status != RepairStatus::Planned
    }

    fn settle(
        &mut self,
        status: RepairStatus,
        detail: String,
        kind: Option<RepairErrorKind>,
    ) -> Result<(), ModelError> {
        if self.is_settled() {
            return Err(ModelError::RepairAlreadySettled {
                issue: self.target_issue.to_string(),
                status: self.status,
            });
        }
        self.status = status;
        self.detail = detail;
        self.error_kind = kind;
        self.timestamp = Utc::now();
        Ok(())
    }
}
