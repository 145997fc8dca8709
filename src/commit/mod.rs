//! The optional commit step: persist repaired files to version control.

mod git;

pub use git::GitCommitter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the commit step did. Only `Failed` indicates a problem; having
/// nothing to commit is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed { sha: String, message: String },
    NothingToCommit,
    Skipped { reason: String },
    Failed { reason: String },
}

impl CommitOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CommitOutcome::Failed { .. })
    }
}

/// Input for one commit attempt.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub run_id: Uuid,
    pub fixed: usize,
}

impl CommitRequest {
    pub fn message(&self) -> String {
        let id = self.run_id.to_string();
        format!(
            "remedy: automated repairs for run {} ({} issues fixed)",
            &id[..8],
            self.fixed
        )
    }
}

#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, request: &CommitRequest) -> CommitOutcome;
}
