use super::RepairPlan;
use super::strategies::{RepairContext, StrategyRegistry};
use crate::errors::RepairError;
use futures::FutureExt;
use remedy_common::{Issue, IssueId, RepairAction, RepairErrorKind, RepairStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{info, warn};

/// Aggregate result of executing a plan.
///
/// `total` counts executed actions only, so `total == successful + failed`;
/// skipped actions are reported separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub actions: Vec<RepairAction>,
}

impl RepairOutcome {
    pub fn from_actions(actions: Vec<RepairAction>) -> Self {
        let count = |status: RepairStatus| actions.iter().filter(|a| a.status == status).count();
        let successful = count(RepairStatus::Succeeded);
        let failed = count(RepairStatus::Failed);
        let skipped = count(RepairStatus::Skipped);
        Self {
            total: successful + failed,
            successful,
            failed,
            skipped,
            actions,
        }
    }
}

pub struct RepairExecutor {
    registry: StrategyRegistry,
    default_timeout: Duration,
}

impl RepairExecutor {
    pub fn new(registry: StrategyRegistry, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Apply every action in `plan` in order. Never fails as a whole: each
    /// action ends `succeeded`, `failed` or `skipped`. Actions already settled
    /// (from a resumed run) are kept as recorded.
    ///
    /// `on_progress` sees the actions settled so far after each step, so the
    /// caller can persist them before the next repair starts.
    pub async fn execute<F>(
        &self,
        plan: &RepairPlan,
        issues: &[Issue],
        ctx: &RepairContext,
        mut on_progress: F,
    ) -> RepairOutcome
    where
        F: FnMut(&[RepairAction], usize),
    {
        let by_id: HashMap<&IssueId, &Issue> = issues.iter().map(|i| (i.id(), i)).collect();
        let total = plan.actions.len();
        let mut actions = Vec::with_capacity(total);

        for planned in &plan.actions {
            let mut action = planned.clone();
            if !action.is_settled() {
                let issue = by_id.get(&action.target_issue).copied();
                self.settle(&mut action, issue, ctx).await;
            }
            actions.push(action);
            on_progress(&actions, total);
        }

        let outcome = RepairOutcome::from_actions(actions);
        info!(
            total = outcome.total,
            successful = outcome.successful,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "repairs executed"
        );
        outcome
    }

    async fn settle(&self, action: &mut RepairAction, issue: Option<&Issue>, ctx: &RepairContext) {
        let result = match issue {
            _ if ctx.dry_run => action.skip("Dry run: repair not applied"),
            None => action.fail(
                RepairErrorKind::StrategyFailure,
                format!("Target issue {} not found", action.target_issue),
            ),
            Some(issue) => match self.apply(issue, ctx).await {
                Ok(detail) => action.succeed(detail),
                Err(e) => {
                    warn!(issue = %action.target_issue, error = %e, "repair failed");
                    action.fail(e.kind(), e.to_string())
                }
            },
        };
        // Only fresh actions reach here, so settling cannot conflict.
        if let Err(e) = result {
            warn!(error = %e, "could not record repair outcome");
        }
    }

    /// Run the category's strategy under its timeout, converting panics and
    /// `applied: false` into errors.
    async fn apply(&self, issue: &Issue, ctx: &RepairContext) -> Result<String, RepairError> {
        let strategy = self
            .registry
            .get(issue.category())
            .ok_or(RepairError::UnsupportedCategory {
                category: issue.category(),
            })?;
        let name = strategy.name().to_string();
        let limit = strategy.timeout().unwrap_or(self.default_timeout);

        let guarded = AssertUnwindSafe(strategy.apply(issue, ctx)).catch_unwind();
        match tokio::time::timeout(limit, guarded).await {
            Err(_) => Err(RepairError::Timeout {
                strategy: name,
                secs: limit.as_secs(),
            }),
            Ok(Err(payload)) => Err(RepairError::Panicked {
                strategy: name,
                message: panic_message(payload.as_ref()),
            }),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok(result))) if result.applied => Ok(result.detail),
            Ok(Ok(Ok(result))) => Err(RepairError::StrategyFailure {
                strategy: name,
                message: result.detail,
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
