//! Repair planning and execution.
//!
//! [`plan_repairs`] turns classified issues into an ordered plan;
//! [`RepairExecutor`] applies it one action at a time, recording the outcome
//! of each action without letting one failure stop the batch.

pub mod executor;
pub mod strategies;

pub use executor::{RepairExecutor, RepairOutcome};
pub use strategies::{
    CommandStrategy, RepairContext, RepairStrategy, ScaffoldPageStrategy, StrategyRegistry,
};

use remedy_common::{Issue, RepairAction};
use serde::{Deserialize, Serialize};

/// Strategy id recorded on actions whose category has no registered strategy.
pub const UNSUPPORTED_STRATEGY: &str = "unsupported";

/// Output of the planning step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    /// One action per auto-fixable issue, grouped by category, detection
    /// order within a category.
    pub actions: Vec<RepairAction>,
    /// Issues that need a human; carried through to the report.
    pub manual: Vec<Issue>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Build the repair plan for `issues`.
///
/// Non auto-fixable issues go to `manual`, never dropped. Categories with no
/// registered strategy still get an action so the executor can record the
/// unsupported category as a failure.
pub fn plan_repairs(issues: &[Issue], registry: &StrategyRegistry) -> RepairPlan {
    let (mut fixable, manual): (Vec<&Issue>, Vec<&Issue>) =
        issues.iter().partition(|i| i.auto_fixable());

    // Stable: detection order is kept within each category.
    fixable.sort_by_key(|i| i.category());

    let actions = fixable
        .into_iter()
        .map(|issue| {
            let strategy = registry
                .get(issue.category())
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| UNSUPPORTED_STRATEGY.to_string());
            RepairAction::planned(issue, &strategy)
        })
        .collect();

    RepairPlan {
        actions,
        manual: manual.into_iter().cloned().collect(),
    }
}
