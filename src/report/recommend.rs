//! Fixed recommendation templates keyed to observed conditions.

use super::quality::QualityScore;
use crate::commit::CommitOutcome;
use remedy_common::{Issue, IssueCategory, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dimensions scoring below this get an improvement recommendation.
const DIMENSION_FLOOR: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Severity,
    pub title: String,
    pub detail: String,
}

impl Recommendation {
    fn new(priority: Severity, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Observed conditions the templates key on.
pub struct RecommendationInputs<'a> {
    pub errors_remaining: usize,
    pub failed_repairs: usize,
    pub manual: &'a [Issue],
    pub remaining: &'a [&'a Issue],
    pub quality: &'a QualityScore,
    pub commit: Option<&'a CommitOutcome>,
}

/// Deterministic: the same inputs always yield the same list, sorted by
/// priority (critical first), template order within a priority.
pub fn generate_recommendations(inputs: &RecommendationInputs<'_>) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if inputs.errors_remaining > 0 {
        recs.push(Recommendation::new(
            Severity::High,
            "Manually check remaining errors",
            format!(
                "{} issue(s) still fail after verification; inspect the affected pages by hand.",
                inputs.errors_remaining
            ),
        ));
    }

    if inputs.failed_repairs > 0 {
        recs.push(Recommendation::new(
            Severity::High,
            "Review failing repair strategies",
            format!(
                "{} repair action(s) failed; check the strategy output in repair-results.json.",
                inputs.failed_repairs
            ),
        ));
    }

    if !inputs.manual.is_empty() {
        let locations: Vec<&str> = inputs.manual.iter().map(|i| i.location()).collect();
        recs.push(Recommendation::new(
            Severity::Medium,
            "Issues require manual attention",
            format!(
                "Not auto-fixable: {}",
                locations.join(", ")
            ),
        ));
    }

    let mut by_category: BTreeMap<IssueCategory, usize> = BTreeMap::new();
    for issue in inputs.remaining {
        *by_category.entry(issue.category()).or_default() += 1;
    }
    for (category, count) in by_category {
        let rec = if count > 1 {
            Recommendation::new(
                Severity::Medium,
                format!("Batch-process {} issues", category),
                format!(
                    "{} issues of category {} remain; fix them together.",
                    count, category
                ),
            )
        } else {
            Recommendation::new(
                Severity::Low,
                format!("Prioritise the remaining {} issue", category),
                format!("1 issue of category {} remains.", category),
            )
        };
        recs.push(rec);
    }

    for dim in &inputs.quality.dimensions {
        if dim.score < DIMENSION_FLOOR {
            recs.push(Recommendation::new(
                Severity::Medium,
                format!("Improve {}", dim.dimension),
                format!(
                    "{} scored {:.1} ({}). {}",
                    dim.dimension,
                    dim.score,
                    dim.grade,
                    dim.findings.join("; ")
                )
                .trim_end()
                .to_string(),
            ));
        }
    }

    if let Some(CommitOutcome::Failed { reason }) = inputs.commit {
        recs.push(Recommendation::new(
            Severity::High,
            "Commit the repairs manually",
            format!("The automatic commit failed: {}", reason),
        ));
    }

    if recs.is_empty() {
        recs.push(Recommendation::new(
            Severity::Low,
            "Keep monitoring",
            "All areas pass and every quality dimension is healthy.",
        ));
    }

    recs.sort_by_key(|r| r.priority);
    recs
}
