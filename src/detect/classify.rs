//! Classification of raw detector failures into [`Issue`]s.
//!
//! Rules are evaluated in table order and the first match wins. Failures that
//! match nothing still become an `other` issue flagged unclassified.

use super::DetectorOutcome;
use regex::Regex;
use remedy_common::{Issue, IssueCategory, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

const EMPTY_FAILURE_MESSAGE: &str = "Detector reported failure without output";

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    pattern: Regex,
    pub category: IssueCategory,
    pub severity: Severity,
    pub auto_fixable: bool,
}

impl ClassificationRule {
    /// `pattern` is matched case-insensitively.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        category: IssueCategory,
        severity: Severity,
        auto_fixable: bool,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            category,
            severity,
            auto_fixable,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Result of classifying one piece of failure text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: IssueCategory,
    pub severity: Severity,
    pub auto_fixable: bool,
    pub unclassified: bool,
}

/// Output of the analysis phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Ordered by area, then by failure order within the area's report.
    pub issues: Vec<Issue>,
    pub by_category: BTreeMap<IssueCategory, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub failed_areas: Vec<String>,
    pub unclassified: usize,
}

impl ErrorAnalysis {
    pub fn total(&self) -> usize {
        self.issues.len()
    }

    pub fn auto_fixable(&self) -> usize {
        self.issues.iter().filter(|i| i.auto_fixable()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl Classifier {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let table: [(&str, &str, IssueCategory, Severity, bool); 4] = [
            (
                "missing-route",
                r"404|not found|failed to resolve component",
                IssueCategory::MissingRoute,
                Severity::Critical,
                true,
            ),
            (
                "server-error",
                r"500|internal server error|server error|502|503",
                IssueCategory::ServerError,
                Severity::High,
                true,
            ),
            (
                "ui-mismatch",
                r"not clickable|expected element|ui mismatch|layout",
                IssueCategory::UiMismatch,
                Severity::Medium,
                true,
            ),
            (
                "timeout",
                r"timed out|timeout",
                IssueCategory::Other,
                Severity::High,
                false,
            ),
        ];
        let rules = table
            .into_iter()
            .map(|(name, pattern, category, severity, fixable)| {
                ClassificationRule::new(name, pattern, category, severity, fixable)
                    .expect("built-in classification patterns are valid regexes")
            })
            .collect();
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn push_rule(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify_text(&self, text: &str) -> Classification {
        match self.rules.iter().find(|r| r.matches(text)) {
            Some(rule) => {
                debug!(rule = %rule.name, "classified failure");
                Classification {
                    category: rule.category,
                    severity: rule.severity,
                    auto_fixable: rule.auto_fixable,
                    unclassified: false,
                }
            }
            None => Classification {
                category: IssueCategory::Other,
                severity: Severity::Medium,
                auto_fixable: false,
                unclassified: true,
            },
        }
    }

    /// Turn every failed or errored outcome into issues. A report carrying a
    /// `failures` list yields one issue per entry; otherwise the whole report
    /// text becomes a single issue located at the area.
    pub fn analyze(&self, outcomes: &[DetectorOutcome]) -> ErrorAnalysis {
        let mut analysis = ErrorAnalysis::default();
        let mut seen = HashSet::new();

        for outcome in outcomes.iter().filter(|o| o.is_failure()) {
            analysis.failed_areas.push(outcome.area.clone());

            let raw: Vec<(String, Option<String>)> = if outcome.report.failures.is_empty() {
                vec![(outcome.report.text(), None)]
            } else {
                outcome
                    .report
                    .failures
                    .iter()
                    .map(|f| (f.message.clone(), f.location.clone()))
                    .collect()
            };

            for (message, location) in raw {
                let message = if message.trim().is_empty() {
                    EMPTY_FAILURE_MESSAGE.to_string()
                } else {
                    message
                };
                let class = self.classify_text(&message);
                let issue = match Issue::new(
                    &outcome.area,
                    class.category,
                    class.severity,
                    &message,
                    location.as_deref().unwrap_or(""),
                    class.auto_fixable,
                ) {
                    Ok(issue) if class.unclassified => issue.into_unclassified(),
                    Ok(issue) => issue,
                    Err(e) => {
                        warn!(area = %outcome.area, error = %e, "malformed failure kept as unclassified");
                        Issue::fallback(&outcome.area, &message)
                    }
                };

                // Identical failures reported twice collapse into one issue.
                if !seen.insert(issue.id().clone()) {
                    continue;
                }
                *analysis.by_category.entry(issue.category()).or_default() += 1;
                *analysis.by_severity.entry(issue.severity()).or_default() += 1;
                if issue.is_unclassified() {
                    analysis.unclassified += 1;
                }
                analysis.issues.push(issue);
            }
        }

        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::OutcomeKind;
    use remedy_common::{DetectorReport, ReportedFailure};

    fn outcome(area: &str, kind: OutcomeKind, report: DetectorReport) -> DetectorOutcome {
        DetectorOutcome {
            area: area.to_string(),
            kind,
            report,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_rule_table_order() {
        let c = Classifier::default();
        assert_eq!(c.classify_text("GET /x -> 404").category, IssueCategory::MissingRoute);
        assert_eq!(
            c.classify_text("Internal Server Error").category,
            IssueCategory::ServerError
        );
        assert_eq!(
            c.classify_text("element is not clickable at point").category,
            IssueCategory::UiMismatch
        );
        let t = c.classify_text("Detector for 'x' timed out after 5s");
        assert_eq!((t.category, t.severity, t.auto_fixable), (IssueCategory::Other, Severity::High, false));

        // First match wins: a 404 page that also mentions a 500.
        assert_eq!(c.classify_text("404 then 500").category, IssueCategory::MissingRoute);
    }

    #[test]
    fn test_unmatched_text_is_unclassified_other() {
        let c = Classifier::default();
        let class = c.classify_text("something odd happened");
        assert_eq!(class.category, IssueCategory::Other);
        assert!(class.unclassified);
        assert!(!class.auto_fixable);
    }

    #[test]
    fn test_analyze_two_missing_routes() {
        let outcomes = vec![
            outcome("centers", OutcomeKind::Passed, DetectorReport::passed("ok")),
            outcome("parent-center", OutcomeKind::Failed, DetectorReport::failed("HTTP 404")),
            outcome("teacher-center", OutcomeKind::Failed, DetectorReport::failed("404 not found")),
        ];
        let analysis = Classifier::default().analyze(&outcomes);

        assert_eq!(analysis.total(), 2);
        assert_eq!(analysis.by_category[&IssueCategory::MissingRoute], 2);
        assert_eq!(analysis.by_severity[&Severity::Critical], 2);
        assert_eq!(analysis.failed_areas, vec!["parent-center", "teacher-center"]);
        assert_eq!(analysis.issues[0].location(), "parent-center");
        assert_eq!(analysis.auto_fixable(), 2);
    }

    #[test]
    fn test_analyze_expands_failures_and_dedups() {
        let report = DetectorReport {
            success: false,
            failures: vec![
                ReportedFailure {
                    message: "404".into(),
                    location: Some("teacher/classes".into()),
                },
                ReportedFailure {
                    message: "layout shifted".into(),
                    location: Some("teacher/home".into()),
                },
                ReportedFailure {
                    message: "404".into(),
                    location: Some("teacher/classes".into()),
                },
            ],
            ..Default::default()
        };
        let analysis =
            Classifier::default().analyze(&[outcome("teacher", OutcomeKind::Failed, report)]);
        assert_eq!(analysis.total(), 2);
        assert_eq!(analysis.issues[0].location(), "teacher/classes");
        assert_eq!(analysis.issues[1].category(), IssueCategory::UiMismatch);
    }

    #[test]
    fn test_analyze_keeps_empty_and_errored_failures() {
        let errored = DetectorReport {
            success: false,
            error: Some("Failed to spawn detector for 'x': not permitted".into()),
            ..Default::default()
        };
        let outcomes = vec![
            outcome("a", OutcomeKind::Failed, DetectorReport::default()),
            outcome("b", OutcomeKind::Error, errored),
            outcome("c", OutcomeKind::Unavailable, DetectorReport::default()),
        ];
        let analysis = Classifier::default().analyze(&outcomes);
        assert_eq!(analysis.total(), 2);
        assert_eq!(analysis.issues[0].message(), EMPTY_FAILURE_MESSAGE);
        assert_eq!(analysis.unclassified, 2);
        assert_eq!(analysis.failed_areas, vec!["a", "b"]);
    }

    #[test]
    fn test_failure_without_area_is_kept_unclassified() {
        let outcomes = vec![outcome("  ", OutcomeKind::Failed, DetectorReport::failed("404"))];
        let analysis = Classifier::default().analyze(&outcomes);
        assert_eq!(analysis.total(), 1);
        let issue = &analysis.issues[0];
        assert_eq!(issue.source_category(), remedy_common::UNKNOWN_AREA);
        assert_eq!(issue.category(), IssueCategory::Other);
        assert!(!issue.auto_fixable());
        assert_eq!(analysis.unclassified, 1);
    }

    #[test]
    fn test_pushed_rule_is_evaluated_after_builtins() {
        let mut c = Classifier::default();
        c.push_rule(
            ClassificationRule::new("db", "deadlock", IssueCategory::ServerError, Severity::Low, false)
                .unwrap(),
        );
        let class = c.classify_text("DEADLOCK detected");
        assert_eq!((class.category, class.severity), (IssueCategory::ServerError, Severity::Low));
    }
}
