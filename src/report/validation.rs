//! Per-area page counts and a qualitative status for the fix results.

use crate::detect::DetectorOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
    Unknown,
}

impl QualityStatus {
    /// all pass → excellent, ≥80% → good, ≥60% → acceptable, else
    /// needs_improvement; nothing tested → unknown.
    pub fn from_counts(tested: u32, passed: u32) -> Self {
        if tested == 0 {
            return QualityStatus::Unknown;
        }
        if passed >= tested {
            return QualityStatus::Excellent;
        }
        let ratio = passed as f64 / tested as f64;
        if ratio >= 0.8 {
            QualityStatus::Good
        } else if ratio >= 0.6 {
            QualityStatus::Acceptable
        } else {
            QualityStatus::NeedsImprovement
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityStatus::Excellent => "excellent",
            QualityStatus::Good => "good",
            QualityStatus::Acceptable => "acceptable",
            QualityStatus::NeedsImprovement => "needs_improvement",
            QualityStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaValidation {
    pub area: String,
    pub pages_tested: u32,
    pub pages_passed: u32,
    pub pages_failed: u32,
    pub status: QualityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixValidation {
    pub areas: Vec<AreaValidation>,
    pub pages_tested: u32,
    pub pages_passed: u32,
    pub pages_failed: u32,
    pub status: QualityStatus,
}

/// Summarize already-run detector outcomes. Reports that carry page counts
/// use them; otherwise an available area counts as one page.
pub fn validate_fix_results(outcomes: &[DetectorOutcome]) -> FixValidation {
    let areas: Vec<AreaValidation> = outcomes
        .iter()
        .map(|o| {
            let (tested, passed) = if !o.is_available() {
                (0, 0)
            } else {
                let tested = o.report.pages_tested.unwrap_or(1);
                let passed = o
                    .report
                    .pages_passed
                    .unwrap_or(if o.passed() { tested } else { 0 })
                    .min(tested);
                (tested, passed)
            };
            AreaValidation {
                area: o.area.clone(),
                pages_tested: tested,
                pages_passed: passed,
                pages_failed: tested - passed,
                status: QualityStatus::from_counts(tested, passed),
            }
        })
        .collect();

    let tested = areas.iter().map(|a| a.pages_tested).sum();
    let passed = areas.iter().map(|a| a.pages_passed).sum();
    FixValidation {
        pages_tested: tested,
        pages_passed: passed,
        pages_failed: tested - passed,
        status: QualityStatus::from_counts(tested, passed),
        areas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::OutcomeKind;
    use remedy_common::DetectorReport;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(QualityStatus::from_counts(0, 0), QualityStatus::Unknown);
        assert_eq!(QualityStatus::from_counts(10, 10), QualityStatus::Excellent);
        assert_eq!(QualityStatus::from_counts(10, 8), QualityStatus::Good);
        assert_eq!(QualityStatus::from_counts(10, 6), QualityStatus::Acceptable);
        assert_eq!(QualityStatus::from_counts(10, 5), QualityStatus::NeedsImprovement);
    }

    #[test]
    fn test_page_counts_from_reports() {
        let outcomes = vec![
            DetectorOutcome {
                area: "teacher".into(),
                kind: OutcomeKind::Failed,
                report: DetectorReport {
                    success: false,
                    pages_tested: Some(10),
                    pages_passed: Some(9),
                    ..Default::default()
                },
                duration_ms: 1,
            },
            DetectorOutcome {
                area: "parent".into(),
                kind: OutcomeKind::Passed,
                report: DetectorReport::passed("ok"),
                duration_ms: 1,
            },
            DetectorOutcome {
                area: "admin".into(),
                kind: OutcomeKind::Unavailable,
                report: DetectorReport::default(),
                duration_ms: 0,
            },
        ];
        let v = validate_fix_results(&outcomes);
        assert_eq!((v.pages_tested, v.pages_passed, v.pages_failed), (11, 10, 1));
        assert_eq!(v.status, QualityStatus::Good);
        assert_eq!(v.areas[0].status, QualityStatus::Good);
        assert_eq!(v.areas[2].status, QualityStatus::Unknown);
    }
}
