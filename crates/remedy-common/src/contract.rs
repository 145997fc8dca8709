//! Result contracts exchanged with external collaborators.

use serde::{Deserialize, Serialize};

/// What a detector returns for one functional area.
///
/// Only `success`, `output` and `error` are required; the remaining fields
/// let richer detectors report several broken pages or page counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorReport {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ReportedFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_tested: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_passed: Option<u32>,
}

impl DetectorReport {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// All diagnostic text, output first.
    pub fn text(&self) -> String {
        [self.output.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single failure inside a [`DetectorReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedFailure {
    pub message: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// What a repair strategy returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairResult {
    pub applied: bool,
    pub detail: String,
}

impl RepairResult {
    pub fn applied(detail: impl Into<String>) -> Self {
        Self {
            applied: true,
            detail: detail.into(),
        }
    }

    pub fn not_applied(detail: impl Into<String>) -> Self {
        Self {
            applied: false,
            detail: detail.into(),
        }
    }
}
