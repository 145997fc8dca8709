use crate::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed defect taxonomy. New categories are additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    MissingRoute,
    ServerError,
    UiMismatch,
    Other,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 4] = [
        IssueCategory::MissingRoute,
        IssueCategory::ServerError,
        IssueCategory::UiMismatch,
        IssueCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::MissingRoute => "missing-route",
            IssueCategory::ServerError => "server-error",
            IssueCategory::UiMismatch => "ui-mismatch",
            IssueCategory::Other => "other",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "missing-route" => Ok(IssueCategory::MissingRoute),
            "server-error" => Ok(IssueCategory::ServerError),
            "ui-mismatch" => Ok(IssueCategory::UiMismatch),
            "other" => Ok(IssueCategory::Other),
            _ => Err(ModelError::UnknownCategory(s.to_string())),
        }
    }
}

/// Issue severity. Ordering follows priority: `Critical < High < Medium < Low`,
/// so sorting ascending puts the most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(ModelError::UnknownSeverity(s.to_string())),
        }
    }
}

/// Source area recorded when a detector outcome carries none.
pub const UNKNOWN_AREA: &str = "unknown-area";

/// Stable identifier of an [`Issue`], derived from its content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Hash the identifying fields; the first 12 hex chars of SHA-256.
    pub fn derive(
        source_category: &str,
        category: IssueCategory,
        location: &str,
        message: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source_category.as_bytes());
        hasher.update(b"|");
        hasher.update(category.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(location.as_bytes());
        hasher.update(b"|");
        hasher.update(message.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classified defect. Immutable once built; repair and report records refer
/// to it by [`IssueId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    id: IssueId,
    category: IssueCategory,
    severity: Severity,
    message: String,
    location: String,
    auto_fixable: bool,
    source_category: String,
    /// Set when no classification rule matched the raw detector text.
    #[serde(default)]
    unclassified: bool,
    detected_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        source_category: &str,
        category: IssueCategory,
        severity: Severity,
        message: &str,
        location: &str,
        auto_fixable: bool,
    ) -> Result<Self, ModelError> {
        let source_category = source_category.trim();
        let message = message.trim();
        if source_category.is_empty() {
            return Err(ModelError::EmptyField {
                field: "source_category",
            });
        }
        if message.is_empty() {
            return Err(ModelError::EmptyField { field: "message" });
        }
        let location = if location.trim().is_empty() {
            source_category
        } else {
            location.trim()
        };

        Ok(Self {
            id: IssueId::derive(source_category, category, location, message),
            category,
            severity,
            message: message.to_string(),
            location: location.to_string(),
            auto_fixable,
            source_category: source_category.to_string(),
            unclassified: false,
            detected_at: Utc::now(),
        })
    }

    /// Unclassified `other` issue that cannot fail validation: blank fields
    /// are replaced with placeholders instead of rejected.
    pub fn fallback(source_category: &str, message: &str) -> Self {
        let non_blank = |s: &str, default: &str| {
            let s = s.trim();
            if s.is_empty() { default.to_string() } else { s.to_string() }
        };
        let source_category = non_blank(source_category, UNKNOWN_AREA);
        let message = non_blank(message, "Failure reported without details");
        let category = IssueCategory::Other;
        Self {
            id: IssueId::derive(&source_category, category, &source_category, &message),
            category,
            severity: Severity::Medium,
            message,
            location: source_category.clone(),
            auto_fixable: false,
            source_category,
            unclassified: true,
            detected_at: Utc::now(),
        }
    }

    /// Mark the issue as produced by the fallback classification rule.
    pub fn into_unclassified(mut self) -> Self {
        self.unclassified = true;
        self
    }

    pub fn id(&self) -> &IssueId {
        &self.id
    }

    pub fn category(&self) -> IssueCategory {
        self.category
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn auto_fixable(&self) -> bool {
        self.auto_fixable
    }

    pub fn source_category(&self) -> &str {
        &self.source_category
    }

    pub fn is_unclassified(&self) -> bool {
        self.unclassified
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}
