//! Detectors: the external checks that report pass/fail per functional area.
//!
//! The orchestrator never looks inside a detector. It only sees the
//! [`DetectorReport`] contract, bounded by a timeout, and folds crashes and
//! timeouts into an outcome of kind `error`.

pub mod classify;
pub mod command;
pub mod http;

pub use classify::{ClassificationRule, Classifier, ErrorAnalysis};
pub use command::CommandDetector;
pub use http::HttpDetector;

use crate::errors::DetectorError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use remedy_common::DetectorReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-invocation information handed to detectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectContext {
    pub run_id: Option<Uuid>,
    /// 0 for detection, 1.. for verification passes.
    pub pass: u32,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Functional area this detector covers, e.g. `"teacher-center"`.
    fn area(&self) -> &str;

    /// Whether the detector's entry point exists. Unavailable detectors are
    /// reported as such and never invoked.
    fn is_available(&self) -> bool {
        true
    }

    /// Per-detector timeout overriding the workflow default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn detect(&self, ctx: &DetectContext) -> Result<DetectorReport, DetectorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Passed,
    Failed,
    /// The detector itself crashed or timed out.
    Error,
    /// Optional detector whose entry point is missing.
    Unavailable,
}

/// One detector invocation as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorOutcome {
    pub area: String,
    pub kind: OutcomeKind,
    pub report: DetectorReport,
    pub duration_ms: u64,
}

impl DetectorOutcome {
    pub fn passed(&self) -> bool {
        self.kind == OutcomeKind::Passed
    }

    /// Failed or errored; unavailable areas are neither passing nor failing.
    pub fn is_failure(&self) -> bool {
        matches!(self.kind, OutcomeKind::Failed | OutcomeKind::Error)
    }

    pub fn is_available(&self) -> bool {
        self.kind != OutcomeKind::Unavailable
    }

    fn from_error(area: &str, error: &DetectorError, elapsed: Duration) -> Self {
        Self {
            area: area.to_string(),
            kind: OutcomeKind::Error,
            report: DetectorReport {
                success: false,
                error: Some(error.to_string()),
                ..Default::default()
            },
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Invoke one detector under a timeout. Never fails: crashes and timeouts
/// come back as `OutcomeKind::Error`.
pub async fn run_detector(
    detector: &dyn Detector,
    ctx: &DetectContext,
    default_timeout: Duration,
) -> DetectorOutcome {
    let area = detector.area().to_string();
    if !detector.is_available() {
        debug!(%area, "detector unavailable, skipping");
        return DetectorOutcome {
            area,
            kind: OutcomeKind::Unavailable,
            report: DetectorReport {
                success: false,
                error: Some("Detector entry point not found".to_string()),
                ..Default::default()
            },
            duration_ms: 0,
        };
    }

    let limit = detector.timeout().unwrap_or(default_timeout);
    let start = Instant::now();
    let result = tokio::time::timeout(limit, detector.detect(ctx)).await;
    let elapsed = start.elapsed();

    match result {
        Ok(Ok(report)) => {
            let kind = if report.success {
                OutcomeKind::Passed
            } else {
                OutcomeKind::Failed
            };
            debug!(%area, ?kind, ms = elapsed.as_millis() as u64, "detector finished");
            DetectorOutcome {
                area,
                kind,
                report,
                duration_ms: elapsed.as_millis() as u64,
            }
        }
        Ok(Err(e)) => {
            warn!(%area, error = %e, "detector failed");
            DetectorOutcome::from_error(&area, &e, elapsed)
        }
        Err(_) => {
            let e = DetectorError::Timeout {
                area: area.clone(),
                secs: limit.as_secs(),
            };
            warn!(%area, error = %e, "detector timed out");
            DetectorOutcome::from_error(&area, &e, elapsed)
        }
    }
}

/// Run every detector, at most `max_concurrency` at a time, calling
/// `on_progress(done, total)` as each finishes. The result is sorted by area
/// so completion order never leaks into downstream ordering.
pub async fn run_detectors<F>(
    detectors: &[Arc<dyn Detector>],
    ctx: &DetectContext,
    default_timeout: Duration,
    max_concurrency: usize,
    mut on_progress: F,
) -> Vec<DetectorOutcome>
where
    F: FnMut(usize, usize),
{
    let total = detectors.len();
    let mut pending = stream::iter(detectors.iter())
        .map(|d| run_detector(d.as_ref(), ctx, default_timeout))
        .buffer_unordered(max_concurrency.max(1));

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = pending.next().await {
        outcomes.push(outcome);
        on_progress(outcomes.len(), total);
    }

    outcomes.sort_by(|a, b| a.area.cmp(&b.area));
    outcomes
}
