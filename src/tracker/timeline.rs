use crate::errors::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Phase;

pub const RUN_STARTED: &str = "run-started";
pub const PHASE_STARTED: &str = "phase-started";
pub const PHASE_COMPLETED: &str = "phase-completed";
pub const FAST_FORWARDED: &str = "fast-forwarded";
pub const TASK_COMPLETED: &str = "task-completed";
pub const RUN_FAILED: &str = "run-failed";
pub const RUN_RESUMED: &str = "run-resumed";
pub const COMMIT_RESULT: &str = "commit-result";

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// `None` for run-level events recorded before the first phase starts.
    pub phase: Option<Phase>,
    pub event: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn new(phase: Option<Phase>, event: &str, detail: impl Into<String>) -> Self {
        Self {
            phase,
            event: event.to_string(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// JSON-lines file mirroring the in-memory timeline.
#[derive(Debug, Clone)]
pub struct TimelineLog {
    path: PathBuf,
}

impl TimelineLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &TimelineEvent) -> Result<(), TrackerError> {
        let persist_err = |source| TrackerError::TimelinePersist {
            path: self.path.clone(),
            source,
        };
        let mut line = serde_json::to_string(event)
            .map_err(|e| persist_err(std::io::Error::other(e)))?;
        line.push('\n');

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(persist_err)?
            .write_all(line.as_bytes())
            .map_err(persist_err)
    }

    /// Read back every entry, skipping lines that fail to parse.
    pub fn read_all(&self) -> anyhow::Result<Vec<TimelineEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("timeline.log"));
        log.append(&TimelineEvent::new(None, RUN_STARTED, "run 1"))
            .unwrap();
        log.append(&TimelineEvent::new(
            Some(Phase::Detection),
            PHASE_COMPLETED,
            "3 areas",
        ))
        .unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, RUN_STARTED);
        assert_eq!(events[1].phase, Some(Phase::Detection));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("nope.log"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let log = TimelineLog::new(dir.path().join("missing/timeline.log"));
        let err = log
            .append(&TimelineEvent::new(None, RUN_STARTED, ""))
            .unwrap_err();
        assert!(matches!(err, TrackerError::TimelinePersist { .. }));
    }
}
