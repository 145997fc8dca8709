use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::run::{RunStatus, WorkflowRun};
use crate::tracker::RunProgress;

/// What gets written to `run-progress.json` at every phase boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run: WorkflowRun,
    pub progress: RunProgress,
}

impl RunSnapshot {
    /// Only a run that never reached a terminal state can be resumed.
    pub fn is_resumable(&self) -> bool {
        self.run.status == RunStatus::Running && self.progress.is_active()
    }
}

/// Persists the resumable run snapshot.
pub struct RunStore {
    state_file: PathBuf,
}

impl RunStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    /// Write through a temporary file so a crash never leaves a torn snapshot.
    pub fn save(&self, snapshot: &RunSnapshot) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize run snapshot")?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, json).context("Failed to write run snapshot")?;
        fs::rename(&tmp, &self.state_file).context("Failed to replace run snapshot")?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<RunSnapshot>> {
        if !self.state_file.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&self.state_file).context("Failed to read run snapshot")?;
        let snapshot = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse run snapshot {}", self.state_file.display())
        })?;
        Ok(Some(snapshot))
    }

    /// The persisted snapshot, if it can be resumed.
    pub fn load_resumable(&self) -> Result<Option<RunSnapshot>> {
        Ok(self.load()?.filter(RunSnapshot::is_resumable))
    }

    pub fn reset(&self) -> Result<()> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).context("Failed to remove run snapshot")?;
        }
        Ok(())
    }
}
