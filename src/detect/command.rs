//! Shell-command detectors.
//!
//! The command runs under `sh -c` in the project directory. If stdout contains
//! a JSON object matching [`DetectorReport`] it wins; otherwise the exit code
//! decides success and stdout/stderr become the diagnostic text.

use super::{DetectContext, Detector};
use crate::errors::DetectorError;
use crate::util::extract_json_object;
use async_trait::async_trait;
use remedy_common::DetectorReport;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

pub struct CommandDetector {
    area: String,
    command: String,
    working_dir: PathBuf,
    entry_point: Option<PathBuf>,
    optional: bool,
    timeout: Option<Duration>,
}

impl CommandDetector {
    pub fn new(area: impl Into<String>, command: impl Into<String>, working_dir: &Path) -> Self {
        Self {
            area: area.into(),
            command: command.into(),
            working_dir: working_dir.to_path_buf(),
            entry_point: None,
            optional: false,
            timeout: None,
        }
    }

    /// File that must exist for the detector to run. Relative paths resolve
    /// against the working directory.
    pub fn with_entry_point(mut self, entry_point: impl AsRef<Path>) -> Self {
        let p = entry_point.as_ref();
        self.entry_point = Some(if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.working_dir.join(p)
        });
        self
    }

    /// An optional detector with a missing entry point is reported as
    /// unavailable. A required one errors, so its area counts as failing.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    fn missing_entry_point(&self) -> Option<&Path> {
        self.entry_point.as_deref().filter(|p| !p.exists())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn parse_output(&self, output: &Output) -> DetectorReport {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Some(json) = extract_json_object(&stdout)
            && let Ok(report) = serde_json::from_str::<DetectorReport>(&json)
        {
            return report;
        }

        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        DetectorReport {
            success: output.status.success(),
            output: non_empty(&stdout),
            error: non_empty(&stderr),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Detector for CommandDetector {
    fn area(&self) -> &str {
        &self.area
    }

    fn is_available(&self) -> bool {
        !self.optional || self.missing_entry_point().is_none()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn detect(&self, ctx: &DetectContext) -> Result<DetectorReport, DetectorError> {
        if let Some(path) = self.missing_entry_point() {
            return Err(DetectorError::MissingEntryPoint {
                area: self.area.clone(),
                path: path.to_path_buf(),
            });
        }
        debug!(area = %self.area, command = %self.command, "running detector command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("REMEDY_AREA", &self.area)
            .env(
                "REMEDY_RUN_ID",
                ctx.run_id.map(|id| id.to_string()).unwrap_or_default(),
            )
            .env("REMEDY_PASS", ctx.pass.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DetectorError::Spawn {
                area: self.area.clone(),
                source,
            })?;

        debug!(
            area = %self.area,
            exit_code = output.status.code().unwrap_or(-1),
            "detector command exited"
        );
        Ok(self.parse_output(&output))
    }
}
