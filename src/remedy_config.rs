//! Project configuration read from `.remedy/remedy.toml`.
//!
//! Layered as file → environment → CLI flags. Every section is optional and
//! falls back to defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "kindergarten-portal"
//! required_dirs = ["client", "server"]
//! required_docs = ["README.md"]
//! source_dirs = ["client/src", "server/src"]
//! pages_dir = "client/src/pages"
//!
//! [environment]
//! runtime = "node"
//! min_runtime_version = "18.0.0"
//!
//! [workflow]
//! auto_commit = true
//! persist_phase_boundaries = true
//! detector_timeout_secs = 120
//! repair_timeout_secs = 60
//! commit_timeout_secs = 30
//! max_concurrency = 4
//! verification_passes = 1
//!
//! [[detectors]]
//! area = "teacher-center"
//! command = "node tests/teacher-center.js"
//! entry_point = "tests/teacher-center.js"
//! optional = true
//!
//! [[detectors]]
//! area = "api-health"
//! kind = "http"
//! url = "http://localhost:3000/api/health"
//!
//! [[repairs]]
//! category = "server-error"
//! command = "scripts/restart-api.sh"
//!
//! [quality]
//! max_file_lines = 500
//! performance_target_ms = 3000
//! ```

use anyhow::{Context, Result};
use remedy_common::IssueCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "remedy.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,
    /// Top-level directories `init` insists on.
    #[serde(default)]
    pub required_dirs: Vec<PathBuf>,
    /// Documentation files scored by the quality assessment.
    #[serde(default)]
    pub required_docs: Vec<PathBuf>,
    /// Roots scanned by the quality assessment; empty means the project dir.
    #[serde(default)]
    pub source_dirs: Vec<PathBuf>,
    /// Where missing-route repairs scaffold pages.
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("src/pages")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            required_dirs: Vec::new(),
            required_docs: Vec::new(),
            source_dirs: Vec::new(),
            pages_dir: default_pages_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EnvironmentSection {
    /// Executable whose `--version` is checked by `init`, e.g. `"node"`.
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub min_runtime_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSection {
    #[serde(default = "default_true")]
    pub auto_commit: bool,
    #[serde(default = "default_true")]
    pub persist_phase_boundaries: bool,
    #[serde(default = "default_detector_timeout")]
    pub detector_timeout_secs: u64,
    #[serde(default = "default_repair_timeout")]
    pub repair_timeout_secs: u64,
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_verification_passes")]
    pub verification_passes: u32,
}

fn default_true() -> bool {
    true
}

fn default_detector_timeout() -> u64 {
    120
}

fn default_repair_timeout() -> u64 {
    60
}

fn default_commit_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

fn default_verification_passes() -> u32 {
    1
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            auto_commit: true,
            persist_phase_boundaries: true,
            detector_timeout_secs: default_detector_timeout(),
            repair_timeout_secs: default_repair_timeout(),
            commit_timeout_secs: default_commit_timeout(),
            max_concurrency: default_max_concurrency(),
            verification_passes: default_verification_passes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Command,
    Http,
}

/// One `[[detectors]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorEntry {
    pub area: String,
    #[serde(default)]
    pub kind: DetectorKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Script that must exist for the detector to run.
    #[serde(default)]
    pub entry_point: Option<PathBuf>,
    /// Missing optional detectors report `unknown` instead of failing `init`.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One `[[repairs]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairEntry {
    pub category: IssueCategory,
    pub command: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RepairEntry {
    pub fn strategy_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-command", self.category))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualitySection {
    #[serde(default = "default_max_file_lines")]
    pub max_file_lines: usize,
    #[serde(default = "default_performance_target")]
    pub performance_target_ms: u64,
}

fn default_max_file_lines() -> usize {
    500
}

fn default_performance_target() -> u64 {
    3000
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            max_file_lines: default_max_file_lines(),
            performance_target_ms: default_performance_target(),
        }
    }
}

/// The complete remedy.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RemedyToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub environment: EnvironmentSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub detectors: Vec<DetectorEntry>,
    #[serde(default)]
    pub repairs: Vec<RepairEntry>,
    #[serde(default)]
    pub quality: QualitySection,
}

impl RemedyToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse remedy.toml")
    }

    /// Load `.remedy/remedy.toml`, or defaults when it does not exist.
    pub fn load_or_default(remedy_dir: &Path) -> Result<Self> {
        let config_path = remedy_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize remedy.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// `REMEDY_AUTO_COMMIT` and `REMEDY_DETECTOR_TIMEOUT_SECS` override the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REMEDY_AUTO_COMMIT") {
            self.workflow.auto_commit = v != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("REMEDY_DETECTOR_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.workflow.detector_timeout_secs = secs;
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.detectors.is_empty() {
            warnings.push("No [[detectors]] configured; `remedy run` will refuse to start".into());
        }

        let mut areas = HashSet::new();
        for d in &self.detectors {
            if !areas.insert(d.area.as_str()) {
                warnings.push(format!("Duplicate detector area '{}'", d.area));
            }
            match d.kind {
                DetectorKind::Command if d.command.is_none() => warnings.push(format!(
                    "Detector '{}' has kind 'command' but no command",
                    d.area
                )),
                DetectorKind::Http if d.url.is_none() => warnings.push(format!(
                    "Detector '{}' has kind 'http' but no url",
                    d.area
                )),
                _ => {}
            }
            if d.timeout_secs == Some(0) {
                warnings.push(format!("Detector '{}' has a zero timeout", d.area));
            }
        }

        let mut categories = HashSet::new();
        for r in &self.repairs {
            if !categories.insert(r.category) {
                warnings.push(format!(
                    "Several [[repairs]] for category '{}'; the last one wins",
                    r.category
                ));
            }
        }

        if self.workflow.max_concurrency == 0 {
            warnings.push("workflow.max_concurrency is 0; treating as 1".into());
        }
        if self.workflow.verification_passes == 0 {
            warnings.push("workflow.verification_passes is 0; treating as 1".into());
        }
        if self.workflow.detector_timeout_secs == 0 {
            warnings.push("workflow.detector_timeout_secs is 0; every detector will time out".into());
        }

        warnings
    }
}
