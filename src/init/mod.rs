//! `remedy init`: create the `.remedy/` directory and check the environment.
//!
//! ```text
//! .remedy/
//! ├── remedy.toml        # Configuration (template on first init)
//! ├── run-progress.json  # Resumable run snapshot (written by `run`)
//! ├── timeline.log       # Append-only timeline
//! ├── runs/              # Per-run artifacts
//! └── logs/              # Daily-rolling log files
//! ```
//!
//! Precondition checks never abort early: every check runs and the caller
//! decides from the collected report. Missing optional detector entry points
//! are warnings, since those areas simply report `unknown`.

use crate::remedy_config::{CONFIG_FILE, DetectorKind, RemedyToml};
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

/// The name of the remedy state directory.
pub const REMEDY_DIR: &str = ".remedy";

const CONFIG_TEMPLATE: &str = r#"# remedy configuration
#
# Each [[detectors]] entry checks one functional area. A command detector
# passes when it exits 0, or when it prints {"success": true, ...} as JSON.

[project]
required_dirs = []
required_docs = ["README.md"]
source_dirs = []
pages_dir = "src/pages"

[environment]
# runtime = "node"
# min_runtime_version = "18.0.0"

[workflow]
auto_commit = true
persist_phase_boundaries = true
detector_timeout_secs = 120
repair_timeout_secs = 60
commit_timeout_secs = 30
max_concurrency = 4
verification_passes = 1

# [[detectors]]
# area = "teacher-center"
# command = "node tests/teacher-center.js"
# entry_point = "tests/teacher-center.js"
# optional = true

# [[detectors]]
# area = "api-health"
# kind = "http"
# url = "http://localhost:3000/api/health"

# [[repairs]]
# category = "server-error"
# command = "scripts/restart-api.sh"

[quality]
max_file_lines = 500
performance_target_ms = 3000
"#;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("version pattern is a valid regex")
});

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub remedy_dir: PathBuf,
    /// False when `.remedy/` already existed.
    pub created: bool,
    /// True when the config template was written by this call.
    pub config_written: bool,
}

/// Create `.remedy/` with its subdirectories and a config template. An
/// existing `remedy.toml` is never overwritten.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let remedy_dir = project_dir.join(REMEDY_DIR);
    let created = !remedy_dir.exists();

    for dir in [remedy_dir.join("runs"), remedy_dir.join("logs")] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let config_file = remedy_dir.join(CONFIG_FILE);
    let config_written = !config_file.exists();
    if config_written {
        std::fs::write(&config_file, CONFIG_TEMPLATE).with_context(|| {
            format!("Failed to create {}: {}", CONFIG_FILE, config_file.display())
        })?;
    }

    Ok(InitResult {
        remedy_dir,
        created,
        config_written,
    })
}

pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(REMEDY_DIR).exists()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl PreconditionCheck {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for PreconditionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionReport {
    pub checks: Vec<PreconditionCheck>,
}

impl PreconditionReport {
    /// True unless a required precondition failed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Failed)
    }

    pub fn with_status(&self, status: CheckStatus) -> impl Iterator<Item = &PreconditionCheck> {
        self.checks.iter().filter(move |c| c.status == status)
    }
}

/// Check the runtime version, required directories and detector entry points.
pub fn check_preconditions(project_dir: &Path, settings: &RemedyToml) -> PreconditionReport {
    let mut checks = Vec::new();

    if let Some(runtime) = &settings.environment.runtime {
        checks.push(check_runtime(
            runtime,
            settings.environment.min_runtime_version.as_deref(),
        ));
    }

    for dir in &settings.project.required_dirs {
        let path = project_dir.join(dir);
        let name = format!("directory {}", dir.display());
        checks.push(if path.is_dir() {
            PreconditionCheck::new(name, CheckStatus::Ok, "present")
        } else {
            PreconditionCheck::new(name, CheckStatus::Failed, "missing")
        });
    }

    for detector in &settings.detectors {
        let name = format!("detector {}", detector.area);
        let check = match (&detector.kind, &detector.entry_point) {
            (DetectorKind::Http, _) => PreconditionCheck::new(
                name,
                CheckStatus::Ok,
                detector.url.clone().unwrap_or_else(|| "no url".to_string()),
            ),
            (DetectorKind::Command, None) => {
                PreconditionCheck::new(name, CheckStatus::Ok, "no entry point to check")
            }
            (DetectorKind::Command, Some(entry)) => {
                let path = project_dir.join(entry);
                if path.exists() {
                    PreconditionCheck::new(name, CheckStatus::Ok, entry.display().to_string())
                } else if detector.optional {
                    PreconditionCheck::new(
                        name,
                        CheckStatus::Warning,
                        format!("{} not found; area will report unknown", entry.display()),
                    )
                } else {
                    PreconditionCheck::new(
                        name,
                        CheckStatus::Failed,
                        format!("{} not found", entry.display()),
                    )
                }
            }
        };
        checks.push(check);
    }

    if settings.detectors.is_empty() {
        checks.push(PreconditionCheck::new(
            "detectors",
            CheckStatus::Warning,
            format!("none configured in {}", CONFIG_FILE),
        ));
    }

    PreconditionReport { checks }
}

fn check_runtime(runtime: &str, min_version: Option<&str>) -> PreconditionCheck {
    let name = format!("runtime {}", runtime);
    let output = match Command::new(runtime).arg("--version").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            return PreconditionCheck::new(
                name,
                CheckStatus::Failed,
                format!("`{} --version` exited with {}", runtime, output.status),
            );
        }
        Err(e) => {
            return PreconditionCheck::new(name, CheckStatus::Failed, format!("not found: {}", e));
        }
    };

    let reported = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let Some(min) = min_version else {
        return PreconditionCheck::new(name, CheckStatus::Ok, reported);
    };
    match (parse_version(&reported), parse_version(min)) {
        (Some(have), Some(need)) if have >= need => PreconditionCheck::new(
            name,
            CheckStatus::Ok,
            format!("{} (>= {})", reported, min),
        ),
        (Some(_), Some(_)) => PreconditionCheck::new(
            name,
            CheckStatus::Failed,
            format!("{} is older than required {}", reported, min),
        ),
        _ => PreconditionCheck::new(
            name,
            CheckStatus::Warning,
            format!("could not compare version '{}' with '{}'", reported, min),
        ),
    }
}

/// First `major[.minor[.patch]]` in `text`, e.g. `v18.19.0` → `(18, 19, 0)`.
pub fn parse_version(text: &str) -> Option<(u64, u64, u64)> {
    let caps = VERSION_RE.captures(text)?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Some((caps[1].parse().ok()?, part(2), part(3)))
}
