use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::detect::{CommandDetector, Detector, HttpDetector};
use crate::remedy_config::{CONFIG_FILE, DetectorEntry, DetectorKind, RemedyToml};
use crate::repair::{CommandStrategy, ScaffoldPageStrategy, StrategyRegistry};
use crate::report::QualityInputs;
use remedy_common::IssueCategory;

/// Runtime configuration for remedy.
///
/// Bridges `remedy.toml` with the filesystem layout under `.remedy/` and
/// builds the detectors and repair strategies the orchestrator needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub remedy_dir: PathBuf,
    pub config_file: PathBuf,
    pub progress_file: PathBuf,
    pub timeline_file: PathBuf,
    pub lock_file: PathBuf,
    pub runs_dir: PathBuf,
    pub log_dir: PathBuf,
    pub verbose: bool,
    settings: RemedyToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let remedy_dir = project_dir.join(".remedy");
        let settings = RemedyToml::load_or_default(&remedy_dir)?;
        Ok(Self::with_settings(project_dir, settings, verbose))
    }

    /// Build from already-loaded settings without touching the filesystem.
    pub fn with_settings(project_dir: PathBuf, settings: RemedyToml, verbose: bool) -> Self {
        let remedy_dir = project_dir.join(".remedy");
        Self {
            config_file: remedy_dir.join(CONFIG_FILE),
            progress_file: remedy_dir.join("run-progress.json"),
            timeline_file: remedy_dir.join("timeline.log"),
            lock_file: remedy_dir.join("run.lock"),
            runs_dir: remedy_dir.join("runs"),
            log_dir: remedy_dir.join("logs"),
            remedy_dir,
            project_dir,
            verbose,
            settings,
        }
    }

    pub fn settings(&self) -> &RemedyToml {
        &self.settings
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.workflow.detector_timeout_secs)
    }

    pub fn repair_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.workflow.repair_timeout_secs)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.workflow.commit_timeout_secs)
    }

    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn quality_inputs(&self) -> QualityInputs {
        let settings = &self.settings;
        QualityInputs {
            project_dir: self.project_dir.clone(),
            source_dirs: settings.project.source_dirs.clone(),
            required_docs: settings.project.required_docs.clone(),
            max_file_lines: settings.quality.max_file_lines,
            performance_target_ms: settings.quality.performance_target_ms,
        }
    }

    /// One detector per `[[detectors]]` entry. Misconfigured entries are
    /// skipped; `validate()` already warns about them.
    pub fn detectors(&self) -> Vec<Arc<dyn Detector>> {
        self.settings
            .detectors
            .iter()
            .filter_map(|entry| self.build_detector(entry))
            .collect()
    }

    fn build_detector(&self, entry: &DetectorEntry) -> Option<Arc<dyn Detector>> {
        let timeout = entry.timeout_secs.map(Duration::from_secs);
        match entry.kind {
            DetectorKind::Command => {
                let mut d = CommandDetector::new(
                    entry.area.clone(),
                    entry.command.clone()?,
                    &self.project_dir,
                );
                if let Some(ep) = &entry.entry_point {
                    d = d.with_entry_point(ep).optional(entry.optional);
                }
                if let Some(t) = timeout {
                    d = d.with_timeout(t);
                }
                Some(Arc::new(d))
            }
            DetectorKind::Http => {
                let mut d = HttpDetector::new(entry.area.clone(), entry.url.clone()?);
                if let Some(t) = timeout {
                    d = d.with_timeout(t);
                }
                Some(Arc::new(d))
            }
        }
    }

    /// Built-in page scaffolding for missing routes, then every `[[repairs]]`
    /// entry in order (later entries replace earlier ones).
    pub fn strategies(&self) -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        registry.register(
            IssueCategory::MissingRoute,
            Arc::new(ScaffoldPageStrategy::new(
                self.resolve(&self.settings.project.pages_dir),
            )),
        );
        for entry in &self.settings.repairs {
            let mut strategy = CommandStrategy::new(
                entry.strategy_name(),
                entry.command.clone(),
                self.project_dir.clone(),
            );
            if let Some(secs) = entry.timeout_secs {
                strategy = strategy.with_timeout(Duration::from_secs(secs));
            }
            registry.register(entry.category, Arc::new(strategy));
        }
        registry
    }
}
