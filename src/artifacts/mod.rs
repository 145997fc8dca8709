//! File-based run artifacts under `.remedy/runs/<timestamp>_<id8>/`.
//!
//! One JSON document per phase, the final report as a JSON + Markdown pair
//! rendered from the same value, an executive summary, and a separate
//! `error.json` for fatal failures.

use crate::orchestrator::{FatalRecord, WorkflowRun};
use crate::report::ComprehensiveReport;
use crate::tracker::Phase;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MD: &str = "report.md";
pub const EXECUTIVE_SUMMARY: &str = "executive-summary.md";
pub const ERROR_FILE: &str = "error.json";
pub const RUN_FILE: &str = "run.json";

/// File name of a phase's result document.
pub fn phase_file(phase: Phase) -> &'static str {
    match phase {
        Phase::Detection => "detection-results.json",
        Phase::Analysis => "error-analysis.json",
        Phase::Fixing => "repair-results.json",
        Phase::Verification => "verification-results.json",
        Phase::Commit => "commit-result.json",
    }
}

/// Paths of the final report files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub executive_summary: PathBuf,
}

pub struct ArtifactStore {
    runs_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(runs_dir: &Path) -> Self {
        Self {
            runs_dir: runs_dir.to_path_buf(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    pub fn dir_for(&self, started_at: DateTime<Utc>, run_id: Uuid) -> PathBuf {
        self.runs_dir.join(format!(
            "{}_{}",
            started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run_id.to_string()[..8]
        ))
    }

    pub fn run_dir(&self, run: &WorkflowRun) -> PathBuf {
        self.dir_for(run.started_at, run.id)
    }

    /// Serialize `value` as pretty JSON into `dir/name`, creating `dir`.
    pub fn write_json<T: Serialize>(&self, dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create artifact directory {}", dir.display()))?;
        let path = dir.join(name);
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", name))?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_phase<T: Serialize>(
        &self,
        run: &WorkflowRun,
        phase: Phase,
        value: &T,
    ) -> Result<PathBuf> {
        self.write_json(&self.run_dir(run), phase_file(phase), value)
    }

    pub fn write_run(&self, run: &WorkflowRun) -> Result<PathBuf> {
        self.write_json(&self.run_dir(run), RUN_FILE, run)
    }

    /// Write report.json, report.md and executive-summary.md together.
    pub fn write_report(&self, run: &WorkflowRun, report: &ComprehensiveReport) -> Result<ReportPaths> {
        let dir = self.run_dir(run);
        let json = self.write_json(&dir, REPORT_JSON, report)?;

        let markdown = dir.join(REPORT_MD);
        fs::write(&markdown, report.to_markdown())
            .with_context(|| format!("Failed to write {}", markdown.display()))?;

        let executive_summary = dir.join(EXECUTIVE_SUMMARY);
        fs::write(&executive_summary, report.executive_summary().to_markdown())
            .with_context(|| format!("Failed to write {}", executive_summary.display()))?;

        Ok(ReportPaths {
            json,
            markdown,
            executive_summary,
        })
    }

    /// The error artifact lives next to, never inside, the normal report.
    pub fn write_error(&self, run: &WorkflowRun, record: &FatalRecord) -> Result<PathBuf> {
        self.write_json(&self.run_dir(run), ERROR_FILE, record)
    }

    pub fn load_report(path: &Path) -> Result<ComprehensiveReport> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    pub fn load_run(dir: &Path) -> Result<WorkflowRun> {
        let path = dir.join(RUN_FILE);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Run directories, oldest first. Names start with a sortable timestamp.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs: Vec<PathBuf> = fs::read_dir(&self.runs_dir)
            .context("Failed to read runs directory")?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        runs.sort();
        Ok(runs)
    }

    pub fn latest_run(&self) -> Result<Option<PathBuf>> {
        Ok(self.list_runs()?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::WorkflowOptions;
    use crate::report::{QualityScore, generate_comprehensive_report};
    use crate::tracker::ProgressTracker;
    use tempfile::tempdir;

    fn run() -> WorkflowRun {
        let mut tracker = ProgressTracker::new();
        tracker.start_run().unwrap();
        WorkflowRun::new(tracker.progress().unwrap(), WorkflowOptions::default())
    }

    #[test]
    fn test_report_files_written_together_and_reload() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let run = run();
        let report = generate_comprehensive_report(&run, QualityScore::from_dimensions(vec![]));

        let paths = store.write_report(&run, &report).unwrap();
        assert!(paths.markdown.exists());
        assert!(paths.executive_summary.exists());
        assert_eq!(paths.json.parent(), paths.markdown.parent());

        let reloaded = ArtifactStore::load_report(&paths.json).unwrap();
        assert_eq!(reloaded.summary, report.summary);
    }

    #[test]
    fn test_phase_files_and_listing() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let run = run();

        let path = store
            .write_phase(&run, Phase::Detection, &Vec::<u32>::new())
            .unwrap();
        assert!(path.ends_with("detection-results.json"));
        store.write_run(&run).unwrap();

        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(
            runs[0]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with(&run.id.to_string()[..8])
        );
        assert_eq!(ArtifactStore::load_run(&runs[0]).unwrap(), run);
    }

    #[test]
    fn test_list_runs_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(&dir.path().join("nope"));
        assert!(store.latest_run().unwrap().is_none());
    }
}
