//! Independent quality dimensions, each scored 0–100 and graded.

use crate::detect::DetectorOutcome;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::{DirEntry, WalkDir};

const SOURCE_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx", "vue", "py", "go", "java"];
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", ".git", ".remedy"];

static DEBT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(TODO|FIXME|HACK)\b").expect("debt marker pattern is a valid regex")
});

static HARDCODED_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(api[_-]?key|secret|password|passwd|access[_-]?token)\s*[:=]\s*["'][^"'\s]{8,}["']"#,
    )
    .expect("secret pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl Grade {
    /// Bands are inclusive on their lower bound.
    pub fn for_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Grade::APlus,
            s if s >= 80.0 => Grade::A,
            s if s >= 70.0 => Grade::BPlus,
            s if s >= 60.0 => Grade::B,
            s if s >= 50.0 => Grade::CPlus,
            s if s >= 40.0 => Grade::C,
            _ => Grade::D,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityDimension {
    CodeQuality,
    TestCoverage,
    Documentation,
    Security,
    Performance,
}

impl QualityDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityDimension::CodeQuality => "code-quality",
            QualityDimension::TestCoverage => "test-coverage",
            QualityDimension::Documentation => "documentation",
            QualityDimension::Security => "security",
            QualityDimension::Performance => "performance",
        }
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: QualityDimension,
    pub score: f64,
    pub grade: Grade,
    pub findings: Vec<String>,
}

impl DimensionScore {
    fn new(dimension: QualityDimension, score: f64, findings: Vec<String>) -> Self {
        let score = round1(score.clamp(0.0, 100.0));
        Self {
            dimension,
            score,
            grade: Grade::for_score(score),
            findings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub dimensions: Vec<DimensionScore>,
    /// Arithmetic mean of the dimension scores.
    pub overall: f64,
    pub grade: Grade,
}

impl QualityScore {
    pub fn from_dimensions(dimensions: Vec<DimensionScore>) -> Self {
        let overall = if dimensions.is_empty() {
            0.0
        } else {
            round1(dimensions.iter().map(|d| d.score).sum::<f64>() / dimensions.len() as f64)
        };
        Self {
            grade: Grade::for_score(overall),
            overall,
            dimensions,
        }
    }

    pub fn dimension(&self, dimension: QualityDimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }
}

/// Inputs for [`perform_quality_assessment`].
#[derive(Debug, Clone)]
pub struct QualityInputs {
    pub project_dir: PathBuf,
    /// Empty means the whole project directory.
    pub source_dirs: Vec<PathBuf>,
    pub required_docs: Vec<PathBuf>,
    pub max_file_lines: usize,
    pub performance_target_ms: u64,
}

/// Facts gathered from one walk over the source tree.
#[derive(Debug, Default)]
struct SourceScan {
    source_files: usize,
    test_files: usize,
    oversized: Vec<String>,
    debt_markers: usize,
    secrets: Vec<String>,
}

pub fn perform_quality_assessment(
    inputs: &QualityInputs,
    outcomes: &[DetectorOutcome],
) -> QualityScore {
    let scan = scan_sources(inputs);
    QualityScore::from_dimensions(vec![
        code_quality(&scan, inputs.max_file_lines),
        test_coverage(&scan),
        documentation(inputs),
        security(&scan),
        performance(outcomes, inputs.performance_target_ms),
    ])
}

fn code_quality(scan: &SourceScan, max_lines: usize) -> DimensionScore {
    let score = 100.0 - 5.0 * scan.oversized.len() as f64 - scan.debt_markers as f64;
    let mut findings: Vec<String> = scan
        .oversized
        .iter()
        .map(|f| format!("{} exceeds {} lines", f, max_lines))
        .collect();
    if scan.debt_markers > 0 {
        findings.push(format!("{} TODO/FIXME/HACK markers", scan.debt_markers));
    }
    DimensionScore::new(QualityDimension::CodeQuality, score, findings)
}

fn test_coverage(scan: &SourceScan) -> DimensionScore {
    let non_test = scan.source_files.saturating_sub(scan.test_files);
    let score = if non_test == 0 {
        if scan.test_files > 0 { 100.0 } else { 0.0 }
    } else {
        (scan.test_files as f64 / non_test as f64 * 100.0).min(100.0)
    };
    let findings = vec![format!(
        "{} test files for {} source files",
        scan.test_files, non_test
    )];
    DimensionScore::new(QualityDimension::TestCoverage, score, findings)
}

fn documentation(inputs: &QualityInputs) -> DimensionScore {
    if inputs.required_docs.is_empty() {
        return DimensionScore::new(QualityDimension::Documentation, 100.0, Vec::new());
    }
    let missing: Vec<String> = inputs
        .required_docs
        .iter()
        .filter(|d| !inputs.project_dir.join(d).exists())
        .map(|d| format!("missing {}", d.display()))
        .collect();
    let present = inputs.required_docs.len() - missing.len();
    let score = present as f64 / inputs.required_docs.len() as f64 * 100.0;
    DimensionScore::new(QualityDimension::Documentation, score, missing)
}

fn security(scan: &SourceScan) -> DimensionScore {
    let score = 100.0 - 10.0 * scan.secrets.len() as f64;
    let findings = scan
        .secrets
        .iter()
        .map(|f| format!("possible hard-coded secret in {}", f))
        .collect();
    DimensionScore::new(QualityDimension::Security, score, findings)
}

fn performance(outcomes: &[DetectorOutcome], target_ms: u64) -> DimensionScore {
    let durations: Vec<u64> = outcomes
        .iter()
        .filter(|o| o.is_available())
        .map(|o| o.duration_ms)
        .collect();
    if durations.is_empty() {
        return DimensionScore::new(QualityDimension::Performance, 100.0, Vec::new());
    }
    let mean = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
    let score = if mean <= target_ms as f64 {
        100.0
    } else {
        target_ms as f64 / mean * 100.0
    };
    let findings = vec![format!(
        "mean detector time {:.0}ms (target {}ms)",
        mean, target_ms
    )];
    DimensionScore::new(QualityDimension::Performance, score, findings)
}

fn scan_sources(inputs: &QualityInputs) -> SourceScan {
    let roots: Vec<PathBuf> = if inputs.source_dirs.is_empty() {
        vec![inputs.project_dir.clone()]
    } else {
        inputs
            .source_dirs
            .iter()
            .map(|d| inputs.project_dir.join(d))
            .collect()
    };

    let mut scan = SourceScan::default();
    for root in roots.iter().filter(|r| r.exists()) {
        let files = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_source_file(e.path()));

        for entry in files {
            let path = entry.path();
            let relative = path.strip_prefix(&inputs.project_dir).unwrap_or(path);
            let display = relative.display().to_string();
            scan.source_files += 1;
            if is_test_file(relative) {
                scan.test_files += 1;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            if content.lines().count() > inputs.max_file_lines {
                scan.oversized.push(display.clone());
            }
            scan.debt_markers += DEBT_MARKER.find_iter(&content).count();
            if HARDCODED_SECRET.is_match(&content) {
                scan.secrets.push(display);
            }
        }
    }
    scan
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| SKIPPED_DIRS.contains(&n))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

fn is_test_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let in_test_dir = path.components().any(|c| {
        matches!(c.as_os_str().to_str(), Some("tests" | "__tests__" | "test"))
    });
    in_test_dir
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.contains("_test.")
        || name.starts_with("test_")
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
