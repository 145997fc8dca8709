//! Report and quality validator.
//!
//! Everything here is a read-only consumer of a [`WorkflowRun`]: generating a
//! report never mutates issues, repair actions or phase states, so it can be
//! re-run safely.

pub mod quality;
pub mod recommend;
pub mod validation;

pub use quality::{
    DimensionScore, Grade, QualityDimension, QualityInputs, QualityScore,
    perform_quality_assessment,
};
pub use recommend::{Recommendation, RecommendationInputs, generate_recommendations};
pub use validation::{AreaValidation, FixValidation, QualityStatus, validate_fix_results};

use crate::commit::CommitOutcome;
use crate::orchestrator::{AreaVerification, RunStatus, WorkflowRun};
use crate::tracker::{PhaseState, TimelineEvent};
use chrono::{DateTime, Utc};
use remedy_common::{Issue, RepairAction, RepairStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

/// The headline numbers. Reloading `report.json` must reproduce these exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_areas: usize,
    pub areas_passing: usize,
    pub total_errors: usize,
    pub errors_fixed: usize,
    pub errors_remaining: usize,
    pub repairs_attempted: usize,
    pub repairs_succeeded: usize,
    pub repairs_failed: usize,
    pub repairs_skipped: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub phases: Vec<PhaseState>,
    pub issues: Vec<Issue>,
    pub repair_actions: Vec<RepairAction>,
    pub manual_attention: Vec<Issue>,
    pub verification: Vec<AreaVerification>,
    pub validation: FixValidation,
    pub quality: QualityScore,
    pub recommendations: Vec<Recommendation>,
    pub commit: Option<CommitOutcome>,
    pub timeline: Vec<TimelineEvent>,
}

/// Condensed digest of a [`ComprehensiveReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub headline: String,
    pub success_rate: f64,
    pub grade: Grade,
    pub key_findings: Vec<String>,
    pub top_recommendations: Vec<String>,
}

/// Build the report for `run`. Pure: the same run and quality score always
/// give the same report apart from `generated_at`.
pub fn generate_comprehensive_report(run: &WorkflowRun, quality: QualityScore) -> ComprehensiveReport {
    let outcomes = run.final_outcomes();
    let available: Vec<_> = outcomes.iter().filter(|o| o.is_available()).collect();
    let areas_passing = match &run.verification {
        Some(v) => v.areas.iter().filter(|a| a.status.is_green()).count(),
        None => available.iter().filter(|o| o.passed()).count(),
    };

    let remaining = run.remaining_issues();
    let actions = run.repair_actions();
    let count = |status: RepairStatus| actions.iter().filter(|a| a.status == status).count();
    let repairs_succeeded = count(RepairStatus::Succeeded);
    let repairs_failed = count(RepairStatus::Failed);

    let summary = ReportSummary {
        total_areas: available.len(),
        areas_passing,
        total_errors: run.issues().len(),
        errors_fixed: run.issues().len() - remaining.len(),
        errors_remaining: remaining.len(),
        repairs_attempted: repairs_succeeded + repairs_failed,
        repairs_succeeded,
        repairs_failed,
        repairs_skipped: count(RepairStatus::Skipped),
        success_rate: run.success_rate,
    };

    let recommendations = generate_recommendations(&RecommendationInputs {
        errors_remaining: summary.errors_remaining,
        failed_repairs: summary.repairs_failed,
        manual: run.manual_issues(),
        remaining: &remaining,
        quality: &quality,
        commit: run.commit.as_ref(),
    });

    ComprehensiveReport {
        run_id: run.id,
        status: run.status,
        started_at: run.started_at,
        ended_at: run.ended_at,
        generated_at: Utc::now(),
        summary,
        phases: run.phases.clone(),
        issues: run.issues().to_vec(),
        repair_actions: actions.to_vec(),
        manual_attention: run.manual_issues().to_vec(),
        verification: run
            .verification
            .as_ref()
            .map(|v| v.areas.clone())
            .unwrap_or_default(),
        validation: validate_fix_results(outcomes),
        quality,
        recommendations,
        commit: run.commit.clone(),
        timeline: run.timeline.clone(),
    }
}

impl ComprehensiveReport {
    pub fn executive_summary(&self) -> ExecutiveSummary {
        let s = &self.summary;
        let headline = format!(
            "Run {} {}: {}/{} areas passing, {} of {} errors fixed ({:.1}% success)",
            short_id(self.run_id),
            self.status,
            s.areas_passing,
            s.total_areas,
            s.errors_fixed,
            s.total_errors,
            s.success_rate
        );

        let mut key_findings = vec![format!(
            "Quality grade {} (overall {:.1})",
            self.quality.grade, self.quality.overall
        )];
        if s.errors_remaining > 0 {
            key_findings.push(format!("{} errors remain", s.errors_remaining));
        }
        if s.repairs_failed > 0 {
            key_findings.push(format!("{} repairs failed", s.repairs_failed));
        }
        if !self.manual_attention.is_empty() {
            key_findings.push(format!(
                "{} issues need manual attention",
                self.manual_attention.len()
            ));
        }

        ExecutiveSummary {
            run_id: self.run_id,
            status: self.status,
            headline,
            success_rate: s.success_rate,
            grade: self.quality.grade,
            key_findings,
            top_recommendations: self
                .recommendations
                .iter()
                .take(3)
                .map(|r| r.title.clone())
                .collect(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut md = String::new();
        let _ = writeln!(md, "# Remediation Report: run {}\n", short_id(self.run_id));
        let _ = writeln!(md, "- **Status:** {}", self.status);
        let _ = writeln!(md, "- **Started:** {}", self.started_at.to_rfc3339());
        if let Some(ended) = self.ended_at {
            let _ = writeln!(md, "- **Ended:** {}", ended.to_rfc3339());
        }
        let _ = writeln!(md, "- **Success rate:** {:.1}%\n", s.success_rate);

        md.push_str("## Summary\n\n| Metric | Value |\n|---|---|\n");
        for (name, value) in [
            ("Areas tested", s.total_areas),
            ("Areas passing", s.areas_passing),
            ("Total errors", s.total_errors),
            ("Errors fixed", s.errors_fixed),
            ("Errors remaining", s.errors_remaining),
            ("Repairs attempted", s.repairs_attempted),
            ("Repairs succeeded", s.repairs_succeeded),
            ("Repairs failed", s.repairs_failed),
            ("Repairs skipped", s.repairs_skipped),
        ] {
            let _ = writeln!(md, "| {} | {} |", name, value);
        }

        md.push_str("\n## Phases\n\n| Phase | Progress | Completed |\n|---|---|---|\n");
        for p in &self.phases {
            let _ = writeln!(
                md,
                "| {} | {}% | {} |",
                p.name,
                p.progress_percent,
                p.completed_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into())
            );
        }

        if !self.verification.is_empty() {
            md.push_str("\n## Verification\n\n| Area | Before | After | Status |\n|---|---|---|---|\n");
            for a in &self.verification {
                let _ = writeln!(
                    md,
                    "| {} | {:?} | {:?} | {:?} |",
                    a.area, a.before, a.after, a.status
                );
            }
        }

        if !self.issues.is_empty() {
            md.push_str("\n## Issues\n\n| Id | Area | Category | Severity | Location | Message |\n|---|---|---|---|---|---|\n");
            for i in &self.issues {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {} | {} |",
                    i.id(),
                    i.source_category(),
                    i.category(),
                    i.severity(),
                    i.location(),
                    one_line(i.message())
                );
            }
        }

        if !self.repair_actions.is_empty() {
            md.push_str("\n## Repairs\n\n| Issue | Strategy | Status | Detail |\n|---|---|---|---|\n");
            for a in &self.repair_actions {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} |",
                    a.target_issue,
                    a.strategy,
                    a.status,
                    one_line(&a.detail)
                );
            }
        }

        if !self.manual_attention.is_empty() {
            md.push_str("\n## Requires Manual Attention\n\n");
            for i in &self.manual_attention {
                let _ = writeln!(md, "- `{}` {}: {}", i.location(), i.category(), one_line(i.message()));
            }
        }

        let v = &self.validation;
        let _ = writeln!(
            md,
            "\n## Fix Validation\n\n{} pages tested, {} passed, {} failed: **{}**",
            v.pages_tested, v.pages_passed, v.pages_failed, v.status
        );

        let _ = writeln!(
            md,
            "\n## Quality\n\nOverall **{:.1}** (grade **{}**)\n\n| Dimension | Score | Grade |\n|---|---|---|",
            self.quality.overall, self.quality.grade
        );
        for d in &self.quality.dimensions {
            let _ = writeln!(md, "| {} | {:.1} | {} |", d.dimension, d.score, d.grade);
        }

        if let Some(commit) = &self.commit {
            let line = match commit {
                CommitOutcome::Committed { sha, .. } => format!("Committed `{}`", sha),
                CommitOutcome::NothingToCommit => "Nothing to commit".to_string(),
                CommitOutcome::Skipped { reason } => format!("Skipped: {}", reason),
                CommitOutcome::Failed { reason } => format!("Failed: {}", reason),
            };
            let _ = writeln!(md, "\n## Commit\n\n{}", line);
        }

        md.push_str("\n## Recommendations\n\n");
        for r in &self.recommendations {
            let _ = writeln!(md, "- **[{}] {}**: {}", r.priority, r.title, r.detail);
        }
        md
    }
}

impl ExecutiveSummary {
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Executive Summary\n\n{}\n", self.headline);
        let _ = writeln!(md, "**Grade:** {}\n\n## Key Findings\n", self.grade);
        for f in &self.key_findings {
            let _ = writeln!(md, "- {}", f);
        }
        if !self.top_recommendations.is_empty() {
            md.push_str("\n## Next Steps\n\n");
            for (i, r) in self.top_recommendations.iter().enumerate() {
                let _ = writeln!(md, "{}. {}", i + 1, r);
            }
        }
        md
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Keep table cells on one line.
fn one_line(s: &str) -> String {
    s.replace('\n', " ").replace('|', "\\|")
}
