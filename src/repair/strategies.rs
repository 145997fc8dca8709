//! Category-keyed repair strategies.

use crate::errors::RepairError;
use async_trait::async_trait;
use remedy_common::{Issue, IssueCategory, RepairResult};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::util::extract_json_object;

/// Per-invocation information handed to repair strategies.
#[derive(Debug, Clone, Default)]
pub struct RepairContext {
    pub run_id: Option<Uuid>,
    /// Root of the project under repair, when known.
    pub project_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Applies one kind of fix. Strategies may touch external state; the executor
/// only observes the returned [`RepairResult`].
#[async_trait]
pub trait RepairStrategy: Send + Sync {
    /// Stable id recorded on every action, e.g. `"scaffold-page"`.
    fn name(&self) -> &str;

    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn apply(&self, issue: &Issue, ctx: &RepairContext) -> Result<RepairResult, RepairError>;
}

/// Lookup table from category to strategy.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<IssueCategory, Arc<dyn RepairStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for `category`, replacing any previous one.
    pub fn register(&mut self, category: IssueCategory, strategy: Arc<dyn RepairStrategy>) {
        self.strategies.insert(category, strategy);
    }

    pub fn with(mut self, category: IssueCategory, strategy: Arc<dyn RepairStrategy>) -> Self {
        self.register(category, strategy);
        self
    }

    pub fn get(&self, category: IssueCategory) -> Option<&Arc<dyn RepairStrategy>> {
        self.strategies.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = IssueCategory> + '_ {
        self.strategies.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Creates a placeholder page for a missing route at
/// `<pages_dir>/<location>.vue`.
pub struct ScaffoldPageStrategy {
    pages_dir: PathBuf,
}

impl ScaffoldPageStrategy {
    pub const NAME: &'static str = "scaffold-page";

    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            pages_dir: pages_dir.into(),
        }
    }

    /// Resolve the page file for a location, refusing anything that would
    /// escape `pages_dir`.
    fn page_path(&self, location: &str) -> Result<PathBuf, RepairError> {
        let relative = location
            .trim()
            .trim_start_matches('/')
            .trim_end_matches('/')
            .trim_end_matches(".vue");
        let rel = Path::new(relative);
        let clean = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(RepairError::StrategyFailure {
                strategy: Self::NAME.to_string(),
                message: format!("Location '{}' is not a valid page path", location),
            });
        }
        Ok(self.pages_dir.join(format!("{}.vue", relative)))
    }

    fn render(issue: &Issue) -> String {
        let title = issue
            .location()
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(issue.location());
        format!(
            r#"<template>
  <div class="page-placeholder">
    <h1>{title}</h1>
    <p>This page is under construction.</p>
  </div>
</template>

<script setup lang="ts">
// Generated placeholder for '{area}'. Replace with the real page.
</script>
"#,
            title = title,
            area = issue.source_category()
        )
    }
}

#[async_trait]
impl RepairStrategy for ScaffoldPageStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn apply(&self, issue: &Issue, _ctx: &RepairContext) -> Result<RepairResult, RepairError> {
        let path = self.page_path(issue.location())?;
        if path.exists() {
            return Ok(RepairResult::not_applied(format!(
                "{} already exists",
                path.display()
            )));
        }

        let io_err = |e: std::io::Error| RepairError::StrategyFailure {
            strategy: Self::NAME.to_string(),
            message: format!("Failed to write {}: {}", path.display(), e),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, Self::render(issue))
            .await
            .map_err(io_err)?;

        debug!(path = %path.display(), "scaffolded page");
        Ok(RepairResult::applied(format!("Created {}", path.display())))
    }
}

/// Runs a configured shell command with the issue JSON on stdin.
///
/// A `{"applied": .., "detail": ..}` object on stdout decides the outcome;
/// otherwise exit status 0 means applied. The run context is exported as
/// `REMEDY_RUN_ID`, `REMEDY_PROJECT_DIR` and `REMEDY_DRY_RUN`.
pub struct CommandStrategy {
    name: String,
    command: String,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandStrategy {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl RepairStrategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn apply(&self, issue: &Issue, ctx: &RepairContext) -> Result<RepairResult, RepairError> {
        let failure = |message: String| RepairError::StrategyFailure {
            strategy: self.name.clone(),
            message,
        };
        let payload = serde_json::to_string(issue).map_err(|e| failure(e.to_string()))?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("REMEDY_ISSUE_ID", issue.id().as_str())
            .env("REMEDY_ISSUE_CATEGORY", issue.category().as_str())
            .env("REMEDY_ISSUE_LOCATION", issue.location())
            .env("REMEDY_ISSUE_AREA", issue.source_category())
            .env("REMEDY_DRY_RUN", if ctx.dry_run { "1" } else { "0" })
            .kill_on_drop(true);
        if let Some(run_id) = ctx.run_id {
            command.env("REMEDY_RUN_ID", run_id.to_string());
        }
        if let Some(project_dir) = &ctx.project_dir {
            command.env("REMEDY_PROJECT_DIR", project_dir);
        }
        let mut child = command
            .spawn()
            .map_err(|e| failure(format!("Failed to spawn '{}': {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores stdin may close it early.
            let _ = stdin.write_all(payload.as_bytes()).await;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failure(e.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Some(json) = extract_json_object(&stdout)
            && let Ok(result) = serde_json::from_str::<RepairResult>(&json)
        {
            return Ok(result);
        }

        if output.status.success() {
            let detail = stdout.trim();
            Ok(RepairResult::applied(if detail.is_empty() {
                format!("'{}' succeeded", self.command)
            } else {
                detail.to_string()
            }))
        } else {
            let detail = if stderr.trim().is_empty() {
                format!(
                    "'{}' exited with code {}",
                    self.command,
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            Err(failure(detail))
        }
    }
}
