use super::{CommitOutcome, CommitRequest, Committer};
use crate::init::REMEDY_DIR;
use anyhow::{Context, Result};
use async_trait::async_trait;
use git2::{IndexAddOption, IndexMatchedPath, Repository, Signature, StatusOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Stages everything in the worktree except remedy's own state directory and
/// commits it on the current branch.
pub struct GitCommitter {
    project_dir: PathBuf,
    timeout: Duration,
}

impl GitCommitter {
    pub fn new(project_dir: &Path, timeout: Duration) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            timeout,
        }
    }
}

#[async_trait]
impl Committer for GitCommitter {
    async fn commit(&self, request: &CommitRequest) -> CommitOutcome {
        let dir = self.project_dir.clone();
        let message = request.message();
        let task = tokio::task::spawn_blocking(move || commit_all(&dir, &message));

        let outcome = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => CommitOutcome::Failed {
                reason: format!("Commit timed out after {}s", self.timeout.as_secs()),
            },
            Ok(Err(join)) => CommitOutcome::Failed {
                reason: format!("Commit task aborted: {}", join),
            },
            Ok(Ok(Err(e))) => CommitOutcome::Failed {
                reason: format!("{:#}", e),
            },
            Ok(Ok(Ok(outcome))) => outcome,
        };

        match &outcome {
            CommitOutcome::Committed { sha, .. } => info!(%sha, "committed repairs"),
            CommitOutcome::Failed { reason } => warn!(%reason, "commit failed"),
            other => info!(?other, "nothing committed"),
        }
        outcome
    }
}

fn commit_all(project_dir: &Path, message: &str) -> Result<CommitOutcome> {
    let repo = match Repository::open(project_dir) {
        Ok(repo) => repo,
        Err(_) => {
            return Ok(CommitOutcome::Skipped {
                reason: format!("{} is not a git repository", project_dir.display()),
            });
        }
    };

    if !has_changes(&repo)? {
        return Ok(CommitOutcome::NothingToCommit);
    }

    // 0 stages the path, a positive value skips it.
    let mut project_only = |path: &Path, _: &[u8]| -> i32 { i32::from(is_remedy_state(path)) };
    let mut index = repo.index()?;
    index.add_all(
        ["*"].iter(),
        IndexAddOption::DEFAULT,
        Some(&mut project_only as &mut IndexMatchedPath),
    )?;
    index.update_all(["*"].iter(), Some(&mut project_only as &mut IndexMatchedPath))?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = repo
        .signature()
        .or_else(|_| Signature::now("remedy", "remedy@localhost"))
        .context("Failed to build commit signature")?;

    // Handle unborn branch (new repo with no commits yet)
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .context("Failed to create commit")?;

    Ok(CommitOutcome::Committed {
        sha: oid.to_string(),
        message: message.to_string(),
    })
}

/// Run state, logs and reports under `.remedy/` are never committed.
fn is_remedy_state(path: &Path) -> bool {
    path.starts_with(REMEDY_DIR)
}

/// Whether the worktree differs from HEAD outside `.remedy/`, ignoring
/// ignored files.
fn has_changes(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo
        .statuses(Some(&mut opts))
        .context("Failed to read worktree status")?;
    Ok(statuses.iter().any(|entry| {
        entry
            .path()
            .is_some_and(|p| !is_remedy_state(Path::new(p)))
    }))
}
