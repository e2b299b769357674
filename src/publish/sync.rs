// file: src/publish/sync.rs
// description: publishes local artifacts to the version-controlled dashboard remote
// reference: https://docs.rs/git2

use crate::config::PublishConfig;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use git2::{Commit, IndexAddOption, PushOptions, RemoteCallbacks, Repository, Signature};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { commit: String },
    /// The work tree matched HEAD; commit and push were skipped.
    NoChanges,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published { commit } => write!(f, "published commit {}", commit),
            Self::NoChanges => write!(f, "no changes to publish"),
        }
    }
}

/// Three gated steps: stage the work tree, commit with a generated
/// message, push the branch. The first failing step aborts the rest;
/// nothing already recorded by earlier stages is touched.
pub struct RemotePublisher {
    config: PublishConfig,
}

impl RemotePublisher {
    pub fn new(config: PublishConfig) -> Self {
        Self { config }
    }

    pub fn publish(&self) -> Result<PublishOutcome> {
        let repo = Repository::open(&self.config.repo_path).map_err(|e| {
            PipelineError::sync_step("stage", format!("failed to open publish repo: {}", e))
        })?;

        self.stage(&repo)?;

        let Some(commit) = self.commit(&repo)? else {
            info!("Publish tree unchanged, skipping commit and push");
            return Ok(PublishOutcome::NoChanges);
        };

        self.push(&repo)?;

        info!(
            "Published {} to {}/{}",
            commit, self.config.remote, self.config.branch
        );
        Ok(PublishOutcome::Published {
            commit: commit.to_string(),
        })
    }

    fn stage(&self, repo: &Repository) -> Result<()> {
        let mut index = repo
            .index()
            .map_err(|e| PipelineError::sync_step("stage", e.to_string()))?;

        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .map_err(|e| PipelineError::sync_step("stage", e.to_string()))?;

        index
            .write()
            .map_err(|e| PipelineError::sync_step("stage", e.to_string()))?;

        Ok(())
    }

    /// Returns `None` when the staged tree equals HEAD's tree.
    fn commit(&self, repo: &Repository) -> Result<Option<git2::Oid>> {
        let mut index = repo
            .index()
            .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?;

        let tree_id = index
            .write_tree()
            .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?;

        // HEAD is absent on an unborn branch; that is a first publish,
        // not an error.
        let parent: Option<Commit> = match repo.head() {
            Ok(head) => Some(
                head.peel_to_commit()
                    .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?,
            ),
            Err(_) => None,
        };

        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(None);
            }
        }

        let tree = repo
            .find_tree(tree_id)
            .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?;

        let signature = repo
            .signature()
            .or_else(|_| Signature::now("Strategy Commander", "commander@localhost"))
            .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?;

        let message = format!(
            "{} ({})",
            self.config.message_prefix,
            Utc::now().format("%Y-%m-%d %H:%M")
        );

        let parents: Vec<&Commit> = parent.iter().collect();
        let oid = repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &message,
                &tree,
                &parents,
            )
            .map_err(|e| PipelineError::sync_step("commit", e.to_string()))?;

        Ok(Some(oid))
    }

    fn push(&self, repo: &Repository) -> Result<()> {
        let mut remote = repo
            .find_remote(&self.config.remote)
            .map_err(|e| PipelineError::sync_step("push", e.to_string()))?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, _allowed| {
            git2::Cred::default()
                .or_else(|_| git2::Cred::username(username_from_url.unwrap_or("git")))
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!(
            "refs/heads/{0}:refs/heads/{0}",
            self.config.branch
        );

        remote
            .push(&[refspec.as_str()], Some(&mut options))
            .map_err(|e| PipelineError::sync_step("push", e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn init_work_repo(path: &Path) -> Repository {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("refs/heads/main");
        let repo = Repository::init_opts(path, &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "tester").unwrap();
            config.set_str("user.email", "tester@example.com").unwrap();
        }
        repo
    }

    fn publisher_for(work: &Path) -> RemotePublisher {
        RemotePublisher::new(PublishConfig {
            repo_path: work.to_path_buf(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            message_prefix: "Update campaign artifacts".to_string(),
        })
    }

    fn step_of(result: Result<PublishOutcome>) -> String {
        match result {
            Err(PipelineError::SyncStep { step, .. }) => step,
            other => panic!("expected SyncStep error, got {:?}", other.map(|o| o.to_string())),
        }
    }

    #[test]
    fn test_publish_to_local_bare_remote() {
        let dir = TempDir::new().unwrap();
        let remote_path = dir.path().join("remote.git");
        Repository::init_bare(&remote_path).unwrap();

        let work_path = dir.path().join("work");
        let repo = init_work_repo(&work_path);
        repo.remote("origin", remote_path.to_str().unwrap()).unwrap();
        fs::write(work_path.join("centrality_scores_multilayer.csv"), "node,score\n").unwrap();

        let outcome = publisher_for(&work_path).publish().unwrap();
        let PublishOutcome::Published { commit } = outcome else {
            panic!("expected a published commit");
        };

        let remote = Repository::open_bare(&remote_path).unwrap();
        let head = remote.find_reference("refs/heads/main").unwrap();
        let pushed = head.peel_to_commit().unwrap();
        assert_eq!(pushed.id().to_string(), commit);
        assert!(pushed.message().unwrap().starts_with("Update campaign artifacts"));
    }

    #[test]
    fn test_unchanged_tree_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let remote_path = dir.path().join("remote.git");
        Repository::init_bare(&remote_path).unwrap();

        let work_path = dir.path().join("work");
        let repo = init_work_repo(&work_path);
        repo.remote("origin", remote_path.to_str().unwrap()).unwrap();
        fs::write(work_path.join("scores.csv"), "node,score\n").unwrap();

        let publisher = publisher_for(&work_path);
        assert!(matches!(
            publisher.publish().unwrap(),
            PublishOutcome::Published { .. }
        ));
        assert_eq!(publisher.publish().unwrap(), PublishOutcome::NoChanges);
    }

    #[test]
    fn test_missing_repo_fails_at_stage_step() {
        let dir = TempDir::new().unwrap();
        let publisher = publisher_for(&dir.path().join("nowhere"));
        assert_eq!(step_of(publisher.publish()), "stage");
    }

    #[test]
    fn test_missing_remote_fails_at_push_step_after_commit() {
        let dir = TempDir::new().unwrap();
        let work_path = dir.path().join("work");
        let repo = init_work_repo(&work_path);
        fs::write(work_path.join("scores.csv"), "node,score\n").unwrap();

        let publisher = publisher_for(&work_path);
        assert_eq!(step_of(publisher.publish()), "push");

        // The commit from the earlier step is kept.
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(head.message().unwrap().starts_with("Update campaign artifacts"));
    }
}
