//! The mapping algorithm: checkpoint, delta range, parse, chunked insert.
//!
//! One `map_repo` call is one incremental import. The checkpoint is never
//! written directly; it is derived by the store from the rows themselves,
//! so a run that dies between chunks leaves a correct prefix and the next
//! run resumes exactly after the last inserted commit.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::git::Vcs;
use crate::models::{ChangelistMapping, Commit, RepoName, VcsType};
use crate::parse;
use crate::store::{ChangelistStore, RepoDirectory};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// What a single mapping run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    /// The job named a repository that is not a Perforce mirror. Stale or
    /// misrouted jobs land here; treated as success.
    Skipped,
    /// Checkpoint already at HEAD; zero writes.
    UpToDate,
    /// New commits were mapped.
    Mapped { commits: usize },
}

pub struct Mapper {
    repos: Arc<dyn RepoDirectory>,
    store: Arc<dyn ChangelistStore>,
    vcs: Arc<dyn Vcs>,
    chunk_size: usize,
}

impl Mapper {
    pub fn new(
        repos: Arc<dyn RepoDirectory>,
        store: Arc<dyn ChangelistStore>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        Self {
            repos,
            store,
            vcs,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the rows-per-write chunk size (clamped to at least 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run one incremental import for the named repository.
    pub async fn map_repo(&self, name: &RepoName) -> Result<MapOutcome> {
        let repo = self
            .repos
            .get_by_name(name)
            .await
            .context("resolving repository")?;

        if repo.vcs != VcsType::Perforce {
            warn!(
                repo = %repo.name,
                vcs = repo.vcs.as_str(),
                "skipping non-perforce repository found in the mapping queue"
            );
            return Ok(MapOutcome::Skipped);
        }

        let checkpoint = self
            .store
            .latest_mapped_commit(repo.id)
            .await
            .context("reading latest mapped commit")?;

        let head = self
            .vcs
            .head_commit(&repo.mirror_dir)
            .await
            .context("resolving mirror HEAD")?;

        if checkpoint.as_ref() == Some(&head) {
            debug!(repo = %repo.name, head = %head, "already mapped up to HEAD");
            return Ok(MapOutcome::UpToDate);
        }

        let commits = self
            .vcs
            .log_between(&repo.mirror_dir, checkpoint.as_ref(), &head)
            .await
            .context("reading commit log for delta range")?;

        let rows = rows_from_commits(&commits)?;

        for chunk in rows.chunks(self.chunk_size) {
            self.store
                .insert_mappings(repo.id, chunk)
                .await
                .context("inserting mapping rows")?;
        }

        info!(
            repo = %repo.name,
            commits = rows.len(),
            head = %head,
            "mapped new perforce changelists"
        );
        Ok(MapOutcome::Mapped {
            commits: rows.len(),
        })
    }
}

/// Convert the delta into insert rows, preserving log order. A commit with
/// no parseable trailer fails the whole run rather than being skipped: a
/// silent gap behind the checkpoint could never be repaired.
fn rows_from_commits(commits: &[Commit]) -> Result<Vec<ChangelistMapping>> {
    commits
        .iter()
        .map(|commit| {
            let changelist_id = parse::changelist_id(&commit.message)
                .with_context(|| format!("extracting changelist from commit {}", commit.id))?;
            Ok(ChangelistMapping {
                commit_sha: commit.id.clone(),
                changelist_id,
            })
        })
        .collect()
}
