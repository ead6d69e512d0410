//! Durable commit -> changelist storage and the repository directory.
//!
//! `MappingDb` is the synchronous rusqlite core. `DbHandle` wraps it behind
//! `Arc<Mutex>` and runs every access on tokio's blocking thread pool via
//! `spawn_blocking`, keeping synchronous SQLite I/O off the async worker
//! threads; it is the object the pipeline holds, through the
//! `ChangelistStore` and `RepoDirectory` traits.
//!
//! There is no checkpoint column anywhere: the latest mapped commit for a
//! repository is derived from the most recently inserted row, so the
//! checkpoint can never run ahead of what was actually written.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{ChangelistMapping, CommitSha, RepoId, RepoName, RepoRecord, VcsType};

/// Read side of the checkpoint store consumed by the mapping algorithm,
/// plus the chunked append it performs.
#[async_trait]
pub trait ChangelistStore: Send + Sync {
    /// Most recently inserted commit for the repository, or `None` when the
    /// repository has never been imported. "No rows" is a normal outcome,
    /// not an error.
    async fn latest_mapped_commit(&self, repo: RepoId) -> Result<Option<CommitSha>>;

    /// Append one chunk of rows atomically. Rows must arrive in log order
    /// (oldest first) so the derived checkpoint lands on the newest commit.
    /// A duplicate `commit_sha` within a repository is rejected.
    async fn insert_mappings(&self, repo: RepoId, rows: &[ChangelistMapping]) -> Result<()>;
}

/// Resolves repository names to records.
#[async_trait]
pub trait RepoDirectory: Send + Sync {
    /// Resolve a repository record; an unknown name is an error.
    async fn get_by_name(&self, name: &RepoName) -> Result<RepoRecord>;
}

pub struct MappingDb {
    conn: Connection,
}

impl MappingDb {
    /// Open (or create) a SQLite database at the given path and run
    /// migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS repos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    vcs_type TEXT NOT NULL DEFAULT 'perforce',
                    mirror_dir TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS commit_changelists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    repo_id INTEGER NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
                    commit_sha TEXT NOT NULL,
                    changelist_id INTEGER NOT NULL,
                    UNIQUE(repo_id, commit_sha)
                );

                CREATE INDEX IF NOT EXISTS idx_commit_changelists_repo
                    ON commit_changelists(repo_id);
                CREATE INDEX IF NOT EXISTS idx_commit_changelists_changelist
                    ON commit_changelists(repo_id, changelist_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Register a repository, or refresh its vcs type and mirror directory
    /// if the name is already known. Returns the stored record.
    pub fn upsert_repo(
        &self,
        name: &RepoName,
        vcs: VcsType,
        mirror_dir: &Path,
    ) -> Result<RepoRecord> {
        self.conn
            .execute(
                "INSERT INTO repos (name, vcs_type, mirror_dir) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET vcs_type = ?2, mirror_dir = ?3",
                params![
                    name.as_str(),
                    vcs.as_str(),
                    mirror_dir.to_string_lossy().as_ref()
                ],
            )
            .context("Failed to upsert repo")?;
        self.get_repo_by_name(name)?
            .with_context(|| format!("repo {} missing after upsert", name))
    }

    pub fn get_repo_by_name(&self, name: &RepoName) -> Result<Option<RepoRecord>> {
        self.conn
            .query_row(
                "SELECT id, name, vcs_type, mirror_dir FROM repos WHERE name = ?1",
                params![name.as_str()],
                repo_from_row,
            )
            .optional()
            .context("Failed to query repo by name")?
            .transpose()
    }

    pub fn list_repos(&self) -> Result<Vec<RepoRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, vcs_type, mirror_dir FROM repos ORDER BY name")
            .context("Failed to prepare repo listing")?;
        let rows = stmt
            .query_map([], repo_from_row)
            .context("Failed to list repos")?;
        let mut repos = Vec::new();
        for row in rows {
            repos.push(row.context("Failed to read repo row")??);
        }
        Ok(repos)
    }

    /// The derived checkpoint: commit of the highest-id row, or `None` when
    /// the repository has never been imported.
    pub fn latest_mapped_commit(&self, repo: RepoId) -> Result<Option<CommitSha>> {
        let sha: Option<String> = self
            .conn
            .query_row(
                "SELECT commit_sha FROM commit_changelists
                 WHERE repo_id = ?1 ORDER BY id DESC LIMIT 1",
                params![repo.0],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query latest mapped commit")?;
        Ok(sha.map(CommitSha::new))
    }

    /// Insert one chunk of rows inside a single transaction. Insertion
    /// order is meaningful: `latest_mapped_commit` reads the highest row
    /// id, so callers pass rows oldest-first.
    pub fn insert_mappings(&self, repo: RepoId, rows: &[ChangelistMapping]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin insert transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO commit_changelists (repo_id, commit_sha, changelist_id)
                     VALUES (?1, ?2, ?3)",
                )
                .context("Failed to prepare mapping insert")?;
            for row in rows {
                stmt.execute(params![repo.0, row.commit_sha.as_str(), row.changelist_id])
                    .with_context(|| {
                        format!("Failed to insert mapping for commit {}", row.commit_sha)
                    })?;
            }
        }
        tx.commit().context("Failed to commit mapping chunk")?;
        Ok(())
    }

    pub fn mapping_count(&self, repo: RepoId) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM commit_changelists WHERE repo_id = ?1",
                params![repo.0],
                |row| row.get(0),
            )
            .context("Failed to count mappings")?;
        Ok(count)
    }

    pub fn changelist_for_commit(&self, repo: RepoId, sha: &CommitSha) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT changelist_id FROM commit_changelists
                 WHERE repo_id = ?1 AND commit_sha = ?2",
                params![repo.0, sha.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to resolve commit to changelist")
    }

    pub fn commit_for_changelist(&self, repo: RepoId, changelist: i64) -> Result<Option<CommitSha>> {
        let sha: Option<String> = self
            .conn
            .query_row(
                "SELECT commit_sha FROM commit_changelists
                 WHERE repo_id = ?1 AND changelist_id = ?2",
                params![repo.0, changelist],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to resolve changelist to commit")?;
        Ok(sha.map(CommitSha::new))
    }
}

fn repo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<RepoRecord>> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let vcs: String = row.get(2)?;
    let mirror_dir: String = row.get(3)?;
    Ok(VcsType::from_str(&vcs)
        .map_err(|e| anyhow::anyhow!(e))
        .map(|vcs| RepoRecord {
            id: RepoId(id),
            name: RepoName::new(name),
            vcs,
            mirror_dir: mirror_dir.into(),
        }))
}

/// Async-safe handle to the mapping database.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<Mutex<MappingDb>>,
}

impl DbHandle {
    pub fn new(db: MappingDb) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&MappingDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

#[async_trait]
impl ChangelistStore for DbHandle {
    async fn latest_mapped_commit(&self, repo: RepoId) -> Result<Option<CommitSha>> {
        self.call(move |db| db.latest_mapped_commit(repo)).await
    }

    async fn insert_mappings(&self, repo: RepoId, rows: &[ChangelistMapping]) -> Result<()> {
        let rows = rows.to_vec();
        self.call(move |db| db.insert_mappings(repo, &rows)).await
    }
}

#[async_trait]
impl RepoDirectory for DbHandle {
    async fn get_by_name(&self, name: &RepoName) -> Result<RepoRecord> {
        let name = name.clone();
        self.call(move |db| {
            db.get_repo_by_name(&name)?
                .with_context(|| format!("unknown repository: {}", name))
        })
        .await
    }
}
