//! Daemon configuration, read from a TOML file.
//!
//! ```toml
//! db_path = "changemap.sqlite"
//! mirror_root = "/var/lib/changemap/mirrors"
//! chunk_size = 1000
//! resync_interval_secs = 600
//!
//! [[repos]]
//! name = "acme/widgets"
//! mirror = "acme-widgets"
//! vcs = "perforce"
//! ```
//!
//! Relative `mirror` entries are resolved against `mirror_root`. Entries
//! with `vcs = "git"` are registered in the directory but never mapped;
//! the pipeline skips them if a job for one ever lands in the queue.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{RepoName, VcsType};

fn default_db_path() -> PathBuf {
    PathBuf::from("changemap.sqlite")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_resync_interval_secs() -> u64 {
    600
}

fn default_vcs() -> VcsType {
    VcsType::Perforce
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the repository directory and mapping rows.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base directory for relative `mirror` entries.
    #[serde(default)]
    pub mirror_root: Option<PathBuf>,

    /// Rows per batch-insert during a mapping run.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Seconds between full re-enqueues of every Perforce repository while
    /// serving.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: RepoName,

    /// Local git mirror of the depot, absolute or relative to
    /// `mirror_root`.
    pub mirror: PathBuf,

    #[serde(default = "default_vcs")]
    pub vcs: VcsType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            mirror_root: None,
            chunk_size: default_chunk_size(),
            resync_interval_secs: default_resync_interval_secs(),
            repos: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Absolute mirror directory for a repository entry.
    pub fn mirror_dir(&self, entry: &RepoEntry) -> PathBuf {
        if entry.mirror.is_absolute() {
            return entry.mirror.clone();
        }
        match &self.mirror_root {
            Some(root) => root.join(&entry.mirror),
            None => entry.mirror.clone(),
        }
    }
}
