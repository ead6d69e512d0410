use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name a repository is registered under, e.g. `acme/widgets`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoName(String);

impl RepoName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Row ID of a registered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub i64);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A full git commit SHA as printed by `git rev-parse`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitSha {
    fn from(sha: &str) -> Self {
        Self(sha.to_string())
    }
}

/// Which revision-control system a registered repository is backed by.
/// Only Perforce-backed repositories are eligible for changelist mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsType {
    Perforce,
    Git,
}

impl VcsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perforce => "perforce",
            Self::Git => "git",
        }
    }
}

impl FromStr for VcsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perforce" => Ok(Self::Perforce),
            "git" => Ok(Self::Git),
            _ => Err(format!("Invalid vcs type: {}", s)),
        }
    }
}

/// A repository as resolved through the repository directory.
#[derive(Debug, Clone)]
pub struct RepoRecord {
    pub id: RepoId,
    pub name: RepoName,
    pub vcs: VcsType,
    /// Local git mirror of the depot.
    pub mirror_dir: PathBuf,
}

/// One unit of work: (re)synchronize the named repository's mapping.
/// Consumed exactly once; a failed job is logged and dropped, never retried
/// by the pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub repo: RepoName,
}

/// A commit parsed out of the mirror's log, alive only for one mapping run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitSha,
    pub message: String,
    pub parents: Vec<CommitSha>,
}

/// One row of the commit -> changelist table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelistMapping {
    pub commit_sha: CommitSha,
    pub changelist_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_type_round_trip() {
        assert_eq!("perforce".parse::<VcsType>().unwrap(), VcsType::Perforce);
        assert_eq!("git".parse::<VcsType>().unwrap(), VcsType::Git);
        assert_eq!(VcsType::Perforce.as_str(), "perforce");
        assert_eq!(VcsType::Git.as_str(), "git");
    }

    #[test]
    fn test_vcs_type_rejects_unknown() {
        assert!("svn".parse::<VcsType>().is_err());
    }

    #[test]
    fn test_repo_name_display() {
        let name = RepoName::from("acme/widgets");
        assert_eq!(name.to_string(), "acme/widgets");
        assert_eq!(name.as_str(), "acme/widgets");
    }
}
