//! Local mirror access via the `git` binary.
//!
//! The pipeline never touches the mirror's object store directly; it shells
//! out for the two operations it needs, the same way the surrounding mirror
//! maintenance does. `log_between` owns the ordering contract: commits come
//! back oldest-to-newest and are passed through the pipeline unsorted.

use std::path::Path;
use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::GitError;
use crate::models::{Commit, CommitSha};

/// Record layout for `git log`: hash, parents, raw body, each field
/// NUL-terminated. Git forbids NUL in commit objects, so it is a safe
/// delimiter around the free-form `%B` body.
const LOG_FORMAT: &str = "--format=format:%H%x00%P%x00%B%x00";

/// What the mapping algorithm needs from a revision-control mirror.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Current HEAD commit of the local mirror.
    async fn head_commit(&self, mirror: &Path) -> Result<CommitSha>;

    /// Commits in `(from, to]` with full message bodies, oldest first.
    /// `from = None` means the entire ancestry of `to`.
    async fn log_between(
        &self,
        mirror: &Path,
        from: Option<&CommitSha>,
        to: &CommitSha,
    ) -> Result<Vec<Commit>>;
}

/// `Vcs` implementation that spawns the `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, mirror: &Path, args: &[&str]) -> Result<String, GitError> {
        let rendered = args.join(" ");
        let output = Command::new("git")
            .args(args)
            .current_dir(mirror)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                args: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: rendered,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn head_commit(&self, mirror: &Path) -> Result<CommitSha> {
        let out = self.run(mirror, &["rev-parse", "HEAD"]).await?;
        Ok(CommitSha::new(out.trim()))
    }

    async fn log_between(
        &self,
        mirror: &Path,
        from: Option<&CommitSha>,
        to: &CommitSha,
    ) -> Result<Vec<Commit>> {
        let range = match from {
            Some(from) => format!("{}..{}", from, to),
            None => to.to_string(),
        };
        let out = self
            .run(mirror, &["log", "--reverse", LOG_FORMAT, &range])
            .await?;
        Ok(parse_log(&out)?)
    }
}

/// Split `git log` output into commits.
///
/// Fields are NUL-separated; git emits a newline between entries, which
/// shows up glued to the front of the following hash field and is stripped.
fn parse_log(out: &str) -> Result<Vec<Commit>, GitError> {
    let mut commits = Vec::new();
    let mut fields = out.split('\0');

    loop {
        let hash = match fields.next() {
            None => break,
            Some(raw) => {
                let hash = raw.trim_start_matches('\n');
                if hash.is_empty() {
                    break;
                }
                hash
            }
        };

        let parents = fields.next().ok_or_else(|| GitError::MalformedLog {
            detail: format!("commit {} truncated before parents field", hash),
        })?;
        let body = fields.next().ok_or_else(|| GitError::MalformedLog {
            detail: format!("commit {} truncated before body field", hash),
        })?;

        commits.push(Commit {
            id: CommitSha::new(hash),
            parents: parents.split_whitespace().map(CommitSha::from).collect(),
            message: body.to_string(),
        });
    }

    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_empty_output() {
        assert!(parse_log("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_log_single_commit() {
        let out = "aaa111\0\0Initial import\n\n[git-p4: depot-paths = \"//depot/\": change = 1]\n\0";
        let commits = parse_log(out).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].id.as_str(), "aaa111");
        assert!(commits[0].parents.is_empty());
        assert!(commits[0].message.contains("change = 1"));
    }

    #[test]
    fn test_parse_log_multiple_commits() {
        let out = concat!(
            "aaa111\0\0first body\0\n",
            "bbb222\0aaa111\0second body\0\n",
            "ccc333\0bbb222\0third body\0",
        );
        let commits = parse_log(out).unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id.as_str(), "aaa111");
        assert_eq!(commits[1].id.as_str(), "bbb222");
        assert_eq!(commits[1].parents, vec![CommitSha::from("aaa111")]);
        assert_eq!(commits[2].id.as_str(), "ccc333");
    }

    #[test]
    fn test_parse_log_merge_commit_parents() {
        let out = "ddd444\0aaa111 bbb222\0merge body\0";
        let commits = parse_log(out).unwrap();
        assert_eq!(
            commits[0].parents,
            vec![CommitSha::from("aaa111"), CommitSha::from("bbb222")]
        );
    }

    #[test]
    fn test_parse_log_body_keeps_newlines() {
        let out = "eee555\0\0subject\n\nparagraph one\nparagraph two\n\0";
        let commits = parse_log(out).unwrap();
        assert_eq!(commits[0].message, "subject\n\nparagraph one\nparagraph two\n");
    }

    #[test]
    fn test_parse_log_truncated_record_is_error() {
        let err = parse_log("aaa111\0only-parents").unwrap_err();
        assert!(matches!(err, GitError::MalformedLog { .. }));
    }
}
