//! Typed error hierarchy for the mapping pipeline.
//!
//! Two top-level enums cover the failure sources with structure worth
//! matching on:
//! - `ParseError` covers commit-message trailer extraction failures
//! - `GitError` covers local mirror invocation failures
//!
//! Everything else flows through `anyhow` with stage context attached at
//! the call site, so a failed job's log line names the repository and the
//! stage that broke.

use thiserror::Error;

/// Errors from the changelist trailer contract.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The commit body carried no well-formed changelist trailer. This fails
    /// the whole mapping run: skipping the commit would leave a permanent
    /// gap behind the checkpoint.
    #[error("no changelist trailer in commit body: {body:?}")]
    NoChangelistTrailer { body: String },

    #[error("changelist id {digits:?} does not fit in an i64")]
    ChangelistOutOfRange { digits: String },
}

/// Errors from running the `git` binary against a local mirror.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} failed ({status}): {stderr}")]
    CommandFailed {
        args: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("git produced non-UTF-8 output: {0}")]
    NonUtf8Output(#[from] std::string::FromUtf8Error),

    #[error("malformed log record: {detail}")]
    MalformedLog { detail: String },
}
