//! Changelist trailer extraction.
//!
//! Commits mirrored from a Perforce depot carry a trailer recording the
//! originating changelist, e.g.
//!
//! ```text
//! [git-p4: depot-paths = "//depot/main/": change = 482]
//! ```
//!
//! `git-p4` and `p4-fusion` are the two bridge tools whose conventions we
//! recognize. The bracket and quote syntax must stay byte-for-byte
//! compatible with history that has already been mirrored, so the pattern
//! is deliberately narrow; do not generalize it.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ParseError;

static TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[(?:git-p4|p4-fusion): depot-paths = "(.*?)"\: change = (\d+)\]"#)
        .expect("changelist trailer pattern compiles")
});

/// Extract the changelist ID from a commit message body.
///
/// Returns `ParseError::NoChangelistTrailer` when no well-formed trailer is
/// present. If a body somehow carries more than one trailer, the first wins.
pub fn changelist_id(body: &str) -> Result<i64, ParseError> {
    let captures = TRAILER
        .captures(body)
        .ok_or_else(|| ParseError::NoChangelistTrailer {
            body: body.to_string(),
        })?;

    let digits = &captures[2];
    digits
        .parse::<i64>()
        .map_err(|_| ParseError::ChangelistOutOfRange {
            digits: digits.to_string(),
        })
}
