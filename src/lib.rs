//! changemap keeps git-mirrored Perforce depots resolvable by changelist.
//!
//! The core is a background pipeline that walks each mirror's new commits,
//! extracts the originating changelist from the bridge trailer in every
//! commit message, and appends `(commit_sha, changelist_id)` rows to a
//! SQLite store. The latest mapped commit per repository doubles as the
//! checkpoint, so imports are incremental, crash-consistent, and
//! re-entrant.

pub mod config;
pub mod errors;
pub mod git;
pub mod mapper;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod queue;
pub mod store;
