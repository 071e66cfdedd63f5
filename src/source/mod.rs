// SPDX-License-Identifier: MIT
//! Version-control capability surface.
//!
//! The engine never touches a VCS binding directly; everything it needs from
//! a repository — commit enumeration, tree-to-tree path deltas, blob reads —
//! goes through [`PolicySource`]. `git.rs` is the production adapter over
//! libgit2; `mem.rs` is an in-memory fake for tests.

pub mod git;
pub mod mem;

use chrono::{DateTime, FixedOffset};

pub use git::GitSource;
pub use mem::MemorySource;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Structural repository errors. Always fatal for the operation that hit
/// them; per-file degradation decisions belong to the engine, not here.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Git(#[from] git2::Error),
}

// ─── Commit metadata ─────────────────────────────────────────────────────────

/// Author, timestamp, and message of one commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full hex object id.
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Author time with its original UTC offset.
    pub when: DateTime<FixedOffset>,
    pub parent_count: usize,
}

impl CommitInfo {
    /// Abbreviated id for log lines and rendered changes.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(6)]
    }
}

// ─── Tree deltas ─────────────────────────────────────────────────────────────

/// Classification of one touched path between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    /// Anything else the binding reports (typechange, copies, …). The engine
    /// logs and skips these.
    Other,
}

/// One entry of a tree-to-tree delta list.
#[derive(Debug, Clone)]
pub struct PathDelta {
    pub status: DeltaStatus,
    /// Path on the new side (for deletions, the deleted path).
    pub path: String,
    /// Old path, set for renames.
    pub old_path: Option<String>,
}

/// Commit enumeration direction for [`PolicySource::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Oldest ancestor first.
    Chronological,
    /// Newest first.
    ReverseChronological,
}

// ─── Capability trait ────────────────────────────────────────────────────────

/// What the change engine needs from a version-controlled repository.
pub trait PolicySource {
    /// Resolve a revision spec (`HEAD`, a branch name, an id prefix) to a
    /// full commit id.
    fn resolve(&self, spec: &str) -> Result<String, SourceError>;

    /// Commit metadata by id.
    fn commit(&self, id: &str) -> Result<CommitInfo, SourceError>;

    /// Enumerate the ancestry of `target` (inclusive), first-parent order.
    fn walk(
        &self,
        target: &str,
        order: WalkOrder,
    ) -> Result<Box<dyn Iterator<Item = Result<CommitInfo, SourceError>> + '_>, SourceError>;

    /// Path deltas between a commit's tree and its first parent's tree
    /// (the empty tree for a root commit), with renames detected.
    fn diff_with_parent(&self, id: &str) -> Result<Vec<PathDelta>, SourceError>;

    /// Path deltas across the full tree diff of two arbitrary commits.
    fn diff_commits(&self, baseline: &str, target: &str) -> Result<Vec<PathDelta>, SourceError>;

    /// Every file path in a commit's tree, recursively.
    fn tree_files(&self, id: &str) -> Result<Vec<String>, SourceError>;

    /// Raw bytes of the file at `path` in the given commit's tree.
    fn blob(&self, id: &str, path: &str) -> Result<Vec<u8>, SourceError>;
}
