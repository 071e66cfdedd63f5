// SPDX-License-Identifier: MIT
//! The change-detection engine.
//!
//! [`PolicyRepo`] owns the bookkeeping map — its running belief about which
//! policies exist in which files as of the last processed commit — and
//! exposes the two entry points: [`delta_commits`](PolicyRepo::delta_commits)
//! for a one-shot comparison of two arbitrary commits, and
//! [`delta_stream`](PolicyRepo::delta_stream) for an incremental walk of a
//! commit ancestry.
//!
//! The walk is strictly sequential: commit N's bookkeeping update completes
//! before commit N+1's delta is computed. That ordering is a correctness
//! requirement, not a tuning choice — later commits' "currently known" state
//! depends on it.

pub mod checkout;

use std::collections::{HashMap, VecDeque};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::policy::{
    collection_delta, parse_document, policy_path_matcher, ChangeKind, PolicyChange,
    PolicyCollection,
};
use crate::source::{CommitInfo, DeltaStatus, PolicySource, SourceError, WalkOrder};

// ─── PolicyRepo ──────────────────────────────────────────────────────────────

/// A version-controlled repository of policy files.
pub struct PolicyRepo<S: PolicySource> {
    repo_uri: String,
    source: S,
    /// file path → collection, as of the last processed commit.
    policy_files: HashMap<String, PolicyCollection>,
    matcher: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl<S: PolicySource> PolicyRepo<S> {
    pub fn new(repo_uri: impl Into<String>, source: S) -> Self {
        Self {
            repo_uri: repo_uri.into(),
            source,
            policy_files: HashMap::new(),
            matcher: Box::new(policy_path_matcher),
        }
    }

    /// Replace the default policy-file predicate.
    pub fn with_matcher(mut self, matcher: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// The engine's current belief about every tracked policy file.
    pub fn policy_files(&self) -> &HashMap<String, PolicyCollection> {
        &self.policy_files
    }

    // ─── One-shot diff ───────────────────────────────────────────────────────

    /// Policy changes between two arbitrary commits (typically two branch
    /// heads), computed over the full tree diff in a single classification
    /// pass. Stateless and repeatable: the bookkeeping map is not touched.
    ///
    /// Returns the complete change set or fails outright; repository errors
    /// are fatal here.
    pub fn delta_commits(&self, baseline: &str, target: &str) -> Result<Vec<PolicyChange>> {
        let baseline_id = self.source.resolve(baseline)?;
        let target_id = self.source.resolve(target)?;
        let baseline_commit = self.source.commit(&baseline_id)?;
        let target_commit = self.source.commit(&target_id)?;

        let mut baseline_policies = PolicyCollection::new();
        let mut target_policies = PolicyCollection::new();

        for delta in self.source.diff_commits(&baseline_id, &target_id)? {
            if !(self.matcher)(&delta.path) {
                continue;
            }
            match delta.status {
                DeltaStatus::Added => {
                    target_policies.merge(self.file_rev(&delta.path, &target_commit)?);
                }
                DeltaStatus::Deleted => {
                    baseline_policies.merge(self.file_rev(&delta.path, &baseline_commit)?);
                }
                DeltaStatus::Modified => {
                    target_policies.merge(self.file_rev(&delta.path, &target_commit)?);
                    baseline_policies.merge(self.file_rev(&delta.path, &baseline_commit)?);
                }
                DeltaStatus::Renamed => {
                    target_policies.merge(self.file_rev(&delta.path, &target_commit)?);
                    if let Some(old_path) = delta.old_path.as_deref().filter(|p| (self.matcher)(p))
                    {
                        baseline_policies.merge(self.file_rev(old_path, &baseline_commit)?);
                    }
                }
                DeltaStatus::Other => {
                    info!(path = %delta.path, commit = %target_id, "unhandled delta kind, skipping");
                }
            }
        }

        Ok(collection_delta(
            &baseline_policies,
            &target_policies,
            &target_commit,
            &self.repo_uri,
        ))
    }

    // ─── Incremental stream ──────────────────────────────────────────────────

    /// Walk the ancestry of `target` oldest-first and yield every policy
    /// change, one commit at a time.
    ///
    /// With `limit`, only the most recent `limit` commits are walked; the
    /// bookkeeping map is primed from the tree at the window boundary
    /// (treated as ground truth, not diffed) so emitted changes cover only
    /// the window. Re-invoking re-walks from scratch and re-primes.
    pub fn delta_stream(
        &mut self,
        target: &str,
        limit: Option<usize>,
    ) -> Result<DeltaStream<'_, S>> {
        self.policy_files.clear();
        let target_id = self.source.resolve(target)?;

        let commits: Vec<CommitInfo> = match limit {
            Some(limit) => {
                let mut recent = Vec::with_capacity(limit + 1);
                for commit in self
                    .source
                    .walk(&target_id, WalkOrder::ReverseChronological)?
                {
                    recent.push(commit?);
                    if recent.len() == limit + 1 {
                        break;
                    }
                }
                // The walk reached back past the window: the oldest commit
                // collected is the boundary, and its tree is ground truth.
                if recent.len() == limit + 1 {
                    if let Some(boundary) = recent.pop() {
                        debug!(
                            commit = boundary.short_id(),
                            "priming bookkeeping from window boundary"
                        );
                        self.initialize_tree(&boundary)?;
                    }
                }
                recent.reverse();
                recent
            }
            None => self
                .source
                .walk(&target_id, WalkOrder::Chronological)?
                .collect::<Result<Vec<_>, SourceError>>()?,
        };

        Ok(DeltaStream {
            repo: self,
            commits: commits.into_iter(),
            pending: VecDeque::new(),
            failed: false,
        })
    }

    /// Seed the bookkeeping map from a commit's full tree.
    fn initialize_tree(&mut self, commit: &CommitInfo) -> Result<(), SourceError> {
        debug_assert!(self.policy_files.is_empty());
        for path in self.source.tree_files(&commit.id)? {
            if !(self.matcher)(&path) {
                continue;
            }
            let collection = self.file_rev_lenient(&path, commit);
            self.policy_files.insert(path, collection);
        }
        Ok(())
    }

    /// Process one commit of the walk: compute the touched-file delta,
    /// classify, then absorb every change into the bookkeeping map before
    /// the next commit is looked at.
    fn process_commit(&mut self, commit: &CommitInfo) -> Result<Vec<PolicyChange>> {
        let deltas = self
            .source
            .diff_with_parent(&commit.id)
            .with_context(|| format!("diffing commit {}", commit.short_id()))?;

        debug!(
            commit = commit.short_id(),
            date = %commit.when.to_rfc3339(),
            parents = commit.parent_count,
            files = deltas.len(),
            message = commit.message.trim(),
            "processing commit"
        );

        // Before/after collections scoped to the files this commit touched —
        // cost stays proportional to the commit, not the repository.
        let mut change_policies = PolicyCollection::new();
        let mut current_policies = PolicyCollection::new();
        let mut removed_paths: Vec<String> = Vec::new();

        for delta in &deltas {
            if !(self.matcher)(&delta.path) {
                continue;
            }
            match delta.status {
                DeltaStatus::Added | DeltaStatus::Modified => {
                    change_policies.merge(self.file_rev_lenient(&delta.path, commit));
                    // For Added, a known collection means the delta
                    // classification disagrees with our bookkeeping; folding
                    // it in keeps the output consistent either way.
                    if let Some(known) = self.policy_files.get(&delta.path) {
                        current_policies.merge(known.clone());
                    }
                }
                DeltaStatus::Deleted => {
                    if let Some(known) = self.policy_files.get(&delta.path) {
                        current_policies.merge(known.clone());
                        removed_paths.push(delta.path.clone());
                    }
                }
                DeltaStatus::Renamed => {
                    change_policies.merge(self.file_rev_lenient(&delta.path, commit));
                    if let Some(old_path) = &delta.old_path {
                        if let Some(known) = self.policy_files.get(old_path) {
                            current_policies.merge(known.clone());
                        }
                        removed_paths.push(old_path.clone());
                    }
                }
                DeltaStatus::Other => {
                    info!(path = %delta.path, commit = %commit.id, "unhandled delta kind, skipping");
                }
            }
        }

        let changes = collection_delta(&current_policies, &change_policies, commit, &self.repo_uri);
        for change in &changes {
            self.apply_change(change);
        }
        for path in removed_paths {
            if self
                .policy_files
                .get(&path)
                .is_some_and(PolicyCollection::is_empty)
            {
                self.policy_files.remove(&path);
            }
        }
        Ok(changes)
    }

    /// Absorb one emitted change into the bookkeeping map.
    fn apply_change(&mut self, change: &PolicyChange) {
        match change.kind {
            ChangeKind::Added => {
                self.policy_files
                    .entry(change.policy.file_path.clone())
                    .or_default()
                    .add(change.policy.clone());
            }
            ChangeKind::Removed => {
                self.policy_files
                    .get_mut(change.file_path())
                    .expect("bookkeeping invariant: removed policy's file is tracked")
                    .remove(&change.policy.name);
            }
            ChangeKind::Modified | ChangeKind::Moved => {
                let previous = change
                    .previous
                    .as_ref()
                    .expect("modified/moved changes carry a previous definition");
                if change.policy.file_path != previous.file_path {
                    self.policy_files
                        .get_mut(&previous.file_path)
                        .expect("bookkeeping invariant: moved policy's previous file is tracked")
                        .remove(&previous.name);
                    self.policy_files
                        .entry(change.policy.file_path.clone())
                        .or_default()
                        .add(change.policy.clone());
                } else {
                    self.policy_files
                        .get_mut(&change.policy.file_path)
                        .expect("bookkeeping invariant: modified policy's file is tracked")
                        .replace(change.policy.clone());
                }
            }
        }
    }

    /// Parse one file at one revision. Repository errors propagate; a
    /// malformed document degrades to an empty collection with a warning —
    /// one bad commit must not halt a stream.
    fn file_rev(&self, path: &str, commit: &CommitInfo) -> Result<PolicyCollection, SourceError> {
        let bytes = self.source.blob(&commit.id, path)?;
        match parse_document(&bytes, path) {
            Ok(collection) => Ok(collection),
            Err(error) => {
                warn!(
                    path,
                    commit = commit.short_id(),
                    date = %commit.when.to_rfc3339(),
                    author = %commit.author_name,
                    %error,
                    "invalid policy file"
                );
                Ok(PolicyCollection::new())
            }
        }
    }

    /// Stream-side variant: blob lookup failures also degrade, so a single
    /// odd revision cannot abort the walk.
    fn file_rev_lenient(&self, path: &str, commit: &CommitInfo) -> PolicyCollection {
        match self.file_rev(path, commit) {
            Ok(collection) => collection,
            Err(error) => {
                warn!(
                    path,
                    commit = commit.short_id(),
                    %error,
                    "unreadable policy file"
                );
                PolicyCollection::new()
            }
        }
    }
}

// ─── DeltaStream ─────────────────────────────────────────────────────────────

/// Lazy, finite, forward-only sequence of policy changes.
///
/// Changes for a commit are computed only when pulled, and each commit's
/// bookkeeping is fully absorbed before the next commit is processed. The
/// first fatal error ends the stream.
pub struct DeltaStream<'a, S: PolicySource> {
    repo: &'a mut PolicyRepo<S>,
    commits: std::vec::IntoIter<CommitInfo>,
    pending: VecDeque<PolicyChange>,
    failed: bool,
}

impl<S: PolicySource> Iterator for DeltaStream<'_, S> {
    type Item = Result<PolicyChange>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Some(Ok(change));
            }
            if self.failed {
                return None;
            }
            let commit = self.commits.next()?;
            match self.repo.process_commit(&commit) {
                Ok(changes) => self.pending.extend(changes),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}
