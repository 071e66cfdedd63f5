// SPDX-License-Identifier: MIT
//! policystream — semantic policy changes from git history.
//!
//! Policy assets live as YAML files under source control; that gives humans
//! an audit log, but dashboards, CI gates, and alerting want structured
//! "policy X was added/removed/modified/moved at commit Y by author Z"
//! events instead of raw diffs. This crate walks a commit history, keeps
//! incremental per-file bookkeeping, classifies every change, and delivers
//! the result to a pluggable sink.
//!
//! - [`policy`] — definitions, collections, parsing, change classification
//! - [`source`] — the VCS capability surface (git adapter + in-memory fake)
//! - [`repo`] — the incremental walk engine and one-shot commit diff
//! - [`transport`] — buffered delivery backends (console, stream, queue)
//! - [`arn`] — sink identifier parsing
//! - [`retry`] — predicate-gated exponential backoff

pub mod arn;
pub mod policy;
pub mod repo;
pub mod retry;
pub mod source;
pub mod transport;

pub use policy::{ChangeKind, PolicyChange, PolicyCollection, PolicyDefinition};
pub use repo::PolicyRepo;
pub use source::{GitSource, MemorySource, PolicySource};
pub use transport::Transport;
