//! Change classification between two policy collections.
//!
//! [`collection_delta`] is a pure function: set difference on names, then a
//! content/location comparison for the survivors. The tie-break is fixed —
//! when both the body and the file path changed in the same commit, the
//! change is `Modified`; the move is only visible to consumers that compare
//! `policy.file_path` with `previous.file_path` themselves.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::json;

use crate::source::CommitInfo;

use super::model::{PolicyCollection, PolicyDefinition};

// ─── ChangeKind ──────────────────────────────────────────────────────────────

/// What happened to a policy in one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[serde(rename = "add")]
    Added,
    #[serde(rename = "remove")]
    Removed,
    Modified,
    Moved,
}

impl ChangeKind {
    /// Wire label, also used in the rendered description.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "add",
            ChangeKind::Removed => "remove",
            ChangeKind::Modified => "modified",
            ChangeKind::Moved => "moved",
        }
    }
}

// ─── PolicyChange ────────────────────────────────────────────────────────────

/// One classified policy change, attributed to a commit.
///
/// `policy` is the change payload: the definition after the change, or — for
/// `Removed` — the definition that disappeared. `previous` is populated only
/// for `Modified` and `Moved`.
#[derive(Debug, Clone)]
pub struct PolicyChange {
    pub kind: ChangeKind,
    pub policy: PolicyDefinition,
    pub previous: Option<PolicyDefinition>,
    pub commit: CommitInfo,
    pub repo_uri: String,
}

impl PolicyChange {
    /// Path of the change payload.
    pub fn file_path(&self) -> &str {
        &self.policy.file_path
    }

    /// Structured event payload delivered to sinks.
    pub fn data(&self) -> serde_json::Value {
        let mut d = json!({
            "change": self.kind.label(),
            "repo_uri": self.repo_uri,
            "policy": {
                "data": self.policy.body_json(),
                "file": self.policy.file_path,
            },
            "commit": {
                "id": self.commit.id,
                "message": self.commit.message,
                "author": self.commit.author_name,
                "email": self.commit.author_email,
                "date": self.commit.when.to_rfc3339(),
            },
        });
        if let Some(previous) = &self.previous {
            d["previous"] = json!({
                "data": previous.body_json(),
                "file": previous.file_path,
            });
        }
        d
    }
}

impl fmt::Display for PolicyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<policy-{} policy:{} resource:{} date:{} author:{} commit:{}>",
            self.kind.label(),
            self.policy.name,
            self.policy.resource().unwrap_or("-"),
            self.commit.when.to_rfc3339(),
            self.commit.author_name,
            self.commit.short_id()
        )
    }
}

// ─── CollectionDelta ─────────────────────────────────────────────────────────

/// Classify the differences between two collections.
///
/// Emits removals, then additions, then — for names present on both sides —
/// at most one `Modified` or `Moved` per name. Each phase iterates names in
/// lexicographic order so the output is deterministic.
pub fn collection_delta(
    before: &PolicyCollection,
    after: &PolicyCollection,
    commit: &CommitInfo,
    repo_uri: &str,
) -> Vec<PolicyChange> {
    let before_names: BTreeSet<&str> = before.names().collect();
    let after_names: BTreeSet<&str> = after.names().collect();

    let mut changes = Vec::new();
    let change = |kind, policy: &PolicyDefinition, previous: Option<&PolicyDefinition>| PolicyChange {
        kind,
        policy: policy.clone(),
        previous: previous.cloned(),
        commit: commit.clone(),
        repo_uri: repo_uri.to_string(),
    };

    for name in before_names.difference(&after_names) {
        if let Some(policy) = before.get(name) {
            changes.push(change(ChangeKind::Removed, policy, None));
        }
    }

    for name in after_names.difference(&before_names) {
        if let Some(policy) = after.get(name) {
            changes.push(change(ChangeKind::Added, policy, None));
        }
    }

    for name in before_names.intersection(&after_names) {
        let (prev, curr) = match (before.get(name), after.get(name)) {
            (Some(p), Some(c)) => (p, c),
            _ => continue,
        };
        if prev.body != curr.body {
            // Content difference wins over a simultaneous path change.
            changes.push(change(ChangeKind::Modified, curr, Some(prev)));
        } else if prev.file_path != curr.file_path {
            changes.push(change(ChangeKind::Moved, curr, Some(prev)));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn commit() -> CommitInfo {
        CommitInfo {
            id: "09cb85f1a2b3c4d5e6f709cb85f1a2b3c4d5e6f7".to_string(),
            author_name: "Kapil".to_string(),
            author_email: "kapil@example.com".to_string(),
            message: "update policies".to_string(),
            when: Utc.with_ymd_and_hms(2018, 8, 12, 9, 39, 43).unwrap().fixed_offset(),
            parent_count: 1,
        }
    }

    fn def(name: &str, file: &str, resource: &str) -> PolicyDefinition {
        let body =
            serde_yaml::from_str(&format!("name: {name}\nresource: {resource}")).unwrap();
        PolicyDefinition::new(name, body, file)
    }

    fn collect(defs: Vec<PolicyDefinition>) -> PolicyCollection {
        defs.into_iter().collect()
    }

    #[test]
    fn identical_collections_yield_nothing() {
        let a = collect(vec![def("foo", "p.yml", "ec2")]);
        let changes = collection_delta(&a, &a.clone(), &commit(), "file:///repo");
        assert!(changes.is_empty());
    }

    #[test]
    fn disjoint_names_are_removed_then_added() {
        let before = collect(vec![def("old-b", "p.yml", "ec2"), def("old-a", "p.yml", "ec2")]);
        let after = collect(vec![def("new", "p.yml", "ec2")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Removed, ChangeKind::Removed, ChangeKind::Added]
        );
        // Deterministic: removals come name-sorted.
        assert_eq!(changes[0].policy.name, "old-a");
        assert_eq!(changes[1].policy.name, "old-b");
        assert!(changes[0].previous.is_none());
    }

    #[test]
    fn body_change_is_modified_with_previous() {
        let before = collect(vec![def("foo", "p.yml", "ec2")]);
        let after = collect(vec![def("foo", "p.yml", "aws.lambda")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].previous.as_ref().unwrap().resource(), Some("ec2"));
    }

    #[test]
    fn path_change_alone_is_moved() {
        let before = collect(vec![def("foo", "p.yml", "ec2")]);
        let after = collect(vec![def("foo", "q.yml", "ec2")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Moved);
        assert_eq!(changes[0].file_path(), "q.yml");
        assert_eq!(changes[0].previous.as_ref().unwrap().file_path, "p.yml");
    }

    #[test]
    fn content_wins_over_simultaneous_path_change() {
        let before = collect(vec![def("foo", "p.yml", "ec2")]);
        let after = collect(vec![def("foo", "q.yml", "aws.lambda")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        // The move stays observable through the paths on both sides.
        assert_eq!(changes[0].file_path(), "q.yml");
        assert_eq!(changes[0].previous.as_ref().unwrap().file_path, "p.yml");
    }

    #[test]
    fn rendered_description_matches_expected_shape() {
        let before = PolicyCollection::new();
        let after = collect(vec![def("ec2-guard-duty", "p.yml", "ec2")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        let rendered = changes[0].to_string();
        assert!(rendered.starts_with("<policy-add policy:ec2-guard-duty resource:ec2"));
        assert!(rendered.contains("author:Kapil"));
        assert!(rendered.contains("commit:09cb85"));
    }

    #[test]
    fn data_payload_carries_commit_and_previous() {
        let before = collect(vec![def("foo", "p.yml", "ec2")]);
        let after = collect(vec![def("foo", "p.yml", "aws.lambda")]);
        let changes = collection_delta(&before, &after, &commit(), "file:///repo");

        let data = changes[0].data();
        assert_eq!(data["change"], "modified");
        assert_eq!(data["repo_uri"], "file:///repo");
        assert_eq!(data["policy"]["file"], "p.yml");
        assert_eq!(data["previous"]["data"]["resource"], "ec2");
        assert_eq!(data["commit"]["author"], "Kapil");
    }
}
