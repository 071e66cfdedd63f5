//! In-memory [`PolicySource`] fake for tests.
//!
//! Commits form a single linear history; each commit records a full tree
//! snapshot and deltas are computed between consecutive snapshots. A removed
//! path whose exact bytes reappear under a new path is paired into a rename,
//! mirroring what similarity detection produces on the production adapter.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

use super::{CommitInfo, DeltaStatus, PathDelta, PolicySource, SourceError, WalkOrder};

struct MemoryCommit {
    id: String,
    author_name: String,
    author_email: String,
    message: String,
    when: DateTime<FixedOffset>,
    files: BTreeMap<String, Vec<u8>>,
    /// Deltas appended verbatim to this commit's computed delta list.
    extra_deltas: Vec<PathDelta>,
}

/// Linear-history fake source.
#[derive(Default)]
pub struct MemorySource {
    commits: Vec<MemoryCommit>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit whose tree is the given full snapshot. Returns the
    /// generated commit id.
    pub fn push_commit<'a, I>(&mut self, author: &str, message: &str, files: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let n = self.commits.len();
        let id = fake_id(n, message);
        let base = Utc
            .with_ymd_and_hms(2021, 3, 1, 12, 0, 0)
            .single()
            .expect("fixed base timestamp is valid")
            .fixed_offset();
        self.commits.push(MemoryCommit {
            id: id.clone(),
            author_name: author.to_string(),
            author_email: format!("{}@example.com", author.to_lowercase()),
            message: message.to_string(),
            when: base + Duration::hours(n as i64),
            files: files
                .into_iter()
                .map(|(path, body)| (path.to_string(), body.as_bytes().to_vec()))
                .collect(),
            extra_deltas: Vec::new(),
        });
        id
    }

    /// Attach a delta the engine should not understand (typechange-like) to
    /// an existing commit.
    pub fn inject_other_delta(&mut self, id: &str, path: &str) {
        if let Some(commit) = self.commits.iter_mut().find(|c| c.id == id) {
            commit.extra_deltas.push(PathDelta {
                status: DeltaStatus::Other,
                path: path.to_string(),
                old_path: None,
            });
        }
    }

    fn index_of(&self, id: &str) -> Result<usize, SourceError> {
        self.commits
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    fn info(&self, index: usize) -> CommitInfo {
        let c = &self.commits[index];
        CommitInfo {
            id: c.id.clone(),
            author_name: c.author_name.clone(),
            author_email: c.author_email.clone(),
            message: c.message.clone(),
            when: c.when,
            parent_count: usize::from(index > 0),
        }
    }
}

impl PolicySource for MemorySource {
    fn resolve(&self, spec: &str) -> Result<String, SourceError> {
        if spec == "HEAD" {
            return self
                .commits
                .last()
                .map(|c| c.id.clone())
                .ok_or_else(|| SourceError::NotFound("HEAD of empty history".to_string()));
        }
        self.commits
            .iter()
            .find(|c| c.id == spec || c.id.starts_with(spec))
            .map(|c| c.id.clone())
            .ok_or_else(|| SourceError::NotFound(spec.to_string()))
    }

    fn commit(&self, id: &str) -> Result<CommitInfo, SourceError> {
        Ok(self.info(self.index_of(id)?))
    }

    fn walk(
        &self,
        target: &str,
        order: WalkOrder,
    ) -> Result<Box<dyn Iterator<Item = Result<CommitInfo, SourceError>> + '_>, SourceError> {
        let end = self.index_of(target)?;
        let indexes: Vec<usize> = match order {
            WalkOrder::Chronological => (0..=end).collect(),
            WalkOrder::ReverseChronological => (0..=end).rev().collect(),
        };
        Ok(Box::new(indexes.into_iter().map(|i| Ok(self.info(i)))))
    }

    fn diff_with_parent(&self, id: &str) -> Result<Vec<PathDelta>, SourceError> {
        let index = self.index_of(id)?;
        let empty = BTreeMap::new();
        let old = if index > 0 {
            &self.commits[index - 1].files
        } else {
            &empty
        };
        let mut deltas = snapshot_delta(old, &self.commits[index].files);
        deltas.extend(self.commits[index].extra_deltas.iter().cloned());
        Ok(deltas)
    }

    fn diff_commits(&self, baseline: &str, target: &str) -> Result<Vec<PathDelta>, SourceError> {
        let baseline = self.index_of(baseline)?;
        let target = self.index_of(target)?;
        Ok(snapshot_delta(
            &self.commits[baseline].files,
            &self.commits[target].files,
        ))
    }

    fn tree_files(&self, id: &str) -> Result<Vec<String>, SourceError> {
        let index = self.index_of(id)?;
        Ok(self.commits[index].files.keys().cloned().collect())
    }

    fn blob(&self, id: &str, path: &str) -> Result<Vec<u8>, SourceError> {
        let index = self.index_of(id)?;
        self.commits[index]
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("{path} @ {id}")))
    }
}

fn snapshot_delta(
    old: &BTreeMap<String, Vec<u8>>,
    new: &BTreeMap<String, Vec<u8>>,
) -> Vec<PathDelta> {
    let mut added: Vec<&String> = new.keys().filter(|p| !old.contains_key(*p)).collect();
    let deleted: Vec<&String> = old.keys().filter(|p| !new.contains_key(*p)).collect();

    let mut deltas = Vec::new();

    // Pair exact-content moves into renames.
    for old_path in &deleted {
        let matched = added
            .iter()
            .position(|new_path| new[*new_path] == old[*old_path]);
        match matched {
            Some(i) => {
                let new_path = added.remove(i);
                deltas.push(PathDelta {
                    status: DeltaStatus::Renamed,
                    path: new_path.clone(),
                    old_path: Some((*old_path).clone()),
                });
            }
            None => deltas.push(PathDelta {
                status: DeltaStatus::Deleted,
                path: (*old_path).clone(),
                old_path: None,
            }),
        }
    }

    for path in added {
        deltas.push(PathDelta {
            status: DeltaStatus::Added,
            path: path.clone(),
            old_path: None,
        });
    }

    for (path, body) in new {
        if old.get(path).is_some_and(|old_body| old_body != body) {
            deltas.push(PathDelta {
                status: DeltaStatus::Modified,
                path: path.clone(),
                old_path: None,
            });
        }
    }

    deltas
}

fn fake_id(n: usize, message: &str) -> String {
    // FNV-1a over the message, widened to a 40-hex id.
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in message.bytes().chain(n.to_le_bytes()) {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{h:016x}{n:024x}")
}
