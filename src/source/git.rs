//! libgit2 adapter for [`PolicySource`].

use std::path::Path;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::{Delta, DiffFindOptions, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};

use super::{CommitInfo, DeltaStatus, PathDelta, PolicySource, SourceError, WalkOrder};

/// Production source over an opened git repository.
///
/// May own a scratch directory when the repository was cloned from a remote
/// URI; the checkout disappears when the source is dropped.
pub struct GitSource {
    repo: Repository,
    _scratch: Option<tempfile::TempDir>,
}

impl GitSource {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            _scratch: None,
        }
    }

    /// Open the repository at `path`.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self::new(Repository::open(path)?))
    }

    /// Walk upward from `path` to find the enclosing repository.
    pub fn discover(path: &Path) -> Result<Self, SourceError> {
        Ok(Self::new(Repository::discover(path)?))
    }

    /// Bind a scratch directory's lifetime to this source (used for
    /// temporary clones of remote repositories).
    pub(crate) fn with_scratch(repo: Repository, scratch: tempfile::TempDir) -> Self {
        Self {
            repo,
            _scratch: Some(scratch),
        }
    }

    fn find_commit(&self, id: &str) -> Result<git2::Commit<'_>, SourceError> {
        let oid = Oid::from_str(id)?;
        Ok(self.repo.find_commit(oid)?)
    }

    fn deltas_between(
        &self,
        old: Option<&git2::Tree<'_>>,
        new: &git2::Tree<'_>,
    ) -> Result<Vec<PathDelta>, SourceError> {
        let mut diff = self.repo.diff_tree_to_tree(old, Some(new), None)?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        let deltas = diff
            .deltas()
            .map(|delta| {
                let status = match delta.status() {
                    Delta::Added => DeltaStatus::Added,
                    Delta::Modified => DeltaStatus::Modified,
                    Delta::Deleted => DeltaStatus::Deleted,
                    Delta::Renamed => DeltaStatus::Renamed,
                    _ => DeltaStatus::Other,
                };
                let path = delta
                    .new_file()
                    .path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let old_path = match status {
                    DeltaStatus::Renamed => delta
                        .old_file()
                        .path()
                        .map(|p| p.to_string_lossy().into_owned()),
                    _ => None,
                };
                PathDelta {
                    status,
                    path,
                    old_path,
                }
            })
            .collect();
        Ok(deltas)
    }
}

impl PolicySource for GitSource {
    fn resolve(&self, spec: &str) -> Result<String, SourceError> {
        let object = self.repo.revparse_single(spec)?;
        Ok(object.peel_to_commit()?.id().to_string())
    }

    fn commit(&self, id: &str) -> Result<CommitInfo, SourceError> {
        Ok(commit_info(&self.find_commit(id)?))
    }

    fn walk(
        &self,
        target: &str,
        order: WalkOrder,
    ) -> Result<Box<dyn Iterator<Item = Result<CommitInfo, SourceError>> + '_>, SourceError> {
        let mut revwalk = self.repo.revwalk()?;
        let sort = match order {
            WalkOrder::Chronological => Sort::TIME | Sort::REVERSE,
            WalkOrder::ReverseChronological => Sort::TIME,
        };
        revwalk.set_sorting(sort)?;
        revwalk.push(Oid::from_str(target)?)?;

        let repo = &self.repo;
        Ok(Box::new(revwalk.map(
            move |oid| -> Result<CommitInfo, SourceError> {
                let commit = repo.find_commit(oid?)?;
                Ok(commit_info(&commit))
            },
        )))
    }

    fn diff_with_parent(&self, id: &str) -> Result<Vec<PathDelta>, SourceError> {
        let commit = self.find_commit(id)?;
        let new_tree = commit.tree()?;
        // Root commits diff against the empty tree.
        let old_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };
        self.deltas_between(old_tree.as_ref(), &new_tree)
    }

    fn diff_commits(&self, baseline: &str, target: &str) -> Result<Vec<PathDelta>, SourceError> {
        let baseline_tree = self.find_commit(baseline)?.tree()?;
        let target_tree = self.find_commit(target)?.tree()?;
        self.deltas_between(Some(&baseline_tree), &target_tree)
    }

    fn tree_files(&self, id: &str) -> Result<Vec<String>, SourceError> {
        let tree = self.find_commit(id)?.tree()?;
        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                let name = entry.name().unwrap_or_default();
                files.push(format!("{root}{name}"));
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    fn blob(&self, id: &str, path: &str) -> Result<Vec<u8>, SourceError> {
        let commit = self.find_commit(id)?;
        let entry = commit
            .tree()?
            .get_path(Path::new(path))
            .map_err(|_| SourceError::NotFound(format!("{path} @ {id}")))?;
        let object = entry.to_object(&self.repo)?;
        let blob = object
            .peel_to_blob()
            .map_err(|_| SourceError::NotFound(format!("{path} @ {id} is not a blob")))?;
        Ok(blob.content().to_vec())
    }
}

fn commit_info(commit: &git2::Commit<'_>) -> CommitInfo {
    let author = commit.author();
    let when = signature_time(&author);
    CommitInfo {
        id: commit.id().to_string(),
        author_name: author.name().unwrap_or("").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        message: commit.message().unwrap_or("").to_string(),
        when,
        parent_count: commit.parent_count(),
    }
}

/// Author time with its original UTC offset preserved.
fn signature_time(sig: &git2::Signature<'_>) -> DateTime<FixedOffset> {
    let time = sig.when();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| Utc.fix());
    DateTime::<Utc>::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .with_timezone(&offset)
}
