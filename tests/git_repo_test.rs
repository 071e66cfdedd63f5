//! End-to-end engine tests over a real on-disk git repository.

use std::fs;
use std::path::Path;

use git2::{IndexAddOption, Repository, Signature, Time};

use policystream::policy::ChangeKind;
use policystream::repo::PolicyRepo;
use policystream::source::GitSource;

const FOO_V1: &str = "\
policies:
  - name: foo
    resource: ec2
";

const FOO_V2_AND_BAR: &str = "\
policies:
  - name: foo
    resource: ec2
    filters:
      - type: cross-account
  - name: bar
    resource: aws.lambda
";

/// Write/remove files in the workdir and commit the result. Commit times
/// increase with `tick` so time-ordered walks are deterministic.
fn commit_files(
    repo: &Repository,
    writes: &[(&str, &str)],
    removes: &[&str],
    message: &str,
    tick: i64,
) -> String {
    let workdir = repo.workdir().expect("fixture repo has a workdir");
    for (path, body) in writes {
        let full = workdir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, body).unwrap();
    }
    for path in removes {
        fs::remove_file(workdir.join(path)).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .unwrap();
    index.update_all(["*"], None).unwrap();
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::new("Kapil", "kapil@example.com", &Time::new(1_533_222_808 + tick, 0))
        .unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
        .to_string()
}

fn fixture(dir: &Path) -> (Repository, Vec<String>) {
    let repo = Repository::init(dir).unwrap();
    let mut ids = Vec::new();
    ids.push(commit_files(&repo, &[("p.yml", FOO_V1)], &[], "add foo", 0));
    ids.push(commit_files(
        &repo,
        &[("q.yml", FOO_V1)],
        &["p.yml"],
        "rename p to q",
        60,
    ));
    ids.push(commit_files(
        &repo,
        &[("q.yml", FOO_V2_AND_BAR)],
        &[],
        "edit foo, add bar",
        120,
    ));
    (repo, ids)
}

#[test]
fn walks_a_real_repository_history() {
    let dir = tempfile::tempdir().unwrap();
    let (_fixture_repo, ids) = fixture(dir.path());

    let source = GitSource::open(dir.path()).unwrap();
    let mut repo = PolicyRepo::new("file:///fixture", source);

    let changes: Vec<_> = repo
        .delta_stream("HEAD", None)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let shape: Vec<(ChangeKind, &str, &str)> = changes
        .iter()
        .map(|c| (c.kind, c.policy.name.as_str(), c.policy.file_path.as_str()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (ChangeKind::Added, "foo", "p.yml"),
            (ChangeKind::Moved, "foo", "q.yml"),
            (ChangeKind::Added, "bar", "q.yml"),
            (ChangeKind::Modified, "foo", "q.yml"),
        ]
    );

    // Attribution carries real commit metadata.
    assert_eq!(changes[1].commit.id, ids[1]);
    assert_eq!(changes[1].commit.author_name, "Kapil");

    // Bookkeeping matches the final tree: one file, two policies.
    assert_eq!(repo.policy_files().len(), 1);
    assert_eq!(repo.policy_files()["q.yml"].len(), 2);
}

#[test]
fn one_shot_diff_between_first_commit_and_head() {
    let dir = tempfile::tempdir().unwrap();
    let (_fixture_repo, ids) = fixture(dir.path());

    let source = GitSource::open(dir.path()).unwrap();
    let repo = PolicyRepo::new("file:///fixture", source);

    let changes = repo.delta_commits(&ids[0], "HEAD").unwrap();
    let mut kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
    kinds.sort_by_key(|k| format!("{k:?}"));
    assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Modified]);

    // Same commit twice: nothing changed.
    assert!(repo.delta_commits("HEAD", "HEAD").unwrap().is_empty());
}

#[test]
fn hidden_and_non_yaml_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_files(
        &repo,
        &[
            ("p.yml", FOO_V1),
            (".ci.yml", "policies:\n  - name: hidden\n    resource: ec2\n"),
            ("README.md", "# not a policy\n"),
        ],
        &[],
        "mixed tree",
        0,
    );

    let source = GitSource::open(dir.path()).unwrap();
    let mut policy_repo = PolicyRepo::new("file:///fixture", source);
    let changes: Vec<_> = policy_repo
        .delta_stream("HEAD", None)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].policy.name, "foo");
}
