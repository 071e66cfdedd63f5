//! Scoped acquisition of the repository to read from.
//!
//! Remote URIs are cloned into a scratch directory whose lifetime is bound to
//! the returned source — when the source is dropped the checkout is removed.
//! Local paths are opened in place; with no URI at all, the enclosing
//! repository is discovered from the working directory.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use git2::Repository;
use tracing::{debug, info};

use crate::source::GitSource;

/// Resolve a repository URI to an opened source plus the identity string
/// stamped onto every emitted change.
pub fn acquire(repo_uri: Option<&str>) -> Result<(GitSource, String)> {
    match repo_uri {
        None => {
            let cwd = env::current_dir().context("cannot determine working directory")?;
            let repo = Repository::discover(&cwd)
                .context("no git repository found from the working directory")?;
            let uri = repo.path().to_string_lossy().into_owned();
            debug!(repo = %uri, "using discovered repository");
            Ok((GitSource::new(repo), uri))
        }
        Some(uri) if is_remote(uri) => {
            info!(repo = %uri, "cloning repository");
            let scratch = tempfile::tempdir().context("cannot create scratch directory")?;
            let repo = Repository::clone(uri, scratch.path())
                .with_context(|| format!("failed to clone {uri}"))?;
            Ok((GitSource::with_scratch(repo, scratch), uri.to_string()))
        }
        Some(path) => {
            let repo = Repository::open(Path::new(path))
                .with_context(|| format!("failed to open repository at {path}"))?;
            Ok((GitSource::new(repo), path.to_string()))
        }
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://") || uri.starts_with("git@")
}
