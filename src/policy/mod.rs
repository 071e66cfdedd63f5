//! `policy` — policy documents and their change semantics.
//!
//! - **Model** — [`PolicyDefinition`] and the name-unique, insertion-ordered
//!   [`PolicyCollection`].
//! - **Parser** — YAML policy documents → collections.
//! - **Delta** — [`collection_delta`] classification of two collections into
//!   a sequence of [`PolicyChange`] records.

pub mod delta;
pub mod model;
pub mod parser;

pub use delta::{collection_delta, ChangeKind, PolicyChange};
pub use model::{PolicyCollection, PolicyDefinition};
pub use parser::{parse_document, ParseError};

/// Does this path look like a policy file?
///
/// Policy files carry a `.yml`/`.yaml` extension and no leading hidden-file
/// component (`.github/workflows/ci.yml` is not a policy file).
pub fn policy_path_matcher(path: &str) -> bool {
    let named_like_policy = path.ends_with(".yml") || path.ends_with(".yaml");
    let hidden = path
        .split('/')
        .next()
        .map(|first| first.starts_with('.'))
        .unwrap_or(true);
    named_like_policy && !hidden
}

#[cfg(test)]
mod tests {
    use super::policy_path_matcher;

    #[test]
    fn matches_yaml_extensions() {
        assert!(policy_path_matcher("p.yml"));
        assert!(policy_path_matcher("policies/ec2.yaml"));
        assert!(!policy_path_matcher("README.md"));
        assert!(!policy_path_matcher("ymlfile.txt"));
    }

    #[test]
    fn rejects_hidden_paths() {
        assert!(!policy_path_matcher(".travis.yml"));
        assert!(!policy_path_matcher(".github/workflows/ci.yml"));
    }
}
