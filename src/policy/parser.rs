//! Policy document parsing.
//!
//! A policy file is a YAML document with a top-level `policies` list; every
//! entry is a mapping carrying at least a `name`. Parsing is strict — a
//! malformed document is the caller's signal to degrade (the stream engine
//! substitutes an empty collection rather than aborting a walk).

use serde::Deserialize;
use serde_yaml::Value;

use super::model::{PolicyCollection, PolicyDefinition};

/// Why a policy document failed to parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("policy entry {index} is not a mapping")]
    NotAMapping { index: usize },
    #[error("policy entry {index} has no name")]
    MissingName { index: usize },
    #[error("duplicate policy name in document: {name}")]
    DuplicateName { name: String },
}

#[derive(Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    policies: Vec<Value>,
}

/// Parse the raw bytes of a policy file at one revision into a collection.
///
/// Every definition is stamped with `file_path` as its origin.
pub fn parse_document(bytes: &[u8], file_path: &str) -> Result<PolicyCollection, ParseError> {
    let doc: PolicyDocument = serde_yaml::from_slice(bytes)?;

    let mut collection = PolicyCollection::new();
    for (index, entry) in doc.policies.into_iter().enumerate() {
        if !entry.is_mapping() {
            return Err(ParseError::NotAMapping { index });
        }
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingName { index })?
            .to_string();
        if collection.contains(&name) {
            return Err(ParseError::DuplicateName { name });
        }
        collection.add(PolicyDefinition::new(name, entry, file_path));
    }
    Ok(collection)
}
