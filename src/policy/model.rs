//! Policy value types.
//!
//! A [`PolicyDefinition`] is one named entry of a policy document together
//! with the file it was parsed from; it is immutable once constructed — a
//! modification always produces a new value. A [`PolicyCollection`] is a
//! name-keyed set of definitions that preserves insertion order.

use std::collections::HashMap;

use serde_yaml::Value;

// ─── PolicyDefinition ────────────────────────────────────────────────────────

/// A named policy as it exists in one file at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDefinition {
    /// Policy name, unique within its owning collection.
    pub name: String,
    /// The raw declarative content. Compared by deep equality.
    pub body: Value,
    /// Repo-relative path of the file the policy was parsed from.
    pub file_path: String,
}

impl PolicyDefinition {
    pub fn new(name: impl Into<String>, body: Value, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body,
            file_path: file_path.into(),
        }
    }

    /// The `resource` field of the body, when present.
    pub fn resource(&self) -> Option<&str> {
        self.body.get("resource").and_then(Value::as_str)
    }

    /// Body as JSON for event payloads.
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

// ─── PolicyCollection ────────────────────────────────────────────────────────

/// Insertion-ordered, name-unique set of policy definitions.
///
/// Name uniqueness is an invariant: [`add`](Self::add) on a present name and
/// [`remove`](Self::remove) of an absent one are programming errors and
/// panic. Use [`merge`](Self::merge) when folding together per-file
/// collections, where a later file legitimately wins.
#[derive(Debug, Clone, Default)]
pub struct PolicyCollection {
    order: Vec<String>,
    map: HashMap<String, PolicyDefinition>,
}

impl PolicyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PolicyDefinition> {
        self.map.get(name)
    }

    /// Insert a definition under a name not yet present.
    ///
    /// # Panics
    /// Panics if a definition with the same name is already present.
    pub fn add(&mut self, policy: PolicyDefinition) {
        assert!(
            !self.map.contains_key(&policy.name),
            "duplicate policy name in collection: {}",
            policy.name
        );
        self.order.push(policy.name.clone());
        self.map.insert(policy.name.clone(), policy);
    }

    /// Remove the definition with the given name.
    ///
    /// # Panics
    /// Panics if no definition with that name is present.
    pub fn remove(&mut self, name: &str) -> PolicyDefinition {
        let removed = self
            .map
            .remove(name)
            .expect("removal of a policy name that is not in the collection");
        self.order.retain(|n| n != name);
        removed
    }

    /// Update the entry for an existing name in place, preserving its
    /// position in the iteration order.
    ///
    /// # Panics
    /// Panics if the name is not already present.
    pub fn replace(&mut self, policy: PolicyDefinition) {
        assert!(
            self.map.contains_key(&policy.name),
            "replace of a policy name that is not in the collection: {}",
            policy.name
        );
        self.map.insert(policy.name.clone(), policy);
    }

    /// Upsert every definition from `other`, appending new names in order.
    /// On a name collision the incoming definition wins.
    pub fn merge(&mut self, other: PolicyCollection) {
        for policy in other.into_iter() {
            if self.map.contains_key(&policy.name) {
                self.map.insert(policy.name.clone(), policy);
            } else {
                self.add(policy);
            }
        }
    }

    /// Names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Definitions, in insertion order. Restartable.
    pub fn iter(&self) -> impl Iterator<Item = &PolicyDefinition> {
        self.order.iter().filter_map(|name| self.map.get(name))
    }
}

impl IntoIterator for PolicyCollection {
    type Item = PolicyDefinition;
    type IntoIter = std::vec::IntoIter<PolicyDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        let mut map = self.map;
        self.order
            .iter()
            .filter_map(|name| map.remove(name))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl FromIterator<PolicyDefinition> for PolicyCollection {
    fn from_iter<I: IntoIterator<Item = PolicyDefinition>>(iter: I) -> Self {
        let mut collection = Self::new();
        for policy in iter {
            collection.add(policy);
        }
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, file: &str) -> PolicyDefinition {
        let body = serde_yaml::from_str(&format!("name: {name}\nresource: ec2")).unwrap();
        PolicyDefinition::new(name, body, file)
    }

    #[test]
    fn add_and_iterate_in_insertion_order() {
        let mut c = PolicyCollection::new();
        c.add(def("b", "p.yml"));
        c.add(def("a", "p.yml"));
        c.add(def("c", "p.yml"));

        let names: Vec<&str> = c.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        // Restartable.
        assert_eq!(c.iter().count(), 3);
    }

    #[test]
    #[should_panic(expected = "duplicate policy name")]
    fn add_duplicate_name_panics() {
        let mut c = PolicyCollection::new();
        c.add(def("a", "p.yml"));
        c.add(def("a", "q.yml"));
    }

    #[test]
    #[should_panic(expected = "not in the collection")]
    fn remove_unknown_name_panics() {
        let mut c = PolicyCollection::new();
        c.remove("missing");
    }

    #[test]
    fn replace_preserves_order() {
        let mut c = PolicyCollection::new();
        c.add(def("a", "p.yml"));
        c.add(def("b", "p.yml"));
        c.replace(def("a", "q.yml"));

        let names: Vec<&str> = c.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(c.get("a").unwrap().file_path, "q.yml");
    }

    #[test]
    fn merge_upserts_and_appends() {
        let mut c = PolicyCollection::new();
        c.add(def("a", "p.yml"));

        let mut other = PolicyCollection::new();
        other.add(def("a", "q.yml"));
        other.add(def("z", "q.yml"));

        c.merge(other);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a").unwrap().file_path, "q.yml");
        assert!(c.contains("z"));
    }

    #[test]
    fn resource_reads_body_field() {
        let p = def("a", "p.yml");
        assert_eq!(p.resource(), Some("ec2"));
    }
}
