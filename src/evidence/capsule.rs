//! Capsule: the sole authoritative source for evidence verification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalValue;

/// Error raised when writing to a capsule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapsuleError {
    /// Entries are written once per reference.
    #[error("Capsule already holds an artifact for ref: {0}")]
    DuplicateReference(String),
}

/// Mapping from reference key to canonical artifact content.
///
/// Owned by the caller. Entries are written once per reference before
/// verification and read-only thereafter; verifiers only ever borrow it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capsule {
    entries: BTreeMap<String, CanonicalValue>,
}

impl Capsule {
    /// Create an empty capsule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an artifact under a reference.
    pub fn insert(
        &mut self,
        reference: impl Into<String>,
        artifact: CanonicalValue,
    ) -> Result<(), CapsuleError> {
        let reference = reference.into();
        if self.entries.contains_key(&reference) {
            return Err(CapsuleError::DuplicateReference(reference));
        }
        self.entries.insert(reference, artifact);
        Ok(())
    }

    /// Move every entry of `other` into this capsule.
    ///
    /// All-or-nothing: on a duplicate reference neither capsule changes.
    pub fn merge(&mut self, other: Capsule) -> Result<(), CapsuleError> {
        if let Some(dup) = other.entries.keys().find(|k| self.entries.contains_key(*k)) {
            return Err(CapsuleError::DuplicateReference(dup.clone()));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    /// Artifact stored under a reference.
    pub fn get(&self, reference: &str) -> Option<&CanonicalValue> {
        self.entries.get(reference)
    }

    /// Whether a reference is present.
    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    /// References in sorted order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the capsule is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects artifacts write-once: the first artifact under a reference is kept.
impl FromIterator<(String, CanonicalValue)> for Capsule {
    fn from_iter<I: IntoIterator<Item = (String, CanonicalValue)>>(iter: I) -> Self {
        let mut entries = BTreeMap::new();
        for (reference, artifact) in iter {
            entries.entry(reference).or_insert(artifact);
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(n: i64) -> CanonicalValue {
        CanonicalValue::from_json(json!({ "n": n })).unwrap()
    }

    #[test]
    fn test_write_once() {
        let mut capsule = Capsule::new();
        capsule.insert("a", artifact(1)).unwrap();
        assert_eq!(
            capsule.insert("a", artifact(2)),
            Err(CapsuleError::DuplicateReference("a".to_string()))
        );
        assert_eq!(capsule.get("a"), Some(&artifact(1)));
    }

    #[test]
    fn test_merge_is_atomic() {
        let mut base = Capsule::new();
        base.insert("a", artifact(1)).unwrap();

        let mut other = Capsule::new();
        other.insert("b", artifact(2)).unwrap();
        other.insert("a", artifact(3)).unwrap();

        assert!(base.merge(other).is_err());
        assert_eq!(base.len(), 1);

        let mut fresh = Capsule::new();
        fresh.insert("c", artifact(4)).unwrap();
        base.merge(fresh).unwrap();
        assert_eq!(base.references().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_collect_keeps_first_write() {
        let capsule: Capsule = [
            ("a".to_string(), artifact(1)),
            ("b".to_string(), artifact(2)),
            ("a".to_string(), artifact(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(capsule.len(), 2);
        assert_eq!(capsule.get("a"), Some(&artifact(1)));
    }

    #[test]
    fn test_serde_transparent() {
        let mut capsule = Capsule::new();
        capsule.insert("ref", artifact(1)).unwrap();
        let json = serde_json::to_value(&capsule).unwrap();
        assert_eq!(json, json!({"ref": {"n": 1}}));
        let back: Capsule = serde_json::from_value(json).unwrap();
        assert_eq!(back, capsule);
    }
}
