//! Merge desired values into an existing config document.
//!
//! Keys absent from the desired map are never touched, keys keep their
//! position, new keys are appended at the end. Generated keys (salts,
//! secrets, instance ids) that already carry a value are never overwritten:
//! regenerating them would invalidate every stored password hash.

use crate::types::{Array, ConfigDocument, Key, Value};
use serde::Serialize;
use std::collections::BTreeSet;

/// Keys the application generates itself on first install
pub const GENERATED_KEYS: &[&str] = &["passwordsalt", "secret", "instanceid"];

/// Which keys the merge must preserve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    generated: BTreeSet<String>,
}

impl MergePolicy {
    /// Policy with no protected keys
    pub fn none() -> Self {
        Self {
            generated: BTreeSet::new(),
        }
    }

    /// Add a protected key
    pub fn with_generated(mut self, key: impl Into<String>) -> Self {
        self.generated.insert(key.into());
        self
    }

    /// Check if a key is protected once set
    pub fn is_generated(&self, key: &Key) -> bool {
        key.as_str().is_some_and(|k| self.generated.contains(k))
    }

    /// Protected keys in sorted order
    pub fn generated_keys(&self) -> impl Iterator<Item = &str> {
        self.generated.iter().map(String::as_str)
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        GENERATED_KEYS
            .iter()
            .fold(Self::none(), |policy, key| policy.with_generated(*key))
    }
}

/// What a merge did, key by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Existing keys whose value changed
    pub set: Vec<String>,
    /// Keys appended to the document
    pub added: Vec<String>,
    /// Generated keys whose existing value was preserved
    pub kept_generated: Vec<String>,
    /// Desired keys already at the desired value
    pub unchanged: Vec<String>,
}

impl MergeReport {
    /// Check if the merge left the document as it was
    pub fn is_noop(&self) -> bool {
        self.set.is_empty() && self.added.is_empty()
    }

    /// Number of keys written
    pub fn total_changes(&self) -> usize {
        self.set.len() + self.added.len()
    }
}

/// Merge `desired` into `doc`, returning the new document and a report.
pub fn merge(
    doc: &ConfigDocument,
    desired: &Array,
    policy: &MergePolicy,
) -> (ConfigDocument, MergeReport) {
    let mut merged = doc.clone();
    let mut report = MergeReport::default();

    for (key, value) in desired.iter() {
        let name = key.to_string();
        match merged.entries.get_key(key) {
            Some(existing) if policy.is_generated(key) && !existing.is_empty() => {
                if existing != value {
                    log::debug!("Keeping generated key '{name}'");
                }
                report.kept_generated.push(name);
            }
            Some(existing) if existing == value => report.unchanged.push(name),
            Some(_) => {
                merged.entries.insert(key.clone(), value.clone());
                report.set.push(name);
            }
            None => {
                merged.entries.insert(key.clone(), value.clone());
                report.added.push(name);
            }
        }
    }

    (merged, report)
}

/// Desired value for `key` if merging it would change the document
pub fn pending_value<'a>(
    doc: &ConfigDocument,
    key: &Key,
    desired: &'a Value,
    policy: &MergePolicy,
) -> Option<&'a Value> {
    match doc.entries.get_key(key) {
        Some(existing) if policy.is_generated(key) && !existing.is_empty() => None,
        Some(existing) if existing == desired => None,
        _ => Some(desired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn desired(pairs: &[(&str, Value)]) -> Array {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn keys(doc: &ConfigDocument) -> Vec<String> {
        doc.entries.keys().map(ToString::to_string).collect()
    }

    #[test]
    fn test_merge_overwrites_and_preserves_untouched() {
        let doc = parse("<?php $CONFIG = array('a' => 1, 'b' => 2);").unwrap();
        let (merged, report) = merge(
            &doc,
            &desired(&[("a", Value::Int(9))]),
            &MergePolicy::default(),
        );

        assert_eq!(keys(&merged), vec!["a", "b"]);
        assert_eq!(merged.get("a"), Some(&Value::Int(9)));
        assert_eq!(merged.get("b"), Some(&Value::Int(2)));
        assert_eq!(report.set, vec!["a"]);
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_merge_appends_new_keys() {
        let doc = parse("<?php $CONFIG = array('a' => 1);").unwrap();
        let (merged, report) = merge(
            &doc,
            &desired(&[("z", Value::from("new")), ("a", Value::Int(1))]),
            &MergePolicy::default(),
        );

        assert_eq!(keys(&merged), vec!["a", "z"]);
        assert_eq!(report.added, vec!["z"]);
        assert_eq!(report.unchanged, vec!["a"]);
    }

    #[test]
    fn test_merge_keeps_generated_keys() {
        let doc = parse("<?php $CONFIG = array('passwordsalt' => 'X', 'secret' => '');").unwrap();
        let (merged, report) = merge(
            &doc,
            &desired(&[
                ("passwordsalt", Value::from("Y")),
                ("secret", Value::from("S")),
                ("instanceid", Value::from("oc1")),
            ]),
            &MergePolicy::default(),
        );

        assert_eq!(merged.get("passwordsalt"), Some(&Value::from("X")));
        assert_eq!(merged.get("secret"), Some(&Value::from("S")));
        assert_eq!(merged.get("instanceid"), Some(&Value::from("oc1")));
        assert_eq!(report.kept_generated, vec!["passwordsalt"]);
        assert_eq!(report.set, vec!["secret"]);
        assert_eq!(report.added, vec!["instanceid"]);
    }

    #[test]
    fn test_merge_without_policy_overwrites_salt() {
        let doc = parse("<?php $CONFIG = array('passwordsalt' => 'X');").unwrap();
        let (merged, _) = merge(
            &doc,
            &desired(&[("passwordsalt", Value::from("Y"))]),
            &MergePolicy::none(),
        );
        assert_eq!(merged.get("passwordsalt"), Some(&Value::from("Y")));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = parse("<?php $CONFIG = array('a' => 1, 'passwordsalt' => 'X');").unwrap();
        let wanted = desired(&[("a", Value::Int(5)), ("dbtype", Value::from("mysql"))]);
        let policy = MergePolicy::default();

        let (once, first) = merge(&doc, &wanted, &policy);
        let (twice, second) = merge(&once, &wanted, &policy);

        assert_eq!(first.total_changes(), 2);
        assert!(second.is_noop());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_numeric_string_keys_match_parsed_list() {
        let doc = parse(
            "<?php $CONFIG = array('trusted_domains' => array(0 => 'localhost', 1 => 'cloud.example.com'));",
        )
        .unwrap();
        let domains: Array = [("0", "localhost"), ("1", "cloud.example.com")]
            .into_iter()
            .collect();
        let wanted = desired(&[("trusted_domains", Value::Array(domains))]);
        let policy = MergePolicy::default();

        let (merged, report) = merge(&doc, &wanted, &policy);
        assert!(report.is_noop());

        let reparsed = parse(&crate::serialize(&merged)).unwrap();
        let (_, again) = merge(&reparsed, &wanted, &policy);
        assert!(again.is_noop());
    }

    #[test]
    fn test_pending_value() {
        let doc = parse("<?php $CONFIG = array('instanceid' => 'oc1', 'a' => 1);").unwrap();
        let policy = MergePolicy::default();
        let new_id = Value::from("oc2");
        let one = Value::Int(1);
        let two = Value::Int(2);

        assert!(pending_value(&doc, &Key::from("instanceid"), &new_id, &policy).is_none());
        assert!(pending_value(&doc, &Key::from("a"), &one, &policy).is_none());
        assert_eq!(
            pending_value(&doc, &Key::from("a"), &two, &policy),
            Some(&two)
        );
    }
}
