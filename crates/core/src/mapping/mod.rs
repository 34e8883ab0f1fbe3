//! Resolution of source index names to destination logstores.
//!
//! The mapping option is a JSON object from logstore name to a comma-separated list of
//! index patterns, e.g. `{"logstore1": "my_index*", "logstore2": "index1,index2"}`.
//! Exact names win over wildcard patterns; among several matching logstores the
//! lexicographically first one is chosen. Unmapped indexes get a logstore named
//! after the index.

mod pattern;

pub use pattern::IndexPattern;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::ledger::TaskRecord;

const MIN_LOGSTORE_LEN: usize = 3;
const MAX_LOGSTORE_LEN: usize = 63;

/// Errors raised while parsing the mapping option.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid logstore index mappings: {0}")]
    InvalidRules(String),

    #[error("Invalid index pattern {pattern:?} for logstore {logstore}")]
    InvalidPattern { logstore: String, pattern: String },
}

/// Parsed mapping rules, ordered by logstore name.
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    rules: Vec<(String, Vec<IndexPattern>)>,
}

impl MappingRules {
    /// Parse the JSON mapping option; `None` or blank means no rules.
    pub fn parse(rules_json: Option<&str>) -> Result<Self, MappingError> {
        let Some(raw) = rules_json.filter(|s| !s.trim().is_empty()) else {
            return Ok(Self::default());
        };

        let parsed: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| MappingError::InvalidRules(e.to_string()))?;

        let mut rules = Vec::with_capacity(parsed.len());
        for (logstore, value) in parsed {
            let serde_json::Value::String(patterns) = value else {
                return Err(MappingError::InvalidRules(format!(
                    "patterns for logstore {} must be a string",
                    logstore
                )));
            };
            let patterns = patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| {
                    IndexPattern::new(p).ok_or_else(|| MappingError::InvalidPattern {
                        logstore: logstore.clone(),
                        pattern: p.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rules.push((logstore, patterns));
        }

        Ok(Self { rules })
    }

    /// Logstore for `index`, or `None` when no rule matches.
    pub fn matching_logstore(&self, index: &str) -> Option<&str> {
        let exact = self.rules.iter().find(|(_, patterns)| {
            patterns
                .iter()
                .any(|p| !p.is_wildcard() && p.matches(index))
        });
        let wildcard = || {
            self.rules
                .iter()
                .find(|(_, patterns)| patterns.iter().any(|p| p.matches(index)))
        };
        exact.or_else(wildcard).map(|(logstore, _)| logstore.as_str())
    }

    /// Logstore for `index`, falling back to [`default_logstore_name`].
    pub fn logstore_for(&self, index: &str) -> String {
        self.matching_logstore(index)
            .map(str::to_string)
            .unwrap_or_else(|| default_logstore_name(index))
    }
}

/// Index to logstore assignments for a set of source indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexLogstoreMappings {
    by_index: BTreeMap<String, String>,
    by_logstore: BTreeMap<String, BTreeSet<String>>,
}

impl IndexLogstoreMappings {
    /// Resolve every index in `indexes` against the mapping rules.
    pub fn resolve<I, S>(indexes: I, rules_json: Option<&str>) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = MappingRules::parse(rules_json)?;
        let mut mappings = Self::default();
        for index in indexes {
            let index = index.as_ref();
            let logstore = rules.logstore_for(index);
            mappings.insert(index, &logstore);
        }
        Ok(mappings)
    }

    /// Mappings as recorded in the ledger, which is what transfers will use.
    pub fn from_tasks(tasks: &[TaskRecord]) -> Self {
        let mut mappings = Self::default();
        for task in tasks {
            mappings.insert(&task.source_index, &task.destination_store);
        }
        mappings
    }

    fn insert(&mut self, index: &str, logstore: &str) {
        self.by_index
            .entry(index.to_string())
            .or_insert_with(|| logstore.to_string());
        self.by_logstore
            .entry(logstore.to_string())
            .or_default()
            .insert(index.to_string());
    }

    pub fn get_logstore(&self, index: &str) -> Option<&str> {
        self.by_index.get(index).map(String::as_str)
    }

    /// Every distinct destination logstore, sorted.
    pub fn all_logstores(&self) -> impl Iterator<Item = &str> {
        self.by_logstore.keys().map(String::as_str)
    }

    /// Source indexes writing to `logstore`, sorted.
    pub fn indexes_for(&self, logstore: &str) -> impl Iterator<Item = &str> {
        self.by_logstore
            .get(logstore)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

/// Deterministic logstore name derived from an index name.
///
/// Lowercases, replaces characters outside `[a-z0-9_-]` with `_`, trims separators
/// from both ends and pads or truncates to the allowed length.
pub fn default_logstore_name(index: &str) -> String {
    let mapped: String = index
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut name: String = mapped
        .trim_matches(|c| c == '-' || c == '_')
        .chars()
        .take(MAX_LOGSTORE_LEN)
        .collect();
    while name.ends_with(['-', '_']) {
        name.pop();
    }

    if name.is_empty() {
        return "es-index".to_string();
    }
    if name.len() < MIN_LOGSTORE_LEN {
        name.push_str("-es");
    }
    name
}

/// Whether `name` is acceptable as a logstore name.
pub fn is_valid_logstore_name(name: &str) -> bool {
    let len = name.len();
    if !(MIN_LOGSTORE_LEN..=MAX_LOGSTORE_LEN).contains(&len) {
        return false;
    }
    let edge_ok = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let body_ok = |c: char| edge_ok(c) || c == '-' || c == '_';

    name.starts_with(edge_ok) && name.ends_with(edge_ok) && name.chars().all(body_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_wildcard_and_default() {
        let mappings =
            IndexLogstoreMappings::resolve(["a", "a-2024", "b"], Some(r#"{"store1": "a*"}"#))
                .unwrap();

        assert_eq!(mappings.get_logstore("a"), Some("store1"));
        assert_eq!(mappings.get_logstore("a-2024"), Some("store1"));
        assert_eq!(mappings.get_logstore("b"), Some("b-es"));

        let stores: Vec<_> = mappings.all_logstores().collect();
        assert_eq!(stores, vec!["b-es", "store1"]);
        let indexes: Vec<_> = mappings.indexes_for("store1").collect();
        assert_eq!(indexes, vec!["a", "a-2024"]);
    }

    #[test]
    fn test_exact_match_beats_wildcard() {
        let rules_json = r#"{"aaa": "logs*", "zzz": "logs-app, other"}"#;
        let rules = MappingRules::parse(Some(rules_json)).unwrap();

        assert_eq!(rules.logstore_for("logs-app"), "zzz");
        assert_eq!(rules.logstore_for("logs-web"), "aaa");
        assert_eq!(rules.logstore_for("other"), "zzz");
    }

    #[test]
    fn test_first_logstore_wins_on_overlap() {
        let rules_json = r#"{"beta": "idx*", "alpha": "i*"}"#;
        let rules = MappingRules::parse(Some(rules_json)).unwrap();
        assert_eq!(rules.logstore_for("idx1"), "alpha");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let rules_json = Some(r#"{"s1": "a*", "s2": "b,c"}"#);
        let first = IndexLogstoreMappings::resolve(["c", "a1", "zz"], rules_json).unwrap();
        let second = IndexLogstoreMappings::resolve(["zz", "a1", "c"], rules_json).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_mapping_json() {
        assert!(MappingRules::parse(Some("[1]")).is_err());
        assert!(MappingRules::parse(Some(r#"{"s": 3}"#)).is_err());
        assert!(MappingRules::parse(None).is_ok());
        assert!(MappingRules::parse(Some("")).is_ok());
    }

    #[test]
    fn test_from_tasks_uses_recorded_destination() {
        let tasks = vec![
            TaskRecord {
                id: 0,
                source_index: "a".to_string(),
                source_shard: 0,
                destination_store: "old".to_string(),
            },
            TaskRecord {
                id: 1,
                source_index: "b".to_string(),
                source_shard: 0,
                destination_store: "old".to_string(),
            },
        ];
        let mappings = IndexLogstoreMappings::from_tasks(&tasks);
        let indexes: Vec<_> = mappings.indexes_for("old").collect();
        assert_eq!(indexes, vec!["a", "b"]);
    }

    #[test]
    fn test_default_logstore_name() {
        assert_eq!(default_logstore_name("Logs.2024"), "logs_2024");
        assert_eq!(default_logstore_name("b"), "b-es");
        assert_eq!(default_logstore_name("__x__"), "x-es");
        assert_eq!(default_logstore_name("***"), "es-index");
        assert_eq!(default_logstore_name(&"a".repeat(80)).len(), 63);
    }

    #[test]
    fn test_default_names_are_valid() {
        for index in ["b", "Logs.2024", "__x__", "***", "a-", "MiXeD_Case-1"] {
            let name = default_logstore_name(index);
            assert!(is_valid_logstore_name(&name), "{} -> {}", index, name);
        }
    }

    #[test]
    fn test_is_valid_logstore_name() {
        assert!(is_valid_logstore_name("store1"));
        assert!(!is_valid_logstore_name(""));
        assert!(!is_valid_logstore_name("ab"));
        assert!(!is_valid_logstore_name("Store1"));
        assert!(!is_valid_logstore_name("-store"));
        assert!(!is_valid_logstore_name("store.1"));
    }
}
