use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one primary shard in the source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardKey {
    pub index: String,
    pub shard: u32,
}

impl ShardKey {
    pub fn new(index: impl Into<String>, shard: u32) -> Self {
        Self {
            index: index.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.index, self.shard)
    }
}

/// A unit of migration work: one source shard bound to one destination store.
///
/// Older caches used `es_index`/`es_shard`/`logstore`; those names are still accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    #[serde(alias = "es_index")]
    pub source_index: String,
    #[serde(alias = "es_shard")]
    pub source_shard: u32,
    #[serde(alias = "logstore")]
    pub destination_store: String,
}

impl TaskRecord {
    pub fn key(&self) -> ShardKey {
        ShardKey::new(self.source_index.clone(), self.source_shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_record_round_trip_names() {
        let record = TaskRecord {
            id: 3,
            source_index: "logs-2024".to_string(),
            source_shard: 1,
            destination_store: "store1".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source_index"], "logs-2024");
        assert_eq!(json["destination_store"], "store1");
    }

    #[test]
    fn test_task_record_accepts_legacy_names() {
        let json = r#"{"id": 0, "es_index": "a", "es_shard": 2, "logstore": "s"}"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key(), ShardKey::new("a", 2));
        assert_eq!(record.destination_store, "s");
    }

    #[test]
    fn test_shard_key_display() {
        assert_eq!(ShardKey::new("idx", 4).to_string(), "idx[4]");
    }
}
