//! Translation of source index mappings into log service index configurations.

use serde_json::{Map, Value};

use crate::logservice::{IndexConfig, IndexKey, IndexKeyType, IndexLine};

/// Token separators used for full-text and text key indexes.
pub const DEFAULT_TOKENS: &[&str] = &[
    ",", " ", "'", "\"", ";", "=", "(", ")", "[", "]", "{", "}", "?", "@", "&", "<", ">", "/",
    ":", "\n", "\t", "\r",
];

fn tokens() -> Vec<String> {
    DEFAULT_TOKENS.iter().map(|t| t.to_string()).collect()
}

/// Convert a source mapping into an index configuration.
///
/// Accepts typeless mappings (`{"properties": {...}}`) and legacy typed mappings
/// (`{"<type>": {"properties": {...}}}`). Nested object properties become dotted
/// keys, matching how documents are flattened during transfer.
pub fn to_index_config(mappings: &Value) -> IndexConfig {
    let mut config = IndexConfig {
        line: Some(IndexLine {
            token: tokens(),
            case_sensitive: false,
            chn: false,
        }),
        ..IndexConfig::default()
    };

    if let Some(properties) = root_properties(mappings) {
        collect_keys(properties, "", &mut config);
    }
    config
}

fn root_properties(mappings: &Value) -> Option<&Map<String, Value>> {
    if let Some(props) = mappings.get("properties").and_then(Value::as_object) {
        return Some(props);
    }
    mappings
        .as_object()?
        .values()
        .find_map(|typed| typed.get("properties").and_then(Value::as_object))
}

fn collect_keys(properties: &Map<String, Value>, prefix: &str, config: &mut IndexConfig) {
    for (name, field) in properties {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        if let Some(nested) = field.get("properties").and_then(Value::as_object) {
            collect_keys(nested, &key, config);
            continue;
        }

        let field_type = field.get("type").and_then(Value::as_str).unwrap_or("text");
        config.keys.insert(key, index_key(key_type_for(field_type)));
    }
}

fn key_type_for(field_type: &str) -> IndexKeyType {
    match field_type {
        "long" | "integer" | "short" | "byte" | "unsigned_long" => IndexKeyType::Long,
        "double" | "float" | "half_float" | "scaled_float" => IndexKeyType::Double,
        _ => IndexKeyType::Text,
    }
}

fn index_key(key_type: IndexKeyType) -> IndexKey {
    let is_text = key_type == IndexKeyType::Text;
    IndexKey {
        key_type,
        token: is_text.then(tokens),
        case_sensitive: is_text.then_some(false),
        chn: is_text.then_some(false),
        alias: String::new(),
        doc_value: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typeless_mapping() {
        let config = to_index_config(&json!({
            "properties": {
                "message": {"type": "text"},
                "status": {"type": "integer"},
                "latency": {"type": "float"},
                "host": {"type": "keyword"},
                "at": {"type": "date"}
            }
        }));

        assert_eq!(config.keys["message"].key_type, IndexKeyType::Text);
        assert_eq!(config.keys["status"].key_type, IndexKeyType::Long);
        assert_eq!(config.keys["latency"].key_type, IndexKeyType::Double);
        assert_eq!(config.keys["host"].key_type, IndexKeyType::Text);
        assert_eq!(config.keys["at"].key_type, IndexKeyType::Text);
        assert!(config.line.is_some());
    }

    #[test]
    fn test_typed_mapping() {
        let config = to_index_config(&json!({
            "_doc": {"properties": {"n": {"type": "long"}}}
        }));
        assert_eq!(config.keys["n"].key_type, IndexKeyType::Long);
    }

    #[test]
    fn test_nested_objects_flatten() {
        let config = to_index_config(&json!({
            "properties": {
                "user": {"properties": {"name": {"type": "keyword"}, "age": {"type": "short"}}}
            }
        }));
        assert_eq!(config.keys["user.name"].key_type, IndexKeyType::Text);
        assert_eq!(config.keys["user.age"].key_type, IndexKeyType::Long);
        assert!(!config.keys.contains_key("user"));
    }

    #[test]
    fn test_numeric_keys_have_no_tokens() {
        let config = to_index_config(&json!({"properties": {"n": {"type": "double"}}}));
        assert!(config.keys["n"].token.is_none());
    }

    #[test]
    fn test_empty_mapping() {
        let config = to_index_config(&json!({}));
        assert!(config.keys.is_empty());
        assert!(config.line.is_some());
    }
}
