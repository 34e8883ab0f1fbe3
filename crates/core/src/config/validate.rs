use super::{types::MigrationConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Required connection fields are non-empty
/// - Pool and batch sizes are positive
/// - `query` and `logstore_index_mappings` are JSON objects when set
pub fn validate_config(config: &MigrationConfig) -> Result<(), ConfigError> {
    if config.hosts.trim().is_empty() {
        return Err(ConfigError::ValidationError("hosts cannot be empty".to_string()));
    }
    if config.endpoint.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "endpoint cannot be empty".to_string(),
        ));
    }
    if config.project_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "project_name cannot be empty".to_string(),
        ));
    }
    if config.pool_size == 0 {
        return Err(ConfigError::ValidationError(
            "pool_size cannot be 0".to_string(),
        ));
    }
    if config.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "batch_size cannot be 0".to_string(),
        ));
    }

    check_json_object("query", config.query.as_deref())?;
    check_json_object(
        "logstore_index_mappings",
        config.logstore_index_mappings.as_deref(),
    )?;

    Ok(())
}

fn check_json_object(field: &str, value: Option<&str>) -> Result<(), ConfigError> {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(());
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(_)) => Ok(()),
        Ok(_) => Err(ConfigError::ValidationError(format!(
            "{} must be a JSON object",
            field
        ))),
        Err(e) => Err(ConfigError::ValidationError(format!(
            "{} is not valid JSON: {}",
            field, e
        ))),
    }
}
