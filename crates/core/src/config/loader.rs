use figment::{
    providers::{Format, Json, Serialized},
    Figment,
};
use std::path::Path;
use tracing::{info, warn};

use super::types::{ckpt_path_in, config_file_in, ConfigOverrides, MigrationConfig};
use super::ConfigError;
use crate::fsutil::{read_or_empty, write_atomic};

/// Load the configuration cached in `cache_path`, merging this run's overrides.
///
/// On a fresh cache directory `hosts`, `endpoint` and `project_name` are required
/// and defaults fill the rest. On an existing one, only non-empty overrides replace
/// cached values; `time_reference` stays pinned to its first-run value. The effective
/// configuration is written back before returning.
pub fn load_or_init(
    cache_path: &Path,
    overrides: ConfigOverrides,
) -> Result<MigrationConfig, ConfigError> {
    let ckpt_path = ckpt_path_in(cache_path);
    std::fs::create_dir_all(&ckpt_path).map_err(|e| ConfigError::Io {
        path: ckpt_path.display().to_string(),
        source: e,
    })?;

    let mut overrides = overrides.non_empty();
    let config_file = config_file_in(cache_path);
    let cached = read_cache(&config_file)?;

    let figment = match cached {
        Some(cached) => {
            let previous: MigrationConfig = parse_cache(&config_file, &cached)?;
            if let Some(requested) = overrides.time_reference.take() {
                if previous.time_reference.as_deref() != Some(requested.as_str()) {
                    warn!(
                        cached = ?previous.time_reference,
                        requested = %requested,
                        "Ignoring time_reference override for an existing migration cache"
                    );
                }
            }
            info!("Resuming migration from cached configuration");
            Figment::new()
                .merge(Json::string(&cached))
                .merge(Serialized::defaults(overrides))
        }
        None => {
            if overrides.hosts.is_none() {
                return Err(ConfigError::MissingField("hosts"));
            }
            if overrides.endpoint.is_none() {
                return Err(ConfigError::MissingField("endpoint"));
            }
            if overrides.project_name.is_none() {
                return Err(ConfigError::MissingField("project_name"));
            }
            Figment::new().merge(Serialized::defaults(overrides))
        }
    };

    let mut config: MigrationConfig = figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.cache_path = cache_path.to_path_buf();

    dump_cache(&config)?;
    Ok(config)
}

/// Read-only load used by worker processes; the cache must already exist.
pub fn load_cached(cache_path: &Path) -> Result<MigrationConfig, ConfigError> {
    let config_file = config_file_in(cache_path);
    let cached = read_cache(&config_file)?.ok_or_else(|| ConfigError::InvalidCache {
        path: config_file.display().to_string(),
        reason: "cache is empty".to_string(),
    })?;

    let mut config = parse_cache(&config_file, &cached)?;
    config.cache_path = cache_path.to_path_buf();
    Ok(config)
}

fn read_cache(config_file: &Path) -> Result<Option<String>, ConfigError> {
    let content = read_or_empty(config_file).map_err(|e| ConfigError::Io {
        path: config_file.display().to_string(),
        source: e,
    })?;
    if content.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

fn parse_cache(config_file: &Path, content: &str) -> Result<MigrationConfig, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::InvalidCache {
        path: config_file.display().to_string(),
        reason: e.to_string(),
    })
}

fn dump_cache(config: &MigrationConfig) -> Result<(), ConfigError> {
    let config_file = config.config_file();
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    write_atomic(&config_file, content.as_bytes()).map_err(|e| ConfigError::Io {
        path: config_file.display().to_string(),
        source: e,
    })
}
