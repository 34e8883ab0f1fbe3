mod loader;
mod types;
mod validate;

pub use loader::{load_cached, load_or_init};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid migration configuration cache {path}: {reason}")]
    InvalidCache { path: String, reason: String },

    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Configuration cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
