//! Creation of destination logstores and their index configurations.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info};

use crate::logservice::{
    IndexConfig, LogService, LogServiceError, INDEX_ALREADY_EXIST, LOGSTORE_ALREADY_EXIST,
};
use crate::mapping::{is_valid_logstore_name, IndexLogstoreMappings};
use crate::schema::to_index_config;
use crate::source::{SourceCluster, SourceError};

/// Retention of created logstores.
pub const DEFAULT_TTL_DAYS: u32 = 3650;

/// Errors that abort provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to create logstore {logstore}: {source}")]
    Logstore {
        logstore: String,
        #[source]
        source: LogServiceError,
    },

    #[error("failed to configure index of logstore {logstore}: {source}")]
    Index {
        logstore: String,
        #[source]
        source: LogServiceError,
    },

    #[error("failed to read mappings of {index}: {source}")]
    Source {
        index: String,
        #[source]
        source: SourceError,
    },
}

/// Ensures every destination logstore and its index exist.
pub struct ResourceProvisioner {
    source: Arc<dyn SourceCluster>,
    log_service: Arc<dyn LogService>,
    ttl_days: u32,
    warmup: Duration,
}

impl ResourceProvisioner {
    pub fn new(
        source: Arc<dyn SourceCluster>,
        log_service: Arc<dyn LogService>,
        warmup: Duration,
    ) -> Self {
        Self {
            source,
            log_service,
            ttl_days: DEFAULT_TTL_DAYS,
            warmup,
        }
    }

    pub fn with_ttl_days(mut self, ttl_days: u32) -> Self {
        self.ttl_days = ttl_days;
        self
    }

    /// Create every logstore in `mappings`, then wait out the warm-up interval.
    pub async fn provision(&self, mappings: &IndexLogstoreMappings) -> Result<(), ProvisionError> {
        for logstore in mappings.all_logstores() {
            if !is_valid_logstore_name(logstore) {
                error!(logstore = %logstore, "Invalid logstore name, not creating it; its tasks will be dropped");
                continue;
            }
            self.ensure_logstore(logstore).await?;
            self.ensure_index(logstore, mappings).await?;
        }

        if !self.warmup.is_zero() {
            info!(secs = self.warmup.as_secs(), "Waiting for logstores to become ready");
            tokio::time::sleep(self.warmup).await;
        }
        Ok(())
    }

    async fn ensure_logstore(&self, logstore: &str) -> Result<(), ProvisionError> {
        match self.log_service.create_logstore(logstore, self.ttl_days).await {
            Ok(()) => {
                info!(logstore = %logstore, ttl_days = self.ttl_days, "Created logstore");
                Ok(())
            }
            Err(e) if e.is_code(LOGSTORE_ALREADY_EXIST) => {
                info!(logstore = %logstore, "Logstore already exists");
                Ok(())
            }
            Err(e) => Err(ProvisionError::Logstore {
                logstore: logstore.to_string(),
                source: e,
            }),
        }
    }

    async fn ensure_index(
        &self,
        logstore: &str,
        mappings: &IndexLogstoreMappings,
    ) -> Result<(), ProvisionError> {
        let indexes: Vec<&str> = mappings.indexes_for(logstore).collect();
        let schemas = join_all(indexes.iter().map(|index| self.source.get_mappings(index))).await;

        let mut merged: Option<IndexConfig> = None;
        for (index, schema) in indexes.into_iter().zip(schemas) {
            let schema = schema.map_err(|e| ProvisionError::Source {
                index: index.to_string(),
                source: e,
            })?;
            let Some(schema) = schema else {
                error!(index = %index, logstore = %logstore, "Source index not found, skipping its schema");
                continue;
            };

            let config = to_index_config(&schema);
            let config = match merged.take() {
                Some(mut acc) => {
                    acc.merge(config);
                    acc
                }
                None => config,
            };
            self.upsert_index(logstore, &config).await?;
            merged = Some(config);
        }
        Ok(())
    }

    async fn upsert_index(&self, logstore: &str, config: &IndexConfig) -> Result<(), ProvisionError> {
        let index_error = |source| ProvisionError::Index {
            logstore: logstore.to_string(),
            source,
        };

        match self.log_service.create_index(logstore, config).await {
            Ok(()) => {
                info!(logstore = %logstore, keys = config.keys.len(), "Created index");
                Ok(())
            }
            Err(e) if e.is_code(INDEX_ALREADY_EXIST) => {
                self.log_service
                    .update_index(logstore, config)
                    .await
                    .map_err(index_error)?;
                info!(logstore = %logstore, keys = config.keys.len(), "Updated index");
                Ok(())
            }
            Err(e) => Err(index_error(e)),
        }
    }
}
