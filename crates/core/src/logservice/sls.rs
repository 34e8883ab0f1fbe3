//! Aliyun Log Service HTTP client.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::proto::encode_log_group;
use super::signer::{content_md5, signature, SignedRequest};
use super::{IndexConfig, LogGroup, LogService, LogServiceError};
use crate::config::Credentials;

const API_VERSION: &str = "0.6.0";
const SIGNATURE_METHOD: &str = "hmac-sha1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const SHARD_COUNT: u32 = 2;
const MAX_SPLIT_SHARD: u32 = 64;

/// Client for one log service project.
pub struct SlsClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

impl SlsClient {
    /// Create a client for `project` at `endpoint`.
    ///
    /// The endpoint may carry a scheme (default `http`). Project requests go to
    /// `<project>.<endpoint>` unless the endpoint is an IP address or `localhost`.
    pub fn new(
        endpoint: &str,
        project: &str,
        credentials: Credentials,
    ) -> Result<Self, LogServiceError> {
        Self::with_timeout(
            endpoint,
            project,
            credentials,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        endpoint: &str,
        project: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, LogServiceError> {
        let base_url = base_url(endpoint, project)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogServiceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        resource: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), LogServiceError> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let md5 = if body.is_empty() {
            String::new()
        } else {
            content_md5(&body)
        };

        let mut headers = BTreeMap::new();
        headers.insert("x-log-apiversion".to_string(), API_VERSION.to_string());
        headers.insert(
            "x-log-signaturemethod".to_string(),
            SIGNATURE_METHOD.to_string(),
        );
        headers.insert("x-log-bodyrawsize".to_string(), body.len().to_string());

        let signed = SignedRequest {
            method: method.as_str(),
            content_md5: &md5,
            content_type: if body.is_empty() { "" } else { content_type },
            date: &date,
            headers: &headers,
            resource,
            params: &[],
        };
        let sig = signature(&self.credentials.access_key, &signed)?;

        let url = format!("{}{}", self.base_url, resource);
        debug!(method = %method, url = %url, bytes = body.len(), "Log service request");

        let mut request = self
            .client
            .request(method, &url)
            .header("Date", &date)
            .header(
                "Authorization",
                format!("LOG {}:{}", self.credentials.access_key_id, sig),
            );
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !body.is_empty() {
            request = request
                .header("Content-Type", content_type)
                .header("Content-MD5", &md5)
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LogServiceError::Timeout
            } else if e.is_connect() {
                LogServiceError::ConnectionFailed(e.to_string())
            } else {
                LogServiceError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(err) => (err.error_code, err.error_message),
            Err(_) => (String::new(), text.chars().take(200).collect()),
        };
        Err(LogServiceError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn send_json(
        &self,
        method: Method,
        resource: &str,
        body: &serde_json::Value,
    ) -> Result<(), LogServiceError> {
        let bytes = serde_json::to_vec(body).map_err(|e| LogServiceError::Encode(e.to_string()))?;
        self.request(method, resource, "application/json", bytes)
            .await
    }
}

fn base_url(endpoint: &str, project: &str) -> Result<String, LogServiceError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let (scheme, host) = match endpoint.split_once("://") {
        Some((scheme, host)) => (scheme, host),
        None => ("http", endpoint),
    };
    if host.is_empty() {
        return Err(LogServiceError::Config("endpoint is empty".to_string()));
    }

    let hostname = host.rsplit_once(':').map_or(host, |(name, _)| name);
    if hostname == "localhost" || hostname.parse::<IpAddr>().is_ok() {
        Ok(format!("{}://{}", scheme, host))
    } else {
        Ok(format!("{}://{}.{}", scheme, project, host))
    }
}

fn logstore_resource(logstore: &str) -> String {
    format!("/logstores/{}", urlencoding::encode(logstore))
}

#[async_trait]
impl LogService for SlsClient {
    async fn create_logstore(
        &self,
        logstore: &str,
        ttl_days: u32,
    ) -> Result<(), LogServiceError> {
        let body = json!({
            "logstoreName": logstore,
            "ttl": ttl_days,
            "shardCount": SHARD_COUNT,
            "autoSplit": true,
            "maxSplitShard": MAX_SPLIT_SHARD,
        });
        self.send_json(Method::POST, "/logstores", &body).await
    }

    async fn create_index(
        &self,
        logstore: &str,
        config: &IndexConfig,
    ) -> Result<(), LogServiceError> {
        let body =
            serde_json::to_value(config).map_err(|e| LogServiceError::Encode(e.to_string()))?;
        let resource = format!("{}/index", logstore_resource(logstore));
        self.send_json(Method::POST, &resource, &body).await
    }

    async fn update_index(
        &self,
        logstore: &str,
        config: &IndexConfig,
    ) -> Result<(), LogServiceError> {
        let body =
            serde_json::to_value(config).map_err(|e| LogServiceError::Encode(e.to_string()))?;
        let resource = format!("{}/index", logstore_resource(logstore));
        self.send_json(Method::PUT, &resource, &body).await
    }

    async fn put_logs(&self, logstore: &str, group: &LogGroup) -> Result<(), LogServiceError> {
        if group.logs.is_empty() {
            return Ok(());
        }
        let body = encode_log_group(group)?;
        let resource = format!("{}/shards/lb", logstore_resource(logstore));
        self.request(Method::POST, &resource, "application/x-protobuf", body)
            .await
    }
}
