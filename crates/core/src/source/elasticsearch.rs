//! Elasticsearch source implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ScanPage, ScanRequest, ShardCopy, SourceCluster, SourceDocument, SourceError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Elasticsearch client over the REST API.
///
/// Requests go to the first host and fail over to the next one on connection
/// errors. Certificate verification is disabled.
pub struct ElasticsearchClient {
    client: Client,
    hosts: Vec<String>,
}

impl ElasticsearchClient {
    /// Create a client from a comma-separated host list (e.g. "localhost:9200,other:9200").
    pub fn new(hosts: &str) -> Result<Self, SourceError> {
        Self::with_timeout(hosts, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(hosts: &str, timeout: Duration) -> Result<Self, SourceError> {
        let hosts: Vec<String> = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(normalize_host)
            .collect();
        if hosts.is_empty() {
            return Err(SourceError::Config("no hosts configured".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| SourceError::Config(e.to_string()))?;

        Ok(Self { client, hosts })
    }

    /// Send a request, trying each host in turn until one accepts the connection.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, SourceError> {
        let mut last_error = None;
        for host in &self.hosts {
            let url = format!("{}{}", host, path);
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(url = %url, "Source request");
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() => {
                    warn!(host = %host, error = %e, "Source host unreachable, trying next");
                    last_error = Some(SourceError::ConnectionFailed(e.to_string()));
                }
                Err(e) if e.is_timeout() => return Err(SourceError::Timeout),
                Err(e) => return Err(SourceError::ApiError(e.to_string())),
            }
        }
        Err(last_error.unwrap_or_else(|| SourceError::ConnectionFailed("no hosts".to_string())))
    }

    async fn read_json(response: Response) -> Result<Value, SourceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

/// Prefix a scheme when missing and drop trailing slashes.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Encode a comma-separated index list for use as a path segment.
fn index_path(indexes: &str) -> String {
    indexes
        .split(',')
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(|i| urlencoding::encode(i).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Deserialize)]
struct SearchShardsResponse {
    shards: Vec<Vec<ShardCopy>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    sort: Vec<Value>,
}

#[async_trait]
impl SourceCluster for ElasticsearchClient {
    async fn search_shards(&self, indexes: Option<&str>) -> Result<Vec<ShardCopy>, SourceError> {
        let path = match indexes.map(index_path).filter(|p| !p.is_empty()) {
            Some(p) => format!("/{}/_search_shards", p),
            None => "/_search_shards".to_string(),
        };
        let response = self.send(Method::GET, &path, None).await?;
        let body = Self::read_json(response).await?;
        let parsed: SearchShardsResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        Ok(parsed.shards.into_iter().flatten().collect())
    }

    async fn get_mappings(&self, index: &str) -> Result<Option<Value>, SourceError> {
        let path = format!("/{}", urlencoding::encode(index));
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::read_json(response).await?;

        // Keyed by the concrete index name, which differs from `index` for aliases.
        let entry = body
            .get(index)
            .or_else(|| body.as_object().and_then(|o| o.values().next()))
            .ok_or_else(|| SourceError::InvalidResponse(format!("no entry for {}", index)))?;
        Ok(Some(entry.get("mappings").cloned().unwrap_or_else(|| json!({}))))
    }

    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, SourceError> {
        let path = format!(
            "/{}/_search?preference=_shards:{}",
            urlencoding::encode(&request.index),
            request.shard
        );

        let mut body = json!({
            "size": request.size,
            "sort": [{"_seq_no": "asc"}],
        });
        if let Some(query) = &request.query {
            body["query"] = query.clone();
        }
        if let Some(after) = &request.search_after {
            body["search_after"] = Value::Array(after.clone());
        }

        let response = self.send(Method::POST, &path, Some(&body)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::IndexNotFound(request.index.clone()));
        }
        let body = Self::read_json(response).await?;
        let parsed: SearchResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let documents = parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| SourceDocument {
                index: hit.index,
                id: hit.id,
                source: hit.source,
                sort: hit.sort,
            })
            .collect();
        Ok(ScanPage { documents })
    }
}
