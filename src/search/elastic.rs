//! Elasticsearch count backend
//!
//! Logs are shipped into one index per day (`{prefix}YYYY.MM.DD`), so a
//! count covers every daily index the window touches.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{SearchBackend, SearchError, TimeWindow};
use crate::model::MetricQuery;

const CONTAINER_FIELD: &str = "kubernetes.container.name";
const MESSAGE_FIELD: &str = "message";
const TIMESTAMP_FIELD: &str = "@timestamp";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const INDEX_DATE_FORMAT: &str = "%Y.%m.%d";

/// Elasticsearch connection settings
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Base URLs, tried in order
    pub urls: Vec<String>,
    pub index_prefix: String,
    pub timeout: Duration,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:9200".to_string()],
            index_prefix: "filebeat-".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    version: InfoVersion,
}

#[derive(Debug, Deserialize)]
struct InfoVersion {
    number: String,
}

/// Counts log lines through the `_count` API
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    http_client: reqwest::Client,
    config: ElasticConfig,
}

impl ElasticBackend {
    pub fn new(config: ElasticConfig) -> Result<Self, SearchError> {
        if config.urls.is_empty() {
            return Err(SearchError::NoEndpoints);
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Daily indices covering the window, oldest first
    pub fn indices(&self, window: &TimeWindow) -> Vec<String> {
        let last = window.to.date_naive();
        let mut day = window.from.date_naive().min(last);
        let mut indices = Vec::new();
        loop {
            indices.push(format!(
                "{}{}",
                self.config.index_prefix,
                day.format(INDEX_DATE_FORMAT)
            ));
            match day.succ_opt() {
                Some(next) if next <= last => day = next,
                _ => break,
            }
        }
        indices
    }

    /// Request body for a `_count` call
    pub fn count_body(query: &MetricQuery, window: &TimeWindow) -> JsonValue {
        let range = json!({
            "range": {
                TIMESTAMP_FIELD: {
                    "gt": window.from.format(TIMESTAMP_FORMAT).to_string(),
                    "lt": window.to.format(TIMESTAMP_FORMAT).to_string(),
                }
            }
        });

        match query {
            MetricQuery::Keyword { container, keyword } => json!({
                "query": {
                    "bool": {
                        "must": [
                            { "term": { CONTAINER_FIELD: container } },
                            { "match_phrase": { MESSAGE_FIELD: keyword } },
                            range,
                        ]
                    }
                }
            }),
            MetricQuery::Dsl { query } => match serde_json::from_str::<JsonValue>(query) {
                // Full request bodies are passed through untouched
                Ok(body @ JsonValue::Object(_)) => body,
                _ => json!({
                    "query": {
                        "bool": {
                            "must": [
                                { "query_string": { "query": query } },
                                range,
                            ]
                        }
                    }
                }),
            },
        }
    }

    async fn count_at(
        &self,
        base_url: &str,
        indices: &str,
        body: &JsonValue,
    ) -> Result<f64, SearchError> {
        let url = format!(
            "{}/{}/_count?ignore_unavailable=true&allow_no_indices=true",
            base_url.trim_end_matches('/'),
            indices
        );

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: CountResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Deserialization(e.to_string()))?;

        Ok(result.count as f64)
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn count(&self, query: &MetricQuery, window: &TimeWindow) -> Result<f64, SearchError> {
        let indices = self.indices(window).join(",");
        let body = Self::count_body(query, window);

        let mut last_error = SearchError::NoEndpoints;
        for url in &self.config.urls {
            match self.count_at(url, &indices, &body).await {
                Ok(count) => return Ok(count),
                Err(SearchError::Network(e)) => {
                    tracing::warn!(url = %url, error = %e, "Search endpoint unreachable, trying next");
                    last_error = SearchError::Network(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    async fn ping(&self) -> Result<String, SearchError> {
        let mut last_error = SearchError::NoEndpoints;
        for url in &self.config.urls {
            let response = match self.http_client.get(url).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = SearchError::Network(e.to_string());
                    continue;
                }
            };

            if !response.status().is_success() {
                last_error = SearchError::Status {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                };
                continue;
            }

            let info: InfoResponse = response
                .json()
                .await
                .map_err(|e| SearchError::Deserialization(e.to_string()))?;
            return Ok(info.version.number);
        }
        Err(last_error)
    }
}
