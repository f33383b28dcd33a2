//! Metric catalogs: where registry mutations land
//!
//! The reconciler writes through a [`MetricCatalog`]. In a single process
//! that is the [`LocalCatalog`] over the shared registry; when the exporter
//! runs as its own process the [`RemoteCatalog`] forwards the same calls over
//! its metric API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::model::{MetricDefinition, StrategyMetric};
use crate::registry::MetricRegistry;

use super::LogCountGauge;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Metric already exists: {0}")]
    AlreadyExists(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Exporter returned status {status}: {body}")]
    Remote { status: u16, body: String },
}

/// Sink for metric definition changes
#[async_trait]
pub trait MetricCatalog: Send + Sync {
    /// Insert or replace the definition for `metric.strategy_id`
    async fn upsert(&self, metric: StrategyMetric) -> Result<(), CatalogError>;

    /// Remove the definition; absent ids are not an error
    async fn remove(&self, strategy_id: &str) -> Result<(), CatalogError>;
}

/// Registry writes with gauge cleanup
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    registry: Arc<MetricRegistry>,
    gauge: Arc<LogCountGauge>,
}

impl LocalCatalog {
    pub fn new(registry: Arc<MetricRegistry>, gauge: Arc<LogCountGauge>) -> Self {
        Self { registry, gauge }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn get(&self, strategy_id: &str) -> Option<StrategyMetric> {
        self.registry.get(strategy_id)
    }

    /// Insert a new definition; fails if the id is taken
    pub fn create(&self, metric: StrategyMetric) -> Result<(), CatalogError> {
        if !self
            .registry
            .insert_if_absent(metric.strategy_id.clone(), metric.clone())
        {
            return Err(CatalogError::AlreadyExists(metric.strategy_id));
        }
        Ok(())
    }

    /// Insert or replace, retiring the old series if the query changed.
    ///
    /// The registry is written first. Scans only set a series while the
    /// entry they counted is still current, under the registry read lock,
    /// so once the write lands no scan can bring the old series back.
    pub fn replace(&self, metric: StrategyMetric) -> Option<StrategyMetric> {
        let previous = self
            .registry
            .set(metric.strategy_id.clone(), metric.clone());
        if let Some(old) = &previous {
            self.gauge.retire_if_changed(old, &metric);
        }
        previous
    }

    /// Remove the definition and its series
    pub fn remove(&self, strategy_id: &str) -> Option<StrategyMetric> {
        let previous = self.registry.delete(strategy_id);
        if let Some(old) = &previous {
            self.gauge.retire(old);
        }
        previous
    }
}

#[async_trait]
impl MetricCatalog for LocalCatalog {
    async fn upsert(&self, metric: StrategyMetric) -> Result<(), CatalogError> {
        self.replace(metric);
        Ok(())
    }

    async fn remove(&self, strategy_id: &str) -> Result<(), CatalogError> {
        LocalCatalog::remove(self, strategy_id);
        Ok(())
    }
}

/// Forwards catalog calls to an exporter's metric API
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    http_client: reqwest::Client,
    addr: String,
}

impl RemoteCatalog {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            addr: addr.into(),
        })
    }

    pub fn metric_url(&self, strategy_id: &str) -> String {
        format!("http://{}/metric/{}", self.addr, strategy_id)
    }
}

async fn remote_error(response: reqwest::Response) -> CatalogError {
    CatalogError::Remote {
        status: response.status().as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl MetricCatalog for RemoteCatalog {
    async fn upsert(&self, metric: StrategyMetric) -> Result<(), CatalogError> {
        let response = self
            .http_client
            .put(self.metric_url(&metric.strategy_id))
            .json(&MetricDefinition::from(&metric))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(())
    }

    async fn remove(&self, strategy_id: &str) -> Result<(), CatalogError> {
        let response = self
            .http_client
            .delete(self.metric_url(strategy_id))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(remote_error(response).await),
        }
    }
}
