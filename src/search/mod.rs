//! Log search backends
//!
//! The exporter asks a backend for the number of log lines matching a
//! metric query within a time window.

pub mod elastic;
pub mod null;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::MetricQuery;

pub use elastic::{ElasticBackend, ElasticConfig};
pub use null::{NullBackend, DRY_RUN_COUNT};

/// Half-open time range a count covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of length `span` ending at `to`
    pub fn ending_at(to: DateTime<Utc>, span: Duration) -> Self {
        let span = chrono::Duration::from_std(span).unwrap_or_else(|_| chrono::Duration::hours(1));
        Self {
            from: to - span,
            to,
        }
    }

    /// Window of length `span` ending now
    pub fn last(span: Duration) -> Self {
        Self::ending_at(Utc::now(), span)
    }
}

/// Counts matching log lines
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn count(&self, query: &MetricQuery, window: &TimeWindow) -> Result<f64, SearchError>;

    /// Check connectivity; returns a backend version string
    async fn ping(&self) -> Result<String, SearchError>;
}

/// Search backend errors
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Deserialization(String),

    #[error("No search endpoints configured")]
    NoEndpoints,
}
