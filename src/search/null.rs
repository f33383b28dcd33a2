//! Dry-run backend

use async_trait::async_trait;

use super::{SearchBackend, SearchError, TimeWindow};
use crate::model::MetricQuery;

/// Count reported for every query in dry-run mode
pub const DRY_RUN_COUNT: f64 = 123.0;

/// Backend that never leaves the process
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

#[async_trait]
impl SearchBackend for NullBackend {
    async fn count(&self, query: &MetricQuery, _window: &TimeWindow) -> Result<f64, SearchError> {
        tracing::debug!(keyword = %query.keyword(), count = DRY_RUN_COUNT, "Dry-run count");
        Ok(DRY_RUN_COUNT)
    }

    async fn ping(&self) -> Result<String, SearchError> {
        Ok("dry-run".to_string())
    }
}
