//! Monitor reconciliation
//!
//! One `reconcile(key)` call drives the rule store, the notification
//! document and the metric catalog to the state the monitor declares, then
//! writes back a status with a bounded retry counter.

use std::sync::Arc;

use super::source::{MonitorSource, SourceError};
use crate::exporter::{CatalogError, MetricCatalog};
use crate::model::{MonitorKey, MonitorSpec, MonitorStatus};
use crate::notify::{NotificationSynchronizer, NotifyError};
use crate::rules::{RuleSyncError, RuleSynchronizer};

/// Consecutive failures after which status writes stop
pub const DEFAULT_RETRY_CAP: u32 = 100;

/// What a reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Monitor is gone; its artifacts were removed
    Deleted,
    /// All three targets are in sync
    Synced,
    /// At least one target failed; status now carries `retry_times`
    Failed { retry_times: u32 },
    /// Failed again at the retry cap; status left untouched
    Abandoned { retry_times: u32 },
}

/// One target that could not be synchronized
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("rule sync failed: {0}")]
    Rules(#[from] RuleSyncError),

    #[error("notification sync failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("metric catalog update failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Reconciliation errors; sync failures are reported through status instead
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

pub struct Reconciler {
    source: Arc<dyn MonitorSource>,
    rules: RuleSynchronizer,
    notify: NotificationSynchronizer,
    catalog: Arc<dyn MetricCatalog>,
    retry_cap: u32,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn MonitorSource>,
        rules: RuleSynchronizer,
        notify: NotificationSynchronizer,
        catalog: Arc<dyn MetricCatalog>,
    ) -> Self {
        Self {
            source,
            rules,
            notify,
            catalog,
            retry_cap: DEFAULT_RETRY_CAP,
        }
    }

    pub fn with_retry_cap(mut self, retry_cap: u32) -> Self {
        self.retry_cap = retry_cap;
        self
    }

    pub fn retry_cap(&self) -> u32 {
        self.retry_cap
    }

    pub async fn reconcile(&self, key: &MonitorKey) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(resource) = self.source.get(key).await? else {
            self.remove(key).await;
            return Ok(ReconcileOutcome::Deleted);
        };

        let failures = self.sync(key, &resource.spec).await;
        let current = resource.status;

        if failures.is_empty() {
            let status = MonitorStatus::success();
            // An unchanged status is not rewritten, the write itself would
            // trigger another reconciliation
            if current != status {
                self.source.write_status(key, &status).await?;
            }
            tracing::info!(monitor = %key, "Monitor synchronized");
            return Ok(ReconcileOutcome::Synced);
        }

        for failure in &failures {
            tracing::warn!(monitor = %key, error = %failure, "Monitor sync failed");
        }

        if current.retry_times >= self.retry_cap {
            tracing::warn!(
                monitor = %key,
                retry_times = current.retry_times,
                retry_cap = self.retry_cap,
                "Retry cap reached, leaving status untouched"
            );
            return Ok(ReconcileOutcome::Abandoned {
                retry_times: current.retry_times,
            });
        }

        let retry_times = current.retry_times + 1;
        self.source
            .write_status(key, &MonitorStatus::failed(retry_times))
            .await?;
        Ok(ReconcileOutcome::Failed { retry_times })
    }

    /// Upsert every target; all three are attempted even if one fails
    async fn sync(&self, key: &MonitorKey, spec: &MonitorSpec) -> Vec<SyncError> {
        let strategy_id = key.strategy_id();
        let mut failures = Vec::new();

        if let Err(e) = self.rules.upsert(&key.namespace, strategy_id, spec).await {
            failures.push(e.into());
        }

        if let Err(e) = self.notify.upsert(strategy_id, spec).await {
            failures.push(e.into());
        }

        let catalog_result = match spec.strategy_metric(strategy_id) {
            Some(metric) => self.catalog.upsert(metric).await,
            None => self.catalog.remove(strategy_id).await,
        };
        if let Err(e) = catalog_result {
            failures.push(e.into());
        }

        failures
    }

    /// Best-effort removal; there is no status left to report failures on
    async fn remove(&self, key: &MonitorKey) {
        let strategy_id = key.strategy_id();

        if let Err(e) = self.rules.delete(&key.namespace, strategy_id).await {
            tracing::warn!(monitor = %key, error = %e, "Failed to delete rule");
        }
        if let Err(e) = self.notify.delete(strategy_id).await {
            tracing::warn!(monitor = %key, error = %e, "Failed to delete notification routing");
        }
        if let Err(e) = self.catalog.remove(strategy_id).await {
            tracing::warn!(monitor = %key, error = %e, "Failed to delete metric");
        }

        tracing::info!(monitor = %key, "Monitor removed");
    }
}
