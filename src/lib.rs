//! Vigil: log monitor operator
//!
//! Keeps three stores consistent with a set of declarative log monitors:
//!
//! - **Alerting rules**: one rule object per monitor, named after it
//! - **Notification routing**: one receiver and one route per monitor in
//!   the shared Alertmanager document
//! - **Metric registry**: one counted log query per monitor, exported as
//!   `vigil_log_count{keyword, strategy_id}`
//!
//! Every reconciliation is idempotent and reports a status with a bounded
//! retry counter back to the monitor.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil::exporter::{LocalCatalog, LogCountGauge};
//! use vigil::model::MonitorKey;
//! use vigil::notify::{InMemoryNotificationStore, NotificationSynchronizer, NotifySettings};
//! use vigil::reconcile::{InMemoryMonitorSource, Reconciler};
//! use vigil::registry::MetricRegistry;
//! use vigil::rules::{InMemoryRuleStore, RuleSynchronizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MetricRegistry::new());
//! let gauge = Arc::new(LogCountGauge::new());
//! let source = Arc::new(InMemoryMonitorSource::new());
//!
//! let reconciler = Reconciler::new(
//!     source.clone(),
//!     RuleSynchronizer::new(Arc::new(InMemoryRuleStore::new())),
//!     NotificationSynchronizer::new(
//!         Arc::new(InMemoryNotificationStore::new()),
//!         NotifySettings::default(),
//!     ),
//!     Arc::new(LocalCatalog::new(registry, gauge)),
//! );
//!
//! let outcome = reconciler.reconcile(&MonitorKey::new("default", "s1")).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod exporter;
#[cfg(feature = "kubernetes")]
pub mod k8s;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod registry;
pub mod rules;
pub mod search;

// Re-export commonly used types
pub use config::AppConfig;
pub use model::{MonitorKey, MonitorSpec, MonitorStatus, StrategyMetric};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use registry::MetricRegistry;
