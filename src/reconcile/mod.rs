//! Monitor reconciliation and the resource seam it reads from

pub mod reconciler;
pub mod source;

pub use reconciler::{
    ReconcileError, ReconcileOutcome, Reconciler, SyncError, DEFAULT_RETRY_CAP,
};
pub use source::{InMemoryMonitorSource, MonitorSource, SourceError};
