//! Where monitors are read from and status is written to

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{MonitorKey, MonitorResource, MonitorSpec, MonitorStatus};

/// Monitor source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Monitor source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed monitor {key}: {reason}")]
    Malformed { key: String, reason: String },
}

/// Read side and status sink for monitor resources
#[async_trait]
pub trait MonitorSource: Send + Sync {
    /// Current resource, or `None` once it has been deleted
    async fn get(&self, key: &MonitorKey) -> Result<Option<MonitorResource>, SourceError>;

    async fn write_status(&self, key: &MonitorKey, status: &MonitorStatus) -> Result<(), SourceError>;
}

/// Monitor source kept in process memory; records every status write
#[derive(Debug, Default)]
pub struct InMemoryMonitorSource {
    resources: Mutex<BTreeMap<MonitorKey, MonitorResource>>,
    status_writes: Mutex<Vec<(MonitorKey, MonitorStatus)>>,
    unavailable: AtomicBool,
}

impl InMemoryMonitorSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update the spec, keeping any status already written
    pub fn apply(&self, key: MonitorKey, spec: MonitorSpec) {
        self.resources
            .lock()
            .entry(key)
            .and_modify(|resource| resource.spec = spec.clone())
            .or_insert_with(|| MonitorResource::new(spec));
    }

    pub fn remove(&self, key: &MonitorKey) -> Option<MonitorResource> {
        self.resources.lock().remove(key)
    }

    pub fn resource(&self, key: &MonitorKey) -> Option<MonitorResource> {
        self.resources.lock().get(key).cloned()
    }

    /// Status writes for `key`, oldest first
    pub fn status_writes(&self, key: &MonitorKey) -> Vec<MonitorStatus> {
        self.status_writes
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, status)| status.clone())
            .collect()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitorSource for InMemoryMonitorSource {
    async fn get(&self, key: &MonitorKey) -> Result<Option<MonitorResource>, SourceError> {
        self.check_available()?;
        Ok(self.resource(key))
    }

    async fn write_status(&self, key: &MonitorKey, status: &MonitorStatus) -> Result<(), SourceError> {
        self.check_available()?;
        // Status of a deleted resource is dropped
        if let Some(resource) = self.resources.lock().get_mut(key) {
            resource.status = status.clone();
        }
        self.status_writes.lock().push((key.clone(), status.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_keeps_status() {
        let source = InMemoryMonitorSource::new();
        let key = MonitorKey::new("default", "s1");
        source.apply(key.clone(), MonitorSpec::default());
        source
            .write_status(&key, &MonitorStatus::failed(2))
            .await
            .unwrap();

        let spec = MonitorSpec {
            duration: "5m".to_string(),
            ..Default::default()
        };
        source.apply(key.clone(), spec.clone());

        let resource = source.get(&key).await.unwrap().unwrap();
        assert_eq!(resource.spec, spec);
        assert_eq!(resource.status, MonitorStatus::failed(2));
        assert_eq!(source.status_writes(&key), vec![MonitorStatus::failed(2)]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let source = InMemoryMonitorSource::new();
        source.set_unavailable(true);
        let result = source.get(&MonitorKey::new("default", "s1")).await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
