//! LogMonitor custom resources as a monitor source

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::{Api, Client};
use serde_json::json;

use crate::model::{MonitorKey, MonitorResource, MonitorSpec, MonitorStatus};
use crate::reconcile::{MonitorSource, SourceError};

pub const LOG_MONITOR_GROUP: &str = "monitoring.vigil.io";
pub const LOG_MONITOR_VERSION: &str = "v1";
pub const LOG_MONITOR_KIND: &str = "LogMonitor";

pub fn log_monitor_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        LOG_MONITOR_GROUP,
        LOG_MONITOR_VERSION,
        LOG_MONITOR_KIND,
    ))
}

#[derive(Clone)]
pub struct KubeMonitorSource {
    client: Client,
    resource: ApiResource,
}

impl KubeMonitorSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: log_monitor_resource(),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

/// Key of a watched object, if it carries both namespace and name
pub fn key_of(object: &DynamicObject) -> Option<MonitorKey> {
    let namespace = object.metadata.namespace.as_deref()?;
    let name = object.metadata.name.as_deref()?;
    Some(MonitorKey::new(namespace, name))
}

/// Decode spec and status of a LogMonitor object.
///
/// Objects being deleted count as absent.
pub fn resource_of(object: &DynamicObject) -> Result<Option<MonitorResource>, SourceError> {
    if object.metadata.deletion_timestamp.is_some() {
        return Ok(None);
    }

    let malformed = |reason: String| SourceError::Malformed {
        key: key_of(object)
            .map(|k| k.to_string())
            .unwrap_or_default(),
        reason,
    };

    let spec: MonitorSpec = match object.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone()).map_err(|e| malformed(e.to_string()))?,
        None => return Err(malformed("missing spec".to_string())),
    };
    let status: MonitorStatus = match object.data.get("status") {
        Some(status) if !status.is_null() => {
            serde_json::from_value(status.clone()).map_err(|e| malformed(e.to_string()))?
        }
        _ => MonitorStatus::default(),
    };

    Ok(Some(MonitorResource { spec, status }))
}

#[async_trait]
impl MonitorSource for KubeMonitorSource {
    async fn get(&self, key: &MonitorKey) -> Result<Option<MonitorResource>, SourceError> {
        let object = self
            .api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        match object {
            Some(object) => resource_of(&object),
            None => Ok(None),
        }
    }

    async fn write_status(&self, key: &MonitorKey, status: &MonitorStatus) -> Result<(), SourceError> {
        let patch = json!({ "status": status });
        self.api(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
