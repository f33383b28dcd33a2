//! Secret-backed notification document store

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube::{Api, Client};

use crate::notify::{NotificationStore, StoreError, StoredDocument};

/// Stores the document under one data key of a Secret; the Secret's
/// `resourceVersion` is the version token
#[derive(Clone)]
pub struct KubeNotificationStore {
    client: Client,
    data_key: String,
}

impl KubeNotificationStore {
    pub fn new(client: Client, data_key: impl Into<String>) -> Self {
        Self {
            client,
            data_key: data_key.into(),
        }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// The document held by `secret`, if it has one under `data_key`
pub fn document_of(secret: &Secret, data_key: &str) -> Option<StoredDocument> {
    let bytes = secret.data.as_ref()?.get(data_key)?;
    Some(StoredDocument {
        bytes: bytes.0.clone(),
        version: secret.metadata.resource_version.clone(),
    })
}

#[async_trait]
impl NotificationStore for KubeNotificationStore {
    async fn load(&self, namespace: &str, name: &str) -> Result<Option<StoredDocument>, StoreError> {
        let Some(secret) = self.fetch(namespace, name).await? else {
            return Ok(None);
        };
        Ok(document_of(&secret, &self.data_key))
    }

    async fn write(
        &self,
        namespace: &str,
        name: &str,
        bytes: Vec<u8>,
        expected_version: Option<&str>,
    ) -> Result<(), StoreError> {
        let conflict = || StoreError::Conflict {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };

        let Some(mut secret) = self.fetch(namespace, name).await? else {
            return Err(StoreError::Unavailable(format!(
                "secret {}/{} not found",
                namespace, name
            )));
        };

        let read_version = secret.metadata.resource_version.clone();
        if expected_version.is_some() && read_version.as_deref() != expected_version {
            return Err(conflict());
        }

        secret
            .data
            .get_or_insert_with(Default::default)
            .insert(self.data_key.clone(), ByteString(bytes));

        match self
            .api(namespace)
            .replace(name, &PostParams::default(), &secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                // The API server rejects stale resourceVersions; tell that
                // apart from other failures by looking again
                let current = self
                    .fetch(namespace, name)
                    .await?
                    .and_then(|s| s.metadata.resource_version);
                if current != read_version {
                    Err(conflict())
                } else {
                    Err(StoreError::Unavailable(e.to_string()))
                }
            }
        }
    }
}
