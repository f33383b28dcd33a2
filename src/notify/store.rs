//! Notification document store interface and an in-memory implementation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Raw document plus the version token it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub bytes: Vec<u8>,
    pub version: Option<String>,
}

/// Backing store for the notification document
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Load a document; `None` when it does not exist
    async fn load(&self, namespace: &str, name: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Write a document. With `expected_version` set, fail with
    /// `StoreError::Conflict` if the stored version moved on since the load.
    async fn write(
        &self,
        namespace: &str,
        name: &str,
        bytes: Vec<u8>,
        expected_version: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Notification store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document {namespace}/{name} was modified concurrently")]
    Conflict { namespace: String, name: String },

    #[error("Notification store unavailable: {0}")]
    Unavailable(String),
}

/// Notification store kept in process memory, versioned by a write counter
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    documents: Mutex<BTreeMap<(String, String), (Vec<u8>, u64)>>,
    unavailable: AtomicBool,
    pending_conflicts: AtomicUsize,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a document directly
    pub fn insert(&self, namespace: &str, name: &str, bytes: impl Into<Vec<u8>>) {
        let mut documents = self.documents.lock();
        let key = (namespace.to_string(), name.to_string());
        let version = documents.get(&key).map(|(_, v)| v + 1).unwrap_or(1);
        documents.insert(key, (bytes.into(), version));
    }

    /// Current document contents
    pub fn document(&self, namespace: &str, name: &str) -> Option<Vec<u8>> {
        self.documents
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    /// Number of writes accepted for a document, including the seed
    pub fn version(&self, namespace: &str, name: &str) -> Option<u64> {
        self.documents
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .map(|(_, v)| *v)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `n` versioned writes lose a race against another writer
    pub fn inject_conflicts(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn load(&self, namespace: &str, name: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.check_available()?;
        Ok(self
            .documents
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .map(|(bytes, version)| StoredDocument {
                bytes: bytes.clone(),
                version: Some(version.to_string()),
            }))
    }

    async fn write(
        &self,
        namespace: &str,
        name: &str,
        bytes: Vec<u8>,
        expected_version: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let key = (namespace.to_string(), name.to_string());
        let mut documents = self.documents.lock();

        if expected_version.is_some() {
            // A simulated concurrent writer bumps the version first
            let injected = self
                .pending_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                if let Some(entry) = documents.get_mut(&key) {
                    entry.1 += 1;
                }
            }
        }

        let current = documents.get(&key).map(|(_, v)| *v).unwrap_or(0);
        if let Some(expected) = expected_version {
            if expected != current.to_string() {
                return Err(StoreError::Conflict {
                    namespace: key.0,
                    name: key.1,
                });
            }
        }

        documents.insert(key, (bytes, current + 1));
        Ok(())
    }
}
