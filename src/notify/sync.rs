//! Notification synchronizer: one receiver and one route per monitor

use std::collections::BTreeMap;
use std::sync::Arc;

use super::document::{AlertmanagerConfig, DocumentError, EmailConfig, Receiver, Route, WebhookConfig};
use super::duration::{self, DurationError};
use super::keyed::{remove_keyed, upsert_keyed};
use super::store::{NotificationStore, StoreError};
use crate::model::MonitorSpec;

/// Repeat interval applied to every monitor route
pub const REPEAT_INTERVAL: &str = "1s";

const EMAIL_CONTENT_TEMPLATE: &str = "{{ template \"email-alert-content\" . }}";
const EMAIL_SUBJECT_TEMPLATE: &str = "{{ template \"email-alert-subject\" . }}";

/// Where the notification document lives and what the generated channels point at
#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub namespace: String,
    pub document: String,
    pub webhook_url: String,
    pub status_webhook_url: String,
    /// Extra read-modify-write attempts after a version conflict
    pub conflict_retries: u32,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            namespace: "monitoring".to_string(),
            document: "alertmanager-main".to_string(),
            webhook_url: "http://alert-webhook.monitoring:8000/api/v2/webhook".to_string(),
            status_webhook_url: "http://alert-webhook.monitoring:8000/api/v2/status".to_string(),
            conflict_retries: 3,
        }
    }
}

/// What a synchronization did to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Written,
    Unchanged,
    DocumentMissing,
}

pub struct NotificationSynchronizer {
    store: Arc<dyn NotificationStore>,
    settings: NotifySettings,
}

impl NotificationSynchronizer {
    pub fn new(store: Arc<dyn NotificationStore>, settings: NotifySettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &NotifySettings {
        &self.settings
    }

    /// Receiver for `key`: one email channel per contact plus the webhook
    pub fn build_receiver(&self, key: &str, spec: &MonitorSpec) -> Receiver {
        let email_configs = spec
            .contacts()
            .into_iter()
            .map(|to| {
                let mut headers = BTreeMap::new();
                headers.insert("subject".to_string(), EMAIL_SUBJECT_TEMPLATE.to_string());
                EmailConfig {
                    to: to.to_string(),
                    html: Some(EMAIL_CONTENT_TEMPLATE.to_string()),
                    headers,
                    status_webhook: Some(self.settings.status_webhook_url.clone()),
                    extra: BTreeMap::new(),
                }
            })
            .collect();

        Receiver {
            name: key.to_string(),
            email_configs,
            webhook_configs: vec![WebhookConfig {
                url: self.settings.webhook_url.clone(),
                extra: BTreeMap::new(),
            }],
            extra: BTreeMap::new(),
        }
    }

    /// Route for `key`, grouped on the strategy id
    pub fn build_route(&self, key: &str, spec: &MonitorSpec) -> Result<Route, NotifyError> {
        // Alertmanager rejects a zero group_interval; empty and zero both
        // fall back to the document default
        let duration = spec.duration.trim();
        let group_interval = if duration.is_empty() || duration::parse(duration)?.is_zero() {
            None
        } else {
            Some(duration::normalize(duration)?)
        };

        let strategy_id = if spec.labels.strategy_id.is_empty() {
            key
        } else {
            spec.labels.strategy_id.as_str()
        };
        let mut match_labels = BTreeMap::new();
        match_labels.insert("strategy_id".to_string(), strategy_id.to_string());

        Ok(Route {
            receiver: Some(key.to_string()),
            group_by: vec!["strategy_id".to_string()],
            match_labels,
            group_interval,
            repeat_interval: Some(REPEAT_INTERVAL.to_string()),
            ..Default::default()
        })
    }

    /// Install or replace the receiver and route for `key`
    pub async fn upsert(&self, key: &str, spec: &MonitorSpec) -> Result<SyncOutcome, NotifyError> {
        let receiver = self.build_receiver(key, spec);
        let route = self.build_route(key, spec)?;

        self.modify(key, |config| {
            upsert_keyed(&mut config.receivers, key, receiver.clone());
            upsert_keyed(config.routes_mut(), key, route.clone());
        })
        .await
    }

    /// Remove the receiver and route for `key`
    pub async fn delete(&self, key: &str) -> Result<SyncOutcome, NotifyError> {
        self.modify(key, |config| {
            remove_keyed(&mut config.receivers, key);
            remove_keyed(config.routes_mut(), key);
        })
        .await
    }

    /// Read-modify-write of the whole document, retried on version conflicts
    async fn modify<F>(&self, key: &str, apply: F) -> Result<SyncOutcome, NotifyError>
    where
        F: Fn(&mut AlertmanagerConfig) + Send + Sync,
    {
        let namespace = &self.settings.namespace;
        let name = &self.settings.document;
        let attempts = self.settings.conflict_retries + 1;

        for attempt in 1..=attempts {
            let Some(document) = self.store.load(namespace, name).await? else {
                tracing::debug!(
                    namespace = %namespace,
                    document = %name,
                    strategy_id = %key,
                    "Notification document not found, skipping"
                );
                return Ok(SyncOutcome::DocumentMissing);
            };

            let mut config = AlertmanagerConfig::parse(&document.bytes)?;
            let before = config.clone();
            apply(&mut config);
            if config == before {
                return Ok(SyncOutcome::Unchanged);
            }

            let yaml = config.to_yaml()?;
            match self
                .store
                .write(namespace, name, yaml.into_bytes(), document.version.as_deref())
                .await
            {
                Ok(()) => {
                    tracing::debug!(strategy_id = %key, attempt, "Notification document written");
                    return Ok(SyncOutcome::Written);
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(
                        strategy_id = %key,
                        attempt,
                        "Notification document changed underneath us, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(NotifyError::ConflictRetriesExhausted { attempts })
    }
}

/// Notification synchronization errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Invalid monitor duration: {0}")]
    Duration(#[from] DurationError),

    #[error("Notification document still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitorLabels;
    use crate::notify::InMemoryNotificationStore;

    const BASE: &str = r#"
global:
  resolve_timeout: 5m
route:
  receiver: default
  routes:
    - receiver: a
      match:
        strategy_id: a
    - receiver: b
      match:
        strategy_id: b
receivers:
  - name: default
  - name: a
  - name: b
"#;

    fn settings() -> NotifySettings {
        NotifySettings {
            namespace: "monitoring".to_string(),
            document: "alertmanager".to_string(),
            webhook_url: "http://hook/api".to_string(),
            status_webhook_url: "http://hook/status".to_string(),
            conflict_retries: 3,
        }
    }

    fn spec(duration: &str, contacts: &str) -> MonitorSpec {
        MonitorSpec {
            labels: MonitorLabels {
                strategy_id: "s1".to_string(),
                ..Default::default()
            },
            duration: duration.to_string(),
            contact_value: contacts.to_string(),
            ..Default::default()
        }
    }

    fn setup() -> (Arc<InMemoryNotificationStore>, NotificationSynchronizer) {
        let store = Arc::new(InMemoryNotificationStore::new());
        store.insert("monitoring", "alertmanager", BASE);
        let sync = NotificationSynchronizer::new(store.clone(), settings());
        (store, sync)
    }

    fn load(store: &InMemoryNotificationStore) -> AlertmanagerConfig {
        let bytes = store.document("monitoring", "alertmanager").unwrap();
        AlertmanagerConfig::parse(&bytes).unwrap()
    }

    fn receiver_names(config: &AlertmanagerConfig) -> Vec<&str> {
        config.receivers.iter().map(|r| r.name.as_str()).collect()
    }

    fn route_receivers(config: &AlertmanagerConfig) -> Vec<&str> {
        config
            .routes()
            .iter()
            .filter_map(|r| r.receiver.as_deref())
            .collect()
    }

    #[test]
    fn test_build_receiver_and_route() {
        let (_, sync) = setup();
        let spec = spec("300s", "a@example.com,b@example.com");

        let receiver = sync.build_receiver("s1", &spec);
        assert_eq!(receiver.name, "s1");
        assert_eq!(receiver.email_configs.len(), 2);
        assert_eq!(receiver.email_configs[1].to, "b@example.com");
        assert_eq!(receiver.email_configs[0].status_webhook.as_deref(), Some("http://hook/status"));
        assert_eq!(
            receiver.email_configs[0].headers.get("subject").map(String::as_str),
            Some(EMAIL_SUBJECT_TEMPLATE)
        );
        assert_eq!(receiver.webhook_configs.len(), 1);
        assert_eq!(receiver.webhook_configs[0].url, "http://hook/api");

        let route = sync.build_route("s1", &spec).unwrap();
        assert_eq!(route.receiver.as_deref(), Some("s1"));
        assert_eq!(route.group_interval.as_deref(), Some("5m"));
        assert_eq!(route.repeat_interval.as_deref(), Some(REPEAT_INTERVAL));
        assert_eq!(route.group_by, vec!["strategy_id".to_string()]);
        assert_eq!(route.match_labels.get("strategy_id").map(String::as_str), Some("s1"));
    }

    #[test]
    fn test_zero_duration_omits_group_interval() {
        let (_, sync) = setup();
        for duration in ["", "0", "0s", "0m0s"] {
            let route = sync.build_route("s1", &spec(duration, "")).unwrap();
            assert_eq!(route.group_interval, None, "duration {:?}", duration);
        }
    }

    #[tokio::test]
    async fn test_upsert_appends_and_is_idempotent() {
        let (store, sync) = setup();

        let outcome = sync.upsert("s1", &spec("5m", "ops@example.com")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Written);
        let version = store.version("monitoring", "alertmanager");

        let outcome = sync.upsert("s1", &spec("5m", "ops@example.com")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(store.version("monitoring", "alertmanager"), version);

        let config = load(&store);
        assert_eq!(receiver_names(&config), vec!["default", "a", "b", "s1"]);
        assert_eq!(route_receivers(&config), vec!["a", "b", "s1"]);
        assert!(config.extra.contains_key("global"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let (store, sync) = setup();

        let mut spec_a = spec("1m", "new@example.com");
        spec_a.labels.strategy_id = "a".to_string();
        sync.upsert("a", &spec_a).await.unwrap();

        let config = load(&store);
        assert_eq!(receiver_names(&config), vec!["default", "a", "b"]);
        assert_eq!(route_receivers(&config), vec!["a", "b"]);
        assert_eq!(config.receivers[1].email_configs[0].to, "new@example.com");
        assert_eq!(config.routes()[0].group_interval.as_deref(), Some("1m"));
    }

    #[tokio::test]
    async fn test_delete_preserves_order() {
        let (store, sync) = setup();
        sync.upsert("s1", &spec("5m", "ops@example.com")).await.unwrap();

        assert_eq!(sync.delete("a").await.unwrap(), SyncOutcome::Written);
        let config = load(&store);
        assert_eq!(receiver_names(&config), vec!["default", "b", "s1"]);
        assert_eq!(route_receivers(&config), vec!["b", "s1"]);

        assert_eq!(sync.delete("a").await.unwrap(), SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_missing_document_is_noop() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let sync = NotificationSynchronizer::new(store.clone(), settings());

        assert_eq!(
            sync.upsert("s1", &spec("5m", "x@example.com")).await.unwrap(),
            SyncOutcome::DocumentMissing
        );
        assert_eq!(sync.delete("s1").await.unwrap(), SyncOutcome::DocumentMissing);
        assert!(store.document("monitoring", "alertmanager").is_none());
    }

    #[tokio::test]
    async fn test_malformed_document_fails() {
        let store = Arc::new(InMemoryNotificationStore::new());
        store.insert("monitoring", "alertmanager", "receivers: [unclosed");
        let sync = NotificationSynchronizer::new(store, settings());

        let err = sync.upsert("s1", &spec("5m", "x@example.com")).await.unwrap_err();
        assert!(matches!(err, NotifyError::Document(_)));
    }

    #[tokio::test]
    async fn test_invalid_duration_fails_before_touching_store() {
        let (store, sync) = setup();
        let version = store.version("monitoring", "alertmanager");

        let err = sync.upsert("s1", &spec("five minutes", "")).await.unwrap_err();
        assert!(matches!(err, NotifyError::Duration(_)));
        assert_eq!(store.version("monitoring", "alertmanager"), version);
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let (store, sync) = setup();
        store.inject_conflicts(2);

        let outcome = sync.upsert("s1", &spec("5m", "ops@example.com")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Written);
        assert_eq!(receiver_names(&load(&store)), vec!["default", "a", "b", "s1"]);
    }

    #[tokio::test]
    async fn test_conflict_retries_exhausted() {
        let (store, sync) = setup();
        store.inject_conflicts(10);

        let err = sync.upsert("s1", &spec("5m", "ops@example.com")).await.unwrap_err();
        assert!(matches!(err, NotifyError::ConflictRetriesExhausted { attempts: 4 }));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let (store, sync) = setup();
        store.set_unavailable(true);

        let err = sync.delete("a").await.unwrap_err();
        assert!(matches!(err, NotifyError::Store(StoreError::Unavailable(_))));
    }
}
