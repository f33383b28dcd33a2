//! Rule synchronizer: one rule object per monitor

use std::collections::BTreeMap;
use std::sync::Arc;

use super::model::{AlertRule, Rule, RuleGroup};
use super::store::{RuleStore, RuleStoreError};
use crate::exporter::LOG_COUNT_GAUGE;
use crate::model::MonitorSpec;

/// Translates monitor specs into rule objects named after the strategy id
pub struct RuleSynchronizer {
    store: Arc<dyn RuleStore>,
}

impl RuleSynchronizer {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Build the rule object for `key` without touching the store
    pub fn build_rule(namespace: &str, key: &str, spec: &MonitorSpec) -> AlertRule {
        let expr = spec
            .promql
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_expression(key));

        let mut annotations = BTreeMap::new();
        annotations.insert("link_prefix".to_string(), spec.labels.link_prefix.clone());

        let group = RuleGroup {
            name: key.to_string(),
            rules: vec![Rule {
                alert: key.to_string(),
                expr,
                for_duration: spec.duration.clone(),
                labels: spec.labels.to_rule_labels(),
                annotations,
            }],
        };

        AlertRule::new(namespace, key, vec![group])
    }

    /// Replace the rule for `key`: delete whatever is there, then create
    pub async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        spec: &MonitorSpec,
    ) -> Result<AlertRule, RuleSyncError> {
        let rule = Self::build_rule(namespace, key, spec);

        match self.store.delete(namespace, key).await {
            Ok(()) | Err(RuleStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    strategy_id = %key,
                    error = %e,
                    "Failed to delete previous rule before create"
                );
            }
        }

        let created = self
            .store
            .create(namespace, &rule)
            .await
            .map_err(RuleSyncError::Create)?;

        tracing::debug!(
            namespace = %namespace,
            strategy_id = %key,
            rules = created.rule_count(),
            "Rule synchronized"
        );
        Ok(created)
    }

    /// Remove the rule for `key`; a missing rule is not an error
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<(), RuleSyncError> {
        match self.store.delete(namespace, key).await {
            Ok(()) | Err(RuleStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(RuleSyncError::Delete(e)),
        }
    }
}

/// Alert expression used when a monitor does not supply one
pub fn default_expression(strategy_id: &str) -> String {
    format!("{}{{strategy_id=\"{}\"}} > 0", LOG_COUNT_GAUGE, strategy_id)
}

/// Rule synchronization errors
#[derive(Debug, thiserror::Error)]
pub enum RuleSyncError {
    #[error("Failed to create rule: {0}")]
    Create(RuleStoreError),

    #[error("Failed to delete rule: {0}")]
    Delete(RuleStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitorLabels;
    use crate::rules::InMemoryRuleStore;

    fn spec() -> MonitorSpec {
        MonitorSpec {
            labels: MonitorLabels {
                strategy_id: "s1".to_string(),
                application: "checkout".to_string(),
                link_prefix: "https://logs.example.com/".to_string(),
                ..Default::default()
            },
            dsl: Some("term:error".to_string()),
            duration: "5m".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_rule() {
        let rule = RuleSynchronizer::build_rule("monitoring", "s1", &spec());

        assert_eq!(rule.name, "s1");
        assert_eq!(rule.namespace, "monitoring");
        assert_eq!(rule.labels.get("app").map(String::as_str), Some("prometheus-operator"));
        assert_eq!(rule.spec.groups.len(), 1);

        let group = &rule.spec.groups[0];
        assert_eq!(group.name, "s1");
        assert_eq!(group.rules.len(), 1);

        let r = &group.rules[0];
        assert_eq!(r.alert, "s1");
        assert_eq!(r.expr, "vigil_log_count{strategy_id=\"s1\"} > 0");
        assert_eq!(r.for_duration, "5m");
        assert_eq!(r.labels.get("application").map(String::as_str), Some("checkout"));
        assert_eq!(
            r.annotations.get("link_prefix").map(String::as_str),
            Some("https://logs.example.com/")
        );
    }

    #[test]
    fn test_explicit_expression_wins() {
        let mut spec = spec();
        spec.promql = Some("rate(errors_total[5m]) > 1".to_string());
        let rule = RuleSynchronizer::build_rule("monitoring", "s1", &spec);
        assert_eq!(rule.spec.groups[0].rules[0].expr, "rate(errors_total[5m]) > 1");
    }

    #[test]
    fn test_rule_spec_json_uses_for_key() {
        let rule = RuleSynchronizer::build_rule("monitoring", "s1", &spec());
        let json = serde_json::to_value(&rule.spec).unwrap();
        assert_eq!(json["groups"][0]["rules"][0]["for"], "5m");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = Arc::new(InMemoryRuleStore::new());
        let sync = RuleSynchronizer::new(store.clone());

        let first = sync.upsert("monitoring", "s1", &spec()).await.unwrap();
        let second = sync.upsert("monitoring", "s1", &spec()).await.unwrap();

        assert_eq!(first, second);
        let rules = store.list("monitoring");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0], first);
    }

    #[tokio::test]
    async fn test_upsert_replaces_content() {
        let store = Arc::new(InMemoryRuleStore::new());
        let sync = RuleSynchronizer::new(store.clone());

        sync.upsert("monitoring", "s1", &spec()).await.unwrap();
        let mut changed = spec();
        changed.duration = "10m".to_string();
        sync.upsert("monitoring", "s1", &changed).await.unwrap();

        let stored = store.get("monitoring", "s1").await.unwrap();
        assert_eq!(stored.spec.groups[0].rules[0].for_duration, "10m");
        assert_eq!(store.list("monitoring").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_rule_is_ok() {
        let store = Arc::new(InMemoryRuleStore::new());
        let sync = RuleSynchronizer::new(store.clone());

        assert!(sync.delete("monitoring", "missing").await.is_ok());

        sync.upsert("monitoring", "s1", &spec()).await.unwrap();
        sync.delete("monitoring", "s1").await.unwrap();
        assert!(store.list("monitoring").is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_upsert() {
        let store = Arc::new(InMemoryRuleStore::new());
        store.set_unavailable(true);
        let sync = RuleSynchronizer::new(store);

        let result = sync.upsert("monitoring", "s1", &spec()).await;
        assert!(matches!(
            result,
            Err(RuleSyncError::Create(RuleStoreError::Unavailable(_)))
        ));
    }
}
