//! Rule store interface and an in-memory implementation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::model::AlertRule;

/// Backing store for alerting rule objects
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn create(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError>;

    async fn get(&self, namespace: &str, name: &str) -> Result<AlertRule, RuleStoreError>;

    async fn update(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), RuleStoreError>;
}

/// Rule store errors
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("Rule {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("Rule {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("Rule store unavailable: {0}")]
    Unavailable(String),
}

/// Rule store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<BTreeMap<(String, String), AlertRule>>,
    unavailable: AtomicBool,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All stored rules in a namespace
    pub fn list(&self, namespace: &str) -> Vec<AlertRule> {
        self.rules
            .lock()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, rule)| rule.clone())
            .collect()
    }

    fn check_available(&self) -> Result<(), RuleStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuleStoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn create(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError> {
        self.check_available()?;
        let key = (namespace.to_string(), rule.name.clone());
        let mut rules = self.rules.lock();
        if rules.contains_key(&key) {
            return Err(RuleStoreError::AlreadyExists {
                namespace: key.0,
                name: key.1,
            });
        }
        rules.insert(key, rule.clone());
        Ok(rule.clone())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<AlertRule, RuleStoreError> {
        self.check_available()?;
        self.rules
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| RuleStoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn update(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError> {
        self.check_available()?;
        let key = (namespace.to_string(), rule.name.clone());
        let mut rules = self.rules.lock();
        match rules.get_mut(&key) {
            Some(existing) => {
                *existing = rule.clone();
                Ok(rule.clone())
            }
            None => Err(RuleStoreError::NotFound {
                namespace: key.0,
                name: key.1,
            }),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), RuleStoreError> {
        self.check_available()?;
        self.rules
            .lock()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| RuleStoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}
