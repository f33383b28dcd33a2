//! Alerting rule synchronization

pub mod model;
pub mod store;
pub mod sync;

pub use model::{AlertRule, AlertRuleSpec, Rule, RuleGroup};
pub use store::{InMemoryRuleStore, RuleStore, RuleStoreError};
pub use sync::{default_expression, RuleSyncError, RuleSynchronizer};
