//! Kubernetes adapters for the store and source seams

pub mod controller;
pub mod monitor;
pub mod rules;
pub mod secret;

pub use controller::run_controller;
pub use monitor::{KubeMonitorSource, LOG_MONITOR_GROUP, LOG_MONITOR_KIND, LOG_MONITOR_VERSION};
pub use rules::KubeRuleStore;
pub use secret::KubeNotificationStore;
