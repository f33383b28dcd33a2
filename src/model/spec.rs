//! Log monitor resource types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::metric::{MetricQuery, StrategyMetric};

/// Identifies a monitor slot: namespace plus strategy id (the resource name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorKey {
    pub namespace: String,
    pub name: String,
}

impl MonitorKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The strategy id tying the resource to its rule, receiver, route and metric
    pub fn strategy_id(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Label set attached to the generated alerting rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorLabels {
    pub application: String,
    pub alarm_source: String,
    pub alarm_content: String,
    pub metric_name: String,
    pub metric_instance_id: String,
    pub strategy_name: String,
    pub strategy_id: String,
    pub contact: String,
    pub container_name: String,
    pub link_prefix: String,
}

impl MonitorLabels {
    /// Rule labels in the snake_case form the alerting pipeline matches on
    pub fn to_rule_labels(&self) -> BTreeMap<String, String> {
        [
            ("alarm_content", &self.alarm_content),
            ("alarm_source", &self.alarm_source),
            ("application", &self.application),
            ("contact", &self.contact),
            ("container_name", &self.container_name),
            ("metric_name", &self.metric_name),
            ("metric_instance_id", &self.metric_instance_id),
            ("strategy_id", &self.strategy_id),
            ("strategy_name", &self.strategy_name),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

/// Desired state of a log monitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSpec {
    pub labels: MonitorLabels,
    /// Raw search-backend filter; ignored when `keyword` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsl: Option<String>,
    /// Phrase to count in the logs of `labels.container_name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Alerting expression; derived from the log-count gauge when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promql: Option<String>,
    pub duration: String,
    /// Comma-separated contact addresses
    pub contact_value: String,
}

impl MonitorSpec {
    /// The log query this monitor counts, if it defines one
    pub fn log_query(&self) -> Option<MetricQuery> {
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            return Some(MetricQuery::Keyword {
                container: self.labels.container_name.clone(),
                keyword: keyword.to_string(),
            });
        }
        self.dsl
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(|q| MetricQuery::Dsl {
                query: q.to_string(),
            })
    }

    /// Registry entry derived from this spec
    pub fn strategy_metric(&self, strategy_id: &str) -> Option<StrategyMetric> {
        self.log_query()
            .map(|query| StrategyMetric::new(strategy_id, query))
    }

    /// Individual contact addresses, trimmed, empty entries dropped
    pub fn contacts(&self) -> Vec<&str> {
        self.contact_value
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Reconciliation phase written back to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    Success,
    Failed,
    Running,
}

/// Observed state of a log monitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusPhase>,
    pub retry_times: u32,
}

impl MonitorStatus {
    pub fn success() -> Self {
        Self {
            status: Some(StatusPhase::Success),
            retry_times: 0,
        }
    }

    pub fn failed(retry_times: u32) -> Self {
        Self {
            status: Some(StatusPhase::Failed),
            retry_times,
        }
    }
}

/// A monitor as read from its source: spec plus last written status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorResource {
    pub spec: MonitorSpec,
    #[serde(default)]
    pub status: MonitorStatus,
}

impl MonitorResource {
    pub fn new(spec: MonitorSpec) -> Self {
        Self {
            spec,
            status: MonitorStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_resource_json() {
        let json = serde_json::json!({
            "labels": {
                "application": "checkout",
                "strategyId": "s1",
                "containerName": "api"
            },
            "keyword": "error",
            "duration": "5m",
            "contactValue": "a@example.com, b@example.com,"
        });
        let spec: MonitorSpec = serde_json::from_value(json).unwrap();

        assert_eq!(spec.labels.strategy_id, "s1");
        assert_eq!(spec.contacts(), vec!["a@example.com", "b@example.com"]);
        assert_eq!(
            spec.log_query(),
            Some(MetricQuery::Keyword {
                container: "api".to_string(),
                keyword: "error".to_string(),
            })
        );
    }

    #[test]
    fn test_keyword_takes_precedence_over_dsl() {
        let spec = MonitorSpec {
            dsl: Some("{\"query\":{}}".to_string()),
            keyword: Some("timeout".to_string()),
            ..Default::default()
        };
        assert!(matches!(spec.log_query(), Some(MetricQuery::Keyword { .. })));

        let spec = MonitorSpec {
            dsl: Some("term:error".to_string()),
            ..Default::default()
        };
        assert_eq!(
            spec.log_query(),
            Some(MetricQuery::Dsl {
                query: "term:error".to_string()
            })
        );

        assert_eq!(MonitorSpec::default().log_query(), None);
    }

    #[test]
    fn test_status_serialization() {
        let status = MonitorStatus::failed(3);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({"status": "Failed", "retryTimes": 3}));
    }

    #[test]
    fn test_rule_labels_are_snake_case() {
        let labels = MonitorLabels {
            strategy_id: "s1".to_string(),
            alarm_source: "logs".to_string(),
            ..Default::default()
        };
        let rule_labels = labels.to_rule_labels();
        assert_eq!(rule_labels.get("strategy_id").map(String::as_str), Some("s1"));
        assert_eq!(rule_labels.get("alarm_source").map(String::as_str), Some("logs"));
        assert_eq!(rule_labels.len(), 9);
    }
}
