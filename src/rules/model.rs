//! Alerting rule objects, shaped like a PrometheusRule resource

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named rule object holding one or more rule groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: AlertRuleSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRuleSpec {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A single alerting rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub alert: String,
    pub expr: String,
    #[serde(rename = "for", default, skip_serializing_if = "String::is_empty")]
    pub for_duration: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl AlertRule {
    /// Rule object with the labels the rule store's selector expects
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        groups: Vec<RuleGroup>,
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "prometheus-operator".to_string());
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
            spec: AlertRuleSpec { groups },
        }
    }

    /// Total number of rules across all groups
    pub fn rule_count(&self) -> usize {
        self.spec.groups.iter().map(|g| g.rules.len()).sum()
    }
}
