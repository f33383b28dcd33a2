//! PrometheusRule-backed rule store

use async_trait::async_trait;
use kube::api::{ApiResource, DeleteParams, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::{Api, Client};
use serde_json::json;

use crate::rules::{AlertRule, AlertRuleSpec, RuleStore, RuleStoreError};

fn prometheus_rule_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "monitoring.coreos.com",
        "v1",
        "PrometheusRule",
    ))
}

/// Rule objects as `monitoring.coreos.com/v1` PrometheusRule resources
#[derive(Clone)]
pub struct KubeRuleStore {
    client: Client,
    resource: ApiResource,
}

impl KubeRuleStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: prometheus_rule_resource(),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }

    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<DynamicObject>, RuleStoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| RuleStoreError::Unavailable(e.to_string()))
    }
}

/// Render a rule as a PrometheusRule object
pub fn to_object(rule: &AlertRule, resource: &ApiResource) -> DynamicObject {
    let mut object = DynamicObject::new(&rule.name, resource)
        .within(&rule.namespace)
        .data(json!({ "spec": rule.spec }));
    object.metadata.labels = Some(rule.labels.clone());
    object
}

/// Read a rule back from a PrometheusRule object
pub fn from_object(object: DynamicObject) -> Result<AlertRule, RuleStoreError> {
    let metadata = object.metadata;
    let spec: AlertRuleSpec = match object.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone())
            .map_err(|e| RuleStoreError::Unavailable(format!("malformed rule spec: {}", e)))?,
        None => AlertRuleSpec::default(),
    };

    Ok(AlertRule {
        name: metadata.name.unwrap_or_default(),
        namespace: metadata.namespace.unwrap_or_default(),
        labels: metadata.labels.unwrap_or_default(),
        spec,
    })
}

#[async_trait]
impl RuleStore for KubeRuleStore {
    async fn create(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError> {
        if self.fetch(namespace, &rule.name).await?.is_some() {
            return Err(RuleStoreError::AlreadyExists {
                namespace: namespace.to_string(),
                name: rule.name.clone(),
            });
        }

        let object = to_object(rule, &self.resource);
        let created = self
            .api(namespace)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| RuleStoreError::Unavailable(e.to_string()))?;
        from_object(created)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<AlertRule, RuleStoreError> {
        match self.fetch(namespace, name).await? {
            Some(object) => from_object(object),
            None => Err(RuleStoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn update(&self, namespace: &str, rule: &AlertRule) -> Result<AlertRule, RuleStoreError> {
        let Some(current) = self.fetch(namespace, &rule.name).await? else {
            return Err(RuleStoreError::NotFound {
                namespace: namespace.to_string(),
                name: rule.name.clone(),
            });
        };

        let mut object = to_object(rule, &self.resource);
        object.metadata.resource_version = current.metadata.resource_version;
        let updated = self
            .api(namespace)
            .replace(&rule.name, &PostParams::default(), &object)
            .await
            .map_err(|e| RuleStoreError::Unavailable(e.to_string()))?;
        from_object(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), RuleStoreError> {
        if self.fetch(namespace, name).await?.is_none() {
            return Err(RuleStoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| RuleStoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
