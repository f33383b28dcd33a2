//! Alertmanager configuration document
//!
//! Only the parts this crate edits are modelled; every other key is carried
//! through `extra` so a load/save round trip leaves it untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

type Extra = BTreeMap<String, serde_yaml::Value>;

/// Top-level notification document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertmanagerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<Receiver>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A named set of contact channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_configs: Vec<EmailConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhook_configs: Vec<WebhookConfig>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_webhook: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Routing node; the root route holds per-monitor child routes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(rename = "match", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    #[serde(rename = "continue", default, skip_serializing_if = "is_false")]
    pub continue_matching: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl AlertmanagerConfig {
    /// Parse and validate a stored document
    pub fn parse(raw: &[u8]) -> Result<Self, DocumentError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(DocumentError::MissingRoute);
        }

        let config: Self = serde_yaml::from_slice(raw)?;
        match &config.route {
            None => Err(DocumentError::MissingRoute),
            Some(route) if route.continue_matching => Err(DocumentError::RootContinue),
            Some(_) => Ok(config),
        }
    }

    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Child routes of the root route
    pub fn routes_mut(&mut self) -> &mut Vec<Route> {
        &mut self.route.get_or_insert_with(Route::default).routes
    }

    pub fn routes(&self) -> &[Route] {
        self.route.as_ref().map(|r| r.routes.as_slice()).unwrap_or(&[])
    }
}

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Malformed notification document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No route provided in notification document")]
    MissingRoute,

    #[error("Root route must not set continue")]
    RootContinue,
}
