//! Process configuration from `VIGIL_*` environment variables

use std::time::Duration;

use crate::api::ServerConfig;
use crate::exporter::ScanMode;
use crate::notify::NotifySettings;
use crate::reconcile::DEFAULT_RETRY_CAP;
use crate::search::ElasticConfig;

/// Effective configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Report a fixed count instead of querying the search backend
    pub dry_run: bool,
    pub elastic: ElasticConfig,
    pub scan_mode: ScanMode,
    /// Length of the window each count covers
    pub scan_window: Duration,
    pub notify: NotifySettings,
    /// Key inside the Alertmanager secret holding the YAML document
    pub alertmanager_key: String,
    pub retry_cap: u32,
    /// Forward metric changes to this exporter instead of the local registry
    pub exporter_addr: Option<String>,
    /// Run the monitor controller alongside the API
    pub controller: bool,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dry_run: false,
            elastic: ElasticConfig::default(),
            scan_mode: ScanMode::OnScrape,
            scan_window: Duration::from_secs(3600),
            notify: NotifySettings::default(),
            alertmanager_key: "alertmanager.yaml".to_string(),
            retry_cap: DEFAULT_RETRY_CAP,
            exporter_addr: None,
            controller: true,
            watch_namespace: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    ///
    /// VIGIL_HOST=0.0.0.0
    /// VIGIL_PORT=8080
    /// VIGIL_DRY_RUN=false
    /// VIGIL_ELASTICSEARCH_URL=http://es-0:9200,http://es-1:9200
    /// VIGIL_INDEX_PREFIX=filebeat-
    /// VIGIL_SEARCH_TIMEOUT_SECS=10
    /// VIGIL_SCAN_INTERVAL_SECS=0 (0 scans on every scrape)
    /// VIGIL_SCAN_WINDOW_SECS=3600
    /// VIGIL_ALERTMANAGER_NAMESPACE=monitoring
    /// VIGIL_ALERTMANAGER_SECRET=alertmanager-main
    /// VIGIL_ALERTMANAGER_KEY=alertmanager.yaml
    /// VIGIL_WEBHOOK_URL, VIGIL_STATUS_WEBHOOK_URL
    /// VIGIL_CONFLICT_RETRIES=3
    /// VIGIL_RETRY_CAP=100
    /// VIGIL_EXPORTER_ADDR=exporter:8080
    /// VIGIL_CONTROLLER=true
    /// VIGIL_WATCH_NAMESPACE=
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset or unparsable values
    /// fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |name: &str, default: bool| {
            var(name)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default)
        };
        let secs = |name: &str| var(name).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs);

        let server = ServerConfig {
            host: var("VIGIL_HOST").unwrap_or(defaults.server.host),
            port: var("VIGIL_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.server.port),
        };

        let urls: Vec<String> = var("VIGIL_ELASTICSEARCH_URL")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.elastic.urls);
        let elastic = ElasticConfig {
            urls,
            index_prefix: var("VIGIL_INDEX_PREFIX").unwrap_or(defaults.elastic.index_prefix),
            timeout: secs("VIGIL_SEARCH_TIMEOUT_SECS").unwrap_or(defaults.elastic.timeout),
        };

        let notify = NotifySettings {
            namespace: var("VIGIL_ALERTMANAGER_NAMESPACE").unwrap_or(defaults.notify.namespace),
            document: var("VIGIL_ALERTMANAGER_SECRET").unwrap_or(defaults.notify.document),
            webhook_url: var("VIGIL_WEBHOOK_URL").unwrap_or(defaults.notify.webhook_url),
            status_webhook_url: var("VIGIL_STATUS_WEBHOOK_URL")
                .unwrap_or(defaults.notify.status_webhook_url),
            conflict_retries: var("VIGIL_CONFLICT_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.notify.conflict_retries),
        };

        Self {
            server,
            dry_run: flag("VIGIL_DRY_RUN", defaults.dry_run),
            elastic,
            scan_mode: secs("VIGIL_SCAN_INTERVAL_SECS")
                .map(ScanMode::from_interval)
                .unwrap_or(defaults.scan_mode),
            scan_window: secs("VIGIL_SCAN_WINDOW_SECS").unwrap_or(defaults.scan_window),
            notify,
            alertmanager_key: var("VIGIL_ALERTMANAGER_KEY").unwrap_or(defaults.alertmanager_key),
            retry_cap: var("VIGIL_RETRY_CAP")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_cap),
            exporter_addr: var("VIGIL_EXPORTER_ADDR"),
            controller: flag("VIGIL_CONTROLLER", defaults.controller),
            watch_namespace: var("VIGIL_WATCH_NAMESPACE"),
        }
    }
}
