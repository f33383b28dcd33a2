//! Vigil Server
//!
//! Run with: cargo run (add `--features kubernetes` for the monitor controller)
//!
//! Environment variables:
//! - VIGIL_HOST: Bind address (default: 0.0.0.0)
//! - VIGIL_PORT: Port number (default: 8080)
//! - VIGIL_DRY_RUN: Report a fixed count instead of querying Elasticsearch
//! - VIGIL_ELASTICSEARCH_URL: Comma-separated Elasticsearch URLs
//! - VIGIL_SCAN_INTERVAL_SECS: Background scan tick; 0 scans on every scrape
//! - RUST_LOG: Log level (default: info)
//!
//! See `AppConfig::from_env` for the full list.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::api::{run_server, AppState};
use vigil::exporter::{LocalCatalog, LogCountGauge, MetricScanner, ScanMode};
use vigil::search::{ElasticBackend, NullBackend, SearchBackend};
use vigil::{AppConfig, MetricRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    tracing::info!("Vigil configuration:");
    tracing::info!("  Host: {}:{}", config.server.host, config.server.port);
    if config.dry_run {
        tracing::info!("  Search backend: DRY RUN");
    } else {
        tracing::info!("  Search backend: {}", config.elastic.urls.join(", "));
        tracing::info!("  Index prefix: {}", config.elastic.index_prefix);
    }
    match config.scan_mode {
        ScanMode::OnScrape => tracing::info!("  Scan mode: on scrape"),
        ScanMode::Background { interval } => {
            tracing::info!("  Scan mode: background, every {} seconds", interval.as_secs())
        }
    }
    tracing::info!("  Scan window: {} seconds", config.scan_window.as_secs());
    tracing::info!(
        "  Alertmanager secret: {}/{} (key {})",
        config.notify.namespace,
        config.notify.document,
        config.alertmanager_key
    );
    tracing::info!("  Retry cap: {}", config.retry_cap);
    if let Some(addr) = &config.exporter_addr {
        tracing::info!("  Remote exporter: {}", addr);
    }

    let backend: Arc<dyn SearchBackend> = if config.dry_run {
        Arc::new(NullBackend)
    } else {
        Arc::new(ElasticBackend::new(config.elastic.clone())?)
    };
    match backend.ping().await {
        Ok(version) => tracing::info!("Search backend reachable, version {}", version),
        Err(e) => tracing::warn!("Search backend not reachable yet: {}", e),
    }

    // Shared by the controller, the metric API and the scanner
    let registry = Arc::new(MetricRegistry::new());
    let gauge = Arc::new(LogCountGauge::new());
    let catalog = LocalCatalog::new(Arc::clone(&registry), Arc::clone(&gauge));
    let scanner = Arc::new(MetricScanner::new(
        Arc::clone(&registry),
        backend,
        gauge,
        config.scan_window,
    ));

    start_controller(&config, &catalog).await?;

    let state = Arc::new(AppState {
        catalog,
        scanner,
        scan_mode: config.scan_mode,
    });

    println!(
        r#"
 __   __ _       _ _
 \ \ / /(_) __ _(_) |
  \ V / | |/ _` | | |
   \_/  |_|\__, |_|_|
           |___/

 Log Monitor Operator
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config.server.clone(), state).await
}

#[cfg(feature = "kubernetes")]
async fn start_controller(
    config: &AppConfig,
    catalog: &LocalCatalog,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;
    use vigil::exporter::{MetricCatalog, RemoteCatalog};
    use vigil::k8s::{run_controller, KubeMonitorSource, KubeNotificationStore, KubeRuleStore};
    use vigil::notify::NotificationSynchronizer;
    use vigil::rules::RuleSynchronizer;
    use vigil::Reconciler;

    if !config.controller {
        tracing::info!("Monitor controller: DISABLED");
        return Ok(());
    }

    let client = kube::Client::try_default().await?;

    let metric_catalog: Arc<dyn MetricCatalog> = match &config.exporter_addr {
        Some(addr) => Arc::new(RemoteCatalog::new(addr.clone(), Duration::from_secs(10))?),
        None => Arc::new(catalog.clone()),
    };

    let reconciler = Reconciler::new(
        Arc::new(KubeMonitorSource::new(client.clone())),
        RuleSynchronizer::new(Arc::new(KubeRuleStore::new(client.clone()))),
        NotificationSynchronizer::new(
            Arc::new(KubeNotificationStore::new(
                client.clone(),
                config.alertmanager_key.clone(),
            )),
            config.notify.clone(),
        ),
        metric_catalog,
    )
    .with_retry_cap(config.retry_cap);

    tokio::spawn(run_controller(
        client,
        config.watch_namespace.clone(),
        Arc::new(reconciler),
    ));
    Ok(())
}

#[cfg(not(feature = "kubernetes"))]
async fn start_controller(
    config: &AppConfig,
    _catalog: &LocalCatalog,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.controller {
        tracing::info!("Monitor controller: not built (enable the `kubernetes` feature)");
    }
    Ok(())
}
