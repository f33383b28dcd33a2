use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_metric, delete_metric, get_metric, health_check, metrics, replace_metric, AppState,
};
use crate::exporter::{ScanMode, ScanWorker};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Prometheus exposition
        .route("/metrics", get(metrics))
        // Metric definitions
        .route(
            "/metric/:id",
            get(get_metric)
                .post(create_metric)
                .put(replace_metric)
                .delete(delete_metric),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server until ctrl-c
pub async fn run_server(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Start the background scan if configured
    let worker = match state.scan_mode {
        ScanMode::Background { interval } => {
            let worker = Arc::new(ScanWorker::new(Arc::clone(&state.scanner), interval));
            let handle = Arc::clone(&worker).start();
            Some((worker, handle))
        }
        ScanMode::OnScrape => None,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Vigil server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((worker, handle)) = worker {
        worker.stop();
        handle.abort();
    }

    tracing::info!("Vigil server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::{LocalCatalog, LogCountGauge, MetricScanner};
    use crate::model::StrategyMetric;
    use crate::registry::MetricRegistry;
    use crate::search::NullBackend;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_state(scan_mode: ScanMode) -> Arc<AppState> {
        let registry = Arc::new(MetricRegistry::new());
        let gauge = Arc::new(LogCountGauge::new());
        let scanner = Arc::new(MetricScanner::new(
            Arc::clone(&registry),
            Arc::new(NullBackend),
            Arc::clone(&gauge),
            Duration::from_secs(3600),
        ));
        Arc::new(AppState {
            catalog: LocalCatalog::new(registry, gauge),
            scanner,
            scan_mode,
        })
    }

    fn create_test_app() -> (Arc<AppState>, Router) {
        let state = create_test_state(ScanMode::OnScrape);
        (Arc::clone(&state), build_router(state))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, app) = create_test_app();

        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["metrics"], 0);
    }

    #[tokio::test]
    async fn test_metric_lifecycle() {
        let (state, app) = create_test_app();
        let body = serde_json::json!({
            "version": "v1",
            "kind": "keyword",
            "container": "api",
            "keyword": "error"
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/metric/s1", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/metric/s1", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/metric/s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: StrategyMetric = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(fetched, StrategyMetric::keyword("s1", "api", "error"));

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/metric/s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.catalog.registry().is_empty());

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/metric/s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(empty_request("GET", "/metric/s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (state, app) = create_test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/metric/s1")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Well-formed JSON, wrong schema
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/metric/s1",
                serde_json::json!({ "version": "v2", "kind": "dsl", "query": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].is_string());

        assert!(state.catalog.registry().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_and_cardinality_cleanup() {
        let (_, app) = create_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/metric/s1",
                serde_json::json!({
                    "version": "v1",
                    "kind": "keyword",
                    "container": "api",
                    "keyword": "error"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains(r#"vigil_log_count{keyword="error",strategy_id="s1"} 123"#));

        // New keyword: the old series must disappear
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/metric/s1",
                serde_json::json!({
                    "version": "v1",
                    "kind": "keyword",
                    "container": "api",
                    "keyword": "timeout"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(
            app.clone()
                .oneshot(empty_request("GET", "/metrics"))
                .await
                .unwrap(),
        )
        .await;
        assert!(!text.contains(r#"keyword="error""#));
        assert!(text.contains(r#"vigil_log_count{keyword="timeout",strategy_id="s1"} 123"#));

        app.clone()
            .oneshot(empty_request("DELETE", "/metric/s1"))
            .await
            .unwrap();
        let text = body_text(
            app.oneshot(empty_request("GET", "/metrics"))
                .await
                .unwrap(),
        )
        .await;
        assert!(!text.contains("strategy_id=\"s1\""));
    }

    #[tokio::test]
    async fn test_background_mode_serves_cached_values() {
        let state = create_test_state(ScanMode::Background {
            interval: Duration::from_secs(60),
        });
        state
            .catalog
            .create(StrategyMetric::dsl("s1", "term:error"))
            .unwrap();
        let app = build_router(Arc::clone(&state));

        let text = body_text(
            app.clone()
                .oneshot(empty_request("GET", "/metrics"))
                .await
                .unwrap(),
        )
        .await;
        assert!(!text.contains("strategy_id=\"s1\""));

        state.scanner.scan().await;
        let text = body_text(app.oneshot(empty_request("GET", "/metrics")).await.unwrap()).await;
        assert!(text.contains(r#"vigil_log_count{keyword="",strategy_id="s1"} 123"#));
    }
}
