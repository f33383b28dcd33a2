//! Registry scan: one count query per entry, results into the gauge

use std::sync::Arc;
use std::time::Duration;

use crate::registry::MetricRegistry;
use crate::search::{SearchBackend, TimeWindow};

use super::LogCountGauge;

/// Outcome of one pass over the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub failed: usize,
}

pub struct MetricScanner {
    registry: Arc<MetricRegistry>,
    backend: Arc<dyn SearchBackend>,
    gauge: Arc<LogCountGauge>,
    window: Duration,
}

impl MetricScanner {
    pub fn new(
        registry: Arc<MetricRegistry>,
        backend: Arc<dyn SearchBackend>,
        gauge: Arc<LogCountGauge>,
        window: Duration,
    ) -> Self {
        Self {
            registry,
            backend,
            gauge,
            window,
        }
    }

    pub fn gauge(&self) -> &Arc<LogCountGauge> {
        &self.gauge
    }

    /// Count every registry entry, sequentially.
    ///
    /// A failed count is logged and leaves the series at its previous
    /// value; it never aborts the pass.
    pub async fn scan(&self) -> ScanReport {
        let snapshot = self.registry.snapshot();
        let window = TimeWindow::last(self.window);
        let mut report = ScanReport::default();

        for (id, metric) in snapshot.iter() {
            match self.backend.count(&metric.query, &window).await {
                Ok(count) => {
                    // Entries replaced or removed while the query ran may
                    // already have their series retired
                    let stored = self
                        .registry
                        .with_current(id, metric, || self.gauge.set(metric, count));
                    if stored.is_none() {
                        tracing::debug!(strategy_id = %id, "Entry changed during scan, dropping count");
                        continue;
                    }
                    report.scanned += 1;
                }
                Err(e) => {
                    tracing::warn!(strategy_id = %id, error = %e, "Log count query failed");
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            scanned = report.scanned,
            failed = report.failed,
            "Registry scan finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetricQuery, StrategyMetric};
    use crate::search::{NullBackend, SearchError, DRY_RUN_COUNT};
    use async_trait::async_trait;

    /// Fails every DSL query, counts keywords by length
    struct FlakyBackend;

    #[async_trait]
    impl SearchBackend for FlakyBackend {
        async fn count(&self, query: &MetricQuery, _window: &TimeWindow) -> Result<f64, SearchError> {
            match query {
                MetricQuery::Dsl { .. } => Err(SearchError::Network("connection refused".to_string())),
                MetricQuery::Keyword { keyword, .. } => Ok(keyword.len() as f64),
            }
        }

        async fn ping(&self) -> Result<String, SearchError> {
            Ok("flaky".to_string())
        }
    }

    fn scanner(backend: Arc<dyn SearchBackend>) -> (Arc<MetricRegistry>, MetricScanner) {
        let registry = Arc::new(MetricRegistry::new());
        let scanner = MetricScanner::new(
            Arc::clone(&registry),
            backend,
            Arc::new(LogCountGauge::new()),
            Duration::from_secs(3600),
        );
        (registry, scanner)
    }

    #[tokio::test]
    async fn test_dry_run_scan() {
        let (registry, scanner) = scanner(Arc::new(NullBackend));
        registry.set("s1", StrategyMetric::dsl("s1", "term:error"));
        registry.set("s2", StrategyMetric::keyword("s2", "api", "timeout"));

        let report = scanner.scan().await;
        assert_eq!(report, ScanReport { scanned: 2, failed: 0 });

        let samples = scanner.gauge().samples();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.count == DRY_RUN_COUNT));
    }

    #[tokio::test]
    async fn test_failed_entry_keeps_previous_value() {
        let (registry, scanner) = scanner(Arc::new(FlakyBackend));
        let dsl = StrategyMetric::dsl("s1", "term:error");
        registry.set("s1", dsl.clone());
        registry.set("s2", StrategyMetric::keyword("s2", "api", "timeout"));
        scanner.gauge().set(&dsl, 5.0);

        let report = scanner.scan().await;
        assert_eq!(report, ScanReport { scanned: 1, failed: 1 });

        let mut samples = scanner.gauge().samples();
        samples.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        assert_eq!(samples[0].count, 5.0);
        assert_eq!(samples[1].keyword, "timeout");
        assert_eq!(samples[1].count, 7.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replace_leaves_no_stale_series() {
        use crate::exporter::LocalCatalog;
        use std::sync::atomic::{AtomicBool, Ordering};

        let registry = Arc::new(MetricRegistry::new());
        let gauge = Arc::new(LogCountGauge::new());
        let catalog = LocalCatalog::new(Arc::clone(&registry), Arc::clone(&gauge));
        let scanner = Arc::new(MetricScanner::new(
            Arc::clone(&registry),
            Arc::new(NullBackend),
            Arc::clone(&gauge),
            Duration::from_secs(60),
        ));
        catalog.replace(StrategyMetric::keyword("s1", "api", "kw0"));

        let done = Arc::new(AtomicBool::new(false));
        let scans: Vec<_> = (0..3)
            .map(|_| {
                let scanner = Arc::clone(&scanner);
                let done = Arc::clone(&done);
                tokio::spawn(async move {
                    while !done.load(Ordering::SeqCst) {
                        scanner.scan().await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let writer = {
            let done = Arc::clone(&done);
            tokio::task::spawn_blocking(move || {
                for i in 1..20_000 {
                    catalog.replace(StrategyMetric::keyword("s1", "api", format!("kw{}", i % 7)));
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        writer.await.unwrap();
        for scan in scans {
            scan.await.unwrap();
        }

        let current = registry.get("s1").unwrap();
        let stale: Vec<_> = gauge
            .samples()
            .into_iter()
            .filter(|s| s.keyword != current.query.keyword())
            .collect();
        assert!(stale.is_empty(), "stale series: {:?}", stale);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let (_, scanner) = scanner(Arc::new(NullBackend));
        assert_eq!(scanner.scan().await, ScanReport::default());
        assert!(scanner.gauge().samples().is_empty());
    }
}
