//! Log count gauge

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::model::{MetricSample, StrategyMetric};

/// Gauge family name
pub const LOG_COUNT_GAUGE: &str = "vigil_log_count";

const LABELS: [&str; 2] = ["keyword", "strategy_id"];

/// `vigil_log_count{keyword, strategy_id}` in its own prometheus registry
pub struct LogCountGauge {
    registry: Registry,
    counts: GaugeVec,
}

impl LogCountGauge {
    pub fn new() -> Self {
        let registry = Registry::new();
        let counts = GaugeVec::new(
            Opts::new(LOG_COUNT_GAUGE, "Log lines matching a strategy query in the scan window"),
            &LABELS,
        )
        .expect("metric can be created");
        registry
            .register(Box::new(counts.clone()))
            .expect("metric can be registered");

        Self { registry, counts }
    }

    pub fn set(&self, metric: &StrategyMetric, count: f64) {
        self.counts
            .with_label_values(&metric.gauge_labels())
            .set(count);
    }

    /// Drop the series for `metric`; returns whether it existed
    pub fn retire(&self, metric: &StrategyMetric) -> bool {
        let removed = self
            .counts
            .remove_label_values(&metric.gauge_labels())
            .is_ok();
        if removed {
            tracing::debug!(
                strategy_id = %metric.strategy_id,
                keyword = %metric.query.keyword(),
                "Retired gauge series"
            );
        }
        removed
    }

    /// Retire `old`'s series when `new` counts something else.
    ///
    /// A changed query resets the series even if the labels stay the same,
    /// so the previous query's count is never served for the new one.
    pub fn retire_if_changed(&self, old: &StrategyMetric, new: &StrategyMetric) -> bool {
        if old == new {
            return false;
        }
        self.retire(old)
    }

    /// Current series, one sample per label set
    pub fn samples(&self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        for family in self.registry.gather() {
            for metric in family.get_metric() {
                let mut keyword = String::new();
                let mut strategy_id = String::new();
                for pair in metric.get_label() {
                    match pair.get_name() {
                        "keyword" => keyword = pair.get_value().to_string(),
                        "strategy_id" => strategy_id = pair.get_value().to_string(),
                        _ => {}
                    }
                }
                samples.push(MetricSample {
                    strategy_id,
                    keyword,
                    count: metric.get_gauge().get_value(),
                });
            }
        }
        samples
    }

    /// Encode in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for LogCountGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogCountGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCountGauge")
            .field("series", &self.samples().len())
            .finish()
    }
}
