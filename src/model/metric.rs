//! Metric definitions held by the registry

use serde::{Deserialize, Serialize};

/// What to count in the search backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricQuery {
    /// Free-form backend query, sent as-is
    Dsl { query: String },
    /// Phrase match within one container's logs
    Keyword { container: String, keyword: String },
}

impl MetricQuery {
    /// Keyword label value; empty for DSL queries
    pub fn keyword(&self) -> &str {
        match self {
            MetricQuery::Dsl { .. } => "",
            MetricQuery::Keyword { keyword, .. } => keyword,
        }
    }
}

/// A registry entry: one counted query per strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMetric {
    pub strategy_id: String,
    #[serde(flatten)]
    pub query: MetricQuery,
}

impl StrategyMetric {
    pub fn new(strategy_id: impl Into<String>, query: MetricQuery) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            query,
        }
    }

    pub fn dsl(strategy_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(
            strategy_id,
            MetricQuery::Dsl {
                query: query.into(),
            },
        )
    }

    pub fn keyword(
        strategy_id: impl Into<String>,
        container: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self::new(
            strategy_id,
            MetricQuery::Keyword {
                container: container.into(),
                keyword: keyword.into(),
            },
        )
    }

    /// Gauge label values, in `[keyword, strategy_id]` order
    pub fn gauge_labels(&self) -> [&str; 2] {
        [self.query.keyword(), &self.strategy_id]
    }
}

/// Schema version of the metric API body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
}

/// Body of `POST`/`PUT /metric/:id`; the strategy id comes from the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub version: SchemaVersion,
    #[serde(flatten)]
    pub query: MetricQuery,
}

impl MetricDefinition {
    pub fn into_metric(self, strategy_id: impl Into<String>) -> StrategyMetric {
        StrategyMetric::new(strategy_id, self.query)
    }
}

impl From<&StrategyMetric> for MetricDefinition {
    fn from(metric: &StrategyMetric) -> Self {
        Self {
            version: SchemaVersion::V1,
            query: metric.query.clone(),
        }
    }
}

/// One count result from the search backend
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub strategy_id: String,
    pub keyword: String,
    pub count: f64,
}
