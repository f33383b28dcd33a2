//! Domain types shared by the synchronizers, registry and exporter

pub mod metric;
pub mod spec;

pub use metric::{MetricDefinition, MetricQuery, MetricSample, SchemaVersion, StrategyMetric};
pub use spec::{MonitorKey, MonitorLabels, MonitorResource, MonitorSpec, MonitorStatus, StatusPhase};
