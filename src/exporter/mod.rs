//! Log count exporter
//!
//! Turns registry entries into `vigil_log_count` gauge series. Counting runs
//! either on each scrape or on a background tick, see [`ScanMode`].

pub mod catalog;
pub mod gauge;
pub mod scanner;
pub mod worker;

use std::time::Duration;

pub use catalog::{CatalogError, LocalCatalog, MetricCatalog, RemoteCatalog};
pub use gauge::{LogCountGauge, LOG_COUNT_GAUGE};
pub use scanner::{MetricScanner, ScanReport};
pub use worker::ScanWorker;

/// When the registry is scanned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Scan on every `/metrics` request
    #[default]
    OnScrape,
    /// Scan on a fixed tick; scrapes serve the last values
    Background { interval: Duration },
}

impl ScanMode {
    /// Zero means on-scrape
    pub fn from_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            ScanMode::OnScrape
        } else {
            ScanMode::Background { interval }
        }
    }
}
