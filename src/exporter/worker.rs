use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use super::MetricScanner;

/// Background worker that refreshes the gauge on a fixed tick
pub struct ScanWorker {
    scanner: Arc<MetricScanner>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl ScanWorker {
    pub fn new(scanner: Arc<MetricScanner>, interval: Duration) -> Self {
        Self {
            scanner,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Scan worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                let report = self.scanner.scan().await;
                if report.failed > 0 {
                    tracing::warn!("Scan worker: {} of {} counts failed", report.failed, report.scanned + report.failed);
                }
            }

            tracing::info!("Scan worker stopped");
        })
    }

    /// Stop the worker after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
