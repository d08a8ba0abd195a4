//! Feed statistics shared by all sessions.
//!
//! Every counter is an atomic, so sessions record into the same collector
//! without taking locks.

use crate::types::result::{AnomalyReason, AnomalyResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the feed
pub struct FeedMetrics {
    /// Total transactions evaluated
    pub transactions_processed: AtomicU64,
    /// Results with at least one reason
    pub anomalies_flagged: AtomicU64,
    /// Fires per rule, indexed by `AnomalyReason::index`
    reason_counts: [AtomicU64; 4],
    pub sessions_started: AtomicU64,
    pub sessions_stopped: AtomicU64,
    pub delivery_failures: AtomicU64,
    /// Sum of generate+evaluate times in microseconds
    eval_time_total_us: AtomicU64,
    eval_time_max_us: AtomicU64,
    /// Start time for rate calculation
    start_time: Instant,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            anomalies_flagged: AtomicU64::new(0),
            reason_counts: Default::default(),
            sessions_started: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            eval_time_total_us: AtomicU64::new(0),
            eval_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one evaluated transaction
    pub fn record_result(&self, result: &AnomalyResult, eval_time: Duration) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        let micros = eval_time.as_micros() as u64;
        self.eval_time_total_us.fetch_add(micros, Ordering::Relaxed);
        self.eval_time_max_us.fetch_max(micros, Ordering::Relaxed);

        if result.is_anomaly {
            self.anomalies_flagged.fetch_add(1, Ordering::Relaxed);
        }
        for reason in &result.reasons {
            self.reason_counts[reason.index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reason_count(&self, reason: AnomalyReason) -> u64 {
        self.reason_counts[reason.index()].load(Ordering::Relaxed)
    }

    pub fn active_sessions(&self) -> u64 {
        let started = self.sessions_started.load(Ordering::Relaxed);
        started.saturating_sub(self.sessions_stopped.load(Ordering::Relaxed))
    }

    /// Evaluation time statistics
    pub fn get_eval_stats(&self) -> EvalStats {
        let count = self.transactions_processed.load(Ordering::Relaxed);
        if count == 0 {
            return EvalStats::default();
        }
        EvalStats {
            count,
            mean_us: self.eval_time_total_us.load(Ordering::Relaxed) / count,
            max_us: self.eval_time_max_us.load(Ordering::Relaxed),
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed.load(Ordering::Relaxed);
        let anomaly_count = self.anomalies_flagged.load(Ordering::Relaxed);
        let anomaly_rate = if tx_count > 0 {
            (anomaly_count as f64 / tx_count as f64) * 100.0
        } else {
            0.0
        };
        let eval = self.get_eval_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║         TRANSACTION ANOMALY FEED - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Processed: {:>8}  │  Throughput: {:>6.1} tx/s ║",
            tx_count,
            self.get_throughput()
        );
        info!(
            "║ Anomalies Flagged:      {:>8}  │  Anomaly Rate: {:>6.1}%   ║",
            anomaly_count, anomaly_rate
        );
        info!(
            "║ Sessions: active={:>5} started={:>5} delivery_failures={:>5} ║",
            self.active_sessions(),
            self.sessions_started.load(Ordering::Relaxed),
            self.delivery_failures.load(Ordering::Relaxed)
        );
        info!(
            "║ Evaluation Time (μs): mean={:>5} max={:>5}                    ║",
            eval.mean_us, eval.max_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Reasons:                                                     ║");
        for reason in AnomalyReason::ALL {
            let count = self.reason_count(reason);
            let pct = if tx_count > 0 {
                (count as f64 / tx_count as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!(
                "║   {:<30}: {:>6} ({:>5.1}%) {}",
                reason.as_str(),
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation time statistics
#[derive(Debug, Default)]
pub struct EvalStats {
    pub count: u64,
    pub mean_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<FeedMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<FeedMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
