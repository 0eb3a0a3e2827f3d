//! Request metrics and statistics tracking for the classifier service.

use crate::types::Label;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Total `/predict` requests received
    pub requests: AtomicU64,
    /// Successful predictions labelled "cat"
    cats: AtomicU64,
    /// Successful predictions labelled "dog"
    dogs: AtomicU64,
    /// Failures keyed by error kind
    failures: RwLock<HashMap<&'static str, u64>>,
    /// End-to-end latencies of successful requests (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            cats: AtomicU64::new(0),
            dogs: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Count an incoming request
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, label: Label, score: f32, latency: Duration) {
        match label {
            Label::Cat => self.cats.fetch_add(1, Ordering::Relaxed),
            Label::Dog => self.dogs.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &'static str) {
        if let Ok(mut failures) = self.failures.write() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Latency percentiles over the retained samples
    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut predictions = HashMap::new();
        predictions.insert(Label::Cat, self.cats.load(Ordering::Relaxed));
        predictions.insert(Label::Dog, self.dogs.load(Ordering::Relaxed));

        MetricsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            predictions,
            failures: self
                .failures
                .read()
                .map(|f| f.clone())
                .unwrap_or_default(),
            score_distribution: self
                .score_buckets
                .read()
                .map(|b| *b)
                .unwrap_or_default(),
            latency: self.latency_stats(),
        }
    }

    /// Log a summary of the current counters
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let failed: u64 = snapshot.failures.values().sum();
        let cats = snapshot.predictions.get(&Label::Cat).copied().unwrap_or(0);
        let dogs = snapshot.predictions.get(&Label::Dog).copied().unwrap_or(0);

        info!(
            uptime_secs = snapshot.uptime_secs,
            requests = snapshot.requests,
            cats,
            dogs,
            failed,
            mean_us = snapshot.latency.mean_us,
            p50_us = snapshot.latency.p50_us,
            p95_us = snapshot.latency.p95_us,
            p99_us = snapshot.latency.p99_us,
            "Metrics summary"
        );
        for (kind, count) in &snapshot.failures {
            info!(kind = %kind, count = count, "Failures by kind");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics in microseconds
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view of the metrics, returned by `GET /metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub predictions: HashMap<Label, u64>,
    pub failures: HashMap<&'static str, u64>,
    pub score_distribution: [u64; 10],
    pub latency: LatencyStats,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_prediction(Label::Dog, 0.87, Duration::from_micros(100));
        metrics.record_prediction(Label::Cat, 0.1, Duration::from_micros(300));
        metrics.record_failure("decode");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.predictions[&Label::Dog], 1);
        assert_eq!(snapshot.predictions[&Label::Cat], 1);
        assert_eq!(snapshot.failures["decode"], 1);
        assert_eq!(snapshot.score_distribution[8], 1);
        assert_eq!(snapshot.score_distribution[1], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        for us in 1..=100 {
            metrics.record_prediction(Label::Cat, 0.2, Duration::from_micros(us));
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
    }

    #[test]
    fn test_score_of_one_lands_in_last_bucket() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(Label::Dog, 1.0, Duration::from_micros(1));
        assert_eq!(metrics.snapshot().score_distribution[9], 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(Label::Dog, 0.9, Duration::from_micros(10));

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["predictions"]["dog"], 1);
        assert_eq!(json["latency"]["count"], 1);
    }
}
