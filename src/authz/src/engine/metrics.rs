//! Prometheus-style metrics for authorization decisions

use crate::types::Decision;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Engine performance metrics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EngineMetrics {
    /// Total number of authorization requests
    pub total_requests: u64,

    pub allowed_decisions: u64,

    /// Explicit deny by a statement
    pub denied_decisions: u64,

    /// No statement applied
    pub not_applicable_decisions: u64,

    /// Effective-policy cache hits
    pub cache_hits: u64,

    /// Effective-policy cache misses
    pub cache_misses: u64,

    /// Latency percentiles
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,

    pub avg_latency_ms: f64,

    /// Store failures, timeouts and malformed stored policies
    pub error_count: u64,
}

impl EngineMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Share of decisions that were `Allow`
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions + self.not_applicable_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Latency samples for percentile calculation
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::with_max_samples(10_000)
    }

    pub fn with_max_samples(max_samples: usize) -> Self {
        let max_samples = max_samples.max(10);
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(max_samples))),
            max_samples,
        }
    }

    pub async fn record_cache_hit(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.cache_hits += 1;
    }

    pub async fn record_cache_miss(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.cache_misses += 1;
    }

    /// Record an authorization decision
    pub async fn record_decision(&self, decision: Decision) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;

        match decision {
            Decision::Allow => metrics.allowed_decisions += 1,
            Decision::Deny => metrics.denied_decisions += 1,
            Decision::NotApplicable => metrics.not_applicable_decisions += 1,
        }
    }

    /// Record request latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        // Keep only recent samples
        if samples.len() > self.max_samples {
            let excess = samples.len() - self.max_samples + self.max_samples / 10;
            samples.drain(0..excess);
        }

        let mut metrics = self.metrics.write().await;

        let sum: f64 = samples.iter().sum();
        metrics.avg_latency_ms = sum / samples.len() as f64;

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p95_ms = Self::percentile(&sorted, 0.95);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
    }

    /// Record an evaluation or store error
    pub async fn record_error(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;
        metrics.error_count += 1;
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = EngineMetrics::default();

        let mut samples = self.latency_samples.write().await;
        samples.clear();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP monkeys_authz_requests_total Total number of authorization requests
# TYPE monkeys_authz_requests_total counter
monkeys_authz_requests_total {}

# HELP monkeys_authz_decisions_total Authorization decisions by outcome
# TYPE monkeys_authz_decisions_total counter
monkeys_authz_decisions_total{{decision="allow"}} {}
monkeys_authz_decisions_total{{decision="deny"}} {}
monkeys_authz_decisions_total{{decision="not_applicable"}} {}

# HELP monkeys_authz_policy_cache_hits_total Effective-policy cache hits
# TYPE monkeys_authz_policy_cache_hits_total counter
monkeys_authz_policy_cache_hits_total {}

# HELP monkeys_authz_policy_cache_misses_total Effective-policy cache misses
# TYPE monkeys_authz_policy_cache_misses_total counter
monkeys_authz_policy_cache_misses_total {}

# HELP monkeys_authz_latency_seconds Authorization latency percentiles
# TYPE monkeys_authz_latency_seconds summary
monkeys_authz_latency_seconds{{quantile="0.5"}} {}
monkeys_authz_latency_seconds{{quantile="0.9"}} {}
monkeys_authz_latency_seconds{{quantile="0.95"}} {}
monkeys_authz_latency_seconds{{quantile="0.99"}} {}

# HELP monkeys_authz_errors_total Authorization checks that failed to evaluate
# TYPE monkeys_authz_errors_total counter
monkeys_authz_errors_total {}
"#,
            metrics.total_requests,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.not_applicable_decisions,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p95_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            metrics.error_count,
        )
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
