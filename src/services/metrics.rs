//! Metrics collection and Prometheus integration.

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Gateway metrics collector for Prometheus integration.
#[derive(Clone)]
pub struct PixMetrics {
    pub registry: Registry,
    /// Charges by type (cob/cobv) and outcome.
    pub charges_total: CounterVec,
    /// Outbound provider requests by method and outcome.
    pub upstream_requests_total: CounterVec,
    /// HTTP calls consumed per provider request, including retries.
    pub upstream_attempts: HistogramVec,
    /// Retries by reason (server_error, network, tls_trust, unauthorized).
    pub retry_attempts_total: CounterVec,
    /// Token exchanges actually performed (cache misses).
    pub token_refreshes_total: CounterVec,
    pub app_uptime_seconds: Gauge,
    pub start_time: Instant,
}

impl PixMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let charges_total = CounterVec::new(
            Opts::new("pix_charges_total", "PIX charges by type and outcome"),
            &["tipo", "outcome"],
        )?;

        let upstream_requests_total = CounterVec::new(
            Opts::new(
                "pix_upstream_requests_total",
                "Provider requests by method and outcome",
            ),
            &["method", "outcome"],
        )?;

        let upstream_attempts = HistogramVec::new(
            HistogramOpts::new(
                "pix_upstream_attempts",
                "HTTP calls consumed per provider request",
            )
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            &["method"],
        )?;

        let retry_attempts_total = CounterVec::new(
            Opts::new("pix_retry_attempts_total", "Provider retries by reason"),
            &["reason"],
        )?;

        let token_refreshes_total = CounterVec::new(
            Opts::new("pix_token_refreshes_total", "Token exchanges by outcome"),
            &["outcome"],
        )?;

        let app_uptime_seconds =
            Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;

        registry.register(Box::new(charges_total.clone()))?;
        registry.register(Box::new(upstream_requests_total.clone()))?;
        registry.register(Box::new(upstream_attempts.clone()))?;
        registry.register(Box::new(retry_attempts_total.clone()))?;
        registry.register(Box::new(token_refreshes_total.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;

        Ok(Self {
            registry,
            charges_total,
            upstream_requests_total,
            upstream_attempts,
            retry_attempts_total,
            token_refreshes_total,
            app_uptime_seconds,
            start_time: Instant::now(),
        })
    }

    pub fn record_charge(&self, tipo: &str, outcome: &str) {
        self.charges_total.with_label_values(&[tipo, outcome]).inc();
    }

    pub fn record_upstream(&self, method: &str, outcome: &str, attempts: usize) {
        self.upstream_requests_total
            .with_label_values(&[method, outcome])
            .inc();
        self.upstream_attempts
            .with_label_values(&[method])
            .observe(attempts as f64);
    }

    pub fn record_retry(&self, reason: &str) {
        self.retry_attempts_total.with_label_values(&[reason]).inc();
    }

    pub fn record_token_refresh(&self, outcome: &str) {
        self.token_refreshes_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        self.app_uptime_seconds
            .set(self.start_time.elapsed().as_secs_f64());
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}
