//! Prometheus metrics for advisor-gateway.
//!
//! Provides HTTP, provider and guardrail metrics for observability.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    provider_requests_total: IntCounterVec,
    provider_latency_seconds: HistogramVec,
    provider_tokens_total: IntCounterVec,
    guardrail_blocks_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["method", "path"],
    )?;

    // outcome: success or a ProviderError kind
    let provider_requests_total = IntCounterVec::new(
        Opts::new("advisor_provider_requests_total", "Total LLM provider calls"),
        &["provider", "outcome"],
    )?;

    let provider_latency_seconds = HistogramVec::new(
        HistogramOpts::new(
            "advisor_provider_latency_seconds",
            "LLM provider latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider"],
    )?;

    let provider_tokens_total = IntCounterVec::new(
        Opts::new("advisor_provider_tokens_total", "Tokens reported by the provider"),
        &["provider", "type"], // type: input, output
    )?;

    let guardrail_blocks_total = IntCounterVec::new(
        Opts::new(
            "advisor_guardrail_blocks_total",
            "Queries refused before reaching the provider",
        ),
        &["guard"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(provider_requests_total.clone()))?;
    registry.register(Box::new(provider_latency_seconds.clone()))?;
    registry.register(Box::new(provider_tokens_total.clone()))?;
    registry.register(Box::new(guardrail_blocks_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        provider_requests_total,
        provider_latency_seconds,
        provider_tokens_total,
        guardrail_blocks_total,
    })
}

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = build()?;
    if METRICS.set(metrics).is_ok() {
        tracing::info!("Prometheus metrics initialized");
    }
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let Some(metrics) = METRICS.get() else {
        tracing::error!("Metrics registry not initialized");
        return "# Metrics registry not initialized\n".to_string();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        m.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// Record one provider call and how it ended.
pub fn record_provider_call(provider: &str, outcome: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.provider_requests_total
            .with_label_values(&[provider, outcome])
            .inc();
        m.provider_latency_seconds
            .with_label_values(&[provider])
            .observe(duration_secs);
    }
}

/// Record token usage reported by the provider.
pub fn record_tokens(provider: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(m) = METRICS.get() {
        m.provider_tokens_total
            .with_label_values(&[provider, "input"])
            .inc_by(input_tokens.max(0) as u64);
        m.provider_tokens_total
            .with_label_values(&[provider, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record a guardrail refusal.
pub fn record_guardrail_block(guard: &str) {
    if let Some(m) = METRICS.get() {
        m.guardrail_blocks_total.with_label_values(&[guard]).inc();
    }
}
