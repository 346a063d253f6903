//! # Prometheus Metrics
//!
//! Operational metrics for the relayer, scraped at `/metrics` on the
//! configured metrics port. All metrics live in a dedicated
//! [`prometheus::Registry`] so they never collide with a default global
//! registry consumer.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the relayer.
///
/// Clone-friendly (prometheus handles are internally reference-counted)
/// so it can be shared across relay loops and request handlers.
#[derive(Clone)]
pub struct RelayerMetrics {
    /// Registry that owns all metrics below.
    registry: Registry,
    /// Hub domain height as of the last observation.
    pub hub_height: IntGauge,
    /// Spoke domain height as of the last observation.
    pub spoke_height: IntGauge,
    /// Total events read from domain logs across all relay loops.
    pub events_processed_total: IntCounter,
    /// Total hub-position syncs pushed to the spoke minter.
    pub position_syncs_total: IntCounter,
    /// Total bridge completions applied.
    pub transfers_completed_total: IntCounter,
    /// Completions rejected as already-processed (the at-least-once
    /// retry case working as intended).
    pub duplicate_completions_total: IntCounter,
    /// Delivery attempts that were retried after a transport failure.
    pub relay_retries_total: IntCounter,
    /// Heartbeats emitted.
    pub heartbeats_total: IntCounter,
    /// End-to-end latency of one relayed delivery, in seconds.
    pub relay_latency_seconds: Histogram,
}

impl RelayerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("usdx".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
            let g = IntGauge::new(name, help).expect("metric creation");
            registry.register(Box::new(g.clone())).expect("metric registration");
            g
        }

        let hub_height = gauge(&registry, "hub_height", "Hub domain height at last observation");
        let spoke_height = gauge(
            &registry,
            "spoke_height",
            "Spoke domain height at last observation",
        );
        let events_processed_total = counter(
            &registry,
            "events_processed_total",
            "Events read from domain logs by the relay loops",
        );
        let position_syncs_total = counter(
            &registry,
            "position_syncs_total",
            "Hub position snapshots pushed to the spoke minter",
        );
        let transfers_completed_total = counter(
            &registry,
            "transfers_completed_total",
            "Bridge transfer completions applied",
        );
        let duplicate_completions_total = counter(
            &registry,
            "duplicate_completions_total",
            "Completions rejected as already processed",
        );
        let relay_retries_total = counter(
            &registry,
            "relay_retries_total",
            "Deliveries retried after a transport failure",
        );
        let heartbeats_total = counter(&registry, "heartbeats_total", "Heartbeats emitted");

        let relay_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "relay_latency_seconds",
                "End-to-end latency of one relayed delivery in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(relay_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            hub_height,
            spoke_height,
            events_processed_total,
            position_syncs_total,
            transfers_completed_total,
            duplicate_completions_total,
            relay_retries_total,
            heartbeats_total,
            relay_latency_seconds,
        }
    }

    /// Encodes all registered metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for RelayerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed to relay loops and axum handlers.
pub type SharedMetrics = Arc<RelayerMetrics>;

/// Axum handler rendering `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_encode() {
        let metrics = RelayerMetrics::new();
        metrics.transfers_completed_total.inc();
        metrics.hub_height.set(42);

        let text = metrics.encode().expect("encode");
        assert!(text.contains("usdx_transfers_completed_total"));
        assert!(text.contains("usdx_hub_height 42"));
    }
}
