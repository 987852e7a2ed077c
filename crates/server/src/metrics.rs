//! Prometheus metrics for the HTTP server.
//!
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Acquisition gauges collected from the ledger on scrape

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use grabarr_core::ledger::LedgerFilter;
use grabarr_core::AcquisitionStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "grabarr_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabarr_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabarr_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabarr_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by event kind.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// Client fell behind the event channel.
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabarr_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Acquisition Metrics (collected dynamically)
// =============================================================================

pub static ACQUISITIONS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "grabarr_acquisitions_by_status",
            "Current acquisition count by status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Monitor running state (1 = running, 0 = stopped).
pub static MONITOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabarr_monitor_running",
        "Whether the acquisition monitor is running (1) or stopped (0)",
    )
    .unwrap()
});

pub static IMPORTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("grabarr_imports_in_flight", "Import jobs currently running").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Acquisitions
    registry
        .register(Box::new(ACQUISITIONS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(MONITOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(IMPORTS_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (search, acquisitions, import)
    for metric in grabarr_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.monitor() {
        Some(monitor) => {
            let status = monitor.status();
            MONITOR_RUNNING.set(if status.running { 1 } else { 0 });
            IMPORTS_IN_FLIGHT.set(status.imports_in_flight as i64);
        }
        None => MONITOR_RUNNING.set(0),
    }

    let filter = LedgerFilter::new().with_limit(i64::MAX);
    if let Ok(records) = state.service().list(&filter) {
        for status in AcquisitionStatus::ALL {
            let count = records.iter().filter(|r| r.status == status).count();
            ACQUISITIONS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let hash_regex = regex_lite::Regex::new(r"[0-9a-fA-F]{40}").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = hash_regex.replace_all(&result, "{hash}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/acquisitions/550e8400-e29b-41d4-a716-446655440000/retry";
        assert_eq!(normalize_path(path), "/api/v1/acquisitions/{id}/retry");
    }

    #[test]
    fn test_normalize_path_hash() {
        let path = "/api/v1/acquisitions/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        assert_eq!(normalize_path(path), "/api/v1/acquisitions/{hash}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_includes_core_and_http() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        grabarr_core::metrics::SEARCHES
            .with_label_values(&["ok"])
            .inc();
        MONITOR_RUNNING.set(0);

        let output = encode_metrics();
        assert!(output.contains("grabarr_http_requests_total"));
        assert!(output.contains("grabarr_searches_total"));
        assert!(output.contains("grabarr_monitor_running"));
        assert!(output.contains("# TYPE"));
    }
}
