//! Prometheus metrics for core components.
//!
//! - Search (fan-out outcomes, per-indexer failures, latency)
//! - Acquisitions (lifecycle outcomes, client polling)
//! - Import (jobs, placements by method, per-file errors)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

// =============================================================================
// Search
// =============================================================================

/// Aggregated searches by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_searches_total", "Aggregated searches"),
        &["result"], // "ok", "partial", "failed"
    )
    .unwrap()
});

/// Indexer failures (errors and timeouts) during fan-out.
pub static INDEXER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_indexer_failures_total", "Indexer search failures"),
        &["indexer"],
    )
    .unwrap()
});

pub static SEARCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "grabarr_search_duration_seconds",
            "Wall time of an aggregated search",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
    )
    .unwrap()
});

pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "grabarr_search_results",
            "Results returned per aggregated search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
    )
    .unwrap()
});

// =============================================================================
// Acquisitions
// =============================================================================

/// Acquisition lifecycle events.
pub static ACQUISITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_acquisitions_total", "Acquisition lifecycle events"),
        &["outcome"], // "initiated", "completed", "failed", "missing", "cancelled"
    )
    .unwrap()
});

/// Duration of one monitor poll across all clients.
pub static POLL_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "grabarr_monitor_poll_duration_seconds",
            "Duration of one acquisition monitor poll",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

pub static CLIENT_POLL_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "grabarr_client_poll_failures_total",
            "Download client status polls that failed",
        ),
        &["client"],
    )
    .unwrap()
});

// =============================================================================
// Import
// =============================================================================

/// Import jobs by result.
pub static IMPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_imports_total", "Import jobs"),
        &["result"], // "imported", "partial", "failed", "skipped"
    )
    .unwrap()
});

/// Files placed into the library by method.
pub static PLACEMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabarr_placements_total", "Files placed into the library"),
        &["method"], // "hardlink", "move", "copy"
    )
    .unwrap()
});

pub static IMPORT_FILE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "grabarr_import_file_errors_total",
            "Per-file import errors",
        ),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES.clone()),
        Box::new(INDEXER_FAILURES.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Acquisitions
        Box::new(ACQUISITIONS.clone()),
        Box::new(POLL_DURATION.clone()),
        Box::new(CLIENT_POLL_FAILURES.clone()),
        // Import
        Box::new(IMPORTS.clone()),
        Box::new(PLACEMENTS.clone()),
        Box::new(IMPORT_FILE_ERRORS.clone()),
    ]
}
