//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search (searches, indexer failures, candidates)
//! - Downloads (submissions, status refreshes)
//! - Import (placed files, failed imports)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Search
// =============================================================================

/// Searches total by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarr_searches_total", "Total release searches"),
        &["result"], // "results", "empty"
    )
    .unwrap()
});

/// Indexer failures by indexer.
pub static INDEXER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarr_indexer_failures_total",
            "Total failed indexer queries",
        ),
        &["indexer"],
    )
    .unwrap()
});

/// Candidates returned per search.
pub static CANDIDATES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediarr_candidates_found",
            "Number of candidates returned per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Downloads
// =============================================================================

/// Downloads submitted by backend.
pub static DOWNLOADS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarr_downloads_submitted_total",
            "Total downloads submitted to a download client",
        ),
        &["client"],
    )
    .unwrap()
});

/// Download client call failures by backend and operation.
pub static DOWNLOAD_CLIENT_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarr_download_client_errors_total",
            "Total failed download client operations",
        ),
        &["client", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Import
// =============================================================================

/// Files placed into libraries by kind.
pub static FILES_IMPORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarr_files_imported_total", "Total files placed into libraries"),
        &["kind"], // "video", "subtitle"
    )
    .unwrap()
});

/// Import attempts by media type and result.
pub static IMPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarr_imports_total", "Total download import attempts"),
        &["media", "result"], // media: "movie", "season"; result: "imported", "incomplete", "failed"
    )
    .unwrap()
});

/// All core metrics, for registration in a process registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCHES.clone()),
        Box::new(INDEXER_FAILURES.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        Box::new(DOWNLOADS_SUBMITTED.clone()),
        Box::new(DOWNLOAD_CLIENT_ERRORS.clone()),
        Box::new(FILES_IMPORTED.clone()),
        Box::new(IMPORTS.clone()),
    ]
}
