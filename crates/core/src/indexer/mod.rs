//! Indexer clients.
//!
//! This module provides an `Indexer` trait for searching releases on
//! external indexers, with one implementation per backend protocol:
//! Torznab XML (Jackett) and JSON REST (Prowlarr).

mod prowlarr;
mod redirect;
mod torznab;

pub use prowlarr::ProwlarrIndexer;
pub use redirect::{follow_redirects, RedirectError, MAX_REDIRECTS};
pub use torznab::{parse_torznab_feed, JackettIndexer};

use async_trait::async_trait;
use thiserror::Error;

use crate::release::CandidateRelease;

/// Errors that can occur while querying an indexer.
#[derive(Debug, Clone, Error)]
pub enum IndexerError {
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Connection to the indexer failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Indexer returned an error response.
    #[error("API error: {0}")]
    ApiError(String),

    /// Response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Every sub-indexer failed.
    #[error("All sub-indexers failed: {0}")]
    AllFailed(String),
}

impl From<reqwest::Error> for IndexerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IndexerError::Timeout
        } else if e.is_connect() {
            IndexerError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            IndexerError::Parse(e.to_string())
        } else {
            IndexerError::ApiError(e.to_string())
        }
    }
}

/// Search backend for one indexer service.
///
/// Implementations must absorb failures of individual sub-targets and only
/// return `Err` when nothing could be queried at all.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Name used in logs, notifications, and metrics.
    fn name(&self) -> &str;

    /// Search for `query`, using TV or movie categories.
    async fn search(&self, query: &str, is_tv: bool) -> Result<Vec<CandidateRelease>, IndexerError>;
}

/// Newznab category code for the search type.
pub(crate) fn category_code(is_tv: bool) -> &'static str {
    if is_tv {
        "5000"
    } else {
        "2000"
    }
}
