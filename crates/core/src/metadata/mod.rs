//! Metadata providers for movies and shows.
//!
//! A provider turns an external id into a library record (shows come with
//! their seasons and episodes), searches its catalog, and fetches posters.

mod tmdb;
mod tvdb;

pub use tmdb::TmdbProvider;
pub use tvdb::TvdbProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::{Movie, Show};

/// Errors that can occur when talking to a metadata provider.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing API key or similar.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// A catalog search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub external_id: i64,
    pub metadata_provider: String,
    pub name: String,
    pub year: Option<i32>,
    pub overview: String,
    pub poster_url: Option<String>,
}

/// Source of movie and show metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name stored on library records (e.g. "tmdb").
    fn name(&self) -> &str;

    async fn get_movie(&self, external_id: i64) -> Result<Movie, MetadataError>;

    /// Fetch a show with all of its seasons and episodes.
    async fn get_show(&self, external_id: i64) -> Result<Show, MetadataError>;

    /// Search movies; `None` lists what is currently trending.
    async fn search_movies(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError>;

    /// Search shows; `None` lists what is currently trending.
    async fn search_shows(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError>;

    /// Store the poster of a media item under its library id.
    ///
    /// Returns whether a poster was written. Failures are logged, not raised.
    async fn download_poster(&self, external_id: i64, is_tv: bool, media_id: &str) -> bool;
}

/// Year of an ISO `YYYY-MM-DD` date.
pub(crate) fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}
