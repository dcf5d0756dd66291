use async_trait::async_trait;
use thiserror::Error;

use crate::hash::HashResolutionError;
use crate::library::{Download, DownloadStatus};
use crate::release::CandidateRelease;

/// Errors from download client backends.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Download rejected: {0}")]
    Rejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Hash resolution failed: {0}")]
    HashResolution(#[from] HashResolutionError),

    /// No backend is configured for this kind of download.
    #[error("No {0} download client configured")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for DownloadClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadClientError::Timeout
        } else if e.is_connect() {
            DownloadClientError::ConnectionFailed(e.to_string())
        } else {
            DownloadClientError::ApiError(e.to_string())
        }
    }
}

/// A download client backend.
///
/// Every operation targets one download; backends translate their native
/// state vocabulary into [`DownloadStatus`].
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Backend name for logging and metrics.
    fn name(&self) -> &str;

    /// Hand a release to the backend. The returned download carries the
    /// backend identifier and its initial status.
    async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError>;

    /// Remove a download, optionally deleting its data.
    async fn remove(&self, download: &Download, delete_data: bool)
        -> Result<(), DownloadClientError>;

    /// Query the backend for the current status.
    async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError>;

    async fn pause(&self, download: &Download) -> Result<(), DownloadClientError>;

    async fn resume(&self, download: &Download) -> Result<(), DownloadClientError>;

    /// Check that the backend is reachable and credentials work.
    async fn check_connection(&self) -> Result<(), DownloadClientError>;
}
