//! Types for the acquisition pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download_client::DownloadClientError;
use crate::importer::ImportError;
use crate::library::RepositoryError;
use crate::metadata::MetadataError;

/// Errors that can occur in pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unknown id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Duplicate media item, request, or file slot.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request has not been authorized for download.
    #[error("request {0} is not authorized for download")]
    Unauthorized(String),

    /// No backend or provider of the required kind is configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("repository error: {0}")]
    Repository(RepositoryError),

    #[error("download client error: {0}")]
    DownloadClient(DownloadClientError),

    #[error("import error: {0}")]
    Import(#[from] ImportError),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),
}

impl PipelineError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PipelineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<RepositoryError> for PipelineError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { kind, id } => PipelineError::NotFound { kind, id },
            RepositoryError::Conflict(message) => PipelineError::Conflict(message),
            other => PipelineError::Repository(other),
        }
    }
}

impl From<DownloadClientError> for PipelineError {
    fn from(e: DownloadClientError) -> Self {
        match e {
            DownloadClientError::NotConfigured(_) => PipelineError::NotConfigured(e.to_string()),
            other => PipelineError::DownloadClient(other),
        }
    }
}

impl From<MetadataError> for PipelineError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(id) => PipelineError::NotFound {
                kind: "metadata",
                id,
            },
            MetadataError::NotConfigured(message) => PipelineError::NotConfigured(message),
            other => PipelineError::Metadata(other),
        }
    }
}

/// The media unit a search or download is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MediaTarget {
    Movie(String),
    Season(String),
}

impl MediaTarget {
    pub fn is_tv(&self) -> bool {
        matches!(self, MediaTarget::Season(_))
    }

    pub fn id(&self) -> &str {
        match self {
            MediaTarget::Movie(id) | MediaTarget::Season(id) => id,
        }
    }
}

impl fmt::Display for MediaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaTarget::Movie(id) => write!(f, "movie {}", id),
            MediaTarget::Season(id) => write!(f, "season {}", id),
        }
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items that completed.
    pub processed: usize,
    /// Items that failed and were skipped.
    pub failed: usize,
}
