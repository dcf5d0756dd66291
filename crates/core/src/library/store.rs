//! Repository trait for library entities.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::release::CandidateRelease;

use super::{
    Download, Movie, MovieFile, MovieRequest, Season, SeasonFile, SeasonRequest, Show,
};

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Entity not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A unique constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl RepositoryError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Storage for media items, requests, downloads, file slots, and search results.
///
/// `save_*` inserts or updates by id; `add_*` file slots reject duplicates
/// with [`RepositoryError::Conflict`].
pub trait MediaRepository: Send + Sync {
    // Movies

    /// Insert a movie. A duplicate (provider, external id) is a conflict.
    fn add_movie(&self, movie: &Movie) -> Result<(), RepositoryError>;
    fn get_movie(&self, id: &str) -> Result<Movie, RepositoryError>;
    fn list_movies(&self) -> Result<Vec<Movie>, RepositoryError>;

    // Shows

    /// Insert a show with its seasons and episodes. A duplicate (provider, external id) is a conflict.
    fn add_show(&self, show: &Show) -> Result<(), RepositoryError>;
    fn get_show(&self, id: &str) -> Result<Show, RepositoryError>;
    fn list_shows(&self) -> Result<Vec<Show>, RepositoryError>;
    fn get_season(&self, season_id: &str) -> Result<Season, RepositoryError>;
    fn get_show_by_season(&self, season_id: &str) -> Result<Show, RepositoryError>;

    // Requests

    fn save_movie_request(&self, request: &MovieRequest) -> Result<(), RepositoryError>;
    fn get_movie_request(&self, id: &str) -> Result<MovieRequest, RepositoryError>;
    fn list_movie_requests(&self) -> Result<Vec<MovieRequest>, RepositoryError>;
    fn delete_movie_request(&self, id: &str) -> Result<(), RepositoryError>;

    fn save_season_request(&self, request: &SeasonRequest) -> Result<(), RepositoryError>;
    fn get_season_request(&self, id: &str) -> Result<SeasonRequest, RepositoryError>;
    fn list_season_requests(&self) -> Result<Vec<SeasonRequest>, RepositoryError>;
    fn delete_season_request(&self, id: &str) -> Result<(), RepositoryError>;

    // Downloads

    fn save_download(&self, download: &Download) -> Result<(), RepositoryError>;
    fn get_download(&self, id: &str) -> Result<Download, RepositoryError>;
    fn list_downloads(&self) -> Result<Vec<Download>, RepositoryError>;
    /// Delete a download and every file slot referencing it.
    fn delete_download(&self, id: &str) -> Result<(), RepositoryError>;

    // File slots

    fn add_movie_file(&self, file: &MovieFile) -> Result<(), RepositoryError>;
    fn movie_files(&self, movie_id: &str) -> Result<Vec<MovieFile>, RepositoryError>;
    fn movie_files_of_download(&self, download_id: &str) -> Result<Vec<MovieFile>, RepositoryError>;

    fn add_season_file(&self, file: &SeasonFile) -> Result<(), RepositoryError>;
    fn season_files(&self, season_id: &str) -> Result<Vec<SeasonFile>, RepositoryError>;
    fn season_files_of_download(&self, download_id: &str)
        -> Result<Vec<SeasonFile>, RepositoryError>;

    // Search results

    fn save_candidate(&self, candidate: &CandidateRelease) -> Result<(), RepositoryError>;
    fn get_candidate(&self, id: &str) -> Result<CandidateRelease, RepositoryError>;

    /// Delete candidates saved before `older_than`; returns how many went.
    fn prune_candidates(&self, older_than: DateTime<Utc>) -> Result<usize, RepositoryError>;
}
