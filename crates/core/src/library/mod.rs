//! Library domain: media items, requests, downloads, file slots, and their storage.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteRepository;
pub use store::{MediaRepository, RepositoryError};
pub use types::{
    quality_in_window, Download, DownloadStatus, Episode, Movie, MovieFile, MovieRequest, Season,
    SeasonFile, SeasonRequest, Show, DEFAULT_LIBRARY,
};
