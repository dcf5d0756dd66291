//! Library entities: media items, requests, downloads, and file slots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::release::Quality;

/// Library name used when a media item is not assigned anywhere else.
pub const DEFAULT_LIBRARY: &str = "Default";

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A movie in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub external_id: i64,
    pub metadata_provider: String,
    pub name: String,
    pub overview: String,
    pub year: Option<i32>,
    pub library: String,
}

impl Movie {
    pub fn new(
        external_id: i64,
        metadata_provider: impl Into<String>,
        name: impl Into<String>,
        year: Option<i32>,
    ) -> Self {
        Self {
            id: new_id(),
            external_id,
            metadata_provider: metadata_provider.into(),
            name: name.into(),
            overview: String::new(),
            year,
            library: DEFAULT_LIBRARY.to_string(),
        }
    }
}

/// A TV show with its seasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub external_id: i64,
    pub metadata_provider: String,
    pub name: String,
    pub overview: String,
    pub year: Option<i32>,
    pub ended: bool,
    pub continuous_download: bool,
    pub library: String,
    pub seasons: Vec<Season>,
}

impl Show {
    pub fn new(
        external_id: i64,
        metadata_provider: impl Into<String>,
        name: impl Into<String>,
        year: Option<i32>,
    ) -> Self {
        Self {
            id: new_id(),
            external_id,
            metadata_provider: metadata_provider.into(),
            name: name.into(),
            overview: String::new(),
            year,
            ended: false,
            continuous_download: false,
            library: DEFAULT_LIBRARY.to_string(),
            seasons: Vec::new(),
        }
    }

    /// Append a season with `episode_count` numbered episodes.
    pub fn with_season(mut self, number: u32, episode_count: u32) -> Self {
        let mut season = Season::new(&self.id, number, format!("Season {}", number), 0);
        season.episodes = (1..=episode_count)
            .map(|n| Episode::new(&season.id, n, format!("Episode {}", n), 0))
            .collect();
        self.seasons.push(season);
        self
    }

    pub fn season_by_number(&self, number: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.number == number)
    }

    pub fn season(&self, season_id: &str) -> Option<&Season> {
        self.seasons.iter().find(|s| s.id == season_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: String,
    pub show_id: String,
    pub number: u32,
    pub name: String,
    pub overview: String,
    pub external_id: i64,
    pub episodes: Vec<Episode>,
}

impl Season {
    pub fn new(show_id: &str, number: u32, name: impl Into<String>, external_id: i64) -> Self {
        Self {
            id: new_id(),
            show_id: show_id.to_string(),
            number,
            name: name.into(),
            overview: String::new(),
            external_id,
            episodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub season_id: String,
    pub number: u32,
    pub external_id: i64,
    pub title: String,
}

impl Episode {
    pub fn new(season_id: &str, number: u32, title: impl Into<String>, external_id: i64) -> Self {
        Self {
            id: new_id(),
            season_id: season_id.to_string(),
            number,
            external_id,
            title: title.into(),
        }
    }
}

/// A user request to acquire a movie within a quality window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRequest {
    pub id: String,
    pub movie_id: String,
    /// Worst acceptable quality.
    pub min_quality: Quality,
    /// Best desired quality. Never below `min_quality`.
    pub wanted_quality: Quality,
    pub authorized: bool,
    pub requested_by: Option<String>,
    pub authorized_by: Option<String>,
}

impl MovieRequest {
    pub fn new(movie_id: impl Into<String>, min_quality: Quality, wanted_quality: Quality) -> Self {
        Self {
            id: new_id(),
            movie_id: movie_id.into(),
            min_quality,
            wanted_quality,
            authorized: false,
            requested_by: None,
            authorized_by: None,
        }
    }
}

/// A user request to acquire a season within a quality window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRequest {
    pub id: String,
    pub season_id: String,
    pub min_quality: Quality,
    pub wanted_quality: Quality,
    pub authorized: bool,
    pub requested_by: Option<String>,
    pub authorized_by: Option<String>,
}

impl SeasonRequest {
    pub fn new(season_id: impl Into<String>, min_quality: Quality, wanted_quality: Quality) -> Self {
        Self {
            id: new_id(),
            season_id: season_id.into(),
            min_quality,
            wanted_quality,
            authorized: false,
            requested_by: None,
            authorized_by: None,
        }
    }
}

/// Whether `quality` lies inside the request window `min..=wanted`.
pub fn quality_in_window(quality: Quality, min: Quality, wanted: Quality) -> bool {
    min <= quality && quality <= wanted
}

/// Normalized download client status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Unknown,
    Downloading,
    Finished,
    Error,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Unknown => "unknown",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Finished => "finished",
            DownloadStatus::Error => "error",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(DownloadStatus::Unknown),
            "downloading" => Ok(DownloadStatus::Downloading),
            "finished" => Ok(DownloadStatus::Finished),
            "error" => Ok(DownloadStatus::Error),
            other => Err(format!("unknown download status: {}", other)),
        }
    }
}

/// A release submitted to a download client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub id: String,
    pub status: DownloadStatus,
    pub title: String,
    pub quality: Quality,
    /// Set once the import engine placed at least one file. Never reset.
    pub imported: bool,
    /// Info-hash for torrents, job id for usenet.
    pub hash: String,
    pub usenet: bool,
}

impl Download {
    pub fn new(title: impl Into<String>, quality: Quality, hash: impl Into<String>, usenet: bool) -> Self {
        Self {
            id: new_id(),
            status: DownloadStatus::Unknown,
            title: title.into(),
            quality,
            imported: false,
            hash: hash.into(),
            usenet,
        }
    }
}

/// Binds a movie to a delivered file at one quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieFile {
    pub movie_id: String,
    pub quality: Quality,
    /// `None` when the file was placed outside this pipeline.
    pub download_id: Option<String>,
    pub file_path_suffix: String,
}

/// Binds a season to a delivered file at one quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonFile {
    pub season_id: String,
    pub quality: Quality,
    pub download_id: Option<String>,
    pub file_path_suffix: String,
}
