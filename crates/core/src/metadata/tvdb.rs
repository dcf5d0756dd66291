//! TVDB metadata provider.
//!
//! TVDB is queried through a metadata relay that owns the API key and
//! returns the unwrapped `data` payload of the TVDB v4 API.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::TvdbConfig;
use crate::library::{Episode, Movie, Season, Show};

use super::{MetadataError, MetadataProvider, SearchHit};

const PROVIDER: &str = "tvdb";

/// TVDB season type of the aired order.
const AIRED_ORDER: i64 = 1;

/// TVDB-backed metadata provider.
pub struct TvdbProvider {
    client: Client,
    relay_url: String,
    image_directory: PathBuf,
}

impl TvdbProvider {
    pub fn new(config: TvdbConfig, image_directory: impl Into<PathBuf>) -> Result<Self, MetadataError> {
        if config.relay_url.trim().is_empty() {
            return Err(MetadataError::NotConfigured(
                "TVDB relay URL is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            relay_url: config.relay_url.trim_end_matches('/').to_string(),
            image_directory: image_directory.into(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.relay_url, path);
        debug!(url = %url, "TVDB request");

        let response = self.client.get(&url).query(query).send().await?;
        let response = check_status(response, path).await?;

        response
            .json()
            .await
            .map_err(|e| MetadataError::Parse(format!("{}: {}", path, e)))
    }

    async fn fetch_poster(&self, path: &str, media_id: &str) -> Result<bool, MetadataError> {
        let record: ImageOnly = self.get(path, &[]).await?;
        let Some(image) = record.image.filter(|i| !i.is_empty()) else {
            return Ok(false);
        };

        let response = self.client.get(&image).send().await?;
        let bytes = check_status(response, &image).await?.bytes().await?;

        let target = self.image_directory.join(format!("{}.jpg", media_id));
        tokio::fs::create_dir_all(&self.image_directory).await?;
        tokio::fs::write(&target, &bytes).await?;

        info!(path = %target.display(), "Stored poster");
        Ok(true)
    }

    /// Search results of `kind` ("series" or "movie"); trending lists carry no type.
    async fn search(
        &self,
        prefix: &str,
        kind: &str,
        query: Option<&str>,
    ) -> Result<Vec<SearchHit>, MetadataError> {
        let results: Vec<SearchRecord> = match query {
            Some(q) => self.get(&format!("/{}/search", prefix), &[("query", q)]).await?,
            None => self.get(&format!("/{}/trending", prefix), &[]).await?,
        };

        let hits = results
            .into_iter()
            .filter(|r| r.kind.as_deref().map_or(true, |k| k == kind))
            .filter_map(|r| {
                let hit = r.into_hit();
                if hit.is_none() {
                    warn!(kind = kind, "Skipping TVDB result without a usable id");
                }
                hit
            })
            .collect();
        Ok(hits)
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, MetadataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        404 => Err(MetadataError::NotFound(what.to_string())),
        429 => Err(MetadataError::RateLimitExceeded),
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(MetadataError::ApiError {
                status: code,
                message: body,
            })
        }
    }
}

#[async_trait]
impl MetadataProvider for TvdbProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_movie(&self, external_id: i64) -> Result<Movie, MetadataError> {
        let record: MovieRecord = self.get(&format!("/movies/{}", external_id), &[]).await?;
        Ok(record.into())
    }

    async fn get_show(&self, external_id: i64) -> Result<Show, MetadataError> {
        let series: SeriesRecord = self.get(&format!("/tv/shows/{}", external_id), &[]).await?;

        // Alternate orders (DVD, absolute) repeat season numbers of the aired order.
        let aired = series
            .seasons
            .iter()
            .filter(|s| s.kind.as_ref().map_or(true, |t| t.id == AIRED_ORDER))
            .map(|s| {
                let path = format!("/tv/seasons/{}", s.id);
                async move { self.get::<SeasonRecord>(&path, &[]).await }
            });
        let seasons = try_join_all(aired).await?;

        Ok(series.into_show(seasons))
    }

    async fn search_movies(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        self.search("movies", "movie", query).await
    }

    async fn search_shows(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        self.search("tv", "series", query).await
    }

    async fn download_poster(&self, external_id: i64, is_tv: bool, media_id: &str) -> bool {
        let path = if is_tv {
            format!("/tv/shows/{}", external_id)
        } else {
            format!("/movies/{}", external_id)
        };
        match self.fetch_poster(&path, media_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(external_id, error = %e, "Failed to download poster");
                false
            }
        }
    }
}

// ============================================================================
// Relay Response Types (private)
// ============================================================================

/// TVDB mixes numeric and string encodings for ids and years.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(i64),
    Text(String),
}

impl Loose {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Number(n) => Some(*n),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn year(value: Option<&Loose>) -> Option<i32> {
    value
        .and_then(Loose::as_i64)
        .and_then(|y| i32::try_from(y).ok())
}

#[derive(Debug, Deserialize)]
struct SearchRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    tvdb_id: Option<Loose>,
    id: Option<Loose>,
    name: Option<String>,
    overview: Option<String>,
    year: Option<Loose>,
    image_url: Option<String>,
    image: Option<String>,
}

impl SearchRecord {
    fn into_hit(self) -> Option<SearchHit> {
        let external_id = self
            .tvdb_id
            .as_ref()
            .and_then(Loose::as_i64)
            .or_else(|| self.id.as_ref().and_then(Loose::as_i64))?;
        Some(SearchHit {
            external_id,
            metadata_provider: PROVIDER.to_string(),
            name: self.name.unwrap_or_default(),
            year: year(self.year.as_ref()),
            overview: self.overview.unwrap_or_default(),
            poster_url: self.image_url.or(self.image).filter(|u| !u.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ImageOnly {
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieRecord {
    id: i64,
    name: String,
    year: Option<Loose>,
}

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    id: i64,
    name: String,
    overview: Option<String>,
    year: Option<Loose>,
    status: Option<Status>,
    #[serde(default)]
    seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct Status {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonType {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SeasonSummary {
    id: i64,
    #[serde(rename = "type")]
    kind: Option<SeasonType>,
}

#[derive(Debug, Deserialize)]
struct SeasonRecord {
    id: i64,
    number: u32,
    #[serde(default)]
    episodes: Vec<EpisodeRecord>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRecord {
    id: i64,
    number: u32,
    name: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<MovieRecord> for Movie {
    fn from(r: MovieRecord) -> Self {
        Movie::new(r.id, PROVIDER, r.name, year(r.year.as_ref()))
    }
}

impl SeriesRecord {
    fn into_show(self, seasons: Vec<SeasonRecord>) -> Show {
        let mut show = Show::new(self.id, PROVIDER, self.name, year(self.year.as_ref()));
        show.overview = self.overview.unwrap_or_default();
        show.ended = matches!(
            self.status.and_then(|s| s.name).as_deref(),
            Some("Ended") | Some("Canceled")
        );

        show.seasons = seasons
            .into_iter()
            .map(|s| {
                let name = format!("Season {}", s.number);
                let mut season = Season::new(&show.id, s.number, name, s.id);
                season.episodes = s
                    .episodes
                    .into_iter()
                    .map(|e| {
                        let title = e.name.unwrap_or_else(|| format!("Episode {}", e.number));
                        Episode::new(&season.id, e.number, title, e.id)
                    })
                    .collect();
                season
            })
            .collect();
        show
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_relay_url() {
        let config = TvdbConfig {
            relay_url: "  ".to_string(),
        };
        assert!(matches!(
            TvdbProvider::new(config, "/tmp"),
            Err(MetadataError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_search_record_accepts_string_ids() {
        let record: SearchRecord = serde_json::from_str(
            r#"{"type": "series", "tvdb_id": "81189", "name": "Breaking Bad", "year": "2008",
                "image_url": "https://artworks.example/bb.jpg"}"#,
        )
        .unwrap();

        let hit = record.into_hit().unwrap();
        assert_eq!(hit.external_id, 81189);
        assert_eq!(hit.year, Some(2008));
        assert_eq!(hit.metadata_provider, "tvdb");
        assert_eq!(hit.poster_url.as_deref(), Some("https://artworks.example/bb.jpg"));

        let missing: SearchRecord = serde_json::from_str(r#"{"name": "No Id"}"#).unwrap();
        assert!(missing.into_hit().is_none());
    }

    #[test]
    fn test_series_conversion() {
        let series: SeriesRecord = serde_json::from_str(
            r#"{"id": 81189, "name": "Breaking Bad", "year": "2008", "overview": "Chemistry.",
                "status": {"name": "Ended"}, "seasons": []}"#,
        )
        .unwrap();
        let season: SeasonRecord = serde_json::from_str(
            r#"{"id": 30272, "number": 1, "episodes": [
                {"id": 349232, "number": 1, "name": "Pilot"},
                {"id": 349235, "number": 2, "name": null}]}"#,
        )
        .unwrap();

        let show = series.into_show(vec![season]);
        assert!(show.ended);
        assert_eq!(show.year, Some(2008));
        assert_eq!(show.overview, "Chemistry.");

        let season = show.season_by_number(1).unwrap();
        assert_eq!(season.name, "Season 1");
        assert_eq!(season.show_id, show.id);
        assert_eq!(season.episodes[0].title, "Pilot");
        assert_eq!(season.episodes[1].title, "Episode 2");
    }
}
