//! TMDB (The Movie Database) metadata provider.
//!
//! TMDB requires an API key for access.
//! Rate limits are generous (around 40 requests per second).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::TmdbConfig;
use crate::library::{Episode, Movie, Season, Show};

use super::{year_of, MetadataError, MetadataProvider, SearchHit};

const PROVIDER: &str = "tmdb";

/// TMDB-backed metadata provider.
pub struct TmdbProvider {
    client: Client,
    base_url: String,
    api_key: String,
    image_base_url: String,
    image_directory: PathBuf,
}

impl TmdbProvider {
    /// Create a provider that stores posters in `image_directory`.
    pub fn new(config: TmdbConfig, image_directory: impl Into<PathBuf>) -> Result<Self, MetadataError> {
        if config.api_key.is_empty() {
            return Err(MetadataError::NotConfigured(
                "TMDB API key is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string());

        let image_base_url = config
            .image_base_url
            .unwrap_or_else(|| "https://image.tmdb.org/t/p".to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
            image_directory: image_directory.into(),
        })
    }

    /// GET `path` with the API key and decode the JSON body.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "TMDB request");

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;
        let response = check_status(response, path).await?;

        response
            .json()
            .await
            .map_err(|e| MetadataError::Parse(format!("{}: {}", path, e)))
    }

    async fn search(
        &self,
        kind: &str,
        query: Option<&str>,
    ) -> Result<Vec<SearchResult>, MetadataError> {
        let page: SearchResponse = match query {
            Some(q) => self.get(&format!("/search/{}", kind), &[("query", q)]).await?,
            None => self.get(&format!("/trending/{}/week", kind), &[]).await?,
        };
        Ok(page.results)
    }

    fn hit(&self, result: SearchResult) -> SearchHit {
        let date = result.release_date.or(result.first_air_date);
        SearchHit {
            external_id: result.id,
            metadata_provider: PROVIDER.to_string(),
            name: result.title.or(result.name).unwrap_or_default(),
            year: year_of(date.as_deref()),
            overview: result.overview.unwrap_or_default(),
            poster_url: result
                .poster_path
                .map(|p| format!("{}/original{}", self.image_base_url, p)),
        }
    }

    async fn poster_path(&self, external_id: i64, is_tv: bool) -> Result<Option<String>, MetadataError> {
        let path = if is_tv {
            format!("/tv/{}", external_id)
        } else {
            format!("/movie/{}", external_id)
        };
        let images: PosterOnly = self.get(&path, &[]).await?;
        Ok(images.poster_path)
    }

    async fn fetch_poster(
        &self,
        external_id: i64,
        is_tv: bool,
        media_id: &str,
    ) -> Result<bool, MetadataError> {
        let Some(poster_path) = self.poster_path(external_id, is_tv).await? else {
            return Ok(false);
        };

        let url = format!("{}/original{}", self.image_base_url, poster_path);
        let response = self.client.get(&url).send().await?;
        let bytes = check_status(response, &poster_path).await?.bytes().await?;

        let target = self.image_directory.join(format!("{}.jpg", media_id));
        tokio::fs::create_dir_all(&self.image_directory).await?;
        tokio::fs::write(&target, &bytes).await?;

        info!(path = %target.display(), "Stored poster");
        Ok(true)
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, MetadataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 => Err(MetadataError::NotConfigured(
            "Invalid TMDB API key".to_string(),
        )),
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
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_movie(&self, external_id: i64) -> Result<Movie, MetadataError> {
        let details: MovieDetails = self.get(&format!("/movie/{}", external_id), &[]).await?;
        Ok(details.into())
    }

    async fn get_show(&self, external_id: i64) -> Result<Show, MetadataError> {
        let details: TvDetails = self.get(&format!("/tv/{}", external_id), &[]).await?;

        let seasons = try_join_all(details.seasons.iter().map(|s| {
            let path = format!("/tv/{}/season/{}", external_id, s.season_number);
            async move { self.get::<SeasonDetails>(&path, &[]).await }
        }))
        .await?;

        Ok(details.into_show(seasons))
    }

    async fn search_movies(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        let results = self.search("movie", query).await?;
        Ok(results.into_iter().map(|r| self.hit(r)).collect())
    }

    async fn search_shows(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        let results = self.search("tv", query).await?;
        Ok(results.into_iter().map(|r| self.hit(r)).collect())
    }

    async fn download_poster(&self, external_id: i64, is_tv: bool, media_id: &str) -> bool {
        match self.fetch_poster(external_id, is_tv, media_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(external_id, error = %e, "Failed to download poster");
                false
            }
        }
    }
}

// ============================================================================
// TMDB API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Movie and TV results share one shape; each fills only its own fields.
#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PosterOnly {
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: i64,
    title: String,
    release_date: Option<String>,
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    id: i64,
    name: String,
    first_air_date: Option<String>,
    overview: Option<String>,
    status: Option<String>,
    #[serde(default)]
    seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct SeasonSummary {
    season_number: u32,
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
    id: i64,
    season_number: u32,
    name: Option<String>,
    overview: Option<String>,
    #[serde(default)]
    episodes: Vec<EpisodeResult>,
}

#[derive(Debug, Deserialize)]
struct EpisodeResult {
    id: i64,
    episode_number: u32,
    name: String,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<MovieDetails> for Movie {
    fn from(d: MovieDetails) -> Self {
        let mut movie = Movie::new(d.id, PROVIDER, d.title, year_of(d.release_date.as_deref()));
        movie.overview = d.overview.unwrap_or_default();
        movie
    }
}

impl TvDetails {
    fn into_show(self, seasons: Vec<SeasonDetails>) -> Show {
        let mut show = Show::new(self.id, PROVIDER, self.name, year_of(self.first_air_date.as_deref()));
        show.overview = self.overview.unwrap_or_default();
        show.ended = matches!(self.status.as_deref(), Some("Ended") | Some("Canceled"));

        show.seasons = seasons
            .into_iter()
            .map(|s| {
                let name = s
                    .name
                    .unwrap_or_else(|| format!("Season {}", s.season_number));
                let mut season = Season::new(&show.id, s.season_number, name, s.id);
                season.overview = s.overview.unwrap_or_default();
                season.episodes = s
                    .episodes
                    .into_iter()
                    .map(|e| Episode::new(&season.id, e.episode_number, e.name, e.id))
                    .collect();
                season
            })
            .collect();
        show
    }
}
