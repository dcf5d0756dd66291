//! Mock metadata provider for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::library::{Movie, Show};
use crate::metadata::{MetadataError, MetadataProvider, SearchHit};

#[derive(Debug, Default)]
struct MockState {
    movies: HashMap<i64, Movie>,
    shows: HashMap<i64, Show>,
    posters: Vec<String>,
    poster_available: bool,
}

/// Mock implementation of the MetadataProvider trait.
///
/// Serves registered movies and shows by external id; unknown ids are
/// `NotFound`. Each lookup returns a record with fresh library ids.
#[derive(Debug, Clone)]
pub struct MockMetadataProvider {
    state: Arc<RwLock<MockState>>,
}

impl Default for MockMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                poster_available: true,
                ..MockState::default()
            })),
        }
    }

    pub fn with_movie(self, movie: Movie) -> Self {
        self.state
            .write()
            .expect("mock state poisoned")
            .movies
            .insert(movie.external_id, movie);
        self
    }

    pub fn with_show(self, show: Show) -> Self {
        self.state
            .write()
            .expect("mock state poisoned")
            .shows
            .insert(show.external_id, show);
        self
    }

    /// Make `download_poster` report failure.
    pub fn without_posters(self) -> Self {
        self.state.write().expect("mock state poisoned").poster_available = false;
        self
    }

    /// Media ids whose poster was requested.
    pub fn poster_requests(&self) -> Vec<String> {
        self.state.read().expect("mock state poisoned").posters.clone()
    }
}

fn hit(external_id: i64, name: &str, year: Option<i32>, overview: &str) -> SearchHit {
    SearchHit {
        external_id,
        metadata_provider: "tmdb".to_string(),
        name: name.to_string(),
        year,
        overview: overview.to_string(),
        poster_url: None,
    }
}

fn matches(name: &str, query: Option<&str>) -> bool {
    query.is_none_or(|q| name.to_lowercase().contains(&q.to_lowercase()))
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn get_movie(&self, external_id: i64) -> Result<Movie, MetadataError> {
        let state = self.state.read().expect("mock state poisoned");
        let movie = state
            .movies
            .get(&external_id)
            .ok_or_else(|| MetadataError::NotFound(format!("movie {}", external_id)))?;

        let mut fresh = Movie::new(movie.external_id, &movie.metadata_provider, &movie.name, movie.year);
        fresh.overview = movie.overview.clone();
        Ok(fresh)
    }

    async fn get_show(&self, external_id: i64) -> Result<Show, MetadataError> {
        let state = self.state.read().expect("mock state poisoned");
        let show = state
            .shows
            .get(&external_id)
            .ok_or_else(|| MetadataError::NotFound(format!("show {}", external_id)))?;

        let mut fresh = Show::new(show.external_id, &show.metadata_provider, &show.name, show.year);
        fresh.overview = show.overview.clone();
        fresh.ended = show.ended;
        for season in &show.seasons {
            fresh = fresh.with_season(season.number, season.episodes.len() as u32);
        }
        Ok(fresh)
    }

    async fn search_movies(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        let state = self.state.read().expect("mock state poisoned");
        Ok(state
            .movies
            .values()
            .filter(|m| matches(&m.name, query))
            .map(|m| hit(m.external_id, &m.name, m.year, &m.overview))
            .collect())
    }

    async fn search_shows(&self, query: Option<&str>) -> Result<Vec<SearchHit>, MetadataError> {
        let state = self.state.read().expect("mock state poisoned");
        Ok(state
            .shows
            .values()
            .filter(|s| matches(&s.name, query))
            .map(|s| hit(s.external_id, &s.name, s.year, &s.overview))
            .collect())
    }

    async fn download_poster(&self, _external_id: i64, _is_tv: bool, media_id: &str) -> bool {
        let mut state = self.state.write().expect("mock state poisoned");
        state.posters.push(media_id.to_string());
        state.poster_available
    }
}
