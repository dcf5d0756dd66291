//! Media items, requests and download management.

use std::sync::Arc;

use tracing::{info, warn};

use crate::library::{Download, Movie, MovieRequest, SeasonRequest, Show};
use crate::metadata::{MetadataProvider, SearchHit};
use crate::release::Quality;

use super::acquisition::AcquisitionPipeline;
use super::types::PipelineError;

fn check_quality_window(min: Quality, wanted: Quality) -> Result<(), PipelineError> {
    if wanted < min {
        return Err(PipelineError::InvalidRequest(format!(
            "wanted quality {} is below minimum quality {}",
            wanted, min
        )));
    }
    Ok(())
}

impl AcquisitionPipeline {
    fn provider(&self, name: &str) -> Result<&Arc<dyn MetadataProvider>, PipelineError> {
        self.metadata
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| PipelineError::NotConfigured(format!("metadata provider '{}'", name)))
    }

    /// Search the catalog of a metadata provider. `None` lists trending items.
    pub async fn search_catalog(
        &self,
        provider: &str,
        query: Option<&str>,
        is_tv: bool,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let provider = self.provider(provider)?;
        let hits = if is_tv {
            provider.search_shows(query).await?
        } else {
            provider.search_movies(query).await?
        };
        Ok(hits)
    }

    /// Add a movie from its metadata provider record.
    ///
    /// A movie already added from the same provider is a conflict. A poster
    /// that cannot be fetched is logged and ignored.
    pub async fn add_movie(
        &self,
        external_id: i64,
        provider: &str,
        library: Option<&str>,
    ) -> Result<Movie, PipelineError> {
        let provider = self.provider(provider)?;
        let mut movie = provider.get_movie(external_id).await?;
        if let Some(library) = library {
            movie.library = library.to_string();
        }
        self.repository.add_movie(&movie)?;
        info!(movie = %movie.name, id = %movie.id, "Movie added");

        if !provider.download_poster(external_id, false, &movie.id).await {
            warn!(movie = %movie.name, "Movie added without poster");
        }
        Ok(movie)
    }

    /// Add a show with all of its seasons and episodes.
    pub async fn add_show(
        &self,
        external_id: i64,
        provider: &str,
        library: Option<&str>,
    ) -> Result<Show, PipelineError> {
        let provider = self.provider(provider)?;
        let mut show = provider.get_show(external_id).await?;
        if let Some(library) = library {
            show.library = library.to_string();
        }
        self.repository.add_show(&show)?;
        info!(show = %show.name, id = %show.id, seasons = show.seasons.len(), "Show added");

        if !provider.download_poster(external_id, true, &show.id).await {
            warn!(show = %show.name, "Show added without poster");
        }
        Ok(show)
    }

    pub fn add_movie_request(&self, request: &MovieRequest) -> Result<(), PipelineError> {
        check_quality_window(request.min_quality, request.wanted_quality)?;
        self.repository.get_movie(&request.movie_id)?;
        self.repository.save_movie_request(request)?;
        info!(request_id = %request.id, movie_id = %request.movie_id, "Movie request added");
        Ok(())
    }

    pub fn add_season_request(&self, request: &SeasonRequest) -> Result<(), PipelineError> {
        check_quality_window(request.min_quality, request.wanted_quality)?;
        self.repository.get_season(&request.season_id)?;
        self.repository.save_season_request(request)?;
        info!(request_id = %request.id, season_id = %request.season_id, "Season request added");
        Ok(())
    }

    /// Update a movie request in place. The movie it targets cannot change.
    pub fn update_movie_request(&self, request: &MovieRequest) -> Result<(), PipelineError> {
        let existing = self.repository.get_movie_request(&request.id)?;
        if existing.movie_id != request.movie_id {
            return Err(PipelineError::InvalidRequest(
                "a request cannot be moved to another movie".into(),
            ));
        }
        check_quality_window(request.min_quality, request.wanted_quality)?;
        self.repository.save_movie_request(request)?;
        Ok(())
    }

    /// Update a season request in place. The season it targets cannot change.
    pub fn update_season_request(&self, request: &SeasonRequest) -> Result<(), PipelineError> {
        let existing = self.repository.get_season_request(&request.id)?;
        if existing.season_id != request.season_id {
            return Err(PipelineError::InvalidRequest(
                "a request cannot be moved to another season".into(),
            ));
        }
        check_quality_window(request.min_quality, request.wanted_quality)?;
        self.repository.save_season_request(request)?;
        Ok(())
    }

    pub fn authorize_movie_request(
        &self,
        request_id: &str,
        authorized_by: Option<&str>,
    ) -> Result<MovieRequest, PipelineError> {
        let mut request = self.repository.get_movie_request(request_id)?;
        request.authorized = true;
        request.authorized_by = authorized_by.map(str::to_string);
        self.repository.save_movie_request(&request)?;
        info!(request_id = request_id, "Movie request authorized");
        Ok(request)
    }

    pub fn authorize_season_request(
        &self,
        request_id: &str,
        authorized_by: Option<&str>,
    ) -> Result<SeasonRequest, PipelineError> {
        let mut request = self.repository.get_season_request(request_id)?;
        request.authorized = true;
        request.authorized_by = authorized_by.map(str::to_string);
        self.repository.save_season_request(&request)?;
        info!(request_id = request_id, "Season request authorized");
        Ok(request)
    }

    pub fn delete_movie_request(&self, request_id: &str) -> Result<(), PipelineError> {
        self.repository.get_movie_request(request_id)?;
        self.repository.delete_movie_request(request_id)?;
        Ok(())
    }

    pub fn delete_season_request(&self, request_id: &str) -> Result<(), PipelineError> {
        self.repository.get_season_request(request_id)?;
        self.repository.delete_season_request(request_id)?;
        Ok(())
    }

    /// Remove a download from its backend and record its new status.
    ///
    /// The download record and its slots are kept.
    pub async fn cancel_download(
        &self,
        download_id: &str,
        delete_data: bool,
    ) -> Result<Download, PipelineError> {
        let mut download = self.repository.get_download(download_id)?;
        info!(download_id = download_id, title = %download.title, delete_data, "Cancelling download");
        self.router.remove(&download, delete_data).await?;
        self.refresh_status(&mut download).await?;
        Ok(download)
    }

    pub async fn pause_download(&self, download_id: &str) -> Result<Download, PipelineError> {
        let mut download = self.repository.get_download(download_id)?;
        self.router.pause(&download).await?;
        self.refresh_status(&mut download).await?;
        Ok(download)
    }

    pub async fn resume_download(&self, download_id: &str) -> Result<Download, PipelineError> {
        let mut download = self.repository.get_download(download_id)?;
        self.router.resume(&download).await?;
        self.refresh_status(&mut download).await?;
        Ok(download)
    }

    /// Delete a download record and the file slots that reference it.
    ///
    /// With `delete_data` the download is also removed from its backend
    /// together with its data first.
    pub async fn delete_download(
        &self,
        download_id: &str,
        delete_data: bool,
    ) -> Result<(), PipelineError> {
        let download = self.repository.get_download(download_id)?;
        if delete_data {
            self.router.remove(&download, true).await?;
        }
        self.repository.delete_download(download_id)?;
        info!(download_id = download_id, title = %download.title, "Download deleted");
        Ok(())
    }

    /// Every download with a freshly queried status.
    ///
    /// A download whose backend cannot be reached keeps its stored status.
    pub async fn list_downloads(&self) -> Result<Vec<Download>, PipelineError> {
        let mut downloads = self.repository.list_downloads()?;
        for download in &mut downloads {
            if let Err(e) = self.refresh_status(download).await {
                warn!(download_id = %download.id, error = %e, "Failed to refresh download status");
            }
        }
        Ok(downloads)
    }

    fn slot_delivered(&self, download_id: Option<&str>) -> Result<bool, PipelineError> {
        match download_id {
            None => Ok(true),
            Some(id) => Ok(self.repository.get_download(id)?.imported),
        }
    }

    /// Whether any file slot of the movie has been delivered.
    pub fn is_movie_downloaded(&self, movie_id: &str) -> Result<bool, PipelineError> {
        for slot in self.repository.movie_files(movie_id)? {
            if self.slot_delivered(slot.download_id.as_deref())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any file slot of the season has been delivered.
    pub fn season_downloaded(&self, season_id: &str) -> Result<bool, PipelineError> {
        for slot in self.repository.season_files(season_id)? {
            if self.slot_delivered(slot.download_id.as_deref())? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use super::super::MediaTarget;
    use super::*;
    use crate::library::{DownloadStatus, MediaRepository, SeasonFile};
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_add_movie_fetches_metadata_and_poster() {
        let h = Harness::new();
        h.metadata_catalog().with_movie(fixtures::movie("Heat", 1995));
        let external_id = fixtures::movie("Heat", 1995).external_id;

        let movie = h
            .pipeline
            .add_movie(external_id, "tmdb", Some("Classics"))
            .await
            .unwrap();

        assert_eq!(movie.library, "Classics");
        assert_eq!(h.repository.get_movie(&movie.id).unwrap().name, "Heat");
        assert_eq!(h.metadata.poster_requests(), vec![movie.id.clone()]);

        let err = h
            .pipeline
            .add_movie(external_id, "tmdb", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_show_without_poster_still_succeeds() {
        let h = Harness::new();
        let metadata = h.metadata_catalog().without_posters();
        metadata.clone().with_show(fixtures::show("Some Show", 2, 3));
        let external_id = fixtures::show("Some Show", 2, 3).external_id;

        let show = h.pipeline.add_show(external_id, "tmdb", None).await.unwrap();

        let stored = h.repository.get_show(&show.id).unwrap();
        assert_eq!(stored.seasons.len(), 2);
        assert_eq!(stored.seasons[0].episodes.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_configured() {
        let h = Harness::new();
        let err = h.pipeline.add_movie(1, "imdb", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotConfigured(_)));

        let err = h.pipeline.add_movie(404, "tmdb", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_request_lifecycle() {
        let h = Harness::new();
        let movie = h.add_movie("Heat", 1995);

        let backwards = MovieRequest::new(&movie.id, Quality::Uhd, Quality::Hd);
        assert!(matches!(
            h.pipeline.add_movie_request(&backwards),
            Err(PipelineError::InvalidRequest(_))
        ));

        let mut request = MovieRequest::new(&movie.id, Quality::Hd, Quality::FullHd);
        h.pipeline.add_movie_request(&request).unwrap();

        let duplicate = MovieRequest::new(&movie.id, Quality::Sd, Quality::FullHd);
        assert!(matches!(
            h.pipeline.add_movie_request(&duplicate),
            Err(PipelineError::Conflict(_))
        ));

        request.wanted_quality = Quality::Uhd;
        h.pipeline.update_movie_request(&request).unwrap();
        let stored = h.repository.get_movie_request(&request.id).unwrap();
        assert_eq!(stored.id, request.id);
        assert_eq!(stored.wanted_quality, Quality::Uhd);

        let authorized = h
            .pipeline
            .authorize_movie_request(&request.id, Some("admin"))
            .unwrap();
        assert!(authorized.authorized);
        assert_eq!(authorized.authorized_by.as_deref(), Some("admin"));

        h.pipeline.delete_movie_request(&request.id).unwrap();
        assert!(matches!(
            h.pipeline.delete_movie_request(&request.id),
            Err(PipelineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_season_request_for_unknown_season() {
        let h = Harness::new();
        let request = SeasonRequest::new("no-such-season", Quality::Hd, Quality::FullHd);
        assert!(matches!(
            h.pipeline.add_season_request(&request),
            Err(PipelineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_pause_resume_delete() {
        let h = Harness::new();
        let movie = h.add_movie("Heat", 1995);
        let candidate = h.stored_candidate("Heat.1995.1080p", 20);
        let download = h
            .pipeline
            .submit_download(&candidate.id, &MediaTarget::Movie(movie.id.clone()), "")
            .await
            .unwrap();

        h.pipeline.pause_download(&download.id).await.unwrap();
        h.pipeline.resume_download(&download.id).await.unwrap();
        assert_eq!(h.torrent.paused().len(), 2);
        assert_eq!(h.torrent.resumed().len(), 2);

        let cancelled = h.pipeline.cancel_download(&download.id, false).await.unwrap();
        assert_eq!(cancelled.status, DownloadStatus::Unknown);
        assert_eq!(h.torrent.removed(), vec![(download.hash.clone(), false)]);
        assert_eq!(h.repository.movie_files(&movie.id).unwrap().len(), 1);

        h.pipeline.delete_download(&download.id, false).await.unwrap();
        assert!(h.repository.movie_files(&movie.id).unwrap().is_empty());
        assert_eq!(h.torrent.removed().len(), 1);
    }

    #[tokio::test]
    async fn test_list_downloads_keeps_unreachable_status() {
        let h = Harness::new();
        let movie = h.add_movie("Heat", 1995);
        let candidate = h.stored_candidate("Heat.1995.1080p", 20);
        let download = h
            .pipeline
            .submit_download(&candidate.id, &MediaTarget::Movie(movie.id), "")
            .await
            .unwrap();
        h.torrent.set_status(&download.hash, DownloadStatus::Finished);

        let listed = h.pipeline.list_downloads().await.unwrap();
        assert_eq!(listed[0].status, DownloadStatus::Finished);

        h.torrent
            .set_next_error(crate::download_client::DownloadClientError::Timeout);
        let listed = h.pipeline.list_downloads().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, DownloadStatus::Finished);
    }

    #[tokio::test]
    async fn test_downloaded_is_computed_from_slots() {
        let h = Harness::new();
        let show = h.add_show("Some Show", 2, 1);
        let first = show.season_by_number(1).unwrap();
        let second = show.season_by_number(2).unwrap();

        assert!(!h.pipeline.season_downloaded(&first.id).unwrap());

        h.repository
            .add_season_file(&SeasonFile {
                season_id: first.id.clone(),
                quality: Quality::Hd,
                download_id: None,
                file_path_suffix: String::new(),
            })
            .unwrap();
        assert!(h.pipeline.season_downloaded(&first.id).unwrap());

        let mut download = Download::new("Some.Show.S02.720p", Quality::Hd, "hash", false);
        h.repository.save_download(&download).unwrap();
        h.repository
            .add_season_file(&SeasonFile {
                season_id: second.id.clone(),
                quality: Quality::Hd,
                download_id: Some(download.id.clone()),
                file_path_suffix: String::new(),
            })
            .unwrap();
        assert!(!h.pipeline.season_downloaded(&second.id).unwrap());

        download.imported = true;
        h.repository.save_download(&download).unwrap();
        assert!(h.pipeline.season_downloaded(&second.id).unwrap());
    }
}
