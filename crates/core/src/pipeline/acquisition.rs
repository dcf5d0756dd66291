//! Search, submission, auto-download and import of releases.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::download_client::DownloadRouter;
use crate::hash::HashResolver;
use crate::importer::{ImportEngine, ImportReport};
use crate::indexer::{Indexer, JackettIndexer, ProwlarrIndexer};
use crate::library::{
    quality_in_window, Download, DownloadStatus, MediaRepository, MovieFile, RepositoryError,
    SeasonFile,
};
use crate::metadata::{MetadataProvider, TmdbProvider, TvdbProvider};
use crate::notification::{titles, NotificationHandle};
use crate::release::{CandidateRelease, Quality};
use crate::scoring::ScoringEngine;
use crate::search::SearchOrchestrator;

use super::types::{BatchSummary, MediaTarget, PipelineError};

const HASH_RESOLVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Slots a submission will create once the download exists.
enum SlotPlan {
    Movie(String),
    Seasons(Vec<String>),
}

/// Drives releases from search to library placement.
///
/// Holds one instance of every collaborator; batch entry points
/// (`auto_download_approved_requests`, `import_completed_downloads`) absorb
/// per-item failures, single-item operations return them.
pub struct AcquisitionPipeline {
    pub(super) repository: Arc<dyn MediaRepository>,
    pub(super) search: SearchOrchestrator,
    pub(super) scoring: ScoringEngine,
    pub(super) router: DownloadRouter,
    pub(super) importer: ImportEngine,
    pub(super) metadata: Vec<Arc<dyn MetadataProvider>>,
    pub(super) notifier: NotificationHandle,
    pub(super) min_seeders: u32,
}

impl AcquisitionPipeline {
    pub fn new(
        repository: Arc<dyn MediaRepository>,
        search: SearchOrchestrator,
        scoring: ScoringEngine,
        router: DownloadRouter,
        importer: ImportEngine,
        notifier: NotificationHandle,
    ) -> Self {
        Self {
            repository,
            search,
            scoring,
            router,
            importer,
            metadata: Vec::new(),
            notifier,
            min_seeders: crate::config::ImportConfig::default().min_seeders,
        }
    }

    /// Register a metadata provider; lookups go by its name.
    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata.push(provider);
        self
    }

    /// Minimum seeders a torrent needs to be picked by auto-download.
    pub fn with_min_seeders(mut self, min_seeders: u32) -> Self {
        self.min_seeders = min_seeders;
        self
    }

    /// Build every collaborator from configuration.
    ///
    /// Download clients are checked once here; a metadata provider that cannot
    /// be created is logged and left out.
    pub async fn from_config(
        config: &Config,
        repository: Arc<dyn MediaRepository>,
        notifier: NotificationHandle,
    ) -> Self {
        let mut indexers: Vec<Arc<dyn Indexer>> = Vec::new();
        if let Some(jackett) = config.indexers.jackett.as_ref().filter(|c| c.enabled) {
            indexers.push(Arc::new(JackettIndexer::new(jackett.clone())));
        }
        if let Some(prowlarr) = config.indexers.prowlarr.as_ref().filter(|c| c.enabled) {
            indexers.push(Arc::new(ProwlarrIndexer::new(prowlarr.clone())));
        }
        if indexers.is_empty() {
            warn!("No indexers enabled, searches will return nothing");
        }

        let hash_resolver = Arc::new(HashResolver::new(
            &config.storage.torrent_directory,
            HASH_RESOLVER_TIMEOUT,
        ));
        let router = DownloadRouter::from_config(
            &config.download_clients,
            &config.storage.torrent_directory,
            hash_resolver,
        )
        .await;

        let search = SearchOrchestrator::new(indexers, Arc::clone(&repository), notifier.clone());
        let importer = ImportEngine::new(
            config.storage.clone(),
            config.import.success_policy,
            notifier.clone(),
        );

        let mut pipeline = Self::new(
            repository,
            search,
            ScoringEngine::from_config(&config.indexers),
            router,
            importer,
            notifier,
        )
        .with_min_seeders(config.import.min_seeders);

        if let Some(tmdb) = &config.metadata.tmdb {
            match TmdbProvider::new(tmdb.clone(), &config.storage.image_directory) {
                Ok(provider) => pipeline = pipeline.with_metadata(Arc::new(provider)),
                Err(e) => error!(error = %e, "TMDB provider unavailable"),
            }
        }
        if let Some(tvdb) = &config.metadata.tvdb {
            match TvdbProvider::new(tvdb.clone(), &config.storage.image_directory) {
                Ok(provider) => pipeline = pipeline.with_metadata(Arc::new(provider)),
                Err(e) => error!(error = %e, "TVDB provider unavailable"),
            }
        }

        pipeline
    }

    /// Search indexers for releases of `target`.
    ///
    /// Without an override the query is derived from the media item, hits
    /// are filtered to the item (movie name and year, or season number) and
    /// scored best first. With an override the raw hits are returned.
    pub async fn search_candidates(
        &self,
        target: &MediaTarget,
        override_query: Option<&str>,
    ) -> Result<Vec<CandidateRelease>, PipelineError> {
        let override_query = override_query.map(str::trim).filter(|q| !q.is_empty());

        match target {
            MediaTarget::Movie(movie_id) => {
                let movie = self.repository.get_movie(movie_id)?;
                let query = override_query.unwrap_or(movie.name.as_str());
                let found = self.search.search(query, false).await?;
                if override_query.is_some() {
                    debug!(query = query, results = found.len(), "Returning unfiltered results");
                    return Ok(found);
                }

                let name = movie.name.to_lowercase();
                let year = movie.year.map(|y| y.to_string());
                let matching = found
                    .into_iter()
                    .filter(|c| c.title.to_lowercase().contains(&name))
                    .filter(|c| year.as_deref().is_none_or(|y| c.title.contains(y)))
                    .collect();
                Ok(self.scoring.evaluate_all(matching, &movie.library, false))
            }
            MediaTarget::Season(season_id) => {
                let show = self.repository.get_show_by_season(season_id)?;
                let season = show
                    .season(season_id)
                    .ok_or_else(|| PipelineError::not_found("season", season_id.as_str()))?;
                let default_query = format!("{} s{:02}", show.name, season.number);
                let query = override_query.unwrap_or(default_query.as_str());
                let found = self.search.search(query, true).await?;
                if override_query.is_some() {
                    debug!(query = query, results = found.len(), "Returning unfiltered results");
                    return Ok(found);
                }

                let matching = found
                    .into_iter()
                    .filter(|c| c.seasons().contains(&season.number))
                    .collect();
                Ok(self.scoring.evaluate_all(matching, &show.library, true))
            }
        }
    }

    fn plan_slots(
        &self,
        candidate: &CandidateRelease,
        target: &MediaTarget,
    ) -> Result<SlotPlan, PipelineError> {
        match target {
            MediaTarget::Movie(movie_id) => {
                let movie = self.repository.get_movie(movie_id)?;
                Ok(SlotPlan::Movie(movie.id))
            }
            MediaTarget::Season(season_id) => {
                let show = self.repository.get_show_by_season(season_id)?;
                let mut numbers = candidate.seasons();
                if numbers.is_empty() {
                    if let Some(season) = show.season(season_id) {
                        numbers.insert(season.number);
                    }
                }

                let mut season_ids = Vec::new();
                for number in numbers {
                    match show.season_by_number(number) {
                        Some(season) => season_ids.push(season.id.clone()),
                        None => warn!(
                            show = %show.name,
                            season = number,
                            release = %candidate.title,
                            "Release covers a season the show does not have, skipping"
                        ),
                    }
                }
                if season_ids.is_empty() {
                    return Err(PipelineError::InvalidRequest(format!(
                        "release '{}' covers no season of {}",
                        candidate.title, show.name
                    )));
                }
                Ok(SlotPlan::Seasons(season_ids))
            }
        }
    }

    fn add_slots(
        &self,
        plan: &SlotPlan,
        download: &Download,
        suffix: &str,
    ) -> Result<(), RepositoryError> {
        match plan {
            SlotPlan::Movie(movie_id) => self.repository.add_movie_file(&MovieFile {
                movie_id: movie_id.clone(),
                quality: download.quality,
                download_id: Some(download.id.clone()),
                file_path_suffix: suffix.to_string(),
            }),
            SlotPlan::Seasons(season_ids) => season_ids.iter().try_for_each(|season_id| {
                self.repository.add_season_file(&SeasonFile {
                    season_id: season_id.clone(),
                    quality: download.quality,
                    download_id: Some(download.id.clone()),
                    file_path_suffix: suffix.to_string(),
                })
            }),
        }
    }

    /// Remove a freshly submitted download and its data from everywhere.
    async fn discard(&self, download: &Download) {
        if let Err(e) = self.router.remove(download, true).await {
            error!(download_id = %download.id, error = %e, "Failed to cancel download");
        }
        if let Err(e) = self.repository.delete_download(&download.id) {
            error!(download_id = %download.id, error = %e, "Failed to delete download record");
        }
    }

    /// Submit a previously found release for `target`.
    ///
    /// The download is paused while its file slots are created and resumed
    /// afterwards. A slot conflict cancels the download, deletes its data and
    /// returns [`PipelineError::Conflict`].
    pub async fn submit_download(
        &self,
        candidate_id: &str,
        target: &MediaTarget,
        suffix: &str,
    ) -> Result<Download, PipelineError> {
        let candidate = self.repository.get_candidate(candidate_id)?;
        let plan = self.plan_slots(&candidate, target)?;

        info!(release = %candidate.title, target = %target, "Submitting download");
        let download = self.router.submit(&candidate).await?;

        if let Err(e) = self.repository.save_download(&download) {
            error!(download_id = %download.id, error = %e, "Failed to persist download");
            self.discard(&download).await;
            return Err(e.into());
        }

        if let Err(e) = self.router.pause(&download).await {
            warn!(download_id = %download.id, error = %e, "Failed to pause download");
        }

        if let Err(e) = self.add_slots(&plan, &download, suffix) {
            error!(
                download_id = %download.id,
                quality = %download.quality,
                target = %target,
                error = %e,
                "Failed to create file slot, cancelling download"
            );
            self.discard(&download).await;
            return Err(e.into());
        }

        if let Err(e) = self.router.resume(&download).await {
            warn!(download_id = %download.id, error = %e, "Failed to resume download");
        }

        info!(download_id = %download.id, title = %download.title, "Download submitted");
        Ok(download)
    }

    fn pick_best(
        &self,
        candidates: Vec<CandidateRelease>,
        min_quality: Quality,
        wanted_quality: Quality,
        season: Option<u32>,
    ) -> Option<CandidateRelease> {
        let wanted_seasons = season.map(|n| BTreeSet::from([n]));
        candidates.into_iter().find(|c| {
            let quality = c.quality();
            if !quality_in_window(quality, min_quality, wanted_quality) {
                debug!(release = %c.title, quality = %quality, "Skipping release outside quality window");
                return false;
            }
            if !c.usenet && c.seeders < self.min_seeders {
                debug!(release = %c.title, seeders = c.seeders, "Skipping release with too few seeders");
                return false;
            }
            if wanted_seasons.as_ref().is_some_and(|s| *s != c.seasons()) {
                debug!(release = %c.title, "Skipping release with other seasons");
                return false;
            }
            true
        })
    }

    /// Submit the best matching release and report whether one was found.
    async fn fulfil(
        &self,
        target: &MediaTarget,
        min_quality: Quality,
        wanted_quality: Quality,
        season: Option<u32>,
    ) -> Result<bool, PipelineError> {
        let candidates = self.search_candidates(target, None).await?;
        let Some(best) = self.pick_best(candidates, min_quality, wanted_quality, season) else {
            warn!(
                target = %target,
                min_quality = %min_quality,
                wanted_quality = %wanted_quality,
                "No release matches the request"
            );
            return Ok(false);
        };

        let suffix = best.quality().label().to_uppercase();
        match self.submit_download(&best.id, target, &suffix).await {
            Ok(_) => Ok(true),
            Err(PipelineError::Conflict(message)) => {
                warn!(target = %target, quality = %best.quality(), conflict = %message, "File slot already exists");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Download the best release for an authorized movie request.
    ///
    /// Returns whether the request was fulfilled; a fulfilled request is
    /// deleted.
    pub async fn download_movie_request(&self, request_id: &str) -> Result<bool, PipelineError> {
        let request = self.repository.get_movie_request(request_id)?;
        if !request.authorized {
            error!(request_id = request_id, "Movie request is not authorized");
            return Err(PipelineError::Unauthorized(request_id.to_string()));
        }

        let target = MediaTarget::Movie(request.movie_id.clone());
        let fulfilled = self
            .fulfil(&target, request.min_quality, request.wanted_quality, None)
            .await?;
        if fulfilled {
            self.repository.delete_movie_request(&request.id)?;
        }
        Ok(fulfilled)
    }

    /// Download the best single-season release for an authorized season request.
    pub async fn download_season_request(&self, request_id: &str) -> Result<bool, PipelineError> {
        let request = self.repository.get_season_request(request_id)?;
        if !request.authorized {
            error!(request_id = request_id, "Season request is not authorized");
            return Err(PipelineError::Unauthorized(request_id.to_string()));
        }

        let season = self.repository.get_season(&request.season_id)?;
        let target = MediaTarget::Season(request.season_id.clone());
        let fulfilled = self
            .fulfil(
                &target,
                request.min_quality,
                request.wanted_quality,
                Some(season.number),
            )
            .await?;
        if fulfilled {
            self.repository.delete_season_request(&request.id)?;
        }
        Ok(fulfilled)
    }

    /// Fulfil every authorized request. Returns how many were fulfilled.
    pub async fn auto_download_approved_requests(&self) -> usize {
        let mut count = 0;

        let movie_requests = self.repository.list_movie_requests().unwrap_or_else(|e| {
            error!(error = %e, "Failed to list movie requests");
            Vec::new()
        });
        for request in movie_requests.iter().filter(|r| r.authorized) {
            match self.download_movie_request(&request.id).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(request_id = %request.id, error = %e, "Failed to download movie request")
                }
            }
        }

        let season_requests = self.repository.list_season_requests().unwrap_or_else(|e| {
            error!(error = %e, "Failed to list season requests");
            Vec::new()
        });
        for request in season_requests.iter().filter(|r| r.authorized) {
            match self.download_season_request(&request.id).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(request_id = %request.id, error = %e, "Failed to download season request")
                }
            }
        }

        info!(count, "Auto-downloaded approved requests");
        count
    }

    /// Query the backend for the status of `download` and persist it.
    pub(super) async fn refresh_status(&self, download: &mut Download) -> Result<(), PipelineError> {
        let status = self.router.status(download).await?;
        if status != download.status {
            debug!(download_id = %download.id, from = %download.status, to = %status, "Download status changed");
        }
        download.status = status;
        self.repository.save_download(download)?;
        Ok(())
    }

    /// Live status of a download, re-queried from its backend.
    pub async fn get_download_status(&self, download_id: &str) -> Result<Download, PipelineError> {
        let mut download = self.repository.get_download(download_id)?;
        self.refresh_status(&mut download).await?;
        Ok(download)
    }

    async fn import_loaded(&self, download: &mut Download) -> Result<ImportReport, PipelineError> {
        let movie_files = self.repository.movie_files_of_download(&download.id)?;
        let report = if let Some(first) = movie_files.first() {
            let movie = self.repository.get_movie(&first.movie_id)?;
            self.importer
                .import_movie(download, &movie, &movie_files)
                .await?
        } else {
            let season_files = self.repository.season_files_of_download(&download.id)?;
            let Some(first) = season_files.first() else {
                return Err(PipelineError::InvalidRequest(format!(
                    "download {} has no file slots",
                    download.id
                )));
            };
            let show = self.repository.get_show_by_season(&first.season_id)?;
            self.importer
                .import_season_files(download, &show, &season_files)
                .await?
        };

        self.repository.save_download(download)?;
        Ok(report)
    }

    /// Import one download into the library of the media its slots belong to.
    pub async fn import_download(&self, download_id: &str) -> Result<ImportReport, PipelineError> {
        let mut download = self.repository.get_download(download_id)?;
        self.import_loaded(&mut download).await
    }

    /// Import every finished download that is not imported yet.
    ///
    /// Statuses are refreshed first. A failing download is logged and
    /// notified; the batch continues.
    pub async fn import_completed_downloads(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();

        let downloads = match self.repository.list_downloads() {
            Ok(downloads) => downloads,
            Err(e) => {
                error!(error = %e, "Failed to list downloads");
                return summary;
            }
        };

        for mut download in downloads.into_iter().filter(|d| !d.imported) {
            if let Err(e) = self.refresh_status(&mut download).await {
                warn!(download_id = %download.id, error = %e, "Failed to refresh download status");
                continue;
            }
            if download.status != DownloadStatus::Finished {
                continue;
            }

            match self.import_loaded(&mut download).await {
                Ok(report) => {
                    debug!(
                        download_id = %download.id,
                        videos = report.videos_placed,
                        subtitles = report.subtitles_placed,
                        "Download imported"
                    );
                    summary.processed += 1;
                }
                Err(e) => {
                    error!(download_id = %download.id, title = %download.title, error = %e, "Import failed");
                    self.notifier.notify(
                        titles::IMPORT_FAILED,
                        format!("Failed to import '{}': {}", download.title, e),
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            imported = summary.processed,
            failed = summary.failed,
            "Finished importing downloads"
        );
        summary
    }
}
