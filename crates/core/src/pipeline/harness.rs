//! Pipeline wired to in-memory storage and mock backends.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::config::{ImportSuccessPolicy, StorageConfig};
use crate::download_client::{DownloadClient, DownloadRouter};
use crate::importer::ImportEngine;
use crate::indexer::Indexer;
use crate::library::{MediaRepository, Movie, Show, SqliteRepository};
use crate::notification::Notification;
use crate::release::CandidateRelease;
use crate::scoring::ScoringEngine;
use crate::search::SearchOrchestrator;
use crate::testing::{
    fixtures, notification_channel, MockDownloadClient, MockIndexer, MockMetadataProvider,
};

use super::AcquisitionPipeline;

pub(crate) struct Harness {
    pub pipeline: AcquisitionPipeline,
    pub repository: Arc<SqliteRepository>,
    pub indexer: Arc<MockIndexer>,
    pub torrent: Arc<MockDownloadClient>,
    pub usenet: Arc<MockDownloadClient>,
    pub metadata: MockMetadataProvider,
    pub notifications: mpsc::Receiver<Notification>,
    _root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Harness whose router has no usenet backend.
    pub fn without_usenet() -> Self {
        Self::build(false)
    }

    fn build(with_usenet: bool) -> Self {
        let root = TempDir::new().unwrap();
        let repository = Arc::new(SqliteRepository::in_memory().unwrap());
        let indexer = Arc::new(MockIndexer::new("mock-indexer"));
        let torrent = Arc::new(MockDownloadClient::new("mock-torrent"));
        let usenet = Arc::new(MockDownloadClient::new("mock-usenet"));
        let metadata = MockMetadataProvider::new();
        let (notifier, notifications) = notification_channel();

        let storage = StorageConfig {
            torrent_directory: root.path().join("downloads"),
            tv_directory: root.path().join("tv"),
            movie_directory: root.path().join("movies"),
            image_directory: root.path().join("images"),
            ..StorageConfig::default()
        };

        let repo: Arc<dyn MediaRepository> = repository.clone();
        let indexers: Vec<Arc<dyn Indexer>> = vec![indexer.clone() as Arc<dyn Indexer>];
        let search = SearchOrchestrator::new(indexers, Arc::clone(&repo), notifier.clone());
        let router = DownloadRouter::new(
            Some(torrent.clone() as Arc<dyn DownloadClient>),
            with_usenet.then(|| usenet.clone() as Arc<dyn DownloadClient>),
        );
        let importer = ImportEngine::new(storage, ImportSuccessPolicy::Any, notifier.clone());

        let pipeline = AcquisitionPipeline::new(
            repo,
            search,
            ScoringEngine::default(),
            router,
            importer,
            notifier,
        )
        .with_metadata(Arc::new(metadata.clone()));

        Self {
            pipeline,
            repository,
            indexer,
            torrent,
            usenet,
            metadata,
            notifications,
            _root: root,
        }
    }

    /// Shared handle to the mock catalog, for registering records.
    pub fn metadata_catalog(&self) -> MockMetadataProvider {
        self.metadata.clone()
    }

    pub fn add_movie(&self, name: &str, year: i32) -> Movie {
        let movie = fixtures::movie(name, year);
        self.repository.add_movie(&movie).unwrap();
        movie
    }

    pub fn add_show(&self, name: &str, seasons: u32, episodes: u32) -> Show {
        let show = fixtures::show(name, seasons, episodes);
        self.repository.add_show(&show).unwrap();
        show
    }

    /// A torrent release already persisted as a search result.
    pub fn stored_candidate(&self, title: &str, seeders: u32) -> CandidateRelease {
        let candidate = fixtures::torrent_candidate(title, seeders);
        self.repository.save_candidate(&candidate).unwrap();
        candidate
    }
}
