//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the indexer, download
//! client, metadata provider, and notification sink traits, allowing the
//! pipeline to be exercised without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediarr_core::testing::{fixtures, MockDownloadClient, MockIndexer};
//!
//! let indexer = MockIndexer::new("jackett")
//!     .with_results(vec![fixtures::torrent_candidate("Heat.1995.1080p", 20)]);
//! let client = MockDownloadClient::new("qbittorrent");
//!
//! // Drive the pipeline, then inspect what was submitted
//! assert_eq!(client.submitted().len(), 1);
//! ```

mod mock_download_client;
mod mock_indexer;
mod mock_metadata;

pub use mock_download_client::MockDownloadClient;
pub use mock_indexer::MockIndexer;
pub use mock_metadata::MockMetadataProvider;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::notification::{DeliveryError, Notification, NotificationHandle, NotificationSink};

/// Sink that keeps every delivered notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered.read().expect("sink state poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.delivered
            .write()
            .expect("sink state poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// A notification handle whose notifications can be read back directly.
pub fn notification_channel() -> (NotificationHandle, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(100);
    (NotificationHandle::new(tx), rx)
}

/// Drain every queued notification title.
pub fn drain_titles(rx: &mut mpsc::Receiver<Notification>) -> Vec<String> {
    let mut titles = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        titles.push(notification.title);
    }
    titles
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::library::{Movie, Show};
    use crate::release::CandidateRelease;

    /// A magnet URI whose info-hash is `hash_char` repeated 40 times.
    pub fn magnet(hash_char: char) -> String {
        format!("magnet:?xt=urn:btih:{}", hash_char.to_string().repeat(40))
    }

    /// Torrent candidate with a 4 GB size.
    pub fn torrent_candidate(title: &str, seeders: u32) -> CandidateRelease {
        CandidateRelease::torrent(title, magnet('a'), seeders)
            .with_size(4 * 1024 * 1024 * 1024)
            .with_indexer("mock-indexer")
    }

    /// Usenet candidate released `age_days` ago.
    pub fn usenet_candidate(title: &str, age_days: u64) -> CandidateRelease {
        CandidateRelease::usenet(title, format!("http://nzb.example/{}", title), age_days * 86_400)
            .with_size(4 * 1024 * 1024 * 1024)
            .with_indexer("mock-indexer")
    }

    pub fn movie(name: &str, year: i32) -> Movie {
        let mut movie = Movie::new(
            (year as i64) * 1000 + name.len() as i64,
            "tmdb",
            name,
            Some(year),
        );
        movie.overview = format!("A movie about {}.", name.to_lowercase());
        movie
    }

    /// Show with `seasons` seasons of `episodes` episodes each.
    pub fn show(name: &str, seasons: u32, episodes: u32) -> Show {
        let mut show = Show::new(name.len() as i64 * 1000, "tmdb", name, Some(2020));
        for number in 1..=seasons {
            show = show.with_season(number, episodes);
        }
        show
    }
}
