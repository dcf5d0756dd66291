//! Mock download client for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::download_client::{DownloadClient, DownloadClientError};
use crate::hash::info_hash_from_magnet;
use crate::library::{Download, DownloadStatus};
use crate::release::CandidateRelease;

#[derive(Debug, Default)]
struct MockState {
    submitted: Vec<CandidateRelease>,
    removed: Vec<(String, bool)>,
    paused: Vec<String>,
    resumed: Vec<String>,
    statuses: HashMap<String, DownloadStatus>,
    next_error: Option<DownloadClientError>,
    hash_counter: u32,
}

/// Mock implementation of the DownloadClient trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted, removed, paused, and resumed downloads
/// - Control the status reported per hash
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let client = MockDownloadClient::new("qbittorrent");
/// let download = client.submit(&candidate).await?;
///
/// client.set_status(&download.hash, DownloadStatus::Finished);
/// assert_eq!(client.status(&download).await?, DownloadStatus::Finished);
/// ```
#[derive(Debug, Clone)]
pub struct MockDownloadClient {
    name: String,
    state: Arc<RwLock<MockState>>,
}

impl MockDownloadClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().expect("mock state poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().expect("mock state poisoned")
    }

    /// Candidates passed to `submit`, in call order.
    pub fn submitted(&self) -> Vec<CandidateRelease> {
        self.read().submitted.clone()
    }

    /// `(hash, delete_data)` of every `remove` call.
    pub fn removed(&self) -> Vec<(String, bool)> {
        self.read().removed.clone()
    }

    pub fn paused(&self) -> Vec<String> {
        self.read().paused.clone()
    }

    pub fn resumed(&self) -> Vec<String> {
        self.read().resumed.clone()
    }

    /// Status reported for `hash` from now on.
    pub fn set_status(&self, hash: &str, status: DownloadStatus) {
        self.write().statuses.insert(hash.to_string(), status);
    }

    /// Configure the next operation to fail with the given error.
    pub fn set_next_error(&self, error: DownloadClientError) {
        self.write().next_error = Some(error);
    }

    fn take_error(&self) -> Result<(), DownloadClientError> {
        match self.write().next_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_hash(&self, candidate: &CandidateRelease) -> String {
        if let Ok(hash) = info_hash_from_magnet(&candidate.download_url) {
            return hash;
        }
        let mut state = self.write();
        state.hash_counter += 1;
        format!("mockhash{:08x}", state.hash_counter)
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError> {
        self.take_error()?;

        let hash = self.next_hash(candidate);
        let mut download = Download::new(&candidate.title, candidate.quality(), &hash, candidate.usenet);
        download.status = DownloadStatus::Downloading;

        let mut state = self.write();
        state.submitted.push(candidate.clone());
        state.statuses.entry(hash).or_insert(DownloadStatus::Downloading);
        Ok(download)
    }

    async fn remove(&self, download: &Download, delete_data: bool) -> Result<(), DownloadClientError> {
        self.take_error()?;
        let mut state = self.write();
        state.removed.push((download.hash.clone(), delete_data));
        state.statuses.remove(&download.hash);
        Ok(())
    }

    async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError> {
        self.take_error()?;
        Ok(self
            .read()
            .statuses
            .get(&download.hash)
            .copied()
            .unwrap_or(DownloadStatus::Unknown))
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadClientError> {
        self.take_error()?;
        self.write().paused.push(download.hash.clone());
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadClientError> {
        self.take_error()?;
        self.write().resumed.push(download.hash.clone());
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), DownloadClientError> {
        self.take_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_uses_magnet_hash() {
        let client = MockDownloadClient::new("mock");
        let candidate = CandidateRelease::torrent(
            "Movie.2020.1080p",
            "magnet:?xt=urn:btih:C12FE1C06BBA254A9DC9F519B335AA7C1367A88A",
            10,
        );

        let download = client.submit(&candidate).await.unwrap();
        assert_eq!(download.hash, "c12fe1c06bba254a9dc9f519b335aa7c1367a88a");
        assert_eq!(download.status, DownloadStatus::Downloading);
        assert_eq!(client.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_next_error_applies_once() {
        let client = MockDownloadClient::new("mock");
        client.set_next_error(DownloadClientError::Timeout);

        let candidate = CandidateRelease::usenet("Movie.720p", "http://nzb/1", 10);
        assert!(client.submit(&candidate).await.is_err());
        assert!(client.submit(&candidate).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_control() {
        let client = MockDownloadClient::new("mock");
        let candidate = CandidateRelease::usenet("Movie.720p", "http://nzb/1", 10);
        let download = client.submit(&candidate).await.unwrap();

        client.set_status(&download.hash, DownloadStatus::Finished);
        assert_eq!(client.status(&download).await.unwrap(), DownloadStatus::Finished);

        client.remove(&download, true).await.unwrap();
        assert_eq!(client.status(&download).await.unwrap(), DownloadStatus::Unknown);
        assert_eq!(client.removed(), vec![(download.hash.clone(), true)]);
    }
}
