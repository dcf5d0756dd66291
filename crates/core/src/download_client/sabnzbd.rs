//! SABnzbd usenet download client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SabnzbdConfig;
use crate::library::{Download, DownloadStatus};
use crate::release::CandidateRelease;

use super::{DownloadClient, DownloadClientError};

/// Map a SABnzbd job status to the shared status.
pub(crate) fn map_status(status: &str) -> DownloadStatus {
    match status {
        "Downloading" | "Queued" | "Paused" | "Extracting" | "Moving" | "Running" => {
            DownloadStatus::Downloading
        }
        "Completed" => DownloadStatus::Finished,
        "Failed" => DownloadStatus::Error,
        _ => DownloadStatus::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    nzo_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SlotList {
    #[serde(default)]
    slots: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    queue: SlotList,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: SlotList,
}

/// SABnzbd client implementation.
pub struct SabnzbdClient {
    client: Client,
    config: SabnzbdConfig,
}

impl SabnzbdClient {
    pub fn new(config: SabnzbdConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Call `/api` with `params` plus the JSON output flag and API key.
    async fn api<T: DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, DownloadClientError> {
        let url = format!("{}/api", self.config.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("output", "json"), ("apikey", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| DownloadClientError::ApiError(format!("Invalid SABnzbd response: {}", e)))
    }

    async fn queue_action(&self, name: &str, nzo_id: &str) -> Result<(), DownloadClientError> {
        let _: serde_json::Value = self
            .api(&[("mode", "queue"), ("name", name), ("value", nzo_id)])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        "sabnzbd"
    }

    async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError> {
        info!(title = %candidate.title, "Submitting NZB to SABnzbd");
        let response: AddResponse = self
            .api(&[
                ("mode", "addurl"),
                ("name", candidate.download_url.as_str()),
                ("nzbname", candidate.title.as_str()),
            ])
            .await?;

        let nzo_id = match response.nzo_ids.into_iter().next() {
            Some(id) if response.status => id,
            _ => {
                return Err(DownloadClientError::Rejected(format!(
                    "SABnzbd did not accept the NZB: {}",
                    response.error.unwrap_or_else(|| "no job id returned".to_string())
                )))
            }
        };

        let mut download = Download::new(&candidate.title, candidate.quality(), nzo_id, true);
        download.status = match self.status(&download).await {
            Ok(status) => status,
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Failed to fetch initial status");
                DownloadStatus::Unknown
            }
        };
        Ok(download)
    }

    async fn remove(
        &self,
        download: &Download,
        delete_data: bool,
    ) -> Result<(), DownloadClientError> {
        info!(title = %download.title, delete_data, "Removing job from SABnzbd");
        let del_files = if delete_data { "1" } else { "0" };
        let _: serde_json::Value = self
            .api(&[
                ("mode", "queue"),
                ("name", "delete"),
                ("value", download.hash.as_str()),
                ("del_files", del_files),
            ])
            .await?;
        Ok(())
    }

    async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError> {
        let nzo_id = download.hash.as_str();

        let queue: QueueResponse = self.api(&[("mode", "queue"), ("nzo_ids", nzo_id)]).await?;
        if let Some(slot) = queue.queue.slots.iter().find(|s| s.nzo_id == nzo_id) {
            debug!(nzo_id, status = %slot.status, "SABnzbd queue status");
            return Ok(map_status(&slot.status));
        }

        let history: HistoryResponse = self
            .api(&[("mode", "history"), ("nzo_ids", nzo_id)])
            .await?;
        if let Some(slot) = history.history.slots.iter().find(|s| s.nzo_id == nzo_id) {
            debug!(nzo_id, status = %slot.status, "SABnzbd history status");
            return Ok(map_status(&slot.status));
        }

        warn!(nzo_id, "Job not found in SABnzbd");
        Ok(DownloadStatus::Unknown)
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Pausing NZB");
        self.queue_action("pause", &download.hash).await
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Resuming NZB");
        self.queue_action("resume", &download.hash).await
    }

    async fn check_connection(&self) -> Result<(), DownloadClientError> {
        let version: serde_json::Value = self.api(&[("mode", "version")]).await?;
        info!(version = %version, "Connected to SABnzbd");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        for status in ["Downloading", "Queued", "Paused", "Extracting", "Moving", "Running"] {
            assert_eq!(map_status(status), DownloadStatus::Downloading, "{}", status);
        }
        assert_eq!(map_status("Completed"), DownloadStatus::Finished);
        assert_eq!(map_status("Failed"), DownloadStatus::Error);
        assert_eq!(map_status("Verifying"), DownloadStatus::Unknown);
    }

    #[test]
    fn test_queue_response_parsing() {
        let queue: QueueResponse = serde_json::from_str(
            r#"{"queue": {"status": "Downloading", "slots": [{"nzo_id": "SABnzbd_nzo_1", "status": "Paused", "filename": "x"}]}}"#,
        )
        .unwrap();
        assert_eq!(queue.queue.slots[0].nzo_id, "SABnzbd_nzo_1");
        assert_eq!(map_status(&queue.queue.slots[0].status), DownloadStatus::Downloading);
    }
}
