//! Transmission download client over its JSON-RPC interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::TransmissionConfig;
use crate::hash::HashResolver;
use crate::library::{Download, DownloadStatus};
use crate::release::CandidateRelease;

use super::{DownloadClient, DownloadClientError};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Map Transmission's numeric torrent status and error code to the shared status.
///
/// 0 is stopped, 1-4 are check/download states, 5-6 are seed states.
pub(crate) fn map_status(status: i64, error: i64) -> DownloadStatus {
    if error != 0 {
        return DownloadStatus::Error;
    }
    match status {
        1..=4 => DownloadStatus::Downloading,
        5 | 6 => DownloadStatus::Finished,
        _ => DownloadStatus::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentFields {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: i64,
    #[serde(rename = "errorString", default)]
    error_string: String,
}

/// Transmission client implementation.
pub struct TransmissionClient {
    client: Client,
    config: TransmissionConfig,
    torrent_directory: PathBuf,
    hash_resolver: Arc<HashResolver>,
    /// Session id negotiated through HTTP 409 responses.
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    pub fn new(
        config: TransmissionConfig,
        torrent_directory: impl Into<PathBuf>,
        hash_resolver: Arc<HashResolver>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            torrent_directory: torrent_directory.into(),
            hash_resolver,
            session_id: RwLock::new(None),
        }
    }

    /// Call an RPC method, renegotiating the session id when asked to.
    async fn rpc(&self, method: &str, arguments: Value) -> Result<Value, DownloadClientError> {
        let payload = json!({ "method": method, "arguments": arguments });

        for _ in 0..2 {
            let mut request = self.client.post(&self.config.url).json(&payload);
            if let Some(id) = self.session_id.read().await.as_deref() {
                request = request.header(SESSION_HEADER, id);
            }
            if !self.config.username.is_empty() {
                request = request.basic_auth(&self.config.username, Some(&self.config.password));
            }

            let response = request.send().await?;
            match response.status() {
                StatusCode::CONFLICT => {
                    let id = response
                        .headers()
                        .get(SESSION_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    debug!("Negotiated new Transmission session id");
                    *self.session_id.write().await = id;
                    continue;
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(DownloadClientError::AuthenticationFailed(
                        "Transmission rejected the credentials".to_string(),
                    ));
                }
                status if !status.is_success() => {
                    return Err(DownloadClientError::ApiError(format!(
                        "{} returned HTTP {}",
                        method, status
                    )));
                }
                _ => {}
            }

            let body: RpcResponse = response
                .json()
                .await
                .map_err(|e| DownloadClientError::ApiError(format!("Invalid RPC response: {}", e)))?;
            if body.result != "success" {
                return Err(DownloadClientError::ApiError(format!(
                    "{} failed: {}",
                    method, body.result
                )));
            }
            return Ok(body.arguments);
        }

        Err(DownloadClientError::ApiError(
            "Failed negotiating Transmission session id".to_string(),
        ))
    }
}

#[async_trait]
impl DownloadClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError> {
        info!(title = %candidate.title, "Submitting torrent to Transmission");
        let hash = self
            .hash_resolver
            .resolve(&candidate.title, &candidate.download_url)
            .await?;

        let download_dir = self.torrent_directory.join(&candidate.title);
        let added = self
            .rpc(
                "torrent-add",
                json!({
                    "filename": candidate.download_url,
                    "download-dir": download_dir.to_string_lossy(),
                }),
            )
            .await?;
        if added.get("torrent-duplicate").is_some() {
            warn!(title = %candidate.title, "Transmission already had this torrent");
        }

        let mut download = Download::new(&candidate.title, candidate.quality(), hash, false);
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
        info!(title = %download.title, delete_data, "Removing torrent from Transmission");
        self.rpc(
            "torrent-remove",
            json!({ "ids": [download.hash], "delete-local-data": delete_data }),
        )
        .await?;
        Ok(())
    }

    async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError> {
        let arguments = self
            .rpc(
                "torrent-get",
                json!({
                    "ids": [download.hash],
                    "fields": ["hashString", "status", "error", "errorString"],
                }),
            )
            .await?;

        let torrents: Vec<TorrentFields> = arguments
            .get("torrents")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DownloadClientError::ApiError(format!("Invalid torrent-get: {}", e)))?
            .unwrap_or_default();

        let Some(torrent) = torrents.first() else {
            warn!(hash = %download.hash, "Torrent not found in Transmission");
            return Ok(DownloadStatus::Unknown);
        };

        if torrent.error != 0 {
            warn!(
                title = %download.title,
                error = %torrent.error_string,
                "Transmission reports a torrent error"
            );
        }
        Ok(map_status(torrent.status, torrent.error))
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Pausing torrent");
        self.rpc("torrent-stop", json!({ "ids": [download.hash] }))
            .await?;
        Ok(())
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Resuming torrent");
        self.rpc("torrent-start", json!({ "ids": [download.hash] }))
            .await?;
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), DownloadClientError> {
        self.rpc("session-stats", json!({})).await?;
        info!(url = %self.config.url, "Connected to Transmission");
        Ok(())
    }
}
