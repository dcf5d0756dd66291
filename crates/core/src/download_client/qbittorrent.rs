//! qBittorrent download client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::QBittorrentConfig;
use crate::hash::HashResolver;
use crate::library::{Download, DownloadStatus};
use crate::release::CandidateRelease;

use super::{DownloadClient, DownloadClientError};

/// Map a qBittorrent torrent state to the shared status.
///
/// States outside the known vocabulary map to `Error`.
pub(crate) fn map_state(state: &str) -> DownloadStatus {
    match state {
        "allocating" | "downloading" | "metaDL" | "pausedDL" | "queuedDL" | "stalledDL"
        | "checkingDL" | "forcedDL" | "moving" | "stoppedDL" | "forcedMetaDL" => {
            DownloadStatus::Downloading
        }
        "uploading" | "pausedUP" | "queuedUP" | "stalledUP" | "checkingUP" | "forcedUP"
        | "stoppedUP" => DownloadStatus::Finished,
        "missingFiles" | "error" | "checkingResumeData" => DownloadStatus::Error,
        "unknown" => DownloadStatus::Unknown,
        _ => DownloadStatus::Error,
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    state: String,
}

/// qBittorrent client implementation.
///
/// Each operation logs in, performs its calls, and logs out again.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    hash_resolver: Arc<HashResolver>,
    category: OnceCell<()>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig, hash_resolver: Arc<HashResolver>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            hash_resolver,
            category: OnceCell::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn logout(&self) {
        let url = format!("{}/api/v2/auth/logout", self.base_url());
        if let Err(e) = self.client.post(&url).send().await {
            warn!(error = %e, "qBittorrent logout failed");
        }
    }

    /// POST a form, logging in again once if the session was rejected.
    async fn send_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<(StatusCode, String), DownloadClientError> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self.client.post(&url).form(params).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session rejected, re-authenticating");
            self.login().await?;
            response = self.client.post(&url).form(params).send().await?;
        }

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// GET with query parameters, logging in again once if the session was rejected.
    async fn get_query(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DownloadClientError> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self.client.get(&url).query(params).send().await?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session rejected, re-authenticating");
            self.login().await?;
            response = self.client.get(&url).query(params).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!(
                "{} returned HTTP {}",
                endpoint, status
            )));
        }
        Ok(response.text().await?)
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DownloadClientError> {
        let (status, body) = self.send_form(endpoint, params).await?;
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!(
                "{} returned HTTP {}",
                endpoint, status
            )));
        }
        Ok(body)
    }

    /// Create the download category, updating it if it already exists.
    async fn ensure_category(&self) -> Result<(), DownloadClientError> {
        self.category
            .get_or_try_init(|| async {
                let params = [
                    ("category", self.config.category_name.as_str()),
                    ("savePath", self.config.category_save_path.as_str()),
                ];
                let (status, _) = self
                    .send_form("/api/v2/torrents/createCategory", &params)
                    .await?;

                if status == StatusCode::CONFLICT {
                    info!(
                        category = %self.config.category_name,
                        "qBittorrent category exists, updating it"
                    );
                    let (status, body) = self
                        .send_form("/api/v2/torrents/editCategory", &params)
                        .await?;
                    if !status.is_success() {
                        warn!(status = %status, body = %body, "Failed to update qBittorrent category");
                    }
                } else if !status.is_success() {
                    return Err(DownloadClientError::ApiError(format!(
                        "createCategory returned HTTP {}",
                        status
                    )));
                } else {
                    info!(category = %self.config.category_name, "Created qBittorrent category");
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// POST to `primary`, falling back to `legacy` when the endpoint is unknown.
    async fn post_with_fallback(
        &self,
        primary: &str,
        legacy: &str,
        hash: &str,
    ) -> Result<(), DownloadClientError> {
        let params = [("hashes", hash)];
        let (status, _) = self.send_form(primary, &params).await?;
        if status == StatusCode::NOT_FOUND {
            debug!(endpoint = legacy, "Falling back to alternate qBittorrent endpoint");
            self.post_form(legacy, &params).await?;
            return Ok(());
        }
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!(
                "{} returned HTTP {}",
                primary, status
            )));
        }
        Ok(())
    }

    async fn add(&self, candidate: &CandidateRelease) -> Result<(), DownloadClientError> {
        self.ensure_category().await?;
        let params = [
            ("urls", candidate.download_url.as_str()),
            ("category", self.config.category_name.as_str()),
            ("savepath", candidate.title.as_str()),
        ];
        let answer = self.post_form("/api/v2/torrents/add", &params).await?;
        if answer.trim() != "Ok." {
            return Err(DownloadClientError::Rejected(format!(
                "qBittorrent answered '{}'",
                answer.trim()
            )));
        }
        Ok(())
    }

    async fn fetch_status(&self, hash: &str) -> Result<DownloadStatus, DownloadClientError> {
        let body = self
            .get_query("/api/v2/torrents/info", &[("hashes", hash)])
            .await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&body)
            .map_err(|e| DownloadClientError::ApiError(format!("Invalid torrent info: {}", e)))?;

        match torrents.first() {
            Some(torrent) => {
                debug!(hash = hash, state = %torrent.state, "qBittorrent torrent state");
                Ok(map_state(&torrent.state))
            }
            None => {
                warn!(hash = hash, "Torrent not found in qBittorrent");
                Ok(DownloadStatus::Unknown)
            }
        }
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError> {
        info!(title = %candidate.title, "Submitting torrent to qBittorrent");
        let hash = self
            .hash_resolver
            .resolve(&candidate.title, &candidate.download_url)
            .await?;

        self.login().await?;
        let added = self.add(candidate).await;
        self.logout().await;
        added?;

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
        info!(title = %download.title, delete_data, "Removing torrent from qBittorrent");
        let delete_files = if delete_data { "true" } else { "false" };
        self.login().await?;
        let result = self
            .post_form(
                "/api/v2/torrents/delete",
                &[("hashes", download.hash.as_str()), ("deleteFiles", delete_files)],
            )
            .await;
        self.logout().await;
        result.map(|_| ())
    }

    async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError> {
        self.login().await?;
        let result = self.fetch_status(&download.hash).await;
        self.logout().await;
        result
    }

    async fn pause(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Pausing torrent");
        self.login().await?;
        let result = self
            .post_with_fallback("/api/v2/torrents/pause", "/api/v2/torrents/stop", &download.hash)
            .await;
        self.logout().await;
        result
    }

    async fn resume(&self, download: &Download) -> Result<(), DownloadClientError> {
        info!(title = %download.title, "Resuming torrent");
        self.login().await?;
        let result = self
            .post_with_fallback(
                "/api/v2/torrents/resume",
                "/api/v2/torrents/start",
                &download.hash,
            )
            .await;
        self.logout().await;
        result
    }

    async fn check_connection(&self) -> Result<(), DownloadClientError> {
        self.login().await?;
        let result = self.ensure_category().await;
        self.logout().await;
        if result.is_ok() {
            info!(url = %self.base_url(), "Connected to qBittorrent");
        }
        result
    }
}
