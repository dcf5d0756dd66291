//! Prowlarr indexer backed by its JSON search API.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::ProwlarrConfig;
use crate::release::CandidateRelease;

use super::redirect::{follow_redirects, manual_redirect_client};
use super::{category_code, Indexer, IndexerError};

/// Maximum number of results requested per search.
const SEARCH_LIMIT: &str = "10000";

/// One entry of the `/api/v1/search` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProwlarrRelease {
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    sort_title: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    magnet_url: Option<String>,
    #[serde(default)]
    guid: Option<String>,
    #[serde(default)]
    seeders: Option<i64>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    age_minutes: Option<f64>,
    #[serde(default)]
    indexer: Option<String>,
    #[serde(default)]
    indexer_flags: Vec<serde_json::Value>,
}

impl ProwlarrRelease {
    fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or(self.sort_title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    fn flags(&self) -> Vec<String> {
        self.indexer_flags
            .iter()
            .map(|flag| match flag {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    /// Preferred torrent locator: download URL, then magnet, then guid.
    fn torrent_locator(&self) -> Option<&str> {
        if let Some(url) = self.download_url.as_deref() {
            return Some(url);
        }
        if let Some(magnet) = self.magnet_url.as_deref() {
            debug!(magnet = magnet, "Using magnet URL as download locator");
            return Some(magnet);
        }
        if let Some(guid) = self.guid.as_deref() {
            warn!(guid = guid, "Using guid as download locator");
            return Some(guid);
        }
        None
    }
}

/// Prowlarr search backend.
pub struct ProwlarrIndexer {
    client: Client,
    redirect_client: Client,
    config: ProwlarrConfig,
}

impl ProwlarrIndexer {
    pub fn new(config: ProwlarrConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            redirect_client: manual_redirect_client(),
            config,
        }
    }

    async fn process_release(&self, release: ProwlarrRelease) -> Option<CandidateRelease> {
        let Some(title) = release.display_title() else {
            warn!(guid = ?release.guid, "Skipping Prowlarr result without a title");
            return None;
        };

        if release.protocol != "torrent" {
            let Some(url) = release.download_url.as_deref() else {
                warn!(title = title, "Skipping usenet result without a download URL");
                return None;
            };
            let age_minutes = release.age_minutes.unwrap_or(0.0).max(0.0) as u64;
            let age_secs = age_minutes.saturating_mul(60);
            return Some(self.finish(
                CandidateRelease::usenet(title, url, age_secs),
                &release,
            ));
        }

        let Some(locator) = release.torrent_locator() else {
            error!(title = title, "No download locator found for Prowlarr result");
            return None;
        };

        let download_url = if locator.starts_with("magnet:") {
            locator.to_string()
        } else {
            match follow_redirects(&self.redirect_client, locator).await {
                Ok(url) => url,
                Err(e) if self.config.reject_torrents_on_url_error => {
                    debug!(url = locator, error = %e, "Rejecting result after redirect failure");
                    return None;
                }
                Err(e) => {
                    debug!(url = locator, error = %e, "Falling back to unresolved download URL");
                    locator.to_string()
                }
            }
        };

        let seeders = release.seeders.unwrap_or(0).max(0) as u32;
        Some(self.finish(
            CandidateRelease::torrent(title, download_url, seeders),
            &release,
        ))
    }

    fn finish(&self, candidate: CandidateRelease, release: &ProwlarrRelease) -> CandidateRelease {
        let candidate = candidate
            .with_size(release.size.unwrap_or(0).max(0) as u64)
            .with_flags(release.flags());
        match release.indexer.as_deref() {
            Some(indexer) => candidate.with_indexer(indexer),
            None => candidate,
        }
    }
}

#[async_trait]
impl Indexer for ProwlarrIndexer {
    fn name(&self) -> &str {
        "prowlarr"
    }

    async fn search(&self, query: &str, is_tv: bool) -> Result<Vec<CandidateRelease>, IndexerError> {
        let url = format!("{}/api/v1/search", self.config.url.trim_end_matches('/'));
        debug!(query = query, "Searching Prowlarr");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("apikey", self.config.api_key.as_str()),
                ("categories", category_code(is_tv)),
                ("limit", SEARCH_LIMIT),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let releases: Vec<ProwlarrRelease> = response
            .json()
            .await
            .map_err(|e| IndexerError::Parse(e.to_string()))?;

        let total = releases.len();
        let candidates: Vec<CandidateRelease> = stream::iter(releases)
            .map(|release| self.process_release(release))
            .buffer_unordered(self.config.max_parallel_requests.max(1))
            .filter_map(|candidate| async move { candidate })
            .collect()
            .await;

        info!(
            query = query,
            received = total,
            results = candidates.len(),
            "Prowlarr search complete"
        );
        Ok(candidates)
    }
}
