//! Routes downloads to the torrent or usenet backend.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::DownloadClientsConfig;
use crate::hash::HashResolver;
use crate::library::{Download, DownloadStatus};
use crate::metrics;
use crate::release::CandidateRelease;

use super::{
    DownloadClient, DownloadClientError, QBittorrentClient, SabnzbdClient, TransmissionClient,
};

/// Holds at most one torrent backend and one usenet backend.
///
/// The selection is made once at startup; every operation is routed by the
/// `usenet` flag of the release or download.
#[derive(Clone, Default)]
pub struct DownloadRouter {
    torrent: Option<Arc<dyn DownloadClient>>,
    usenet: Option<Arc<dyn DownloadClient>>,
}

impl DownloadRouter {
    pub fn new(
        torrent: Option<Arc<dyn DownloadClient>>,
        usenet: Option<Arc<dyn DownloadClient>>,
    ) -> Self {
        Self { torrent, usenet }
    }

    /// Build the router from configuration.
    ///
    /// qBittorrent is preferred for torrents; Transmission is used when
    /// qBittorrent is disabled or fails its connectivity check. SABnzbd
    /// handles usenet. A backend failing its check leaves its slot empty.
    pub async fn from_config(
        config: &DownloadClientsConfig,
        torrent_directory: &Path,
        hash_resolver: Arc<HashResolver>,
    ) -> Self {
        let mut torrent: Option<Arc<dyn DownloadClient>> = None;

        if let Some(qb) = config.qbittorrent.as_ref().filter(|c| c.enabled) {
            let client = QBittorrentClient::new(qb.clone(), Arc::clone(&hash_resolver));
            match client.check_connection().await {
                Ok(()) => torrent = Some(Arc::new(client)),
                Err(e) => error!(error = %e, "qBittorrent unavailable, trying Transmission"),
            }
        }

        if torrent.is_none() {
            if let Some(tr) = config.transmission.as_ref().filter(|c| c.enabled) {
                let client = TransmissionClient::new(
                    tr.clone(),
                    torrent_directory,
                    Arc::clone(&hash_resolver),
                );
                match client.check_connection().await {
                    Ok(()) => torrent = Some(Arc::new(client)),
                    Err(e) => error!(error = %e, "Transmission unavailable"),
                }
            }
        }

        let mut usenet: Option<Arc<dyn DownloadClient>> = None;
        if let Some(sab) = config.sabnzbd.as_ref().filter(|c| c.enabled) {
            let client = SabnzbdClient::new(sab.clone());
            match client.check_connection().await {
                Ok(()) => usenet = Some(Arc::new(client)),
                Err(e) => error!(error = %e, "SABnzbd unavailable"),
            }
        }

        match &torrent {
            Some(client) => info!(client = client.name(), "Torrent download client selected"),
            None => warn!("No torrent download client available"),
        }
        match &usenet {
            Some(client) => info!(client = client.name(), "Usenet download client selected"),
            None => warn!("No usenet download client available"),
        }

        Self { torrent, usenet }
    }

    /// Backend responsible for releases with the given `usenet` flag.
    pub fn client_for(&self, usenet: bool) -> Result<&Arc<dyn DownloadClient>, DownloadClientError> {
        let (slot, kind) = if usenet {
            (&self.usenet, "usenet")
        } else {
            (&self.torrent, "torrent")
        };
        slot.as_ref().ok_or(DownloadClientError::NotConfigured(kind))
    }

    pub fn has_torrent_client(&self) -> bool {
        self.torrent.is_some()
    }

    pub fn has_usenet_client(&self) -> bool {
        self.usenet.is_some()
    }

    pub async fn submit(&self, candidate: &CandidateRelease) -> Result<Download, DownloadClientError> {
        let client = self.client_for(candidate.usenet)?;
        let download = client
            .submit(candidate)
            .await
            .inspect_err(|_| record_error(client.name(), "submit"))?;
        metrics::DOWNLOADS_SUBMITTED
            .with_label_values(&[client.name()])
            .inc();
        Ok(download)
    }

    pub async fn remove(&self, download: &Download, delete_data: bool) -> Result<(), DownloadClientError> {
        let client = self.client_for(download.usenet)?;
        client
            .remove(download, delete_data)
            .await
            .inspect_err(|_| record_error(client.name(), "remove"))
    }

    pub async fn status(&self, download: &Download) -> Result<DownloadStatus, DownloadClientError> {
        let client = self.client_for(download.usenet)?;
        client
            .status(download)
            .await
            .inspect_err(|_| record_error(client.name(), "status"))
    }

    pub async fn pause(&self, download: &Download) -> Result<(), DownloadClientError> {
        let client = self.client_for(download.usenet)?;
        client
            .pause(download)
            .await
            .inspect_err(|_| record_error(client.name(), "pause"))
    }

    pub async fn resume(&self, download: &Download) -> Result<(), DownloadClientError> {
        let client = self.client_for(download.usenet)?;
        client
            .resume(download)
            .await
            .inspect_err(|_| record_error(client.name(), "resume"))
    }
}

fn record_error(client: &str, operation: &str) {
    metrics::DOWNLOAD_CLIENT_ERRORS
        .with_label_values(&[client, operation])
        .inc();
}
