//! Download client abstraction.
//!
//! This module provides a `DownloadClient` trait with backends for
//! qBittorrent, Transmission, and SABnzbd, and a router that picks the
//! backend for each download.

mod qbittorrent;
mod router;
mod sabnzbd;
mod transmission;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use router::DownloadRouter;
pub use sabnzbd::SabnzbdClient;
pub use transmission::TransmissionClient;
pub use types::{DownloadClient, DownloadClientError};
