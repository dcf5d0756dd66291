//! Info-hash resolution for torrent releases.
//!
//! Magnet links carry the hash directly. Anything else is fetched as a
//! `.torrent` file, staged on disk, and hashed over its re-encoded `info`
//! dictionary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, warn};

use crate::importer::sanitize_filename;

/// Errors that can occur while resolving an info-hash.
#[derive(Debug, Error)]
pub enum HashResolutionError {
    #[error("Invalid magnet URI: {0}")]
    InvalidMagnet(String),

    #[error("Failed to fetch torrent file: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Torrent file request returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Failed to decode torrent file: {0}")]
    Decode(String),

    #[error("Failed to stage torrent file at {path}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves the canonical info-hash for a release locator.
pub struct HashResolver {
    client: Client,
    staging_dir: PathBuf,
}

impl HashResolver {
    /// Create a resolver that stages fetched `.torrent` files in `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            staging_dir: staging_dir.into(),
        }
    }

    /// Path where the `.torrent` file for `title` is staged.
    pub fn staging_path(&self, title: &str) -> PathBuf {
        self.staging_dir
            .join(format!("{}.torrent", sanitize_filename(title)))
    }

    /// Resolve the lowercase hex info-hash of a magnet URI or `.torrent` URL.
    pub async fn resolve(&self, title: &str, locator: &str) -> Result<String, HashResolutionError> {
        if locator.starts_with("magnet:") {
            return info_hash_from_magnet(locator);
        }

        debug!(title = %title, "Fetching torrent file for hash resolution");
        let response = self.client.get(locator).send().await?;
        if !response.status().is_success() {
            return Err(HashResolutionError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        self.stage(title, &bytes).await?;
        info_hash_from_torrent(&bytes)
    }

    async fn stage(&self, title: &str, bytes: &[u8]) -> Result<(), HashResolutionError> {
        let path = self.staging_path(title);
        if path.exists() {
            warn!(path = %path.display(), "Torrent file already staged, overwriting");
        }
        write_staged(&path, bytes).await
    }
}

async fn write_staged(path: &Path, bytes: &[u8]) -> Result<(), HashResolutionError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HashResolutionError::Staging {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| HashResolutionError::Staging {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Extract the info-hash from the `xt=urn:btih:` parameter of a magnet URI.
///
/// Accepts 40-char hex and 32-char base32 hashes; returns lowercase hex.
pub fn info_hash_from_magnet(magnet: &str) -> Result<String, HashResolutionError> {
    let query = magnet
        .strip_prefix("magnet:?")
        .ok_or_else(|| HashResolutionError::InvalidMagnet(magnet.to_string()))?;

    let value = query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .ok_or_else(|| HashResolutionError::InvalidMagnet(magnet.to_string()))?;

    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Ok(value.to_lowercase()),
        32 => decode_base32_20(value)
            .map(|bytes| to_hex(&bytes))
            .ok_or_else(|| HashResolutionError::InvalidMagnet(magnet.to_string())),
        _ => Err(HashResolutionError::InvalidMagnet(magnet.to_string())),
    }
}

/// SHA-1 of the bencoded `info` dictionary of a `.torrent` file.
pub fn info_hash_from_torrent(bytes: &[u8]) -> Result<String, HashResolutionError> {
    let info = info_dictionary(bytes)?;
    Ok(format!("{:x}", Sha1::digest(&info)))
}

/// Decode a `.torrent` file and re-encode its `info` dictionary with sorted keys.
pub fn info_dictionary(bytes: &[u8]) -> Result<Vec<u8>, HashResolutionError> {
    let root: Value =
        serde_bencode::from_bytes(bytes).map_err(|e| HashResolutionError::Decode(e.to_string()))?;

    let Value::Dict(mut root) = root else {
        return Err(HashResolutionError::Decode(
            "top level is not a dictionary".to_string(),
        ));
    };

    let info = root
        .remove(b"info".as_slice())
        .ok_or_else(|| HashResolutionError::Decode("missing info dictionary".to_string()))?;
    if !matches!(info, Value::Dict(_)) {
        return Err(HashResolutionError::Decode(
            "info is not a dictionary".to_string(),
        ));
    }

    serde_bencode::to_bytes(&info).map_err(|e| HashResolutionError::Decode(e.to_string()))
}

fn decode_base32_20(value: &str) -> Option<[u8; 20]> {
    let mut out = Vec::with_capacity(20);
    let mut buffer: u32 = 0;
    let mut bits: u8 = 0;
    for ch in value.chars() {
        if ch == '=' {
            break;
        }
        buffer = (buffer << 5) | base32_value(ch)? as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    out.try_into().ok()
}

fn base32_value(ch: char) -> Option<u8> {
    match ch.to_ascii_uppercase() {
        c @ 'A'..='Z' => Some(c as u8 - b'A'),
        c @ '2'..='7' => Some(c as u8 - b'2' + 26),
        _ => None,
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
