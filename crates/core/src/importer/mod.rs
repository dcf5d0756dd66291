//! Import of completed downloads into the library layout.
//!
//! The engine lists a download's output directory, extracts archives,
//! classifies videos and subtitles, and links them into the movie or show
//! directory of the target library. Single unmatched files never fail an
//! import; they are logged and, where the user should act, notified.

mod files;
mod movie;
mod placement;
mod tv;

pub use files::{classify, collect, extract_archives, is_archive, list_files, DownloadFiles, FileKind};
pub use placement::{place_file, sanitize_filename, PlacementMethod};

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ImportSuccessPolicy, LibraryConfig, StorageConfig};
use crate::library::{Download, DEFAULT_LIBRARY};
use crate::metrics;
use crate::notification::NotificationHandle;

/// Two-letter language code right before a trailing `.srt`.
static SUBTITLE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[. ]([a-z]{2})\.srt$").expect("valid regex"));

/// Errors that abort the import of a whole download.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Download directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to create directory: {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to place {source_path} at {target}")]
    Placement {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

/// What an import placed and what it could not find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub videos_placed: usize,
    pub subtitles_placed: usize,
    /// Episode tags (`S01E02`) with no matching video file.
    pub missing_episodes: Vec<String>,
    /// Whether the download was marked imported.
    pub imported: bool,
}

/// Places completed downloads into their libraries.
pub struct ImportEngine {
    storage: StorageConfig,
    policy: ImportSuccessPolicy,
    notifier: NotificationHandle,
}

impl ImportEngine {
    pub fn new(
        storage: StorageConfig,
        policy: ImportSuccessPolicy,
        notifier: NotificationHandle,
    ) -> Self {
        Self {
            storage,
            policy,
            notifier,
        }
    }

    /// Directory where the download client leaves the output of `download`.
    pub fn download_directory(&self, download: &Download) -> PathBuf {
        self.storage.torrent_directory.join(&download.title)
    }

    async fn gather(&self, download: &Download) -> Result<DownloadFiles, ImportError> {
        let dir = self.download_directory(download);
        if !dir.is_dir() {
            return Err(ImportError::MissingDirectory(dir));
        }
        Ok(collect(&dir).await)
    }

    fn record_outcome(&self, media: &str, download: &mut Download, report: &mut ImportReport) {
        let success = match self.policy {
            ImportSuccessPolicy::Any => report.videos_placed > 0,
            ImportSuccessPolicy::All => {
                report.videos_placed > 0 && report.missing_episodes.is_empty()
            }
        };

        let result = if success {
            download.imported = true;
            report.imported = true;
            "imported"
        } else if report.videos_placed > 0 {
            "incomplete"
        } else {
            "failed"
        };
        metrics::IMPORTS.with_label_values(&[media, result]).inc();
    }
}

/// Root directory for a media item assigned to `library`.
///
/// Unknown library names fall back to `default_root` with a warning.
fn library_root(library: &str, libraries: &[LibraryConfig], default_root: &Path) -> PathBuf {
    if library == DEFAULT_LIBRARY {
        return default_root.to_path_buf();
    }
    match libraries.iter().find(|l| l.name == library) {
        Some(config) => {
            debug!(library = %library, "Using configured library");
            config.path.clone()
        }
        None => {
            warn!(library = %library, "Library not configured, using default directory");
            default_root.to_path_buf()
        }
    }
}

/// `Name (Year)`, or just the name when the year is unknown.
fn display_name(name: &str, year: Option<i32>) -> String {
    let name = sanitize_filename(name);
    match year {
        Some(year) => format!("{} ({})", name, year),
        None => name,
    }
}

/// Deterministic directory name of a media item.
fn media_directory_name(name: &str, year: Option<i32>, provider: &str, external_id: i64) -> String {
    format!(
        "{}  [{}id-{}]",
        display_name(name, year),
        provider,
        external_id
    )
}

fn with_suffix(stem: String, suffix: &str) -> String {
    if suffix.is_empty() {
        stem
    } else {
        format!("{} - {}", stem, suffix)
    }
}

/// `.ext` of `path`, or an empty string.
fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

fn subtitle_language(file_name: &str) -> Option<String> {
    SUBTITLE_LANGUAGE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

async fn create_dir(path: &Path) -> Result<(), ImportError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ImportError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Place one file, logging instead of failing.
async fn place_logged(source: &Path, target: &Path, kind: &str) -> bool {
    match place_file(source, target).await {
        Ok(method) => {
            debug!(
                source = %source.display(),
                target = %target.display(),
                method = ?method,
                "Placed file"
            );
            metrics::FILES_IMPORTED.with_label_values(&[kind]).inc();
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to place file");
            false
        }
    }
}
