//! Listing, archive extraction, and classification of download output.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// MIME types treated as archives.
const ARCHIVE_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/vnd.rar",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/x-freearc",
    "application/x-bzip",
    "application/x-bzip2",
    "application/gzip",
    "application/x-gzip",
    "application/x-tar",
];

/// Files of a download split by kind, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadFiles {
    pub videos: Vec<PathBuf>,
    pub subtitles: Vec<PathBuf>,
    pub all: Vec<PathBuf>,
}

/// Kind of a file as far as import is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Subtitle,
    Other,
}

/// Recursively list regular files under `root`, in file name order per directory.
///
/// Directories are traversed but not returned; symlinks are neither.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    debug!(root = %root.display(), count = files.len(), "Listed download files");
    files
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extensions recognized even when the MIME table has no entry for them.
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "tgz", "bz2"];

pub fn is_archive(path: &Path) -> bool {
    let by_mime = mime_guess::from_path(path)
        .iter()
        .any(|mime| ARCHIVE_MIME_TYPES.contains(&mime.essence_str()));
    by_mime
        || extension_lowercase(path)
            .is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
}

/// Classify a file by its guessed MIME type.
///
/// `.srt` files count as subtitles unless their MIME type is known and neither
/// textual nor SubRip.
pub fn classify(path: &Path) -> FileKind {
    let mime = mime_guess::from_path(path).first();
    let is_srt = extension_lowercase(path).as_deref() == Some("srt");

    match mime {
        Some(mime) if mime.type_() == mime_guess::mime::VIDEO => FileKind::Video,
        Some(mime)
            if is_srt
                && (mime.type_() == mime_guess::mime::TEXT
                    || mime.subtype().as_str() == "x-subrip") =>
        {
            FileKind::Subtitle
        }
        None if is_srt => FileKind::Subtitle,
        _ => FileKind::Other,
    }
}

/// Split `files` into videos and subtitles, keeping their order.
pub fn classify_files(files: Vec<PathBuf>) -> DownloadFiles {
    let mut result = DownloadFiles::default();
    for file in &files {
        match classify(file) {
            FileKind::Video => result.videos.push(file.clone()),
            FileKind::Subtitle => result.subtitles.push(file.clone()),
            FileKind::Other => debug!(file = %file.display(), "Ignoring non-media file"),
        }
    }
    result.all = files;
    result
}

fn extract_command(archive: &Path, dest_dir: &Path) -> Command {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".zip") {
        let mut cmd = Command::new("unzip");
        cmd.arg("-o").arg("-q").arg(archive).arg("-d").arg(dest_dir);
        cmd
    } else if name.ends_with(".rar") {
        let mut cmd = Command::new("unrar");
        cmd.arg("x").arg("-o+").arg("-y").arg(archive).arg(dest_dir);
        cmd
    } else if name.ends_with(".7z") {
        let mut cmd = Command::new("7z");
        cmd.arg("x")
            .arg("-y")
            .arg(format!("-o{}", dest_dir.display()))
            .arg(archive);
        cmd
    } else {
        let mut cmd = Command::new("tar");
        cmd.arg("-xf").arg(archive).arg("-C").arg(dest_dir);
        cmd
    }
}

/// Extract every archive in `files` into its containing directory.
///
/// Returns the number of archives extracted. Failures are logged and skipped.
pub async fn extract_archives(files: &[PathBuf]) -> usize {
    let mut extracted = 0;

    for archive in files.iter().filter(|f| is_archive(f)) {
        let Some(dest_dir) = archive.parent() else {
            continue;
        };
        info!(
            archive = %archive.display(),
            destination = %dest_dir.display(),
            "Extracting archive"
        );

        let output = extract_command(archive, dest_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => extracted += 1,
            Ok(output) => error!(
                archive = %archive.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Archive extraction failed"
            ),
            Err(e) => error!(
                archive = %archive.display(),
                error = %e,
                "Failed to run archive extractor"
            ),
        }
    }

    extracted
}

/// List, extract archives once, re-list, and classify the files under `root`.
pub async fn collect(root: &Path) -> DownloadFiles {
    let files = list_files(root);
    let files = if extract_archives(&files).await > 0 {
        list_files(root)
    } else {
        files
    };

    let classified = classify_files(files);
    info!(
        root = %root.display(),
        total = classified.all.len(),
        videos = classified.videos.len(),
        subtitles = classified.subtitles.len(),
        "Classified download files"
    );
    classified
}
