//! Filename sanitizing and link-first file placement.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use super::ImportError;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip characters that are invalid in file names, then trim dots and spaces from both ends.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    stripped.trim_matches(|c| c == '.' || c == ' ').to_string()
}

/// How a file ended up at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMethod {
    Hardlink,
    Copy,
}

/// Place `source` at `target`.
///
/// Any existing file at `target` is removed first. A hardlink is attempted;
/// on any error the file is copied instead.
pub async fn place_file(source: &Path, target: &Path) -> Result<PlacementMethod, ImportError> {
    match fs::remove_file(target).await {
        Ok(()) => debug!(target = %target.display(), "Removed existing file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ImportError::Placement {
                source_path: source.to_path_buf(),
                target: target.to_path_buf(),
                error: e,
            })
        }
    }

    match fs::hard_link(source, target).await {
        Ok(()) => return Ok(PlacementMethod::Hardlink),
        Err(e) => warn!(
            source = %source.display(),
            target = %target.display(),
            error = %e,
            "Hardlink failed, falling back to copy"
        ),
    }

    fs::copy(source, target)
        .await
        .map_err(|e| ImportError::Placement {
            source_path: source.to_path_buf(),
            target: target.to_path_buf(),
            error: e,
        })?;
    Ok(PlacementMethod::Copy)
}
