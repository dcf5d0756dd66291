use tracing::{info, warn};

use crate::library::{Download, Movie, MovieFile};
use crate::notification::titles;

use super::{
    create_dir, display_name, dotted_extension, file_name, library_root, media_directory_name,
    place_logged, subtitle_language, with_suffix, ImportEngine, ImportError, ImportReport,
};

impl ImportEngine {
    /// Directory of `movie` inside its library.
    pub fn movie_directory(&self, movie: &Movie) -> std::path::PathBuf {
        library_root(
            &movie.library,
            &self.storage.movie_libraries,
            &self.storage.movie_directory,
        )
        .join(media_directory_name(
            &movie.name,
            movie.year,
            &movie.metadata_provider,
            movie.external_id,
        ))
    }

    /// Import a completed movie download into every slot bound to it.
    ///
    /// Only the first video file is used; more than one triggers a warning
    /// notification. Sets `download.imported` when a video was placed.
    pub async fn import_movie(
        &self,
        download: &mut Download,
        movie: &Movie,
        slots: &[MovieFile],
    ) -> Result<ImportReport, ImportError> {
        let files = self.gather(download).await?;
        let mut report = ImportReport::default();
        let title = display_name(&movie.name, movie.year);

        if files.videos.is_empty() {
            warn!(download = %download.title, movie = %title, "No video files in download");
            self.notifier.notify(
                titles::NO_VIDEO_FILES,
                format!("No video file found in '{}' for {}.", download.title, title),
            );
        } else if files.videos.len() > 1 {
            warn!(
                download = %download.title,
                count = files.videos.len(),
                "Multiple video files in movie download, importing only the first"
            );
            self.notifier.notify(
                titles::MULTIPLE_VIDEO_FILES,
                format!(
                    "Found {} video files in '{}' for {}. Only the first was imported.",
                    files.videos.len(),
                    download.title,
                    title
                ),
            );
        }

        let movie_dir = self.movie_directory(movie);
        create_dir(&movie_dir).await?;

        for slot in slots {
            let stem = with_suffix(title.clone(), &slot.file_path_suffix);

            if let Some(video) = files.videos.first() {
                let target = movie_dir.join(format!("{}{}", stem, dotted_extension(video)));
                if place_logged(video, &target, "video").await {
                    report.videos_placed += 1;
                }
            }

            for subtitle in &files.subtitles {
                let Some(language) = subtitle_language(file_name(subtitle)) else {
                    warn!(
                        file = %subtitle.display(),
                        "Subtitle has no language code, skipping"
                    );
                    continue;
                };
                let target = movie_dir.join(format!("{}.{}.srt", stem, language));
                if place_logged(subtitle, &target, "subtitle").await {
                    report.subtitles_placed += 1;
                }
            }
        }

        self.record_outcome("movie", download, &mut report);
        if report.imported {
            info!(movie = %title, download = %download.title, "Movie imported");
            self.notifier.notify(
                titles::MOVIE_DOWNLOADED,
                format!("Successfully downloaded {} from '{}'.", title, download.title),
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImportSuccessPolicy, StorageConfig};
    use crate::release::Quality;
    use crate::testing::notification_channel;
    use tempfile::TempDir;

    fn engine(root: &TempDir) -> (ImportEngine, tokio::sync::mpsc::Receiver<crate::notification::Notification>) {
        let storage = StorageConfig {
            torrent_directory: root.path().join("downloads"),
            movie_directory: root.path().join("movies"),
            tv_directory: root.path().join("tv"),
            image_directory: root.path().join("images"),
            ..StorageConfig::default()
        };
        let (handle, rx) = notification_channel();
        (ImportEngine::new(storage, ImportSuccessPolicy::Any, handle), rx)
    }

    fn slot(movie: &Movie, download: &Download, suffix: &str) -> MovieFile {
        MovieFile {
            movie_id: movie.id.clone(),
            quality: download.quality,
            download_id: Some(download.id.clone()),
            file_path_suffix: suffix.to_string(),
        }
    }

    #[tokio::test]
    async fn test_import_movie_with_subtitles() {
        let root = TempDir::new().unwrap();
        let (engine, mut rx) = engine(&root);
        let movie = Movie::new(949, "tmdb", "Heat", Some(1995));
        let mut download = Download::new("Heat.1995.1080p.BluRay", Quality::FullHd, "abc", false);

        let source = engine.download_directory(&download);
        std::fs::create_dir_all(source.join("Subs")).unwrap();
        std::fs::write(source.join("Heat.1995.1080p.mkv"), b"video").unwrap();
        std::fs::write(source.join("Subs/Heat.1995.en.srt"), b"sub").unwrap();
        std::fs::write(source.join("Subs/Heat.1995.srt"), b"sub").unwrap();
        std::fs::write(source.join("info.nfo"), b"nfo").unwrap();

        let slots = vec![slot(&movie, &download, "1080P")];
        let report = engine.import_movie(&mut download, &movie, &slots).await.unwrap();

        assert!(download.imported);
        assert_eq!(report.videos_placed, 1);
        assert_eq!(report.subtitles_placed, 1);

        let movie_dir = root.path().join("movies/Heat (1995)  [tmdbid-949]");
        assert!(movie_dir.join("Heat (1995) - 1080P.mkv").is_file());
        assert!(movie_dir.join("Heat (1995) - 1080P.en.srt").is_file());

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.title, titles::MOVIE_DOWNLOADED);
    }

    #[tokio::test]
    async fn test_multiple_videos_imports_first_and_warns() {
        let root = TempDir::new().unwrap();
        let (engine, mut rx) = engine(&root);
        let movie = Movie::new(1, "tmdb", "Heat", Some(1995));
        let mut download = Download::new("Heat.Collection", Quality::Hd, "abc", false);

        let source = engine.download_directory(&download);
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.mkv"), b"first").unwrap();
        std::fs::write(source.join("b.mkv"), b"second").unwrap();

        let slots = vec![slot(&movie, &download, "")];
        let report = engine.import_movie(&mut download, &movie, &slots).await.unwrap();
        assert_eq!(report.videos_placed, 1);

        let placed = root.path().join("movies/Heat (1995)  [tmdbid-1]/Heat (1995).mkv");
        assert_eq!(std::fs::read(placed).unwrap(), b"first");

        assert_eq!(rx.try_recv().unwrap().title, titles::MULTIPLE_VIDEO_FILES);
        assert_eq!(rx.try_recv().unwrap().title, titles::MOVIE_DOWNLOADED);
    }

    #[tokio::test]
    async fn test_no_video_leaves_download_unimported() {
        let root = TempDir::new().unwrap();
        let (engine, mut rx) = engine(&root);
        let movie = Movie::new(1, "tmdb", "Heat", Some(1995));
        let mut download = Download::new("Heat.Extras", Quality::Hd, "abc", false);

        let source = engine.download_directory(&download);
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("readme.txt"), b"text").unwrap();

        let slots = vec![slot(&movie, &download, "")];
        let report = engine.import_movie(&mut download, &movie, &slots).await.unwrap();
        assert!(!download.imported);
        assert!(!report.imported);
        assert_eq!(rx.try_recv().unwrap().title, titles::NO_VIDEO_FILES);
    }

    #[tokio::test]
    async fn test_missing_download_directory() {
        let root = TempDir::new().unwrap();
        let (engine, _rx) = engine(&root);
        let movie = Movie::new(1, "tmdb", "Heat", Some(1995));
        let mut download = Download::new("Never.Downloaded", Quality::Hd, "abc", false);

        let result = engine.import_movie(&mut download, &movie, &[]).await;
        assert!(matches!(result, Err(ImportError::MissingDirectory(_))));
        assert!(!download.imported);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let root = TempDir::new().unwrap();
        let (engine, _rx) = engine(&root);
        let movie = Movie::new(949, "tmdb", "Heat", Some(1995));
        let mut download = Download::new("Heat.1995.720p", Quality::Hd, "abc", false);

        let source = engine.download_directory(&download);
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("Heat.mkv"), b"video").unwrap();

        let slots = vec![slot(&movie, &download, "")];
        engine.import_movie(&mut download, &movie, &slots).await.unwrap();
        engine.import_movie(&mut download, &movie, &slots).await.unwrap();

        let movie_dir = root.path().join("movies/Heat (1995)  [tmdbid-949]");
        assert_eq!(std::fs::read_dir(&movie_dir).unwrap().count(), 1);
        assert!(download.imported);
    }
}
