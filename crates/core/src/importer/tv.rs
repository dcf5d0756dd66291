use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::library::{Download, SeasonFile, Show};
use crate::notification::titles;

use super::{
    create_dir, display_name, dotted_extension, file_name, library_root, media_directory_name,
    place_logged, sanitize_filename, subtitle_language, with_suffix, ImportEngine, ImportError,
    ImportReport,
};

/// `S<season>E<episode>` delimited by dots or spaces.
static EPISODE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[. ])S(\d+)E(\d+)[. ]").expect("valid regex"));

/// Whether `digits` spells `number` with at most one leading zero.
fn number_matches(digits: &str, number: u32) -> bool {
    let plain = number.to_string();
    digits == plain || digits.strip_prefix('0') == Some(plain.as_str())
}

/// Whether `file_name` carries the tag of the given episode.
///
/// Adjacent tags share their delimiter, so each scan resumes on the trailing
/// delimiter of the previous match.
pub(crate) fn matches_episode(file_name: &str, season: u32, episode: u32) -> bool {
    let mut start = 0;
    while let Some(caps) = EPISODE_TAG.captures_at(file_name, start) {
        let s = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let e = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        if number_matches(s, season) && number_matches(e, episode) {
            return true;
        }
        match caps.get(0) {
            Some(m) if m.end() > start + 1 => start = m.end() - 1,
            _ => break,
        }
    }
    false
}

fn find_episode_video<'a>(videos: &'a [PathBuf], season: u32, episode: u32) -> Option<&'a Path> {
    videos
        .iter()
        .find(|v| matches_episode(file_name(v), season, episode))
        .map(PathBuf::as_path)
}

impl ImportEngine {
    /// Directory of `show` inside its library.
    pub fn show_directory(&self, show: &Show) -> PathBuf {
        library_root(&show.library, &self.storage.tv_libraries, &self.storage.tv_directory).join(
            media_directory_name(&show.name, show.year, &show.metadata_provider, show.external_id),
        )
    }

    /// Import a completed season download, episode by episode.
    ///
    /// Each episode takes the first video whose name carries its tag. Missing
    /// episodes are notified and do not stop the remaining ones.
    pub async fn import_season_files(
        &self,
        download: &mut Download,
        show: &Show,
        slots: &[SeasonFile],
    ) -> Result<ImportReport, ImportError> {
        let files = self.gather(download).await?;
        let mut report = ImportReport::default();
        let show_dir = self.show_directory(show);
        let show_name = sanitize_filename(&show.name);

        if files.videos.is_empty() {
            warn!(download = %download.title, show = %show.name, "No video files in download");
            self.notifier.notify(
                titles::NO_VIDEO_FILES,
                format!("No video file found in '{}' for {}.", download.title, show.name),
            );
        }

        let mut imported_seasons = Vec::new();

        for slot in slots {
            let Some(season) = show.season(&slot.season_id) else {
                warn!(season_id = %slot.season_id, show = %show.name, "Slot references an unknown season");
                continue;
            };

            let season_dir = show_dir.join(format!("Season {}", season.number));
            create_dir(&season_dir).await?;

            for episode in &season.episodes {
                let tag = format!("S{:02}E{:02}", season.number, episode.number);
                let stem = with_suffix(format!("{} {}", show_name, tag), &slot.file_path_suffix);

                for subtitle in &files.subtitles {
                    let name = file_name(subtitle);
                    if !matches_episode(name, season.number, episode.number) {
                        continue;
                    }
                    let Some(language) = subtitle_language(name) else {
                        debug!(file = %subtitle.display(), "Episode subtitle has no language code");
                        continue;
                    };
                    let target = season_dir.join(format!("{}.{}.srt", stem, language));
                    if place_logged(subtitle, &target, "subtitle").await {
                        report.subtitles_placed += 1;
                    }
                }

                match find_episode_video(&files.videos, season.number, episode.number) {
                    Some(video) => {
                        let target =
                            season_dir.join(format!("{}{}", stem, dotted_extension(video)));
                        if place_logged(video, &target, "video").await {
                            report.videos_placed += 1;
                        }
                    }
                    None => {
                        warn!(
                            episode = %tag,
                            download = %download.title,
                            "No video file for episode"
                        );
                        self.notifier.notify(
                            titles::MISSING_EPISODE,
                            format!(
                                "No video file found for {} in '{}' for {}.",
                                tag, download.title, show.name
                            ),
                        );
                        report.missing_episodes.push(tag);
                    }
                }
            }

            imported_seasons.push(season.number);
        }

        self.record_outcome("season", download, &mut report);
        if report.imported {
            let seasons = imported_seasons
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            info!(show = %show.name, seasons = %seasons, "Season imported");
            self.notifier.notify(
                titles::SEASON_DOWNLOADED,
                format!(
                    "Successfully downloaded season {} of {}.",
                    seasons,
                    display_name(&show.name, show.year)
                ),
            );
        }
        Ok(report)
    }
}
