//! Quality and season extraction from free-text release titles.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::Quality;

/// Quality markers in priority order; the first pattern that matches wins.
static QUALITY_PATTERNS: Lazy<Vec<(Regex, Quality)>> = Lazy::new(|| {
    [
        (r"(?i)\b4k\b", Quality::Uhd),
        (r"(?i)\b1080p\b", Quality::FullHd),
        (r"(?i)\b720p\b", Quality::Hd),
        (r"(?i)\b(?:480p|360p)\b", Quality::Sd),
    ]
    .into_iter()
    .map(|(pattern, quality)| (Regex::new(pattern).expect("valid quality pattern"), quality))
    .collect()
});

/// `S<n>` season marker. No trailing boundary, so `S02E05` yields season 2.
static SEASON_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d+)").expect("valid season pattern"));

/// Infer the quality tier of a release from its title.
pub fn parse_quality(title: &str) -> Quality {
    QUALITY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(title))
        .map(|(_, quality)| *quality)
        .unwrap_or(Quality::Unknown)
}

/// Infer the set of seasons a release covers.
///
/// One marker yields that season, two markers yield the inclusive range
/// between them (`S01-S03` is seasons 1 to 3), anything else is empty.
pub fn parse_seasons(title: &str) -> BTreeSet<u32> {
    let numbers: Vec<u32> = SEASON_PATTERN
        .captures_iter(title)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();

    match numbers.as_slice() {
        [single] => BTreeSet::from([*single]),
        [a, b] => (*a.min(b)..=*a.max(b)).collect(),
        _ => BTreeSet::new(),
    }
}
