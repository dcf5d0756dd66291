//! Candidate releases and quality tiers.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::parser::{parse_quality, parse_seasons};

/// Video resolution tier, declared worst to best so the derived `Ord` ranks `Uhd` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Unknown,
    Sd,
    Hd,
    #[serde(rename = "fullhd")]
    FullHd,
    Uhd,
}

impl Quality {
    /// Returns the string representation used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::Sd => "sd",
            Quality::Hd => "hd",
            Quality::FullHd => "fullhd",
            Quality::Uhd => "uhd",
        }
    }

    /// Human-facing resolution label.
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::Sd => "480p",
            Quality::Hd => "720p",
            Quality::FullHd => "1080p",
            Quality::Uhd => "4K",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Quality::Unknown),
            "sd" => Ok(Quality::Sd),
            "hd" => Ok(Quality::Hd),
            "fullhd" => Ok(Quality::FullHd),
            "uhd" => Ok(Quality::Uhd),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

/// An indexer search hit.
///
/// Quality and seasons are derived from the title on every call and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRelease {
    /// Durable identity, assigned when the search result is persisted.
    pub id: String,
    pub title: String,
    /// Magnet URI or file URL. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub download_url: String,
    /// Always 0 for usenet releases.
    pub seeders: u32,
    pub size_bytes: u64,
    pub usenet: bool,
    /// Release age in seconds. Always 0 for torrents.
    pub age_secs: u64,
    pub indexer: Option<String>,
    /// Indexer-reported flags such as "freeleech".
    pub flags: Vec<String>,
    /// Cumulative scoring result, starts at 0.
    pub score: i64,
}

impl CandidateRelease {
    /// Create a torrent candidate with a fresh id and zero score.
    pub fn torrent(title: impl Into<String>, download_url: impl Into<String>, seeders: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            download_url: download_url.into(),
            seeders,
            size_bytes: 0,
            usenet: false,
            age_secs: 0,
            indexer: None,
            flags: Vec::new(),
            score: 0,
        }
    }

    /// Create a usenet candidate with a fresh id and zero score.
    pub fn usenet(title: impl Into<String>, download_url: impl Into<String>, age_secs: u64) -> Self {
        Self {
            seeders: 0,
            usenet: true,
            age_secs,
            ..Self::torrent(title, download_url, 0)
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_indexer(mut self, indexer: impl Into<String>) -> Self {
        self.indexer = Some(indexer.into());
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn quality(&self) -> Quality {
        parse_quality(&self.title)
    }

    pub fn seasons(&self) -> BTreeSet<u32> {
        parse_seasons(&self.title)
    }

    /// Ranking comparison: `Ordering::Less` means `self` is the better candidate.
    ///
    /// Quality, then score, then usenet before torrent, then age (usenet) or
    /// seeders (torrent), then the smaller size. Title and id make the order total.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .quality()
            .cmp(&self.quality())
            .then_with(|| other.score.cmp(&self.score))
            .then_with(|| other.usenet.cmp(&self.usenet))
            .then_with(|| {
                if self.usenet {
                    other.age_secs.cmp(&self.age_secs)
                } else {
                    other.seeders.cmp(&self.seeders)
                }
            })
            .then_with(|| self.size_bytes.cmp(&other.size_bytes))
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort candidates best first.
pub fn sort_best_first(candidates: &mut [CandidateRelease]) {
    candidates.sort_by(CandidateRelease::rank_cmp);
}
