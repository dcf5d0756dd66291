use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Library-scope sentinels accepted in scoring rule sets.
pub const ALL_TV: &str = "ALL_TV";
pub const ALL_MOVIES: &str = "ALL_MOVIES";

/// Validate configuration
/// Currently validates:
/// - Enabled indexers and download clients have a URL
/// - A configured TVDB relay has a URL
/// - Scoring rule names are unique across title and flag rules
/// - Rule sets only reference defined rules
/// - Library names are unique per media type
/// - Scheduler intervals are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let Some(jackett) = &config.indexers.jackett {
        if jackett.enabled && jackett.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "indexers.jackett.url cannot be empty".to_string(),
            ));
        }
        if jackett.enabled && jackett.indexers.is_empty() {
            return Err(ConfigError::ValidationError(
                "indexers.jackett.indexers cannot be empty".to_string(),
            ));
        }
    }

    if let Some(prowlarr) = &config.indexers.prowlarr {
        if prowlarr.enabled && prowlarr.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "indexers.prowlarr.url cannot be empty".to_string(),
            ));
        }
    }

    let clients = &config.download_clients;
    let client_urls = [
        (
            "qbittorrent",
            clients.qbittorrent.as_ref().map(|c| (c.enabled, &c.url)),
        ),
        (
            "transmission",
            clients.transmission.as_ref().map(|c| (c.enabled, &c.url)),
        ),
        ("sabnzbd", clients.sabnzbd.as_ref().map(|c| (c.enabled, &c.url))),
    ];
    for (name, entry) in client_urls {
        if let Some((true, url)) = entry {
            if url.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "download_clients.{}.url cannot be empty",
                    name
                )));
            }
        }
    }

    if let Some(tvdb) = &config.metadata.tvdb {
        if tvdb.relay_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "metadata.tvdb.relay_url cannot be empty".to_string(),
            ));
        }
    }

    let mut rule_names = HashSet::new();
    let title_names = config.indexers.title_scoring_rules.iter().map(|r| &r.name);
    let flag_names = config
        .indexers
        .indexer_flag_scoring_rules
        .iter()
        .map(|r| &r.name);
    for name in title_names.chain(flag_names) {
        if !rule_names.insert(name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "scoring rule '{}' is defined more than once",
                name
            )));
        }
    }

    for rule_set in &config.indexers.scoring_rule_sets {
        if let Some(missing) = rule_set
            .rule_names
            .iter()
            .find(|name| !rule_names.contains(name.as_str()))
        {
            return Err(ConfigError::ValidationError(format!(
                "scoring rule set '{}' references unknown rule '{}'",
                rule_set.name, missing
            )));
        }
    }

    for (kind, libraries) in [
        ("tv_libraries", &config.storage.tv_libraries),
        ("movie_libraries", &config.storage.movie_libraries),
    ] {
        let mut seen = HashSet::new();
        for library in libraries {
            if library.name == ALL_TV || library.name == ALL_MOVIES {
                return Err(ConfigError::ValidationError(format!(
                    "storage.{}: '{}' is a reserved library name",
                    kind, library.name
                )));
            }
            if !seen.insert(library.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "storage.{}: duplicate library '{}'",
                    kind, library.name
                )));
            }
        }
    }

    if config.scheduler.import_interval_secs == 0
        || config.scheduler.auto_download_interval_secs == 0
    {
        return Err(ConfigError::ValidationError(
            "scheduler intervals cannot be 0".to_string(),
        ));
    }

    Ok(())
}
