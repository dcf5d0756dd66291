use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub indexers: IndexersConfig,
    #[serde(default)]
    pub download_clients: DownloadClientsConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration (health and metrics endpoints only)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mediarr.db")
}

/// Storage roots and named libraries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Where download clients place their output (and where `.torrent` files are staged).
    #[serde(default = "default_torrent_directory")]
    pub torrent_directory: PathBuf,
    /// Default root for shows that are not assigned to a known library.
    #[serde(default = "default_tv_directory")]
    pub tv_directory: PathBuf,
    /// Default root for movies that are not assigned to a known library.
    #[serde(default = "default_movie_directory")]
    pub movie_directory: PathBuf,
    /// Poster storage.
    #[serde(default = "default_image_directory")]
    pub image_directory: PathBuf,
    #[serde(default)]
    pub tv_libraries: Vec<LibraryConfig>,
    #[serde(default)]
    pub movie_libraries: Vec<LibraryConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            torrent_directory: default_torrent_directory(),
            tv_directory: default_tv_directory(),
            movie_directory: default_movie_directory(),
            image_directory: default_image_directory(),
            tv_libraries: Vec::new(),
            movie_libraries: Vec::new(),
        }
    }
}

fn default_torrent_directory() -> PathBuf {
    PathBuf::from("/data/torrents")
}

fn default_tv_directory() -> PathBuf {
    PathBuf::from("/data/tv")
}

fn default_movie_directory() -> PathBuf {
    PathBuf::from("/data/movies")
}

fn default_image_directory() -> PathBuf {
    PathBuf::from("/data/images")
}

/// A named library root.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LibraryConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Indexer backends and scoring rules.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexersConfig {
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
    #[serde(default)]
    pub prowlarr: Option<ProwlarrConfig>,
    #[serde(default)]
    pub title_scoring_rules: Vec<TitleScoringRule>,
    #[serde(default)]
    pub indexer_flag_scoring_rules: Vec<IndexerFlagScoringRule>,
    #[serde(default)]
    pub scoring_rule_sets: Vec<ScoringRuleSet>,
}

/// Jackett (Torznab) indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    pub api_key: String,
    /// Sub-indexers to query; "all" queries Jackett's aggregate endpoint.
    #[serde(default = "default_jackett_indexers")]
    pub indexers: Vec<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum sub-indexer requests in flight.
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,
}

fn default_jackett_indexers() -> Vec<String> {
    vec!["all".to_string()]
}

/// Prowlarr (JSON-REST) indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProwlarrConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_prowlarr_url")]
    pub url: String,
    pub api_key: String,
    /// Drop torrent results whose download URL cannot be resolved through redirects.
    #[serde(default = "default_true")]
    pub reject_torrents_on_url_error: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum results resolved concurrently.
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,
}

fn default_prowlarr_url() -> String {
    "http://localhost:9696".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_parallel_requests() -> usize {
    8
}

fn default_true() -> bool {
    true
}

/// Adds `score_modifier` when any keyword occurs in the title (or, when negated, when none does).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TitleScoringRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub score_modifier: i64,
    #[serde(default)]
    pub negate: bool,
}

/// Adds `score_modifier` when any flag is reported by the indexer (or, when negated, when none is).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IndexerFlagScoringRule {
    pub name: String,
    pub flags: Vec<String>,
    pub score_modifier: i64,
    #[serde(default)]
    pub negate: bool,
}

/// Group of rule names applied to a set of libraries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScoringRuleSet {
    pub name: String,
    /// Library names, or the sentinels `ALL_TV` / `ALL_MOVIES`.
    pub libraries: Vec<String>,
    pub rule_names: Vec<String>,
}

/// Download client backends.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadClientsConfig {
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    #[serde(default)]
    pub transmission: Option<TransmissionConfig>,
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// qBittorrent WebUI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default = "default_qb_username")]
    pub username: String,
    #[serde(default = "default_qb_password")]
    pub password: String,
    #[serde(default = "default_category_name")]
    pub category_name: String,
    /// Save path of the category as seen from qBittorrent (empty: qBittorrent default).
    #[serde(default)]
    pub category_save_path: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_qb_username() -> String {
    "admin".to_string()
}

fn default_qb_password() -> String {
    "admin".to_string()
}

fn default_category_name() -> String {
    "MediaManager".to_string()
}

/// Transmission RPC configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Full RPC endpoint (e.g., "http://localhost:9091/transmission/rpc")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// SABnzbd API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Base URL without the `/api` suffix (e.g., "http://localhost:8080")
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// When a download counts as imported.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportSuccessPolicy {
    /// At least one video file was placed.
    #[default]
    Any,
    /// Every expected episode was placed.
    All,
}

/// Import and auto-download behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub success_policy: ImportSuccessPolicy,
    /// Minimum seeders for torrent candidates picked by auto-download.
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            success_policy: ImportSuccessPolicy::default(),
            min_seeders: default_min_seeders(),
        }
    }
}

fn default_min_seeders() -> u32 {
    3
}

/// Metadata provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub tmdb: Option<TmdbConfig>,
    #[serde(default)]
    pub tvdb: Option<TvdbConfig>,
}

/// TMDB API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    pub api_key: String,
    /// Base URL (default: https://api.themoviedb.org/3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Image base URL for posters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base_url: Option<String>,
}

/// TVDB configuration. TVDB is reached through a relay that holds the API key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TvdbConfig {
    /// Relay base URL, e.g. `https://metadata-relay.example.org/tvdb`.
    pub relay_url: String,
}

/// Batch job intervals for the binary's scheduler loop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_import_interval")]
    pub import_interval_secs: u64,
    #[serde(default = "default_auto_download_interval")]
    pub auto_download_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            import_interval_secs: default_import_interval(),
            auto_download_interval_secs: default_auto_download_interval(),
        }
    }
}

fn default_import_interval() -> u64 {
    120
}

fn default_auto_download_interval() -> u64 {
    1800
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub jackett: Option<SanitizedEndpoint>,
    pub prowlarr: Option<SanitizedEndpoint>,
    pub qbittorrent: Option<SanitizedEndpoint>,
    pub transmission: Option<SanitizedEndpoint>,
    pub sabnzbd: Option<SanitizedEndpoint>,
    pub tmdb_configured: bool,
    pub tvdb_relay_url: Option<String>,
    pub scoring_rule_sets: Vec<String>,
    pub import: ImportConfig,
    pub scheduler: SchedulerConfig,
}

/// An external endpoint with its credential hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEndpoint {
    pub enabled: bool,
    pub url: String,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            jackett: config.indexers.jackett.as_ref().map(|j| SanitizedEndpoint {
                enabled: j.enabled,
                url: j.url.clone(),
                credentials_configured: !j.api_key.is_empty(),
            }),
            prowlarr: config.indexers.prowlarr.as_ref().map(|p| SanitizedEndpoint {
                enabled: p.enabled,
                url: p.url.clone(),
                credentials_configured: !p.api_key.is_empty(),
            }),
            qbittorrent: config
                .download_clients
                .qbittorrent
                .as_ref()
                .map(|q| SanitizedEndpoint {
                    enabled: q.enabled,
                    url: q.url.clone(),
                    credentials_configured: !q.password.is_empty(),
                }),
            transmission: config
                .download_clients
                .transmission
                .as_ref()
                .map(|t| SanitizedEndpoint {
                    enabled: t.enabled,
                    url: t.url.clone(),
                    credentials_configured: !t.password.is_empty(),
                }),
            sabnzbd: config
                .download_clients
                .sabnzbd
                .as_ref()
                .map(|s| SanitizedEndpoint {
                    enabled: s.enabled,
                    url: s.url.clone(),
                    credentials_configured: !s.api_key.is_empty(),
                }),
            tmdb_configured: config
                .metadata
                .tmdb
                .as_ref()
                .is_some_and(|t| !t.api_key.is_empty()),
            tvdb_relay_url: config.metadata.tvdb.as_ref().map(|t| t.relay_url.clone()),
            scoring_rule_sets: config
                .indexers
                .scoring_rule_sets
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            import: config.import.clone(),
            scheduler: config.scheduler.clone(),
        }
    }
}
