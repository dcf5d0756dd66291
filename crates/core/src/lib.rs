pub mod config;
pub mod download_client;
pub mod hash;
pub mod importer;
pub mod indexer;
pub mod library;
pub mod metadata;
pub mod metrics;
pub mod notification;
pub mod pipeline;
pub mod release;
pub mod scoring;
pub mod search;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use library::{MediaRepository, RepositoryError, SqliteRepository};
pub use notification::{create_notification_system, LogSink, NotificationHandle};
pub use pipeline::{AcquisitionPipeline, MediaTarget, PipelineError, PipelineScheduler};
pub use release::{CandidateRelease, Quality};
