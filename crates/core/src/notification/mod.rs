//! Fire-and-forget user notifications.
//!
//! Components hold a cloneable [`NotificationHandle`]; a single
//! [`NotificationDispatcher`] task drains the channel into a
//! [`NotificationSink`] (email, push, webhook, or just the log).

mod dispatcher;
mod handle;

pub use dispatcher::{
    create_notification_system, DeliveryError, LogSink, NotificationDispatcher, NotificationSink,
};
pub use handle::NotificationHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification addressed to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Notification titles emitted by the pipeline.
pub mod titles {
    pub const INDEXER_FAILURE: &str = "Indexer Failure";
    pub const NO_SEARCH_RESULTS: &str = "No Search Results";
    pub const MOVIE_DOWNLOADED: &str = "Movie Downloaded";
    pub const MULTIPLE_VIDEO_FILES: &str = "Multiple Video Files Found";
    pub const SEASON_DOWNLOADED: &str = "Season Downloaded";
    pub const MISSING_EPISODE: &str = "Missing Episode File";
    pub const NO_VIDEO_FILES: &str = "No Video Files Found";
    pub const IMPORT_FAILED: &str = "Import Failed";
}
