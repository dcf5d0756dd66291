//! Search orchestration across every enabled indexer.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, warn};

use crate::indexer::Indexer;
use crate::library::{MediaRepository, RepositoryError};
use crate::metrics;
use crate::notification::{titles, NotificationHandle};
use crate::release::CandidateRelease;

/// How long persisted search results stay available for submission.
const CANDIDATE_RETENTION_HOURS: i64 = 24;

/// Fans a query out to all indexers and persists every hit.
pub struct SearchOrchestrator {
    indexers: Vec<Arc<dyn Indexer>>,
    repository: Arc<dyn MediaRepository>,
    notifier: NotificationHandle,
    retention: Duration,
}

impl SearchOrchestrator {
    pub fn new(
        indexers: Vec<Arc<dyn Indexer>>,
        repository: Arc<dyn MediaRepository>,
        notifier: NotificationHandle,
    ) -> Self {
        Self {
            indexers,
            repository,
            notifier,
            retention: Duration::hours(CANDIDATE_RETENTION_HOURS),
        }
    }

    /// Keep persisted results for `retention` instead of the default day.
    pub fn with_candidate_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn indexer_names(&self) -> Vec<&str> {
        self.indexers.iter().map(|i| i.name()).collect()
    }

    /// Query every indexer concurrently and return the merged results.
    ///
    /// Indexer failures are logged and reported in one aggregated
    /// notification. Results are merged in completion order and each one is
    /// persisted before returning; a persistence failure is returned.
    /// Results older than the retention window are dropped first.
    pub async fn search(
        &self,
        query: &str,
        is_tv: bool,
    ) -> Result<Vec<CandidateRelease>, RepositoryError> {
        debug!(query = query, is_tv, indexers = self.indexers.len(), "Starting search");

        let mut pending: FuturesUnordered<_> = self
            .indexers
            .iter()
            .map(|indexer| async move {
                let result = indexer.search(query, is_tv).await;
                (indexer.name().to_string(), result)
            })
            .collect();

        let mut results = Vec::new();
        let mut failed = Vec::new();

        while let Some((name, outcome)) = pending.next().await {
            match outcome {
                Ok(mut found) => {
                    debug!(indexer = %name, results = found.len(), "Indexer returned results");
                    results.append(&mut found);
                }
                Err(e) => {
                    error!(indexer = %name, query = query, error = %e, "Indexer search failed");
                    metrics::INDEXER_FAILURES.with_label_values(&[&name]).inc();
                    failed.push(name);
                }
            }
        }

        if !failed.is_empty() {
            self.notifier.notify(
                titles::INDEXER_FAILURE,
                format!(
                    "The following indexers failed for query '{}': {}. Check indexer configuration and connectivity.",
                    query,
                    failed.join(", ")
                ),
            );
        }

        if results.is_empty() {
            metrics::SEARCHES.with_label_values(&["empty"]).inc();
            self.notifier.notify(
                titles::NO_SEARCH_RESULTS,
                format!(
                    "No releases found for query '{}' from any configured indexer.",
                    query
                ),
            );
        } else {
            metrics::SEARCHES.with_label_values(&["results"]).inc();
        }
        metrics::CANDIDATES_FOUND
            .with_label_values(&[])
            .observe(results.len() as f64);

        match self.repository.prune_candidates(Utc::now() - self.retention) {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "Pruned stale search results"),
            Err(e) => warn!(error = %e, "Failed to prune stale search results"),
        }
        for candidate in &results {
            self.repository.save_candidate(candidate)?;
        }

        info!(query = query, results = results.len(), failed = failed.len(), "Search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::IndexerError;
    use crate::library::SqliteRepository;
    use crate::testing::{notification_channel, MockIndexer};

    fn torrent(title: &str) -> CandidateRelease {
        CandidateRelease::torrent(title, "magnet:?xt=urn:btih:abc", 10)
    }

    #[tokio::test]
    async fn test_merges_results_and_persists_them() {
        let repo = Arc::new(SqliteRepository::in_memory().unwrap());
        let (notifier, mut rx) = notification_channel();
        let a: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("a").with_results(vec![torrent("Movie.2020.1080p")]));
        let b: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("b").with_results(vec![torrent("Movie.2020.720p")]));

        let orchestrator = SearchOrchestrator::new(vec![a, b], repo.clone(), notifier);
        let results = orchestrator.search("Movie", false).await.unwrap();

        assert_eq!(results.len(), 2);
        for candidate in &results {
            assert_eq!(repo.get_candidate(&candidate.id).unwrap().title, candidate.title);
        }
        assert!(rx.try_recv().is_err(), "no notification expected");
    }

    #[tokio::test]
    async fn test_stale_results_are_pruned_on_next_search() {
        let repo = Arc::new(SqliteRepository::in_memory().unwrap());
        let old = torrent("Movie.2020.720p");
        let fresh = torrent("Movie.2020.1080p");

        let first: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("a").with_results(vec![old.clone()]));
        SearchOrchestrator::new(vec![first], repo.clone(), NotificationHandle::disabled())
            .search("Movie", false)
            .await
            .unwrap();
        assert!(repo.get_candidate(&old.id).is_ok());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("a").with_results(vec![fresh.clone()]));
        SearchOrchestrator::new(vec![second], repo.clone(), NotificationHandle::disabled())
            .with_candidate_retention(Duration::zero())
            .search("Movie", false)
            .await
            .unwrap();

        assert!(matches!(
            repo.get_candidate(&old.id),
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(repo.get_candidate(&fresh.id).is_ok());
    }

    #[tokio::test]
    async fn test_failures_are_aggregated_into_one_notification() {
        let repo = Arc::new(SqliteRepository::in_memory().unwrap());
        let (notifier, mut rx) = notification_channel();
        let ok: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("ok").with_results(vec![torrent("Show.S01.1080p")]));
        let bad1: Arc<dyn Indexer> =
            Arc::new(MockIndexer::new("bad1").with_error(IndexerError::Timeout));
        let bad2: Arc<dyn Indexer> = Arc::new(
            MockIndexer::new("bad2").with_error(IndexerError::ApiError("HTTP 500".into())),
        );

        let orchestrator = SearchOrchestrator::new(vec![bad1, ok, bad2], repo, notifier);
        let results = orchestrator.search("Show", true).await.unwrap();
        assert_eq!(results.len(), 1);

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.title, titles::INDEXER_FAILURE);
        assert!(notification.message.contains("bad1"));
        assert!(notification.message.contains("bad2"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_results_notify() {
        let repo = Arc::new(SqliteRepository::in_memory().unwrap());
        let (notifier, mut rx) = notification_channel();
        let empty: Arc<dyn Indexer> = Arc::new(MockIndexer::new("empty"));

        let orchestrator = SearchOrchestrator::new(vec![empty], repo, notifier);
        let results = orchestrator.search("Nothing", false).await.unwrap();

        assert!(results.is_empty());
        assert_eq!(rx.try_recv().unwrap().title, titles::NO_SEARCH_RESULTS);
    }

    #[tokio::test]
    async fn test_indexers_receive_query_and_type() {
        let repo = Arc::new(SqliteRepository::in_memory().unwrap());
        let indexer = Arc::new(MockIndexer::new("a"));
        let orchestrator = SearchOrchestrator::new(
            vec![indexer.clone() as Arc<dyn Indexer>],
            repo,
            NotificationHandle::disabled(),
        );

        orchestrator.search("Show s01", true).await.unwrap();
        assert_eq!(indexer.queries(), vec![("Show s01".to_string(), true)]);
    }
}
