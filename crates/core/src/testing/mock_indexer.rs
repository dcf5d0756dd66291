//! Mock indexer for testing.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::indexer::{Indexer, IndexerError};
use crate::release::CandidateRelease;

#[derive(Debug, Default)]
struct MockState {
    results: Vec<CandidateRelease>,
    error: Option<IndexerError>,
    queries: Vec<(String, bool)>,
}

/// Mock implementation of the Indexer trait.
///
/// Returns the configured results (with fresh ids on every search) or the
/// configured error, and records every query.
#[derive(Debug, Clone)]
pub struct MockIndexer {
    name: String,
    state: Arc<RwLock<MockState>>,
}

impl MockIndexer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    pub fn with_results(self, results: Vec<CandidateRelease>) -> Self {
        self.set_results(results);
        self
    }

    /// Fail every search with `error`.
    pub fn with_error(self, error: IndexerError) -> Self {
        self.state.write().expect("mock state poisoned").error = Some(error);
        self
    }

    pub fn set_results(&self, results: Vec<CandidateRelease>) {
        self.state.write().expect("mock state poisoned").results = results;
    }

    /// `(query, is_tv)` of every search, in call order.
    pub fn queries(&self) -> Vec<(String, bool)> {
        self.state.read().expect("mock state poisoned").queries.clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, is_tv: bool) -> Result<Vec<CandidateRelease>, IndexerError> {
        let mut state = self.state.write().expect("mock state poisoned");
        state.queries.push((query.to_string(), is_tv));

        if let Some(error) = &state.error {
            return Err(error.clone());
        }

        Ok(state
            .results
            .iter()
            .cloned()
            .map(|mut candidate| {
                candidate.id = uuid::Uuid::new_v4().to_string();
                candidate.indexer.get_or_insert_with(|| self.name.clone());
                candidate
            })
            .collect())
    }
}
