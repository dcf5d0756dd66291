use std::sync::Arc;

use mediarr_core::PipelineScheduler;

/// Shared application state
pub struct AppState {
    scheduler: Arc<PipelineScheduler>,
}

impl AppState {
    pub fn new(scheduler: Arc<PipelineScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &PipelineScheduler {
        &self.scheduler
    }
}
