//! Acquisition pipeline: from a media item to files in its library.
//!
//! The pipeline ties the other components together:
//! - **Search**: indexer fan-out, filtering to the media item, scoring
//! - **Submission**: routing to a download client and creating file slots
//! - **Import**: placing finished downloads into the library
//!
//! [`PipelineScheduler`] runs the batch entry points periodically.

mod acquisition;
#[cfg(test)]
mod harness;
mod library;
mod scheduler;
mod types;

pub use acquisition::AcquisitionPipeline;
pub use scheduler::PipelineScheduler;
pub use types::{BatchSummary, MediaTarget, PipelineError};
