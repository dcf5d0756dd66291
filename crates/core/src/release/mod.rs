//! Release titles, candidates, and ranking.

mod parser;
mod types;

pub use parser::{parse_quality, parse_seasons};
pub use types::{sort_best_first, CandidateRelease, Quality};
