//! End-to-end prospecting runs
//!
//! A [`ProspectingSession`] owns the index stack, the reference sites and
//! any point data, and carries them through signature extraction,
//! similarity scoring, fusion and target extraction.

mod config;
mod session;

pub use config::{PointScoring, ProspectingConfig};
pub use session::{ProspectingSession, RunReport};
