//! Category processing stages.
//!
//! - [`dedupe`]: collapse repeated stories
//! - [`enrich`]: score and annotate with the model
//! - [`translate`]: per-language overlays of an enriched bundle
//! - [`orchestrator`]: the per-category state machine and run loop

pub mod dedupe;
pub mod enrich;
pub mod orchestrator;
pub mod translate;

pub use orchestrator::{CategoryOutcome, CategoryStage, Pipeline, RunReport};
