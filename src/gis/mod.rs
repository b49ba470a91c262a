//! Municipal GIS layer refresher.
//!
//! Layers live under `<data_dir>/<group>/<layer>.json`. Only small, verified
//! layers are refreshed, one weekday slice at a time; protected layers are
//! never overwritten.

pub mod layers;
pub mod scraper;

pub use layers::plan_targets;
pub use scraper::{GisError, HttpLayerFetcher, LayerFetcher, LayerOutcome, refresh_layers};
