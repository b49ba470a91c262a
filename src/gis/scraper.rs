//! Layer refresh: fetch, validate, and atomically replace GeoJSON files.

use super::layers::{LAYER_GROUPS, endpoint, group_of, is_protected};
use crate::outputs::write_atomic;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Request timeout for GIS queries; some layers are slow to serialize.
pub const GIS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GisError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response has no features")]
    Empty,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of GeoJSON documents.
#[allow(async_fn_in_trait)]
pub trait LayerFetcher {
    async fn fetch_layer(&self, layer: &str, url: &str) -> Result<Value, GisError>;
}

pub struct HttpLayerFetcher {
    http: reqwest::Client,
}

impl HttpLayerFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(GIS_TIMEOUT).build()?;
        Ok(Self { http })
    }
}

impl LayerFetcher for HttpLayerFetcher {
    async fn fetch_layer(&self, _layer: &str, url: &str) -> Result<Value, GisError> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        validate_geojson(&body)
    }
}

/// Accept only a JSON object with a non-empty `features` array.
pub fn validate_geojson(body: &str) -> Result<Value, GisError> {
    let doc: Value = serde_json::from_str(body)?;
    match doc.get("features").and_then(Value::as_array) {
        Some(features) if !features.is_empty() => Ok(doc),
        _ => Err(GisError::Empty),
    }
}

/// What happened to one targeted layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    Updated { path: PathBuf, features: usize },
    Protected,
    NoEndpoint,
    Failed(String),
}

fn layer_path(data_dir: &Path, group: &str, layer: &str) -> PathBuf {
    data_dir.join(group).join(format!("{layer}.json"))
}

/// Refresh `targets` under `data_dir`, in catalogue order.
///
/// Protected layers and layers without an endpoint are skipped. A failed
/// fetch leaves the existing file in place.
#[instrument(level = "info", skip(fetcher, targets), fields(data_dir = %data_dir.display()))]
pub async fn refresh_layers<F: LayerFetcher>(
    fetcher: &F,
    data_dir: &Path,
    targets: &[&str],
) -> Result<Vec<(String, LayerOutcome)>, GisError> {
    for (group, _) in LAYER_GROUPS {
        fs::create_dir_all(data_dir.join(group)).await?;
    }

    let mut results = Vec::new();
    for (group, layers) in LAYER_GROUPS {
        for layer in layers.iter().filter(|l| targets.contains(*l)) {
            let outcome = refresh_one(fetcher, data_dir, group, layer).await;
            results.push((layer.to_string(), outcome));
        }
    }
    // Targets outside the catalogue.
    for layer in targets.iter().filter(|l| group_of(l).is_none()) {
        warn!(layer, "Unknown layer; skipping");
        results.push((layer.to_string(), LayerOutcome::NoEndpoint));
    }
    Ok(results)
}

async fn refresh_one<F: LayerFetcher>(fetcher: &F, data_dir: &Path, group: &str, layer: &str) -> LayerOutcome {
    if is_protected(layer) {
        warn!(layer, "Layer is protected and requires manual optimization; skipping");
        return LayerOutcome::Protected;
    }
    let Some(url) = endpoint(layer) else {
        warn!(layer, "No endpoint defined for layer; skipping");
        return LayerOutcome::NoEndpoint;
    };

    info!(layer, "Fetching layer");
    let doc = match fetcher.fetch_layer(layer, url).await {
        Ok(doc) => doc,
        Err(e) => {
            error!(layer, error = %e, "Could not update layer; current data remains untouched");
            return LayerOutcome::Failed(e.to_string());
        }
    };
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or_default();

    let path = layer_path(data_dir, group, layer);
    let written = match serde_json::to_vec_pretty(&doc) {
        Ok(bytes) => write_atomic(&path, &bytes).await.map_err(GisError::from),
        Err(e) => Err(GisError::from(e)),
    };
    match written {
        Ok(()) => {
            info!(layer, features, path = %path.display(), "Layer updated");
            LayerOutcome::Updated { path, features }
        }
        Err(e) => {
            error!(layer, error = %e, "Could not write layer");
            LayerOutcome::Failed(e.to_string())
        }
    }
}
