//! Output generation for HTML pages and JSON records.
//!
//! # Submodules
//!
//! - [`html`]: renders a bundle to a self-contained HTML page
//! - [`json`]: renders a bundle to the app's JSON record list
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── news/
//!     ├── topnews.html      topnews.json
//!     ├── topnews_CN.html   topnews_CN.json
//!     ├── topnews_ES.html   topnews_ES.json
//!     ├── ainews.html       summary.json
//!     └── ...
//! ```
//!
//! Every file is written to a hidden temp file next to its target and then
//! renamed over it, so readers see either the old file or the new one.

pub mod html;
pub mod json;

use crate::config::{CategoryConfig, LanguageConfig};
use crate::models::CategoryBundle;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Where one (category, language) slot is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub html: PathBuf,
    pub json: PathBuf,
}

/// Compute the file paths for a category in a language.
pub fn output_paths(
    output_dir: &Path,
    category: &CategoryConfig,
    language: &LanguageConfig,
) -> OutputPaths {
    let dir = if category.folder.is_empty() {
        output_dir.to_path_buf()
    } else {
        output_dir.join(&category.folder)
    };
    let suffix = &language.file_suffix;
    OutputPaths {
        html: dir.join(format!("{}{}.html", category.file_base, suffix)),
        json: dir.join(format!("{}{}.json", category.json_base(), suffix)),
    }
}

/// Write `contents` to `path` via a sibling temp file and a rename.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    // Unique per writer: overlapping runs must never rename each other's
    // half-written file into place.
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.{:08x}.tmp",
        std::process::id(),
        rand::random::<u32>()
    ));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    debug!(bytes = contents.len(), "Wrote file");
    Ok(())
}

/// Render and save both files for one (category, language) slot.
#[instrument(level = "info", skip_all, fields(category = %category.id, language = %language.code))]
pub async fn save_bundle(
    output_dir: &Path,
    category: &CategoryConfig,
    language: &LanguageConfig,
    bundle: &CategoryBundle,
    timestamp: &str,
) -> Result<OutputPaths, Box<dyn Error>> {
    let paths = output_paths(output_dir, category, language);

    let page = html::render_page(bundle, timestamp);
    write_atomic(&paths.html, page.as_bytes()).await?;

    let records = json::render_records(bundle)?;
    write_atomic(&paths.json, records.as_bytes()).await?;

    info!(
        html = %paths.html.display(),
        json = %paths.json.display(),
        articles = bundle.articles.len(),
        "Saved category artifacts"
    );
    Ok(paths)
}
