use clap::Parser;
use news_brief::api::{GeminiClient, RetryAsk, RetryPolicy};
use news_brief::cli::Cli;
use news_brief::config::{ApiKeys, PipelineConfig};
use news_brief::init_environment;
use news_brief::pipeline::Pipeline;
use news_brief::sources::{HttpFetcher, build_http_client};
use news_brief::utils::ensure_writable_dir;
use std::error::Error;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Some(path) = init_environment(None) {
        debug!(path = %path.display(), "Loaded .env");
    }

    let start_time = std::time::Instant::now();
    info!("news_brief starting up");

    let args = Cli::parse();
    debug!(mode = ?args.mode, config = ?args.config, "Parsed CLI arguments");

    let config = PipelineConfig::load(args.config.as_deref())?;
    info!(
        output_dir = %config.output_dir.display(),
        categories = config.categories.len(),
        languages = config.translations.len() + 1,
        "Loaded configuration"
    );

    // Early check: the output directory must be writable before any API spend.
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let keys = ApiKeys::from_env();
    debug!(?keys, "Resolved API keys");

    let http = build_http_client(&config.fetch)?;
    let gemini = GeminiClient::new(http.clone(), &config.ai, keys.gemini.clone())?;
    if !gemini.has_key() {
        warn!("GEMINI_KEY is not set; every category will fail at enrichment");
    }
    let ai = RetryAsk::new(gemini, RetryPolicy::from_config(&config.ai));
    let fetcher = HttpFetcher::new(http, keys, config.fetch.clone());

    let pipeline = Pipeline::new(&config, &fetcher, &ai)?;
    let report = pipeline.run(args.mode).await;

    for outcome in &report.outcomes {
        if outcome.succeeded() {
            info!(
                category = %outcome.category,
                articles = outcome.articles,
                degraded = ?outcome.degraded_languages,
                "Category complete"
            );
        } else {
            warn!(
                category = %outcome.category,
                failed_at = ?outcome.failed_at,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Category did not complete"
            );
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        succeeded = report.succeeded(),
        failed = report.failed(),
        abandoned = report.abandoned.len(),
        "Execution complete"
    );

    if report.timed_out {
        error!(abandoned = ?report.abandoned, "Run exceeded its time budget");
        std::process::exit(1);
    }
    Ok(())
}
