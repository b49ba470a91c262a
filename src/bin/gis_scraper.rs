use chrono::{Datelike, Local};
use clap::Parser;
use news_brief::cli::GisCli;
use news_brief::gis::{HttpLayerFetcher, LayerOutcome, plan_targets, refresh_layers};
use news_brief::init_tracing;
use std::error::Error;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = GisCli::parse();

    let day = match args.day {
        Some(day) => day,
        None => Local::now().weekday().num_days_from_monday() as u8,
    };
    let targets = plan_targets(day, args.all);
    if args.all {
        info!("Full refresh of every rotated layer requested");
    }
    if targets.is_empty() {
        info!(day, "No layers scheduled for this day; nothing to do");
        return Ok(());
    }
    info!(day, targets = ?targets, "Active targets");

    let fetcher = HttpLayerFetcher::new()?;
    let results = refresh_layers(&fetcher, &args.data_dir, &targets).await?;

    let updated = results
        .iter()
        .filter(|(_, o)| matches!(o, LayerOutcome::Updated { .. }))
        .count();
    let failed = results
        .iter()
        .filter(|(_, o)| matches!(o, LayerOutcome::Failed(_)))
        .count();
    if failed > 0 {
        warn!(updated, failed, "Some layers could not be refreshed");
    } else {
        info!(updated, "Layer refresh complete");
    }
    Ok(())
}
