//! Per-category state machine and the run loop that schedules categories.

use crate::api::AskAsync;
use crate::config::{CategoryConfig, ConfigError, PipelineConfig, RunMode};
use crate::models::CategoryBundle;
use crate::outputs::{self, html};
use crate::pipeline::{dedupe::dedupe, enrich::enrich, translate::translate};
use crate::sources::ArticleFetcher;
use chrono::Utc;
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::pin::pin;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{error, info, warn};

/// Where a category is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryStage {
    Pending,
    Fetching,
    Enriching,
    Translating,
    Saving,
    Done,
    Failed,
}

impl fmt::Display for CategoryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CategoryStage::Pending => "pending",
            CategoryStage::Fetching => "fetching",
            CategoryStage::Enriching => "enriching",
            CategoryStage::Translating => "translating",
            CategoryStage::Saving => "saving",
            CategoryStage::Done => "done",
            CategoryStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final state of one category.
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub category: String,
    pub stage: CategoryStage,
    /// Stage that was active when the category failed.
    pub failed_at: Option<CategoryStage>,
    /// Enriched article count.
    pub articles: usize,
    /// Languages whose files were written from the English bundle.
    pub degraded_languages: Vec<String>,
    pub error: Option<String>,
}

impl CategoryOutcome {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            stage: CategoryStage::Pending,
            failed_at: None,
            articles: 0,
            degraded_languages: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == CategoryStage::Done
    }

    fn advance(&mut self, next: CategoryStage) {
        info!(category = %self.category, from = %self.stage, to = %next, "Category stage transition");
        self.stage = next;
    }

    fn fail(mut self, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        error!(category = %self.category, stage = %self.stage, error = %message, "Category failed");
        self.failed_at = Some(self.stage);
        self.error = Some(message);
        self.advance(CategoryStage::Failed);
        self
    }
}

/// What happened in one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Categories that finished, in completion order.
    pub outcomes: Vec<CategoryOutcome>,
    /// Categories still pending or in flight when the run budget ran out.
    pub abandoned: Vec<String>,
    pub timed_out: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Drives categories through fetch → dedupe → enrich → translate → save.
pub struct Pipeline<'a, F, A> {
    config: &'a PipelineConfig,
    fetcher: &'a F,
    ai: &'a A,
    tz: Tz,
}

impl<'a, F: ArticleFetcher, A: AskAsync> Pipeline<'a, F, A> {
    pub fn new(config: &'a PipelineConfig, fetcher: &'a F, ai: &'a A) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            fetcher,
            ai,
            tz: config.timezone()?,
        })
    }

    /// Run one category to completion. Never returns an error: failures are
    /// recorded on the outcome.
    pub async fn process_category(&self, category: &CategoryConfig) -> CategoryOutcome {
        let mut outcome = CategoryOutcome::new(&category.id);

        outcome.advance(CategoryStage::Fetching);
        let raw = self.fetcher.fetch_category(category).await;
        let raw_count = raw.len();
        let articles = dedupe(raw);
        info!(category = %category.id, raw = raw_count, unique = articles.len(), "Deduplicated articles");
        if articles.is_empty() {
            return outcome.fail("no articles fetched");
        }

        outcome.advance(CategoryStage::Enriching);
        let now = Utc::now();
        let local = now.with_timezone(&self.tz);
        let today = local.format("%Y-%m-%d").to_string();
        let base = &self.config.base_language;
        let english = match enrich(self.ai, category, &articles, &self.config.ai, &base.code, &today).await {
            Ok(bundle) => bundle,
            Err(e) => return outcome.fail(e),
        };
        outcome.articles = english.articles.len();

        outcome.advance(CategoryStage::Translating);
        let mut bundles: Vec<(&_, CategoryBundle)> = Vec::with_capacity(1 + self.config.translations.len());
        for language in &self.config.translations {
            let bundle = match translate(self.ai, &english, language).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(
                        category = %category.id,
                        language = %language.code,
                        error = %e,
                        "Translation failed; serving English content for this language"
                    );
                    outcome.degraded_languages.push(language.code.clone());
                    english.clone()
                }
            };
            bundles.push((language, bundle));
        }
        bundles.insert(0, (base, english));

        outcome.advance(CategoryStage::Saving);
        let timestamp = html::format_timestamp(now, self.tz, &self.config.render.timestamp_format);
        for (language, bundle) in &bundles {
            if let Err(e) =
                outputs::save_bundle(&self.config.output_dir, category, language, bundle, &timestamp).await
            {
                return outcome.fail(format!("saving {} output: {e}", language.code));
            }
        }

        outcome.advance(CategoryStage::Done);
        outcome
    }

    /// Run every category scheduled for `mode` within the run budget.
    pub async fn run(&self, mode: RunMode) -> RunReport {
        let categories = self.config.categories_for(mode);
        let run_start = Instant::now();
        let deadline = run_start + self.config.run_timeout();
        let stagger = self.config.stagger();
        info!(
            ?mode,
            categories = categories.len(),
            max_in_flight = self.config.orchestration.max_in_flight(),
            "Starting run"
        );

        let mut in_flight = pin!(
            stream::iter(categories.iter().copied().enumerate())
                .map(|(i, category)| async move {
                    let start_at = run_start + stagger * i as u32;
                    if start_at > Instant::now() {
                        info!(category = %category.id, delay_secs = (start_at - Instant::now()).as_secs(), "Waiting for staggered start");
                        sleep_until(start_at).await;
                    }
                    self.process_category(category).await
                })
                .buffer_unordered(self.config.orchestration.max_in_flight())
        );

        let mut report = RunReport::default();
        loop {
            match timeout_at(deadline, in_flight.next()).await {
                Ok(Some(outcome)) => report.outcomes.push(outcome),
                Ok(None) => break,
                Err(_) => {
                    report.timed_out = true;
                    report.abandoned = categories
                        .iter()
                        .filter(|c| !report.outcomes.iter().any(|o| o.category == c.id))
                        .map(|c| c.id.clone())
                        .collect();
                    error!(
                        timeout_secs = self.config.run_timeout_secs,
                        abandoned = ?report.abandoned,
                        "Run timed out; abandoning remaining categories"
                    );
                    break;
                }
            }
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_secs = run_start.elapsed().as_secs(),
            "Run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedAi;
    use crate::config::{Orchestration, Schedule, SourceSpec};
    use crate::models::Article;
    use serde_json::json;

    struct StaticFetcher(Vec<Article>);

    impl ArticleFetcher for StaticFetcher {
        async fn fetch_category(&self, _category: &CategoryConfig) -> Vec<Article> {
            self.0.clone()
        }
    }

    fn article(i: usize) -> Article {
        Article {
            title: format!("Story {i}"),
            url: format!("https://news.example/{i}"),
            description: format!("Teaser {i}"),
            source: "Wire".into(),
            published_at: None,
        }
    }

    fn category(id: &str) -> CategoryConfig {
        CategoryConfig {
            id: id.into(),
            title: format!("{id} news"),
            file_base: format!("{id}news"),
            json_name: None,
            folder: "news".into(),
            schedule: Schedule::Hourly,
            sources: vec![SourceSpec::Rss {
                name: "feed".into(),
                url: "https://feed.example/rss".into(),
            }],
        }
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            output_dir: dir.to_path_buf(),
            orchestration: Orchestration::Sequential,
            stagger_secs: 0,
            categories: vec![category("global")],
            translations: vec![],
            ..PipelineConfig::default()
        }
    }

    fn enrichment_reply(n: usize) -> String {
        let items: Vec<_> = (0..n)
            .map(|i| json!({"id": i, "score": 6 + i, "sentiment": "Positive", "why_matters": "r", "impact": "High"}))
            .collect();
        json!({"summary": "s", "landscape_insight": "i", "clusters": ["c"], "processed_articles": items}).to_string()
    }

    #[tokio::test]
    async fn test_process_category_success() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let fetcher = StaticFetcher(vec![article(0), article(1), article(0)]);
        let ai = ScriptedAi::new(vec![Ok(enrichment_reply(2))]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let outcome = pipeline.process_category(&config.categories[0]).await;
        assert!(outcome.succeeded(), "{:?}", outcome.error);
        assert_eq!(outcome.articles, 2);
        assert!(tmp.path().join("news/globalnews.html").exists());
        assert!(tmp.path().join("news/globalnews.json").exists());
    }

    #[tokio::test]
    async fn test_empty_fetch_fails_at_fetching() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let fetcher = StaticFetcher(vec![]);
        let ai = ScriptedAi::new(vec![]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let outcome = pipeline.process_category(&config.categories[0]).await;
        assert_eq!(outcome.stage, CategoryStage::Failed);
        assert_eq!(outcome.failed_at, Some(CategoryStage::Fetching));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_translation_failure_degrades_to_english() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.translations = PipelineConfig::default().translations;
        let fetcher = StaticFetcher(vec![article(0)]);
        let ai = ScriptedAi::new(vec![
            Ok(enrichment_reply(1)),
            Ok("definitely not json".into()),
            Ok(json!({"summary": "Resumen", "articles": [{"title": "Historia 0"}]}).to_string()),
        ]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let outcome = pipeline.process_category(&config.categories[0]).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.degraded_languages, vec!["zh".to_string()]);

        let read = |name: &str| std::fs::read_to_string(tmp.path().join("news").join(name)).unwrap();
        assert_eq!(read("globalnews_CN.html"), read("globalnews.html"));
        assert_eq!(read("globalnews_CN.json"), read("globalnews.json"));
        assert!(read("globalnews_ES.html").contains("Historia 0"));
    }

    #[tokio::test]
    async fn test_run_isolates_category_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.categories = vec![category("first"), category("second")];
        let fetcher = StaticFetcher(vec![article(0), article(1)]);
        // Sequential: the first category gets the short reply.
        let ai = ScriptedAi::new(vec![Ok(enrichment_reply(1)), Ok(enrichment_reply(2))]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let report = pipeline.run(RunMode::Hourly).await;
        assert!(!report.timed_out);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded(), 1);
        let first = report.outcomes.iter().find(|o| o.category == "first").unwrap();
        assert_eq!(first.failed_at, Some(CategoryStage::Enriching));
        assert!(tmp.path().join("news/secondnews.html").exists());
        assert!(!tmp.path().join("news/firstnews.html").exists());
    }

    #[tokio::test]
    async fn test_hourly_mode_skips_daily_categories() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        let mut daily = category("ai");
        daily.schedule = Schedule::Daily;
        config.categories.push(daily);
        let fetcher = StaticFetcher(vec![]);
        let ai = ScriptedAi::new(vec![]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let report = pipeline.run(RunMode::Hourly).await;
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].category, "global");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stagger_spaces_category_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.stagger_secs = 20;
        config.orchestration = Orchestration::Parallel { workers: 3 };
        config.categories = vec![category("a"), category("b"), category("c")];
        let fetcher = StaticFetcher(vec![]);
        let ai = ScriptedAi::new(vec![]);
        let pipeline = Pipeline::new(&config, &fetcher, &ai).unwrap();

        let start = Instant::now();
        let report = pipeline.run(RunMode::Hourly).await;
        assert_eq!(report.outcomes.len(), 3);
        assert!(start.elapsed() >= std::time::Duration::from_secs(40));
        let order: Vec<_> = report.outcomes.iter().map(|o| o.category.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
