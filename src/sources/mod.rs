//! Article collection from news APIs and feeds.
//!
//! - [`feeds`]: RSS/Atom fetching and parsing
//! - [`providers`]: keyed JSON news APIs
//!
//! A category's sources are fetched concurrently. A source that fails, or
//! whose key is not configured, contributes nothing; it never fails the
//! category.

pub mod feeds;
pub mod providers;

use crate::config::{ApiKeys, CategoryConfig, FetchConfig, SourceSpec};
use crate::models::Article;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Produces the raw article pool for a category.
#[allow(async_fn_in_trait)]
pub trait ArticleFetcher {
    async fn fetch_category(&self, category: &CategoryConfig) -> Vec<Article>;
}

/// Shared HTTP client with a browser-like identity; several publishers
/// refuse obvious bots.
pub fn build_http_client(config: &FetchConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
}

/// Live fetcher backed by the configured providers.
pub struct HttpFetcher {
    http: reqwest::Client,
    keys: ApiKeys,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client, keys: ApiKeys, config: FetchConfig) -> Self {
        Self { http, keys, config }
    }

    /// `None` when the source needs a key that is not configured.
    async fn fetch_source(&self, spec: &SourceSpec) -> Option<Result<Vec<Article>, Box<dyn Error>>> {
        let http = &self.http;
        let keys = &self.keys;
        let result = match spec {
            SourceSpec::NewsApiHeadlines { label, page_size } => {
                let key = keys.news_api.as_deref()?;
                providers::newsapi_headlines(http, key, label, *page_size).await
            }
            SourceSpec::NewsApiSearch {
                label,
                query,
                page_size,
            } => {
                let key = keys.news_api.as_deref()?;
                providers::newsapi_search(http, key, label, query, *page_size).await
            }
            SourceSpec::NewsData { category, .. } => {
                let key = keys.newsdata.as_deref()?;
                providers::newsdata(http, key, category).await
            }
            SourceSpec::TheNewsApi { search, limit, .. } => {
                let key = keys.thenews.as_deref()?;
                providers::thenewsapi(http, key, search, *limit).await
            }
            SourceSpec::GNews { label, query, max } => {
                let key = keys.gnews.as_deref()?;
                providers::gnews(http, key, label, query, *max).await
            }
            SourceSpec::EventRegistry {
                label,
                concept_uri,
                max_items,
            } => {
                let key = keys.event_registry.as_deref()?;
                providers::event_registry(http, key, label, concept_uri, *max_items).await
            }
            SourceSpec::Rss { name, url } => {
                feeds::fetch_feed(
                    http,
                    name,
                    url,
                    self.config.feed_retries,
                    Duration::from_millis(self.config.feed_retry_delay_ms),
                )
                .await
            }
        };
        Some(result)
    }
}

impl ArticleFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(category = %category.id))]
    async fn fetch_category(&self, category: &CategoryConfig) -> Vec<Article> {
        let cap = self.config.max_items_per_source;
        let batches: Vec<Vec<Article>> = stream::iter(category.sources.iter())
            .map(|spec| async move {
                match self.fetch_source(spec).await {
                    None => {
                        debug!(source = spec.label(), "No API key configured; skipping source");
                        Vec::new()
                    }
                    Some(Ok(mut articles)) => {
                        articles.truncate(cap);
                        debug!(source = spec.label(), count = articles.len(), "Source fetched");
                        articles
                    }
                    Some(Err(e)) => {
                        warn!(source = spec.label(), error = %e, "Source failed; continuing without it");
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let articles: Vec<Article> = batches.into_iter().flatten().collect();
        info!(count = articles.len(), "Collected raw articles");
        articles
    }
}
