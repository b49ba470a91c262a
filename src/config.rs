//! Pipeline configuration.
//!
//! Everything a stage needs is carried in one immutable [`PipelineConfig`]
//! that is built once at startup and passed down by reference. Defaults
//! reproduce the production setup; a YAML file can override any field:
//!
//! ```yaml
//! output_dir: ./site
//! orchestration:
//!   kind: sequential
//! run_timeout_secs: 600
//! render:
//!   timezone: Europe/Madrid
//! ```
//!
//! API keys are secrets and never live in the YAML file. They are read from
//! the environment into [`ApiKeys`].

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which category set a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunMode {
    /// Categories refreshed every hour.
    #[default]
    Hourly,
    /// Hourly categories plus the daily-only ones.
    Daily,
}

/// How often a category is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Hourly,
    Daily,
}

/// How categories are scheduled against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Orchestration {
    /// One category at a time.
    Sequential,
    /// Up to `workers` categories in flight, starts still staggered.
    Parallel { workers: usize },
}

impl Orchestration {
    pub fn max_in_flight(&self) -> usize {
        match self {
            Orchestration::Sequential => 1,
            Orchestration::Parallel { workers } => (*workers).max(1),
        }
    }
}

/// A single upstream the fetch stage pulls from.
///
/// Each variant maps onto one provider adapter in [`crate::sources`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// NewsAPI `/v2/top-headlines`.
    NewsApiHeadlines { label: String, page_size: u32 },
    /// NewsAPI `/v2/everything` with a free-text query.
    NewsApiSearch {
        label: String,
        query: String,
        page_size: u32,
    },
    /// newsdata.io `/api/1/news` filtered by category.
    NewsData { label: String, category: String },
    /// thenewsapi.com `/v1/news/all`.
    TheNewsApi {
        label: String,
        search: String,
        limit: u32,
    },
    /// gnews.io `/api/v4/search`.
    GNews {
        label: String,
        query: String,
        max: u32,
    },
    /// EventRegistry article search by concept.
    EventRegistry {
        label: String,
        concept_uri: String,
        max_items: u32,
    },
    /// RSS 2.0 or Atom feed.
    Rss { name: String, url: String },
}

impl SourceSpec {
    /// Name used in log lines.
    pub fn label(&self) -> &str {
        match self {
            SourceSpec::NewsApiHeadlines { label, .. }
            | SourceSpec::NewsApiSearch { label, .. }
            | SourceSpec::NewsData { label, .. }
            | SourceSpec::TheNewsApi { label, .. }
            | SourceSpec::GNews { label, .. }
            | SourceSpec::EventRegistry { label, .. } => label,
            SourceSpec::Rss { name, .. } => name,
        }
    }

    fn rss(name: &str, url: &str) -> Self {
        SourceSpec::Rss {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// One editorial category and where its output goes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryConfig {
    pub id: String,
    /// Page heading.
    pub title: String,
    /// Base filename for the HTML page.
    pub file_base: String,
    /// Base filename for the JSON records; defaults to `file_base`.
    #[serde(default)]
    pub json_name: Option<String>,
    /// Subdirectory of the output dir.
    #[serde(default)]
    pub folder: String,
    pub schedule: Schedule,
    pub sources: Vec<SourceSpec>,
}

impl CategoryConfig {
    pub fn json_base(&self) -> &str {
        self.json_name.as_deref().unwrap_or(&self.file_base)
    }

    /// Title-cased name used inside prompts, e.g. `"Charlotte"`.
    pub fn prompt_name(&self) -> String {
        self.id
            .split('_')
            .map(|w| {
                let mut c = w.chars();
                match c.next() {
                    None => String::new(),
                    Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A language an output bundle is produced in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageConfig {
    /// Short code, e.g. `"zh"`.
    pub code: String,
    /// Name given to the model, e.g. `"Chinese (Simplified)"`.
    pub name: String,
    /// Appended to output filenames, e.g. `"_CN"`.
    #[serde(default)]
    pub file_suffix: String,
}

impl LanguageConfig {
    fn new(code: &str, name: &str, file_suffix: &str) -> Self {
        LanguageConfig {
            code: code.to_string(),
            name: name.to_string(),
            file_suffix: file_suffix.to_string(),
        }
    }
}

/// Source fetching knobs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Concurrent source requests per category.
    pub workers: usize,
    pub timeout_secs: u64,
    /// Extra attempts for feed fetches only.
    pub feed_retries: u32,
    pub feed_retry_delay_ms: u64,
    pub max_items_per_source: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            workers: 5,
            timeout_secs: 20,
            feed_retries: 2,
            feed_retry_delay_ms: 3_000,
            max_items_per_source: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Generative-AI endpoint and retry policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL; the model name and `:generateContent` are appended.
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// First rate-limit backoff; doubles each attempt.
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter_max_ms: u64,
    /// Fixed wait after a non rate-limit failure.
    pub retry_delay_ms: u64,
    /// Most articles sent in one enrichment prompt.
    pub batch_size: usize,
    /// Description characters included in the prompt per article.
    pub prompt_description_chars: usize,
    /// Description characters kept on enriched articles.
    pub description_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            max_attempts: 3,
            backoff_base_ms: 5_000,
            backoff_max_ms: 60_000,
            jitter_max_ms: 5_000,
            retry_delay_ms: 5_000,
            batch_size: 20,
            prompt_description_chars: 250,
            description_chars: 350,
        }
    }
}

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// IANA zone name for the "last updated" stamp.
    pub timezone: String,
    /// `chrono` format string for the stamp.
    pub timestamp_format: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            timezone: "America/New_York".to_string(),
            timestamp_format: "%Y-%m-%d %I:%M %p %Z".to_string(),
        }
    }
}

/// Immutable configuration shared by every stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub orchestration: Orchestration,
    /// Minimum spacing between category starts.
    pub stagger_secs: u64,
    /// Wall-clock budget for the whole run.
    pub run_timeout_secs: u64,
    pub fetch: FetchConfig,
    pub ai: AiConfig,
    pub render: RenderConfig,
    /// Language the enrichment stage writes in.
    pub base_language: LanguageConfig,
    /// Languages produced by translation.
    pub translations: Vec<LanguageConfig>,
    pub categories: Vec<CategoryConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_dir: PathBuf::from("."),
            orchestration: Orchestration::Parallel { workers: 3 },
            stagger_secs: 20,
            run_timeout_secs: 300,
            fetch: FetchConfig::default(),
            ai: AiConfig::default(),
            render: RenderConfig::default(),
            base_language: LanguageConfig::new("en", "English", ""),
            translations: vec![
                LanguageConfig::new("zh", "Chinese (Simplified)", "_CN"),
                LanguageConfig::new("es", "Spanish", "_ES"),
            ],
            categories: default_categories(),
        }
    }
}

impl PipelineConfig {
    /// Load settings from an optional YAML file and validate them.
    ///
    /// Without a path the built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                info!(path = %p.display(), "Loaded configuration file");
                Self::from_yaml(&raw)?
            }
            None => {
                debug!("No configuration file given; using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse settings from YAML text; absent fields keep their defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".into()));
        }
        let mut ids = HashSet::new();
        for c in &self.categories {
            if !ids.insert(c.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate category id {}", c.id)));
            }
        }
        let mut codes = HashSet::from([self.base_language.code.as_str()]);
        for l in &self.translations {
            if !codes.insert(l.code.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate language {}", l.code)));
            }
        }
        if self.ai.max_attempts == 0 {
            return Err(ConfigError::Invalid("ai.max_attempts must be at least 1".into()));
        }
        if self.ai.batch_size == 0 {
            return Err(ConfigError::Invalid("ai.batch_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.render
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid(format!("timezone {}: {e}", self.render.timezone)))
    }

    /// Categories that run in the given mode, in configured order.
    pub fn categories_for(&self, mode: RunMode) -> Vec<&CategoryConfig> {
        self.categories
            .iter()
            .filter(|c| mode == RunMode::Daily || c.schedule == Schedule::Hourly)
            .collect()
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            id: "global".into(),
            title: "Headline News".into(),
            file_base: "topnews".into(),
            json_name: None,
            folder: "news".into(),
            schedule: Schedule::Hourly,
            sources: vec![
                SourceSpec::NewsApiHeadlines {
                    label: "NewsAPI_Global".into(),
                    page_size: 30,
                },
                SourceSpec::NewsData {
                    label: "NewsData_Global".into(),
                    category: "top".into(),
                },
                SourceSpec::rss(
                    "Google News (Global)",
                    "https://news.google.com/rss?hl=en-US&gl=US&ceid=US:en",
                ),
            ],
        },
        CategoryConfig {
            id: "market".into(),
            title: "Finance".into(),
            file_base: "money".into(),
            json_name: None,
            folder: "news".into(),
            schedule: Schedule::Hourly,
            sources: vec![
                SourceSpec::NewsApiSearch {
                    label: "NewsAPI_Market".into(),
                    query: "stock market OR finance OR crypto OR equities OR economy OR inflation"
                        .into(),
                    page_size: 30,
                },
                SourceSpec::TheNewsApi {
                    label: "TheNewsAPI_Market".into(),
                    search: "finance stocks".into(),
                    limit: 5,
                },
                SourceSpec::rss(
                    "Google News (Market)",
                    "https://news.google.com/rss/search?q=stock+market+finance+economy&hl=en-US&gl=US&ceid=US:en",
                ),
            ],
        },
        CategoryConfig {
            id: "ai".into(),
            title: "AI Analysis".into(),
            file_base: "ainews".into(),
            json_name: Some("summary".into()),
            folder: "news".into(),
            schedule: Schedule::Daily,
            sources: vec![
                SourceSpec::EventRegistry {
                    label: "EventRegistry".into(),
                    concept_uri: "http://en.wikipedia.org/wiki/Artificial_intelligence".into(),
                    max_items: 25,
                },
                SourceSpec::rss(
                    "TechCrunch",
                    "https://techcrunch.com/category/artificial-intelligence/feed/",
                ),
                SourceSpec::rss("VentureBeat", "https://venturebeat.com/category/ai/feed/"),
                SourceSpec::rss("DeepLearning.AI", "https://www.deeplearning.ai/the-batch/rss/"),
                SourceSpec::rss("TLDR AI", "https://tldr.tech/ai/rss"),
            ],
        },
        CategoryConfig {
            id: "charlotte".into(),
            title: "Local Life".into(),
            file_base: "local".into(),
            json_name: None,
            folder: "news".into(),
            schedule: Schedule::Hourly,
            sources: vec![
                SourceSpec::rss("WCNC", "https://www.wcnc.com/feeds/syndication/rss/news/local"),
                SourceSpec::rss("WCCB", "https://www.wccbcharlotte.com/feed/"),
                SourceSpec::rss(
                    "Google News (Charlotte)",
                    "https://news.google.com/rss/search?q=Charlotte+NC+news&hl=en-US&gl=US&ceid=US:en",
                ),
                SourceSpec::GNews {
                    label: "GNews_Charlotte".into(),
                    query: "Charlotte NC".into(),
                    max: 10,
                },
            ],
        },
    ]
}

/// Provider credentials read from the environment.
///
/// A missing key disables the matching adapter for the run.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub news_api: Option<String>,
    pub newsdata: Option<String>,
    pub thenews: Option<String>,
    pub gnews: Option<String>,
    pub event_registry: Option<String>,
    pub gemini: Option<String>,
}

impl ApiKeys {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        ApiKeys {
            news_api: get("NEWS_API_KEY"),
            newsdata: get("NEWSDATA_KEY"),
            thenews: get("THENEWS_KEY"),
            gnews: get("GNEWS_KEY"),
            event_registry: get("NEWS_API_AI_KEY"),
            gemini: get("GEMINI_KEY"),
        }
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_deref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("news_api", &redact(&self.news_api))
            .field("newsdata", &redact(&self.newsdata))
            .field("thenews", &redact(&self.thenews))
            .field("gnews", &redact(&self.gnews))
            .field("event_registry", &redact(&self.event_registry))
            .field("gemini", &redact(&self.gemini))
            .finish()
    }
}
