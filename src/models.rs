//! Data models for fetched articles and their enriched representations.
//!
//! This module defines the records that flow through the pipeline:
//! - [`Article`]: a normalized article as produced by any source adapter
//! - [`EnrichedArticle`]: an article annotated with the model's judgment
//! - [`CategoryBundle`]: the enriched articles plus category-level prose for
//!   one (category, language) slot
//! - [`AppRecord`]: one row of the application-facing JSON output

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A news article normalized from any provider or feed.
///
/// Provider adapters fill what they can; `published_at` is kept as the raw
/// text the provider sent because formats differ between sources.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// Link to the full story. Candidate identity key.
    pub url: String,
    /// Plain-text teaser or body excerpt.
    pub description: String,
    /// Human-readable outlet name.
    pub source: String,
    /// Publication time as reported by the source, if any.
    pub published_at: Option<String>,
}

/// Tone of an article as judged by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    /// Badge color used by the HTML renderer.
    pub fn color(&self) -> &'static str {
        match self {
            Sentiment::Positive => "#2ecc71",
            Sentiment::Neutral => "#95a5a6",
            Sentiment::Negative => "#e74c3c",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact tier of an article as judged by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Impact {
    High,
    #[default]
    Medium,
    Low,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "High",
            Impact::Medium => "Medium",
            Impact::Low => "Low",
        }
    }

    /// CSS class for the impact badge.
    pub fn css_class(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Impact::High),
            "medium" => Ok(Impact::Medium),
            "low" => Ok(Impact::Low),
            other => Err(format!("unknown impact: {other}")),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An article annotated by the enrichment stage.
///
/// After enrichment only the text fields (`article.title`,
/// `article.description`, `rationale`) are ever replaced, and only by the
/// translator when it builds a per-language copy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub article: Article,
    /// Significance score, nominally 0 to 10.
    pub score: f64,
    pub sentiment: Sentiment,
    pub impact: Impact,
    /// Short "why this matters" explanation.
    pub rationale: String,
}

/// Enriched articles plus category-level prose for one (category, language).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryBundle {
    /// Category identifier, e.g. `"market"`.
    pub category: String,
    /// Display title used as the page heading.
    pub title: String,
    /// Language code of the text fields, e.g. `"en"`.
    pub language: String,
    pub articles: Vec<EnrichedArticle>,
    pub summary: String,
    pub insight: String,
    pub clusters: Vec<String>,
}

/// One row of the JSON file consumed by the companion app.
///
/// The serialized key names are the ones the app already reads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppRecord {
    pub title: String,
    pub url: String,
    #[serde(rename = "industry")]
    pub source: String,
    pub summary: String,
    #[serde(rename = "charlotte_impact")]
    pub rationale: String,
    pub impact_score: i64,
}

impl From<&EnrichedArticle> for AppRecord {
    fn from(a: &EnrichedArticle) -> Self {
        AppRecord {
            title: a.article.title.clone(),
            url: a.article.url.clone(),
            source: a.article.source.clone(),
            summary: a.article.description.clone(),
            rationale: a.rationale.clone(),
            // Scores are 0-10, the app wants 0-5.
            impact_score: (a.score / 2.0).trunc() as i64,
        }
    }
}
