//! AI enrichment: one prompt per category, one judgment per article.

use crate::api::{AiError, AskAsync, ask_structured};
use crate::config::{AiConfig, CategoryConfig};
use crate::models::{Article, CategoryBundle, EnrichedArticle, Impact, Sentiment};
use crate::utils::{take_chars, truncate_chars};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

const DEFAULT_SCORE: f64 = 5.0;
const DEFAULT_RATIONALE: &str = "Significant update.";

#[derive(Debug, Serialize)]
struct PromptItem<'a> {
    id: usize,
    title: &'a str,
    desc: String,
}

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    #[serde(default)]
    summary: String,
    #[serde(default, alias = "insight")]
    landscape_insight: String,
    #[serde(default)]
    clusters: Vec<String>,
    #[serde(default)]
    processed_articles: Vec<ProcessedItem>,
}

/// Per-article judgment. Numbers sometimes come back quoted, so the
/// numeric fields are read loosely.
#[derive(Debug, Deserialize)]
struct ProcessedItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    why_matters: Option<String>,
    #[serde(default)]
    impact: Option<String>,
}

/// Quoted `"NaN"` and `"inf"` parse as floats; they count as missing.
fn loose_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Build the enrichment prompt for `batch`.
pub fn build_prompt(
    category: &CategoryConfig,
    batch: &[Article],
    config: &AiConfig,
    today: &str,
) -> String {
    let items: Vec<PromptItem> = batch
        .iter()
        .enumerate()
        .map(|(id, a)| PromptItem {
            id,
            title: &a.title,
            desc: take_chars(&a.description, config.prompt_description_chars),
        })
        .collect();
    // Serializing plain strings and integers cannot fail.
    let input = serde_json::to_string(&items).unwrap_or_default();
    let n = batch.len();

    format!(
        r#"Task: High-Quality Analysis and Enrichment for {id} news.
Category Name: {name}
Current Date: {today}

Input: {input}

Requirements:
1. Process EXACTLY {n} articles. Do not skip any. Echo each input "id".
2. Provide for EACH article:
   - score (0-10.0): How critical/significant this news is.
   - sentiment: Positive, Neutral, or Negative.
   - why_matters: A professional, deep insight (max 120 chars) on the impact. Avoid generic filler.
   - impact: High, Medium, or Low.
3. Generate a professional Category Page Summary (3 sentences): a cohesive summary of current trends based on the articles above.
4. Generate a "Landscape Insight": a one-sentence visionary takeaway.
5. Group into 3-4 trending clusters (e.g., "Policy Shifts", "Regional Conflict").

CRITICAL: Avoid placeholders like "Significant update." or "The news is important." Use the specific context of each headline.
Return ONLY valid JSON.
Structure: {{"summary": "...", "landscape_insight": "...", "clusters": ["..."], "processed_articles": [{{"id": 0, "score": 7.5, "sentiment": "...", "why_matters": "...", "impact": "..."}}]}}"#,
        id = category.id,
        name = category.prompt_name(),
    )
}

/// Score and annotate up to `config.batch_size` articles with one model call.
///
/// The reply must contain exactly one judgment per submitted article, each
/// pointing at a distinct input id; otherwise the whole call fails and no
/// partial result is returned. Missing per-article fields take defaults.
/// Articles come back ordered by descending score.
#[instrument(level = "info", skip_all, fields(category = %category.id))]
pub async fn enrich<A: AskAsync>(
    ai: &A,
    category: &CategoryConfig,
    articles: &[Article],
    config: &AiConfig,
    language: &str,
    today: &str,
) -> Result<CategoryBundle, AiError> {
    let batch = &articles[..articles.len().min(config.batch_size)];
    if batch.is_empty() {
        return Err(AiError::Rejected("no articles to enrich".into()));
    }
    info!(count = batch.len(), "Enriching articles");

    let prompt = build_prompt(category, batch, config, today);
    let reply: EnrichmentReply = ask_structured(ai, &prompt).await?;
    let bundle = assemble(category, batch, reply, config, language)?;

    info!(count = bundle.articles.len(), clusters = bundle.clusters.len(), "Enrichment complete");
    Ok(bundle)
}

fn assemble(
    category: &CategoryConfig,
    batch: &[Article],
    reply: EnrichmentReply,
    config: &AiConfig,
    language: &str,
) -> Result<CategoryBundle, AiError> {
    let got = reply.processed_articles.len();
    if got != batch.len() {
        warn!(expected = batch.len(), got, "Model returned a different article count");
        return Err(AiError::CountMismatch {
            expected: batch.len(),
            got,
        });
    }

    let mut used = HashSet::new();
    let mut enriched = Vec::with_capacity(got);
    for (pos, item) in reply.processed_articles.into_iter().enumerate() {
        let idx = match &item.id {
            None => pos,
            Some(v) => loose_number(v)
                .filter(|n| n.fract() == 0.0 && *n >= 0.0)
                .map(|n| n as usize)
                .ok_or_else(|| AiError::Rejected(format!("invalid article id {v}")))?,
        };
        if idx >= batch.len() {
            return Err(AiError::Rejected(format!("article id {idx} out of range")));
        }
        if !used.insert(idx) {
            return Err(AiError::Rejected(format!("article id {idx} scored twice")));
        }

        let mut article = batch[idx].clone();
        article.description = truncate_chars(&article.description, config.description_chars);

        enriched.push(EnrichedArticle {
            article,
            score: item.score.as_ref().and_then(loose_number).unwrap_or(DEFAULT_SCORE),
            sentiment: item
                .sentiment
                .and_then(|s| s.parse::<Sentiment>().ok())
                .unwrap_or_default(),
            impact: item
                .impact
                .and_then(|s| s.parse::<Impact>().ok())
                .unwrap_or_default(),
            rationale: item
                .why_matters
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RATIONALE.to_string()),
        });
    }
    enriched.sort_by(|a, b| b.score.total_cmp(&a.score));

    let clusters = reply
        .clusters
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unique()
        .collect();

    Ok(CategoryBundle {
        category: category.id.clone(),
        title: category.title.clone(),
        language: language.to_string(),
        articles: enriched,
        summary: reply.summary,
        insight: reply.landscape_insight,
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedAi;
    use crate::api::{RetryAsk, RetryPolicy};
    use crate::config::PipelineConfig;
    use std::time::Duration;

    fn category() -> CategoryConfig {
        PipelineConfig::default()
            .categories
            .into_iter()
            .find(|c| c.id == "market")
            .unwrap()
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article {
                title: format!("Headline {i}"),
                url: format!("https://news.example/{i}"),
                description: "x".repeat(400),
                source: "Example".to_string(),
                published_at: None,
            })
            .collect()
    }

    fn reply_for(n: usize) -> String {
        let items: Vec<Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "id": i,
                    "score": i as f64 + 1.0,
                    "sentiment": "Positive",
                    "why_matters": format!("Reason {i}"),
                    "impact": "High"
                })
            })
            .collect();
        serde_json::json!({
            "summary": "Markets moved.",
            "landscape_insight": "Volatility ahead.",
            "clusters": ["Rates", "Rates ", "Earnings"],
            "processed_articles": items
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_enrich_success_sorted_and_truncated() {
        let ai = ScriptedAi::new(vec![Ok(reply_for(3))]);
        let bundle = enrich(&ai, &category(), &articles(3), &AiConfig::default(), "en", "2026-01-01")
            .await
            .unwrap();

        assert_eq!(bundle.articles.len(), 3);
        assert_eq!(bundle.articles[0].article.title, "Headline 2");
        assert_eq!(bundle.articles[0].score, 3.0);
        assert_eq!(bundle.articles[0].rationale, "Reason 2");
        assert_eq!(bundle.articles[0].impact, Impact::High);
        assert_eq!(bundle.articles[0].article.description.chars().count(), 353);
        assert!(bundle.articles[0].article.description.ends_with("..."));
        assert_eq!(bundle.summary, "Markets moved.");
        assert_eq!(bundle.insight, "Volatility ahead.");
        assert_eq!(bundle.clusters, vec!["Rates", "Earnings"]);
        assert_eq!(bundle.title, "Finance");
        assert_eq!(bundle.language, "en");
    }

    #[tokio::test]
    async fn test_count_mismatch_fails_whole_category() {
        let ai = ScriptedAi::new(vec![Ok(reply_for(2))]);
        let res = enrich(&ai, &category(), &articles(3), &AiConfig::default(), "en", "d").await;
        assert!(matches!(res, Err(AiError::CountMismatch { expected: 3, got: 2 })));
    }

    #[tokio::test]
    async fn test_batch_is_capped() {
        let ai = ScriptedAi::new(vec![Ok(reply_for(20))]);
        let bundle = enrich(&ai, &category(), &articles(25), &AiConfig::default(), "en", "d")
            .await
            .unwrap();
        assert_eq!(bundle.articles.len(), 20);
        assert!(ai.prompts.lock().unwrap()[0].contains("EXACTLY 20 articles"));
    }

    #[tokio::test]
    async fn test_missing_fields_take_defaults() {
        let reply = r#"```json
{"processed_articles": [{"id": "0"}, {"id": 1, "score": "8.5", "sentiment": "angry", "impact": "low"}]}
```"#;
        let ai = ScriptedAi::new(vec![Ok(crate::api::extract_json_text(reply))]);
        let bundle = enrich(&ai, &category(), &articles(2), &AiConfig::default(), "en", "d")
            .await
            .unwrap();

        let first = &bundle.articles[0];
        assert_eq!(first.article.title, "Headline 1");
        assert_eq!(first.score, 8.5);
        assert_eq!(first.sentiment, Sentiment::Neutral);
        assert_eq!(first.impact, Impact::Low);

        let second = &bundle.articles[1];
        assert_eq!(second.score, DEFAULT_SCORE);
        assert_eq!(second.rationale, DEFAULT_RATIONALE);
        assert_eq!(second.impact, Impact::Medium);
        assert!(bundle.summary.is_empty());
        assert!(bundle.clusters.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_scores_take_default() {
        let reply = r#"{"processed_articles": [
            {"id": 0, "score": "NaN"},
            {"id": 1, "score": "inf"},
            {"id": 2, "score": "7"}
        ]}"#;
        let ai = ScriptedAi::new(vec![Ok(reply.to_string())]);
        let bundle = enrich(&ai, &category(), &articles(3), &AiConfig::default(), "en", "d")
            .await
            .unwrap();

        let scores: Vec<f64> = bundle.articles.iter().map(|a| a.score).collect();
        assert_eq!(scores, vec![7.0, DEFAULT_SCORE, DEFAULT_SCORE]);
        assert_eq!(bundle.articles[0].article.title, "Headline 2");
        assert!(bundle.articles.iter().all(|a| a.score.is_finite()));
    }

    #[tokio::test]
    async fn test_duplicate_or_out_of_range_ids_rejected() {
        let dup = r#"{"processed_articles": [{"id": 0}, {"id": 0}]}"#;
        let ai = ScriptedAi::new(vec![Ok(dup.to_string())]);
        let res = enrich(&ai, &category(), &articles(2), &AiConfig::default(), "en", "d").await;
        assert!(matches!(res, Err(AiError::Rejected(_))));

        let oob = r#"{"processed_articles": [{"id": 0}, {"id": 7}]}"#;
        let ai = ScriptedAi::new(vec![Ok(oob.to_string())]);
        let res = enrich(&ai, &category(), &articles(2), &AiConfig::default(), "en", "d").await;
        assert!(matches!(res, Err(AiError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_calling_model() {
        let ai = ScriptedAi::new(vec![]);
        let res = enrich(&ai, &category(), &[], &AiConfig::default(), "en", "d").await;
        assert!(res.is_err());
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_two_rate_limits_then_success_scores_once() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            jitter_max: Duration::ZERO,
            retry_delay: Duration::ZERO,
        };
        let ai = RetryAsk::new(
            ScriptedAi::new(vec![
                Err(AiError::RateLimited),
                Err(AiError::RateLimited),
                Ok(reply_for(2)),
            ]),
            policy,
        );
        let bundle = enrich(&ai, &category(), &articles(2), &AiConfig::default(), "en", "d")
            .await
            .unwrap();

        assert_eq!(ai.inner().calls(), 3);
        assert_eq!(bundle.articles.len(), 2);
        let scores: Vec<f64> = bundle.articles.iter().map(|a| a.score).collect();
        assert_eq!(scores, vec![2.0, 1.0]);
    }

    #[test]
    fn test_prompt_trims_descriptions() {
        let prompt = build_prompt(&category(), &articles(1), &AiConfig::default(), "2026-10-18");
        assert!(prompt.contains("Current Date: 2026-10-18"));
        assert!(prompt.contains("Category Name: Market"));
        assert!(prompt.contains(&"x".repeat(250)));
        assert!(!prompt.contains(&"x".repeat(251)));
    }
}
