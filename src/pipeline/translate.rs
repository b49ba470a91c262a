//! Per-language translation of an enriched bundle.

use crate::api::{AiError, AskAsync, ask_structured};
use crate::config::LanguageConfig;
use crate::models::CategoryBundle;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
struct Payload<'a> {
    summary: &'a str,
    insight: &'a str,
    clusters: &'a [String],
    articles: Vec<ArticleText<'a>>,
}

#[derive(Debug, Serialize)]
struct ArticleText<'a> {
    title: &'a str,
    description: &'a str,
    why_matters: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationReply {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    insight: Option<String>,
    #[serde(default)]
    clusters: Option<Vec<String>>,
    #[serde(default)]
    articles: Vec<TranslatedArticle>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatedArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    why_matters: Option<String>,
}

fn build_prompt(bundle: &CategoryBundle, language: &LanguageConfig) -> String {
    let payload = Payload {
        summary: &bundle.summary,
        insight: &bundle.insight,
        clusters: &bundle.clusters,
        articles: bundle
            .articles
            .iter()
            .map(|a| ArticleText {
                title: &a.article.title,
                description: &a.article.description,
                why_matters: &a.rationale,
            })
            .collect(),
    };
    let json = serde_json::to_string(&payload).unwrap_or_default();

    format!(
        r#"Task: Translate this {title} news analysis into {lang}.
Requirements:
1. Translate ALL text fields: titles, descriptions, summary, insight, why_matters, and clusters.
2. Keep the JSON structure EXACTLY the same, including the order of "articles".
3. Professional and accurate tone.

JSON to translate:
{json}

Output Format: Give me the translated JSON directly."#,
        title = bundle.title,
        lang = language.name,
    )
}

/// Translate `bundle` into `language` with one model call.
///
/// Only text fields change; URL, source, score, sentiment and impact are
/// carried over. Any translated field that is missing or blank keeps its
/// English value.
#[instrument(level = "info", skip_all, fields(category = %bundle.category, language = %language.code))]
pub async fn translate<A: AskAsync>(
    ai: &A,
    bundle: &CategoryBundle,
    language: &LanguageConfig,
) -> Result<CategoryBundle, AiError> {
    info!(language = %language.name, "Translating bundle");
    let reply: TranslationReply = ask_structured(ai, &build_prompt(bundle, language)).await?;
    Ok(merge(bundle, reply, &language.code))
}

fn pick(translated: Option<String>, original: &str) -> String {
    translated
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| original.to_string())
}

fn merge(bundle: &CategoryBundle, reply: TranslationReply, code: &str) -> CategoryBundle {
    let mut merged = bundle.clone();
    merged.language = code.to_string();
    merged.summary = pick(reply.summary, &bundle.summary);
    merged.insight = pick(reply.insight, &bundle.insight);
    if let Some(clusters) = reply.clusters.filter(|c| !c.is_empty()) {
        merged.clusters = clusters;
    }

    let mut translated = reply.articles.into_iter();
    for article in merged.articles.iter_mut() {
        let Some(t) = translated.next() else { break };
        article.article.title = pick(t.title, &article.article.title);
        article.article.description = pick(t.description, &article.article.description);
        article.rationale = pick(t.why_matters, &article.rationale);
    }
    merged
}
