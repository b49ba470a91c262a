//! Static HTML page generation.
//!
//! Each page is a single self-contained document: inline CSS, no scripts,
//! no external assets. Rendering is a pure function of the bundle and the
//! timestamp string, so the same inputs always produce the same bytes.

use crate::models::{CategoryBundle, EnrichedArticle};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

/// UI strings for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub last_updated: &'static str,
    pub today_brief: &'static str,
    pub why_matters: &'static str,
    pub read_more: &'static str,
    pub sentiment: &'static str,
    pub trending: &'static str,
    pub impact: &'static str,
}

const EN: Labels = Labels {
    last_updated: "Last Updated",
    today_brief: "Today's Brief",
    why_matters: "Why this matters",
    read_more: "Read More",
    sentiment: "Sentiment",
    trending: "Trending Themes",
    impact: "Impact",
};

const ZH: Labels = Labels {
    last_updated: "最后更新",
    today_brief: "今日简报",
    why_matters: "深度见解",
    read_more: "阅读全文",
    sentiment: "情感倾向",
    trending: "热门主题",
    impact: "影响",
};

const ES: Labels = Labels {
    last_updated: "Última actualización",
    today_brief: "Resumen de hoy",
    why_matters: "Por qué es importante",
    read_more: "Leer más",
    sentiment: "Sentimiento",
    trending: "Temas en tendencia",
    impact: "Impacto",
};

/// Labels for a language code; unknown codes get English.
pub fn labels_for(code: &str) -> Labels {
    match code {
        "zh" => ZH,
        "es" => ES,
        _ => EN,
    }
}

/// Format the "last updated" stamp in the configured zone.
pub fn format_timestamp(now: DateTime<Utc>, tz: Tz, format: &str) -> String {
    now.with_timezone(&tz).format(format).to_string()
}

const STYLE: &str = r#":root { --bg: #F2F2F7; --card: #FFFFFF; --blue: #007AFF; --text: #1C1C1E; --sub: #8E8E93; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; background: var(--bg); color: var(--text); margin: 0; padding: 20px; -webkit-font-smoothing: antialiased; }
.header { padding: 10px 0 20px 0; }
.updated { font-size: 11px; color: var(--sub); text-transform: uppercase; font-weight: 700; letter-spacing: 0.5px; margin-bottom: 6px; opacity: 0.8; }
h1 { font-size: 34px; font-weight: 800; margin: 0; letter-spacing: -1px; }
.trending-container { margin-top: 15px; background: rgba(0,0,0,0.03); padding: 12px; border-radius: 14px; }
.trending-title { font-size: 11px; font-weight: 800; color: var(--sub); text-transform: uppercase; display: block; margin-bottom: 8px; }
.clusters { display: flex; flex-wrap: wrap; gap: 6px; }
.cluster { background: white; color: var(--blue); padding: 5px 12px; border-radius: 10px; font-size: 11px; font-weight: 700; border: 1px solid rgba(0,122,255,0.1); }
.brief { background: linear-gradient(145deg, #007AFF, #5856D6); color: white; padding: 24px; border-radius: 24px; margin: 24px 0; box-shadow: 0 12px 24px rgba(0,122,255,0.25); }
.brief h2 { font-size: 20px; margin-top: 0; margin-bottom: 10px; font-weight: 800; }
.brief p { font-size: 15px; margin: 0; opacity: 0.95; line-height: 1.5; }
.brief .divider { height: 1px; background: rgba(255,255,255,0.25); margin: 16px 0; }
.brief .insight-text { font-size: 14px; font-weight: 500; opacity: 0.9; }
.card { background: var(--card); border-radius: 20px; padding: 20px; margin-bottom: 20px; box-shadow: 0 5px 15px rgba(0,0,0,0.04); border: 1px solid rgba(0,0,0,0.02); }
.card-meta { display: flex; justify-content: space-between; align-items: center; margin-bottom: 12px; }
.impact { font-size: 10px; font-weight: 900; padding: 3px 10px; border-radius: 8px; text-transform: uppercase; letter-spacing: 0.5px; }
.impact.high { background: #FF3B3015; color: #FF3B30; }
.impact.medium { background: #FF950015; color: #FF9500; }
.impact.low { background: #34C75915; color: #34C759; }
.score { font-weight: 900; color: var(--blue); font-size: 20px; font-variant-numeric: tabular-nums; }
h3 { font-size: 19px; margin: 0 0 12px 0; line-height: 1.3; font-weight: 700; color: #000; }
.desc { font-size: 15px; color: #3A3A3C; line-height: 1.5; margin-bottom: 16px; opacity: 0.9; }
.insight { background: #F2F2F7; padding: 14px; border-radius: 14px; font-size: 14px; border-left: 4px solid var(--blue); line-height: 1.5; font-weight: 500; }
.card-footer { display: flex; justify-content: space-between; align-items: center; margin-top: 18px; }
.source { font-size: 12px; color: var(--sub); font-weight: 700; }
.sentiment-box { font-size: 10px; font-weight: 800; padding: 3px 8px; border-radius: 6px; text-transform: uppercase; }
.btn-link { background: var(--blue); color: white; text-decoration: none; font-weight: 700; font-size: 12px; padding: 8px 16px; border-radius: 10px; }"#;

/// Only web links become anchors; anything else points nowhere.
fn safe_href(url: &str) -> &str {
    let lower = url.trim_start().to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        url.trim()
    } else {
        "#"
    }
}

fn write_card(out: &mut String, a: &EnrichedArticle, labels: &Labels) {
    let color = a.sentiment.color();
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        r#"<div class="card"><div class="card-meta"><span class="impact {class}">{impact} {impact_label}</span><span class="score">{score:.1}</span></div><h3>{title}</h3><p class="desc">{desc}</p><div class="insight"><strong>{why}:</strong> {rationale}</div><div class="card-footer"><span class="source">{source}</span><span class="sentiment-box" style="background: {color}15; color: {color}">{sentiment_label}: {sentiment}</span><a href="{href}" class="btn-link" target="_blank" rel="noopener">{read_more} →</a></div></div>"#,
        class = a.impact.css_class(),
        impact = a.impact,
        impact_label = labels.impact,
        score = a.score,
        title = text(&a.article.title),
        desc = text(&a.article.description),
        why = labels.why_matters,
        rationale = text(&a.rationale),
        source = text(&a.article.source),
        sentiment_label = labels.sentiment,
        sentiment = a.sentiment,
        href = attr(safe_href(&a.article.url)),
        read_more = labels.read_more,
    );
}

/// Render the page for `bundle`, labelled in the bundle's own language.
pub fn render_page(bundle: &CategoryBundle, timestamp: &str) -> String {
    let labels = labels_for(&bundle.language);
    let mut out = String::with_capacity(8 * 1024 + bundle.articles.len() * 1024);

    let _ = write!(
        out,
        r#"<!DOCTYPE html><html lang="{lang}"><head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0, viewport-fit=cover"><title>{title}</title><style>{STYLE}</style></head><body><div class="header"><div class="updated">{updated}: {timestamp}</div><h1>{title}</h1>"#,
        lang = attr(&bundle.language),
        title = text(&bundle.title),
        updated = labels.last_updated,
        timestamp = text(timestamp),
    );

    if !bundle.clusters.is_empty() {
        let _ = write!(
            out,
            r#"<div class="trending-container"><span class="trending-title">{}:</span><div class="clusters">"#,
            labels.trending
        );
        for c in &bundle.clusters {
            let _ = write!(out, r#"<span class="cluster">#{}</span>"#, text(c));
        }
        out.push_str("</div></div>");
    }
    out.push_str("</div>");

    let _ = write!(
        out,
        r#"<div class="brief"><h2>{}</h2><p>{}</p><div class="divider"></div><p class="insight-text">{}</p></div>"#,
        labels.today_brief,
        text(&bundle.summary),
        text(&bundle.insight),
    );

    for a in &bundle.articles {
        write_card(&mut out, a, &labels);
    }
    out.push_str("</body></html>");
    out
}
