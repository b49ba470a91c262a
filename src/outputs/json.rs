//! JSON record output for the companion app.
//!
//! The app reads a flat array, one object per article:
//!
//! ```text
//! [
//!   {
//!     "title": "...",
//!     "url": "https://...",
//!     "industry": "Reuters",
//!     "summary": "...",
//!     "charlotte_impact": "...",
//!     "impact_score": 4
//!   }
//! ]
//! ```

use crate::models::{AppRecord, CategoryBundle};

/// App records for `bundle`, in bundle order.
pub fn records(bundle: &CategoryBundle) -> Vec<AppRecord> {
    bundle.articles.iter().map(AppRecord::from).collect()
}

/// Pretty-printed JSON for `bundle`. Non-ASCII text is written as UTF-8.
pub fn render_records(bundle: &CategoryBundle) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&records(bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, EnrichedArticle, Impact, Sentiment};

    fn bundle() -> CategoryBundle {
        CategoryBundle {
            category: "charlotte".into(),
            title: "Local Life".into(),
            language: "zh".into(),
            articles: vec![EnrichedArticle {
                article: Article {
                    title: "轻轨延长线开通".into(),
                    url: "https://local.example/rail".into(),
                    description: "新车站".into(),
                    source: "WCNC".into(),
                    published_at: None,
                },
                score: 7.9,
                sentiment: Sentiment::Positive,
                impact: Impact::Medium,
                rationale: "通勤更方便".into(),
            }],
            summary: String::new(),
            insight: String::new(),
            clusters: vec![],
        }
    }

    #[test]
    fn test_records_shape() {
        let json = render_records(&bundle()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let row = &parsed[0];
        assert_eq!(row["title"], "轻轨延长线开通");
        assert_eq!(row["industry"], "WCNC");
        assert_eq!(row["summary"], "新车站");
        assert_eq!(row["charlotte_impact"], "通勤更方便");
        assert_eq!(row["impact_score"], 3);
    }

    #[test]
    fn test_unicode_is_not_escaped() {
        let json = render_records(&bundle()).unwrap();
        assert!(json.contains("轻轨延长线开通"));
        assert!(json.starts_with("[\n  {"));
    }

    #[test]
    fn test_empty_bundle_is_empty_array() {
        let mut b = bundle();
        b.articles.clear();
        assert_eq!(render_records(&b).unwrap(), "[]");
    }
}
