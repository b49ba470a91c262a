//! Exact-duplicate removal for fetched articles.

use crate::models::Article;
use crate::utils::{normalize_title, normalize_url};
use std::collections::HashSet;
use tracing::debug;

/// Remove duplicates, keeping the first-seen article.
///
/// An article survives only if its normalized URL and normalized title are
/// both non-empty and neither has been seen before. The same story syndicated
/// under a new link but the same headline is therefore dropped, as is a
/// re-titled story at an already seen link.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let total = articles.len();
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();

    let unique: Vec<Article> = articles
        .into_iter()
        .filter(|a| {
            let url = normalize_url(&a.url);
            let title = normalize_title(&a.title);
            if url.is_empty() || title.is_empty() {
                return false;
            }
            if seen_urls.contains(&url) || seen_titles.contains(&title) {
                return false;
            }
            seen_urls.insert(url);
            seen_titles.insert(title);
            true
        })
        .collect();

    debug!(total, kept = unique.len(), "Deduplicated articles");
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, title: &str, source: &str) -> Article {
        Article {
            title: title.to_string(),
            url: url.to_string(),
            description: String::new(),
            source: source.to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_case_and_whitespace_variants_collapse() {
        let input = vec![
            article("https://a.example/story", "Foo", "first"),
            article("  HTTPS://A.example/Story ", "foo ", "second"),
            article("https://b.example/other", "Bar", "third"),
        ];
        let out = dedupe(input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, "first");
        assert_eq!(out[0].title, "Foo");
        assert_eq!(out[1].title, "Bar");
    }

    #[test]
    fn test_same_title_different_url_is_dropped() {
        let out = dedupe(vec![
            article("https://a.example/1", "Same   headline", "a"),
            article("https://b.example/2", "same headline", "b"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "a");
    }

    #[test]
    fn test_empty_identity_fields_are_dropped() {
        let out = dedupe(vec![
            article("", "Has title", "a"),
            article("https://x.example", "   ", "b"),
            article("https://y.example", "Kept", "c"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "c");
    }

    #[test]
    fn test_rejected_article_does_not_reserve_its_title() {
        // The second article is dropped for its URL; its new title must not
        // block a later article carrying that title.
        let out = dedupe(vec![
            article("https://a.example", "One", "a"),
            article("https://a.example", "Two", "b"),
            article("https://c.example", "Two", "c"),
        ]);
        let sources: Vec<_> = out.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(sources, vec!["a", "c"]);
    }

    #[test]
    fn test_no_two_outputs_share_identity() {
        let titles = ["Alpha", "alpha", "Beta", " beta ", "Gamma", "ALPHA  "];
        let urls = ["u1", "U1", "u2", "u3", "u2 ", "u4"];
        let input: Vec<_> = urls
            .iter()
            .zip(titles.iter())
            .map(|(u, t)| article(u, t, "s"))
            .collect();
        let out = dedupe(input);

        let mut url_keys = HashSet::new();
        let mut title_keys = HashSet::new();
        for a in &out {
            assert!(url_keys.insert(normalize_url(&a.url)));
            assert!(title_keys.insert(normalize_title(&a.title)));
        }
        // u1/Alpha kept, U1 dup url, u2/Beta kept, u3/beta dup title,
        // u2 dup url, u4/ALPHA dup title
        assert_eq!(out.len(), 2);
    }
}
