//! JSON news API adapters.
//!
//! Each provider has a request builder and a pure `parse_*` function that
//! maps the provider's response body onto [`Article`]s. Items without a
//! title or URL are dropped; a missing description becomes empty.

use crate::models::Article;
use crate::utils::{html_to_text, take_chars};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;

pub const NEWSAPI_HEADLINES_URL: &str = "https://newsapi.org/v2/top-headlines";
pub const NEWSAPI_EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";
pub const NEWSDATA_URL: &str = "https://newsdata.io/api/1/news";
pub const THENEWSAPI_URL: &str = "https://api.thenewsapi.com/v1/news/all";
pub const GNEWS_URL: &str = "https://gnews.io/api/v4/search";
pub const EVENT_REGISTRY_URL: &str = "https://eventregistry.org/api/v1/article/getArticles";

/// EventRegistry returns full article bodies; only a teaser is kept.
const EVENT_REGISTRY_BODY_CHARS: usize = 350;

fn article(
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    source: String,
    published_at: Option<String>,
) -> Option<Article> {
    let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
    // NewsAPI tombstones for deleted stories.
    if title == "[Removed]" {
        return None;
    }
    let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
    Some(Article {
        title,
        url,
        description: description.map(|d| html_to_text(&d)).unwrap_or_default(),
        source,
        published_at: published_at.filter(|p| !p.trim().is_empty()),
    })
}

#[derive(Debug, Default, Deserialize)]
struct NamedSource {
    #[serde(default)]
    name: Option<String>,
}

// NewsAPI and GNews share one shape.

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    articles: Vec<ArticlesItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticlesItem {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    #[serde(default)]
    source: NamedSource,
    published_at: Option<String>,
}

/// NewsAPI (`/v2/top-headlines`, `/v2/everything`) and GNews responses.
pub fn parse_articles_response(body: &str, fallback: &str) -> Result<Vec<Article>, serde_json::Error> {
    let resp: ArticlesResponse = serde_json::from_str(body)?;
    Ok(resp
        .articles
        .into_iter()
        .filter_map(|a| {
            let source = a.source.name.unwrap_or_else(|| fallback.to_string());
            article(a.title, a.url, a.description, source, a.published_at)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct NewsDataResponse {
    #[serde(default)]
    results: Vec<NewsDataItem>,
}

#[derive(Debug, Deserialize)]
struct NewsDataItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    source_id: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// NewsData `/api/1/news` response. Articles are attributed to their
/// `source_id`, or `NewsData` when absent.
pub fn parse_newsdata(body: &str) -> Result<Vec<Article>, serde_json::Error> {
    let resp: NewsDataResponse = serde_json::from_str(body)?;
    Ok(resp
        .results
        .into_iter()
        .filter_map(|a| {
            let source = a.source_id.unwrap_or_else(|| "NewsData".to_string());
            article(a.title, a.link, a.description, source, a.pub_date)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct TheNewsResponse {
    #[serde(default)]
    data: Vec<TheNewsItem>,
}

#[derive(Debug, Deserialize)]
struct TheNewsItem {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    source: Option<String>,
    published_at: Option<String>,
}

/// TheNewsAPI `/v1/news/all` response (`data` array).
pub fn parse_thenewsapi(body: &str) -> Result<Vec<Article>, serde_json::Error> {
    let resp: TheNewsResponse = serde_json::from_str(body)?;
    Ok(resp
        .data
        .into_iter()
        .filter_map(|a| {
            let source = a.source.unwrap_or_else(|| "TheNewsAPI".to_string());
            article(a.title, a.url, a.description, source, a.published_at)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct EventRegistryResponse {
    #[serde(default)]
    articles: EventRegistryPage,
}

#[derive(Debug, Default, Deserialize)]
struct EventRegistryPage {
    #[serde(default)]
    results: Vec<EventRegistryItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRegistryItem {
    title: Option<String>,
    url: Option<String>,
    body: Option<String>,
    date_time: Option<String>,
}

/// EventRegistry `getArticles` response; bodies are cut to a teaser.
pub fn parse_event_registry(body: &str, label: &str) -> Result<Vec<Article>, serde_json::Error> {
    let resp: EventRegistryResponse = serde_json::from_str(body)?;
    Ok(resp
        .articles
        .results
        .into_iter()
        .filter_map(|a| {
            let teaser = a.body.map(|b| take_chars(&b, EVENT_REGISTRY_BODY_CHARS));
            article(a.title, a.url, teaser, label.to_string(), a.date_time)
        })
        .collect())
}

async fn get_text(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String, Box<dyn Error>> {
    Ok(http
        .get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?)
}

/// Fetch NewsAPI top headlines in English.
///
/// # Arguments
///
/// * `http` - Shared client
/// * `key` - NewsAPI key
/// * `label` - Source name for articles whose `source.name` is missing
/// * `page_size` - Number of articles requested
///
/// # Returns
///
/// The parsed articles, or the HTTP or decode error.
pub async fn newsapi_headlines(
    http: &reqwest::Client,
    key: &str,
    label: &str,
    page_size: u32,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let query = [
        ("apiKey", key.to_string()),
        ("language", "en".to_string()),
        ("pageSize", page_size.to_string()),
    ];
    let body = get_text(http, NEWSAPI_HEADLINES_URL, &query).await?;
    Ok(parse_articles_response(&body, label)?)
}

/// Search NewsAPI's `everything` endpoint for `q`.
///
/// # Arguments
///
/// * `q` - Query string, passed through unchanged
/// * `page_size` - Number of articles requested
///
/// Other arguments and the return value are as for [`newsapi_headlines`].
pub async fn newsapi_search(
    http: &reqwest::Client,
    key: &str,
    label: &str,
    q: &str,
    page_size: u32,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let query = [
        ("apiKey", key.to_string()),
        ("q", q.to_string()),
        ("language", "en".to_string()),
        ("pageSize", page_size.to_string()),
    ];
    let body = get_text(http, NEWSAPI_EVERYTHING_URL, &query).await?;
    Ok(parse_articles_response(&body, label)?)
}

/// Fetch the latest English NewsData articles in `category`
/// (for example `business` or `technology`).
pub async fn newsdata(
    http: &reqwest::Client,
    key: &str,
    category: &str,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let query = [
        ("apikey", key.to_string()),
        ("language", "en".to_string()),
        ("category", category.to_string()),
    ];
    let body = get_text(http, NEWSDATA_URL, &query).await?;
    Ok(parse_newsdata(&body)?)
}

/// Search TheNewsAPI.
///
/// # Arguments
///
/// * `search` - Search expression (`|` separates alternatives)
/// * `limit` - Maximum articles requested; the provider may return fewer
pub async fn thenewsapi(
    http: &reqwest::Client,
    key: &str,
    search: &str,
    limit: u32,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let query = [
        ("api_token", key.to_string()),
        ("language", "en".to_string()),
        ("search", search.to_string()),
        ("limit", limit.to_string()),
    ];
    let body = get_text(http, THENEWSAPI_URL, &query).await?;
    Ok(parse_thenewsapi(&body)?)
}

/// Search GNews for `q`, returning at most `max` English articles.
pub async fn gnews(
    http: &reqwest::Client,
    key: &str,
    label: &str,
    q: &str,
    max: u32,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let query = [
        ("token", key.to_string()),
        ("q", q.to_string()),
        ("lang", "en".to_string()),
        ("max", max.to_string()),
    ];
    let body = get_text(http, GNEWS_URL, &query).await?;
    Ok(parse_articles_response(&body, label)?)
}

/// Fetch articles tagged with a concept from EventRegistry.
///
/// Unlike the other providers this is a JSON `POST`, with the key in the
/// body.
///
/// # Arguments
///
/// * `http` - Shared client
/// * `key` - EventRegistry key
/// * `label` - Source name recorded on every article
/// * `concept_uri` - Wikipedia concept URI, e.g. `http://en.wikipedia.org/wiki/Artificial_intelligence`
/// * `max_items` - Number of articles requested
///
/// # Returns
///
/// Articles sorted by relevance, bodies cut to a teaser.
pub async fn event_registry(
    http: &reqwest::Client,
    key: &str,
    label: &str,
    concept_uri: &str,
    max_items: u32,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let request = json!({
        "action": "getArticles",
        "conceptUri": concept_uri,
        "lang": "eng",
        "articlesSortBy": "rel",
        "articlesCount": max_items,
        "resultType": "articles",
        "apiKey": key,
    });
    let body = http
        .post(EVENT_REGISTRY_URL)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_event_registry(&body, label)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newsapi() {
        let body = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"source": {"id": null, "name": "Reuters"}, "title": "Markets rise",
                 "url": "https://reuters.example/markets", "description": "Stocks up.",
                 "publishedAt": "2026-01-05T12:00:00Z"},
                {"source": {"id": null, "name": "[Removed]"}, "title": "[Removed]",
                 "url": "https://removed.com", "description": null},
                {"source": {}, "title": "No source name",
                 "url": "https://x.example/y", "description": null}
            ]
        }"#;
        let articles = parse_articles_response(body, "NewsAPI_Global").unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].source, "Reuters");
        assert_eq!(articles[0].description, "Stocks up.");
        assert_eq!(articles[0].published_at.as_deref(), Some("2026-01-05T12:00:00Z"));
        assert_eq!(articles[1].source, "NewsAPI_Global");
        assert_eq!(articles[1].description, "");
    }

    #[test]
    fn test_parse_newsdata() {
        let body = r#"{"status": "success", "results": [
            {"title": "Rates hold", "link": "https://nd.example/1", "description": "<p>Fed</p>", "source_id": "cnbc"},
            {"title": "", "link": "https://nd.example/2"},
            {"title": "No id", "link": "https://nd.example/3"}
        ]}"#;
        let articles = parse_newsdata(body).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://nd.example/1");
        assert_eq!(articles[0].source, "cnbc");
        assert_eq!(articles[0].description, "Fed");
        assert_eq!(articles[1].source, "NewsData");
    }

    #[test]
    fn test_parse_thenewsapi() {
        let body = r#"{"meta": {"found": 1}, "data": [
            {"uuid": "u1", "title": "Bond yields", "url": "https://tn.example/1",
             "description": "Treasuries", "source": "wsj.com", "published_at": "2026-01-05T08:00:00.000000Z"}
        ]}"#;
        let articles = parse_thenewsapi(body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "wsj.com");
    }

    #[test]
    fn test_parse_event_registry_truncates_body() {
        let long = "word ".repeat(200);
        let body = json!({
            "articles": {"results": [
                {"title": "New model", "url": "https://er.example/1", "body": long, "dateTime": "2026-01-05T09:00:00Z"}
            ]}
        })
        .to_string();
        let articles = parse_event_registry(&body, "EventRegistry").unwrap();
        assert_eq!(articles.len(), 1);
        assert!(articles[0].description.chars().count() <= EVENT_REGISTRY_BODY_CHARS);
        assert_eq!(articles[0].source, "EventRegistry");
    }

    #[test]
    fn test_error_bodies_parse_to_nothing() {
        assert!(parse_articles_response(r#"{"status": "error", "code": "apiKeyInvalid"}"#, "x")
            .unwrap()
            .is_empty());
        assert!(parse_newsdata("not json").is_err());
    }
}
