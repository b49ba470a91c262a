//! RSS 2.0 and Atom feed fetching.
//!
//! Feeds are the only source kind that is retried: publishers' CDNs fail
//! intermittently far more often than the JSON APIs do.
//!
//! A body is read as an RSS channel first and as an Atom feed second. Only
//! an item's own `title`, `link`, `description` and date elements are used;
//! extension elements such as `media:title` and an Atom entry's `<source>`
//! metadata never leak into the article. Titles and descriptions are
//! flattened from HTML to text.

use crate::models::Article;
use crate::utils::html_to_text;
use chrono::SecondsFormat;
use reqwest::header::{ACCEPT, REFERER};
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

#[derive(Debug, thiserror::Error)]
#[error("document is neither RSS ({rss}) nor Atom ({atom})")]
pub struct FeedError {
    rss: rss::Error,
    atom: atom_syndication::Error,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn build_article(
    title: &str,
    url: &str,
    description: Option<&str>,
    content: Option<&str>,
    published: Option<String>,
    source: &str,
) -> Option<Article> {
    let title = html_to_text(title);
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    let description = non_empty(description)
        .or(non_empty(content))
        .map(html_to_text)
        .unwrap_or_default();
    Some(Article {
        title,
        url: url.to_string(),
        description,
        source: source.to_string(),
        published_at: published.filter(|p| !p.trim().is_empty()),
    })
}

fn rss_articles(channel: &rss::Channel, source: &str) -> Vec<Article> {
    channel
        .items()
        .iter()
        .filter_map(|item| {
            // `pubDate` first, then Dublin Core `dc:date`.
            let published = item.pub_date().map(str::to_string).or_else(|| {
                item.dublin_core_ext()
                    .and_then(|dc| dc.dates().first().cloned())
            });
            build_article(
                item.title()?,
                item.link()?,
                item.description(),
                item.content(),
                published,
                source,
            )
        })
        .collect()
}

fn atom_articles(feed: &atom_syndication::Feed, source: &str) -> Vec<Article> {
    feed.entries()
        .iter()
        .filter_map(|entry| {
            let link = entry.links().iter().find(|l| l.rel() == "alternate")?;
            let published = entry
                .published()
                .unwrap_or(entry.updated())
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            build_article(
                entry.title().as_str(),
                link.href(),
                entry.summary().map(|t| t.as_str()),
                entry.content().and_then(|c| c.value()),
                Some(published),
                source,
            )
        })
        .collect()
}

/// Parse an RSS or Atom document into articles attributed to `source`.
///
/// Entries without a title or an alternate link are skipped.
///
/// # Arguments
///
/// * `xml` - The raw feed body
/// * `source` - Display name recorded on every article
///
/// # Returns
///
/// The feed's articles in document order, or a [`FeedError`] carrying both
/// parsers' complaints when the body is neither format.
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<Article>, FeedError> {
    let rss = match rss::Channel::read_from(xml.as_bytes()) {
        Ok(channel) => return Ok(rss_articles(&channel, source)),
        Err(e) => e,
    };
    match atom_syndication::Feed::read_from(xml.as_bytes()) {
        Ok(feed) => Ok(atom_articles(&feed, source)),
        Err(atom) => Err(FeedError { rss, atom }),
    }
}

/// Fetch and parse one feed, retrying up to `retries` extra times with a
/// fixed `delay` between attempts.
///
/// # Arguments
///
/// * `http` - Shared client
/// * `name` - Display name recorded on every article
/// * `url` - Feed URL
/// * `retries` - Extra attempts after the first failure
/// * `delay` - Pause between attempts
///
/// # Returns
///
/// The feed's articles, or the last attempt's error. HTTP errors and
/// unparseable bodies are both retried.
#[instrument(level = "info", skip(http, delay), fields(source = %name))]
pub async fn fetch_feed(
    http: &reqwest::Client,
    name: &str,
    url: &str,
    retries: u32,
    delay: Duration,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match fetch_once(http, name, url).await {
            Ok(articles) => {
                info!(attempt, count = articles.len(), "Fetched feed");
                return Ok(articles);
            }
            Err(e) if attempt <= retries => {
                warn!(attempt, error = %e, "Feed fetch failed; retrying");
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(
    http: &reqwest::Client,
    name: &str,
    url: &str,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let body = http
        .get(url)
        .header(ACCEPT, "application/rss+xml,application/xml;q=0.9,*/*;q=0.8")
        .header(REFERER, "https://www.google.com/")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_feed(&body, name)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{local_client, serve};
    use std::sync::atomic::Ordering;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Channel title is not an item</title>
    <link>https://feed.example/</link>
    <item>
      <title>Fed holds rates &amp; signals patience</title>
      <link>https://feed.example/fed</link>
      <description><![CDATA[<p>The <b>Federal Reserve</b> left rates unchanged.</p>]]></description>
      <pubDate>Mon, 05 Jan 2026 14:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Chipmakers rally</title>
      <link>https://feed.example/chips</link>
      <description>&lt;a href="https://x"&gt;Shares jump&lt;/a&gt;&amp;nbsp;on demand</description>
      <dc:date>2026-01-05</dc:date>
    </item>
    <item>
      <title>No link, dropped</title>
    </item>
    <item>
      <title>Body only</title>
      <link>https://feed.example/body</link>
      <content:encoded><![CDATA[<div>Full body text</div>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom feed</title>
  <entry>
    <title type="html">Model release &#8211; v2</title>
    <link rel="self" href="https://atom.example/self"/>
    <link rel="alternate" href="https://atom.example/post"/>
    <summary>Short summary</summary>
    <published>2026-01-05T10:00:00Z</published>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let articles = parse_feed(RSS, "Example Feed").unwrap();
        assert_eq!(articles.len(), 3);

        assert_eq!(articles[0].title, "Fed holds rates & signals patience");
        assert_eq!(articles[0].url, "https://feed.example/fed");
        assert_eq!(articles[0].description, "The Federal Reserve left rates unchanged.");
        assert_eq!(
            articles[0].published_at.as_deref(),
            Some("Mon, 05 Jan 2026 14:00:00 GMT")
        );
        assert_eq!(articles[0].source, "Example Feed");

        assert!(articles[1].description.starts_with("Shares jump"));
        assert!(articles[1].description.ends_with("on demand"));
        assert_eq!(articles[1].published_at.as_deref(), Some("2026-01-05"));

        assert_eq!(articles[2].description, "Full body text");
    }

    #[test]
    fn test_parse_atom_entry() {
        let articles = parse_feed(ATOM, "Atom").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Model release \u{2013} v2");
        assert_eq!(articles[0].url, "https://atom.example/post");
        assert_eq!(articles[0].description, "Short summary");
        assert_eq!(articles[0].published_at.as_deref(), Some("2026-01-05T10:00:00Z"));
    }

    #[test]
    fn test_extension_elements_stay_out_of_item_fields() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>City desk</title>
    <item>
      <title>Council approves budget</title>
      <media:title>Photo: City Hall at dusk</media:title>
      <link>https://city.example/budget</link>
      <description>Short teaser</description>
      <media:description>Image credit Jane Doe</media:description>
      <media:content url="https://city.example/hall.jpg" medium="image">
        <media:title>Nested caption</media:title>
      </media:content>
    </item>
  </channel>
</rss>"#;
        let articles = parse_feed(xml, "City").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Council approves budget");
        assert_eq!(articles[0].description, "Short teaser");
    }

    #[test]
    fn test_atom_source_metadata_is_ignored() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Aggregator</title>
  <entry>
    <source>
      <title>Upstream Blog</title>
      <link rel="alternate" href="https://upstream.example/"/>
    </source>
    <title>Real headline</title>
    <link href="https://aggregator.example/real"/>
    <updated>2026-01-06T08:30:00Z</updated>
  </entry>
</feed>"#;
        let articles = parse_feed(xml, "Aggregator").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Real headline");
        assert_eq!(articles[0].url, "https://aggregator.example/real");
        assert_eq!(articles[0].published_at.as_deref(), Some("2026-01-06T08:30:00Z"));
    }

    #[test]
    fn test_non_feed_document_is_an_error() {
        assert!(parse_feed("<html><body><p>Not a feed</p></body></html>", "html").is_err());
        assert!(parse_feed("plain text", "text").is_err());
    }

    #[tokio::test]
    async fn test_feed_retries_are_bounded() {
        let (url, hits) = serve("500 Internal Server Error", "unavailable").await;

        let result = fetch_feed(&local_client(), "Flaky", &url, 2, Duration::from_millis(10)).await;

        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_feed_fetch_parses_successful_body() {
        let (url, hits) = serve("200 OK", RSS).await;

        let articles = fetch_feed(&local_client(), "Example Feed", &url, 2, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(articles.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
