// src/ingest/providers/google_news.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::article::{Article, Source};
use crate::ingest::feed::parse_feed;
use crate::ingest::types::SourceProvider;

const SEARCH_FEED_BASE: &str = "https://news.google.com/rss/search";

/// Aggregator provider: a Google News search feed for the configured query.
pub struct GoogleNewsProvider {
    query: String,
    client: reqwest::Client,
}

impl GoogleNewsProvider {
    pub fn new(query: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            query: query.into(),
            client,
        }
    }

    pub fn feed_url(&self) -> Result<Url> {
        Url::parse_with_params(
            SEARCH_FEED_BASE,
            &[
                ("q", self.query.as_str()),
                ("hl", "ja"),
                ("gl", "JP"),
                ("ceid", "JP:ja"),
            ],
        )
        .context("building aggregator feed url")
    }

    pub fn parse_feed_xml(xml: &str) -> Result<Vec<Article>> {
        let entries = parse_feed(xml).context("parsing aggregator feed")?;
        Ok(entries
            .into_iter()
            .map(|e| Article {
                url: e.link,
                title: e.title,
                description: e.description,
                source: Source::NewsAggregator,
                published_at: e.published_at,
                published_raw: e.published_raw,
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for GoogleNewsProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let url = self.feed_url()?;
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context("aggregator feed fetch")?
            .error_for_status()
            .context("aggregator feed status")?
            .text()
            .await
            .context("reading aggregator feed body")?;
        Self::parse_feed_xml(&body)
    }

    fn source(&self) -> Source {
        Source::NewsAggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_encodes_the_query() {
        let p = GoogleNewsProvider::new("医療 IT", reqwest::Client::new());
        let url = p.feed_url().unwrap();
        assert_eq!(url.host_str(), Some("news.google.com"));
        assert!(url.query().unwrap().contains("hl=ja"));
        // the space must be encoded, not passed through
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn rss2_search_results_parse_as_aggregator_articles() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>医療 IT - Google ニュース</title>
    <item>
      <title>病院システムのクラウド移行が加速</title>
      <link>https://news.google.com/articles/abc123</link>
      <pubDate>Mon, 04 Aug 2025 08:00:00 GMT</pubDate>
      <description>各地の病院でクラウド化が進む</description>
    </item>
  </channel>
</rss>"#;
        let articles = GoogleNewsProvider::parse_feed_xml(xml).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, Source::NewsAggregator);
        assert_eq!(articles[0].title, "病院システムのクラウド移行が加速");
    }
}
