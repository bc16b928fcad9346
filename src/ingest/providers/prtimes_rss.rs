// src/ingest/providers/prtimes_rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::article::{Article, Source};
use crate::ingest::feed::parse_feed;
use crate::ingest::types::SourceProvider;

/// Press-release feed provider. Several feed URLs may be configured; a
/// failing feed is logged and skipped so the others still contribute.
pub struct PrTimesRssProvider {
    feeds: Vec<String>,
    client: reqwest::Client,
}

impl PrTimesRssProvider {
    pub fn new(feeds: Vec<String>, client: reqwest::Client) -> Self {
        Self { feeds, client }
    }

    pub fn parse_feed_xml(xml: &str) -> Result<Vec<Article>> {
        let entries = parse_feed(xml).context("parsing press-release feed")?;
        Ok(entries
            .into_iter()
            .map(|e| Article {
                url: e.link,
                title: e.title,
                description: e.description,
                source: Source::PressRelease,
                published_at: e.published_at,
                published_raw: e.published_raw,
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for PrTimesRssProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let mut out = Vec::new();
        for feed_url in &self.feeds {
            let body = match self.client.get(feed_url).send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => resp.text().await.context("reading press-release feed body")?,
                    Err(e) => {
                        warn!(error = ?e, feed = feed_url, "press-release feed returned an error status");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(error = ?e, feed = feed_url, "press-release feed fetch failed");
                    continue;
                }
            };
            match Self::parse_feed_xml(&body) {
                Ok(mut articles) => out.append(&mut articles),
                Err(e) => warn!(error = ?e, feed = feed_url, "press-release feed parse failed"),
            }
        }
        Ok(out)
    }

    fn source(&self) -> Source {
        Source::PressRelease
    }
}
