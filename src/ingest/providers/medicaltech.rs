// src/ingest/providers/medicaltech.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::article::{Article, Source};
use crate::extract;
use crate::ingest::{normalize_text, parse_published};
use crate::ingest::types::SourceProvider;

const DEFAULT_URL: &str = "https://medicaltech-news.com/";

/// The top page lists the latest articles as `h3.item-ttl` anchors with a
/// `<time datetime>` shortly after each one.
static RE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h3[^>]*class="[^"]*item-ttl[^"]*"[^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("item regex")
});
static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<time[^>]*datetime="([^"]+)""#).expect("time regex"));
/// Looser fallback in case the markup changes.
static RE_HEADING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h[23][^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>(.*?)</a>\s*</h[23]>"#)
        .expect("heading fallback regex")
});

const DATE_LOOKAHEAD_BYTES: usize = 400;
const MIN_FALLBACK_TITLE_CHARS: usize = 5;

/// Tech-news top-page scraper.
pub struct MedicalTechProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl MedicalTechProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_URL).expect("default base url"),
            client,
        }
    }

    pub fn parse_top_page(html: &str, base: &Url) -> Vec<Article> {
        let mut articles = Vec::new();
        for m in RE_ITEM.captures_iter(html) {
            let link = m.get(1).map_or("", |g| g.as_str()).trim();
            let title = normalize_text(m.get(2).map_or("", |g| g.as_str()));
            if link.is_empty() || title.is_empty() {
                continue;
            }
            let Some(url) = resolve_link(base, link) else {
                continue;
            };
            let published_raw = date_near(html, m.get(0).map_or(0, |g| g.end()));
            let published_at = published_raw.as_deref().and_then(parse_published);
            articles.push(Article {
                url,
                title,
                description: String::new(),
                source: Source::MedicalTechNews,
                published_at,
                published_raw,
            });
        }

        if articles.is_empty() {
            for m in RE_HEADING_FALLBACK.captures_iter(html) {
                let link = m.get(1).map_or("", |g| g.as_str()).trim();
                let title = normalize_text(m.get(2).map_or("", |g| g.as_str()));
                if link.is_empty() || title.chars().count() < MIN_FALLBACK_TITLE_CHARS {
                    continue;
                }
                let Some(url) = resolve_link(base, link) else {
                    continue;
                };
                articles.push(Article {
                    url,
                    title,
                    description: String::new(),
                    source: Source::MedicalTechNews,
                    published_at: None,
                    published_raw: None,
                });
            }
        }
        articles
    }
}

#[async_trait]
impl SourceProvider for MedicalTechProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let html = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .context("tech-news page fetch")?
            .error_for_status()
            .context("tech-news page status")?
            .text()
            .await
            .context("reading tech-news page body")?;

        let mut articles = Self::parse_top_page(&html, &self.base_url);
        for article in &mut articles {
            if article.description.is_empty() {
                if let Some(desc) = extract::enrich_description(&self.client, &article.url).await {
                    article.description = desc;
                }
            }
        }
        Ok(articles)
    }

    fn source(&self) -> Source {
        Source::MedicalTechNews
    }
}

/// First `<time datetime>` within a bounded window after the heading match.
fn date_near(html: &str, from: usize) -> Option<String> {
    let mut end = (from + DATE_LOOKAHEAD_BYTES).min(html.len());
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    RE_TIME
        .captures(&html[from..end])
        .and_then(|c| c.get(1))
        .map(|g| g.as_str().to_string())
}

fn resolve_link(base: &Url, link: &str) -> Option<String> {
    if link.starts_with("http") {
        Some(link.to_string())
    } else {
        base.join(link).ok().map(|u| u.to_string())
    }
}
