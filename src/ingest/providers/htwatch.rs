// src/ingest/providers/htwatch.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::article::{Article, Source};
use crate::extract;
use crate::ingest::{normalize_text, parse_published};
use crate::ingest::types::SourceProvider;

const DEFAULT_URL: &str = "https://ht-watch.com/";

/// Each story on the watch-site top page is an `<article>` whose first
/// anchor wraps the card and whose `<h2>` holds the title.
static RE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<article[^>]*>\s*<a[^>]*href="([^"]+)"[^>]*>.*?<h2[^>]*>(.*?)</h2>"#)
        .expect("item regex")
});
static RE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<p[^>]*class="[^"]*date[^"]*"[^>]*>(.*?)</p>|<time[^>]*datetime="([^"]+)""#)
        .expect("date regex")
});
/// Looser fallback: any anchor-then-h2 inside an article block.
static RE_ITEM_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<article[^>]*>.*?<a[^>]*href="([^"]+)"[^>]*>.*?<h2[^>]*>(.*?)</h2>"#)
        .expect("item fallback regex")
});

const DATE_LOOKAHEAD_BYTES: usize = 400;
const MIN_FALLBACK_TITLE_CHARS: usize = 5;

/// Watch-site top-page scraper.
pub struct HtWatchProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl HtWatchProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_URL).expect("default base url"),
            client,
        }
    }

    pub fn parse_top_page(html: &str, base: &Url) -> Vec<Article> {
        let mut articles = collect(html, base, &RE_ITEM, 1);
        if articles.is_empty() {
            articles = collect(html, base, &RE_ITEM_FALLBACK, MIN_FALLBACK_TITLE_CHARS);
        }
        articles
    }
}

#[async_trait]
impl SourceProvider for HtWatchProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let html = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .context("watch-site page fetch")?
            .error_for_status()
            .context("watch-site page status")?
            .text()
            .await
            .context("reading watch-site page body")?;

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
        Source::HealthTechWatch
    }
}

fn collect(html: &str, base: &Url, pattern: &Regex, min_title_chars: usize) -> Vec<Article> {
    let mut articles = Vec::new();
    for m in pattern.captures_iter(html) {
        let link = m.get(1).map_or("", |g| g.as_str()).trim();
        let title = normalize_text(m.get(2).map_or("", |g| g.as_str()));
        if link.is_empty() || title.chars().count() < min_title_chars {
            continue;
        }
        let url = if link.starts_with("http") {
            link.to_string()
        } else {
            match base.join(link) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        };
        let published_raw = date_near(html, m.get(0).map_or(0, |g| g.end()));
        let published_at = published_raw.as_deref().and_then(parse_published);
        articles.push(Article {
            url,
            title,
            description: String::new(),
            source: Source::HealthTechWatch,
            published_at,
            published_raw,
        });
    }
    articles
}

/// Date marker (a `date`-classed paragraph or `<time datetime>`) within a
/// bounded window after the title match.
fn date_near(html: &str, from: usize) -> Option<String> {
    let mut end = (from + DATE_LOOKAHEAD_BYTES).min(html.len());
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    let caps = RE_DATE.captures(&html[from..end])?;
    let raw = caps
        .get(2)
        .or_else(|| caps.get(1))
        .map(|g| g.as_str())?;
    let cleaned = normalize_text(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP_PAGE: &str = r#"<html><body>
<article class="card">
  <a href="/news/2025/0804"><img src="/img/1.jpg">
    <h2>遠隔診療プラットフォームが資金調達</h2>
    <p class="entry-date">2025-08-04T08:30:00+09:00</p>
  </a>
</article>
<article class="card">
  <a href="https://ht-watch.com/news/2025/0803">
    <h2>介護記録システムの新機能</h2>
  </a>
</article>
</body></html>"#;

    fn base() -> Url {
        Url::parse(DEFAULT_URL).unwrap()
    }

    #[test]
    fn parses_article_cards() {
        let articles = HtWatchProvider::parse_top_page(TOP_PAGE, &base());
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://ht-watch.com/news/2025/0804");
        assert_eq!(articles[0].title, "遠隔診療プラットフォームが資金調達");
        assert_eq!(articles[1].title, "介護記録システムの新機能");
        assert!(articles[1].published_at.is_none());
    }

    #[test]
    fn date_paragraph_is_picked_up_when_parseable() {
        let articles = HtWatchProvider::parse_top_page(TOP_PAGE, &base());
        assert_eq!(
            articles[0].published_at.unwrap().to_rfc3339(),
            "2025-08-03T23:30:00+00:00"
        );
    }

    #[test]
    fn unparseable_dates_stay_raw() {
        let html = r#"<article><a href="/n/1"><h2>在宅医療のテック活用</h2><p class="date">2025.08.04</p></a></article>"#;
        let articles = HtWatchProvider::parse_top_page(html, &base());
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].published_raw.as_deref(), Some("2025.08.04"));
        assert!(articles[0].published_at.is_none());
    }

    #[test]
    fn empty_page_yields_no_articles() {
        assert!(HtWatchProvider::parse_top_page("<html></html>", &base()).is_empty());
    }
}
