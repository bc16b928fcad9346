// src/ingest/mod.rs
pub mod feed;
pub mod providers;
pub mod types;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};
use tracing::{info, warn};

use crate::article::{Article, Source};
use crate::ingest::types::SourceProvider;

/// Normalize feed/scrape text: decode HTML entities, strip tags, collapse
/// whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Publication dates in the wild: RFC 2822 (RSS pubDate), RFC 3339 (Atom,
/// dc:date, `<time datetime>`), or a bare local datetime, which scraped
/// Japanese sites publish in JST.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        return DateTime::from_timestamp(unix, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return jst()
            .from_local_datetime(&naive)
            .single()
            .map(|d| d.with_timezone(&Utc));
    }
    None
}

pub(crate) fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("JST offset")
}

/// COLLECT: run every provider once, sequentially. A failing source
/// contributes an empty batch; it never aborts the run.
pub async fn collect_batches(providers: &[Box<dyn SourceProvider>]) -> Vec<(Source, Vec<Article>)> {
    let mut batches = Vec::with_capacity(providers.len());
    for provider in providers {
        let source = provider.source();
        match provider.fetch_latest().await {
            Ok(articles) => {
                info!(source = source.id(), count = articles.len(), "fetched batch");
                batches.push((source, articles));
            }
            Err(e) => {
                warn!(error = ?e, source = source.id(), "source fetch failed, contributing empty batch");
                batches.push((source, Vec::new()));
            }
        }
    }
    batches
}
