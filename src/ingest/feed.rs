// src/ingest/feed.rs
//! Generic feed parsing for the RSS-backed providers.
//!
//! Handles the three formats the configured feeds actually publish:
//! RSS 2.0 (`rss/channel/item`), RSS 1.0/RDF (`rdf:RDF` with `item`
//! siblings and `dc:date`), and Atom (`feed/entry` with `link@href`).

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::{normalize_text, parse_published};

/// One feed entry, normalized but not yet bound to a `Source`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_raw: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Rss2 {
    channel: Rss2Channel,
}

#[derive(Debug, Deserialize)]
struct Rss2Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// RSS 1.0 puts `item`s directly under the `rdf:RDF` root.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date")]
    dc_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// Parse a feed document into entries, trying the known formats in order.
/// Entries without a link are dropped; titles and descriptions come out
/// normalized.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let clean = scrub_html_entities_for_xml(xml);

    if let Ok(rss) = from_str::<Rss2>(&clean) {
        if !rss.channel.items.is_empty() {
            return Ok(rss.channel.items.into_iter().filter_map(rss_item_to_entry).collect());
        }
    }
    if let Ok(rdf) = from_str::<Rdf>(&clean) {
        if !rdf.items.is_empty() {
            return Ok(rdf.items.into_iter().filter_map(rss_item_to_entry).collect());
        }
    }
    if let Ok(atom) = from_str::<AtomFeed>(&clean) {
        if !atom.entries.is_empty() {
            return Ok(atom.entries.into_iter().filter_map(atom_entry_to_entry).collect());
        }
    }
    Err(anyhow!("unrecognized or empty feed document"))
}

fn rss_item_to_entry(item: RssItem) -> Option<FeedEntry> {
    let link = item.link.as_deref().unwrap_or_default().trim().to_string();
    if link.is_empty() {
        return None;
    }
    let published_raw = item
        .pub_date
        .or(item.dc_date)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let published_at = published_raw.as_deref().and_then(parse_published);
    Some(FeedEntry {
        title: normalize_text(item.title.as_deref().unwrap_or_default()),
        link,
        description: normalize_text(item.description.as_deref().unwrap_or_default()),
        published_raw,
        published_at,
    })
}

fn atom_entry_to_entry(entry: AtomEntry) -> Option<FeedEntry> {
    let link = entry
        .links
        .iter()
        .find_map(|l| l.href.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string();
    if link.is_empty() {
        return None;
    }
    let published_raw = entry
        .published
        .or(entry.updated)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let published_at = published_raw.as_deref().and_then(parse_published);
    Some(FeedEntry {
        title: normalize_text(entry.title.as_deref().unwrap_or_default()),
        link,
        description: normalize_text(entry.summary.as_deref().unwrap_or_default()),
        published_raw,
        published_at,
    })
}

/// Named HTML entities inside element text break strict XML parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
