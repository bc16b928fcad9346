//! Article model: origin sources, the candidate record, and the normalized
//! identity keys used for dedup and the delivery ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Origin of a candidate article. Closed set; the dedup rank below is the
/// default priority order and can be overridden in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    PressRelease,
    MedicalTechNews,
    HealthTechWatch,
    NewsAggregator,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::PressRelease,
        Source::MedicalTechNews,
        Source::HealthTechWatch,
        Source::NewsAggregator,
    ];

    /// Stable identifier used in configuration files.
    pub fn id(&self) -> &'static str {
        match self {
            Source::PressRelease => "press_release",
            Source::MedicalTechNews => "medicaltech_news",
            Source::HealthTechWatch => "healthtech_watch",
            Source::NewsAggregator => "news_aggregator",
        }
    }

    /// Heading shown in the outgoing digest.
    pub fn label(&self) -> &'static str {
        match self {
            Source::PressRelease => "PR TIMES",
            Source::MedicalTechNews => "医療テックニュース",
            Source::HealthTechWatch => "ヘルステックウォッチ",
            Source::NewsAggregator => "Google ニュース",
        }
    }

    /// Default dedup priority; lower wins a duplicate collision.
    pub fn default_rank(&self) -> usize {
        match self {
            Source::PressRelease => 0,
            Source::MedicalTechNews => 1,
            Source::HealthTechWatch => 2,
            Source::NewsAggregator => 3,
        }
    }

    pub fn from_id(id: &str) -> Option<Source> {
        Source::ALL.iter().copied().find(|s| s.id() == id)
    }
}

/// One candidate article as produced by a source provider.
///
/// `url` is the raw link as published; identity derivation normalizes it.
/// `published_at` may be absent for scraped sources without reliable dates;
/// `published_raw` keeps the original date string for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub description: String,
    pub source: Source,
    pub published_at: Option<DateTime<Utc>>,
    pub published_raw: Option<String>,
}

impl Article {
    pub fn identity(&self) -> Identity {
        Identity::derive(&self.url, &self.title)
    }

    /// Title and description concatenated for keyword matching.
    pub fn matchable_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Normalized keys that recognize "the same article" across sources and runs.
/// The URL key is primary; the title key only exists for non-empty titles so
/// that title-less records are never merged with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub url_key: String,
    pub title_key: Option<String>,
}

impl Identity {
    pub fn derive(url: &str, title: &str) -> Identity {
        let url_key = normalize_url(url).unwrap_or_else(|| url.trim().to_string());
        let title_norm = normalize_title(title);
        let title_key = if title_norm.is_empty() {
            None
        } else {
            Some(title_norm)
        };
        Identity { url_key, title_key }
    }
}

/// Query parameters that carry tracking noise rather than identity.
fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_")
        || matches!(name, "gclid" | "fbclid" | "yclid" | "mc_cid" | "mc_eid" | "ref")
}

/// Canonicalize a URL for use as an identity key: drop the fragment, strip
/// tracking query parameters, and trim a trailing slash. Returns `None` for
/// empty or unparseable input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut u = Url::parse(trimmed).ok()?;
    u.set_fragment(None);

    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        u.set_query(None);
    } else {
        u.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut s = u.to_string();
    if s.ends_with('/') {
        s.pop();
    }
    Some(s)
}

/// Case- and whitespace-insensitive form of a title. All whitespace is
/// removed, not collapsed: syndicated copies of Japanese headlines differ
/// mostly in spacing.
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace().collect::<String>().to_lowercase()
}
