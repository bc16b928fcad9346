//! Runtime configuration: keyword policy, source roster, selection limits,
//! and ledger location.
//!
//! Resolution order: built-in defaults → TOML file (`config/notifier.toml`,
//! or `$NOTIFIER_CONFIG_PATH`) → environment overrides. A missing file means
//! defaults; an unreadable or malformed file is an error, never silently
//! ignored.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::article::Source;

pub const DEFAULT_CONFIG_PATH: &str = "config/notifier.toml";

pub const ENV_CONFIG_PATH: &str = "NOTIFIER_CONFIG_PATH";
pub const ENV_SLACK_WEBHOOK: &str = "SLACK_WEBHOOK_URL";
pub const ENV_PRTIMES_FEEDS: &str = "PRTIMES_RSS_URLS";
pub const ENV_LEDGER_PATH: &str = "LEDGER_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub keywords: KeywordPolicy,
    pub selection: SelectionPolicy,
    pub sources: SourcesConfig,
    pub ledger: LedgerConfig,
    pub fetch: FetchConfig,
    /// Delivery webhook; env-only, never stored in the config file.
    #[serde(skip)]
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordPolicy {
    /// Category A: at least one must match for inclusion.
    pub medical: Vec<String>,
    /// Category B: at least one must match for inclusion.
    pub technology: Vec<String>,
    /// Any match vetoes the record, regardless of inclusion hits.
    pub exclude: Vec<String>,
    /// Host substrings that veto the record before keyword checks.
    pub exclude_domains: Vec<String>,
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        let v = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            medical: v(&[
                "医療",
                "ヘルスケア",
                "診療",
                "病院",
                "歯科",
                "看護",
                "クリニック",
                "製薬",
            ]),
            technology: v(&[
                "AI",
                "IT",
                "DX",
                "デジタル",
                "電子カルテ",
                "システム",
                "SaaS",
                "クラウド",
                "アプリ",
            ]),
            exclude: v(&["美容整形", "ダイエットサプリ", "エステ"]),
            exclude_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Scheduled-run lookback in hours. Manual and dry runs are unrestricted.
    pub lookback_hours: i64,
    /// Whether records without a resolvable published time pass the window.
    pub include_undated: bool,
    pub max_items: usize,
    pub manual_max_items: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            lookback_hours: 6,
            include_undated: true,
            max_items: 20,
            manual_max_items: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Dedup priority order, highest first. Source ids; unknown ids are a
    /// configuration error. Sources not listed keep their default rank after
    /// the listed ones.
    pub priority: Vec<String>,
    /// Grouping order in the outgoing digest. Same id rules as `priority`.
    pub display: Vec<String>,
    /// Sources skipped on manual runs.
    pub manual_exclude: Vec<String>,
    /// Press-release feed URLs.
    pub prtimes_feeds: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            display: Vec::new(),
            manual_exclude: vec!["news_aggregator".to_string()],
            prtimes_feeds: vec!["https://prtimes.jp/index.rdf".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/delivered.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Settings {
    /// Load using `$NOTIFIER_CONFIG_PATH` or the default path, then apply
    /// environment overrides.
    pub fn load() -> Result<Settings> {
        Settings::load_with_path(None)
    }

    /// Same as `load`, with an explicit path taking precedence (CLI flag).
    pub fn load_with_path(explicit: Option<&std::path::Path>) -> Result<Settings> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var(ENV_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let mut settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            Settings::from_toml_str(&content)
                .with_context(|| format!("parsing config at {}", path.display()))?
        } else if explicit.is_some() {
            return Err(anyhow!("config file not found: {}", path.display()));
        } else {
            Settings::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn from_toml_str(s: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(s)?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_SLACK_WEBHOOK) {
            if !url.trim().is_empty() {
                self.slack_webhook_url = Some(url.trim().to_string());
            }
        }
        if let Ok(feeds) = std::env::var(ENV_PRTIMES_FEEDS) {
            let urls: Vec<String> = feeds
                .split(',')
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if !urls.is_empty() {
                self.sources.prtimes_feeds = urls;
            }
        }
        if let Ok(p) = std::env::var(ENV_LEDGER_PATH) {
            if !p.trim().is_empty() {
                self.ledger.path = PathBuf::from(p.trim());
            }
        }
    }

    /// Resolve the configured priority/display id lists into rank tables.
    pub fn source_ranks(&self) -> Result<SourceRanks> {
        SourceRanks::resolve(&self.sources.priority, &self.sources.display)
    }

    pub fn manual_excluded_sources(&self) -> Result<Vec<Source>> {
        self.sources
            .manual_exclude
            .iter()
            .map(|id| {
                Source::from_id(id).ok_or_else(|| anyhow!("unknown source id in manual_exclude: {id}"))
            })
            .collect()
    }
}

/// Fixed total order among sources: dedup rank (lower wins collisions) and
/// digest display order. Derived once from configuration.
#[derive(Debug, Clone)]
pub struct SourceRanks {
    ranks: HashMap<Source, usize>,
    display: Vec<Source>,
}

impl SourceRanks {
    fn resolve(priority_ids: &[String], display_ids: &[String]) -> Result<SourceRanks> {
        let priority = Self::order_from_ids(priority_ids, "priority")?;
        let display = Self::order_from_ids(display_ids, "display")?;
        let ranks = priority
            .into_iter()
            .enumerate()
            .map(|(i, s)| (s, i))
            .collect();
        Ok(SourceRanks { ranks, display })
    }

    /// Listed sources first in list order, then the rest in default order.
    fn order_from_ids(ids: &[String], field: &str) -> Result<Vec<Source>> {
        let mut order = Vec::with_capacity(Source::ALL.len());
        for id in ids {
            let source = Source::from_id(id)
                .ok_or_else(|| anyhow!("unknown source id in sources.{field}: {id}"))?;
            if !order.contains(&source) {
                order.push(source);
            }
        }
        let mut rest: Vec<Source> = Source::ALL
            .iter()
            .copied()
            .filter(|s| !order.contains(s))
            .collect();
        rest.sort_by_key(|s| s.default_rank());
        order.extend(rest);
        Ok(order)
    }

    pub fn rank(&self, source: Source) -> usize {
        self.ranks.get(&source).copied().unwrap_or(usize::MAX)
    }

    pub fn display_order(&self) -> &[Source] {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builtin_policy() {
        let s = Settings::default();
        assert!(s.keywords.medical.iter().any(|k| k == "医療"));
        assert!(s.keywords.technology.iter().any(|k| k == "クラウド"));
        assert_eq!(s.selection.lookback_hours, 6);
        assert_eq!(s.selection.max_items, 20);
        assert_eq!(s.selection.manual_max_items, 5);
        assert!(s.selection.include_undated);
        assert_eq!(s.ledger.path, PathBuf::from("data/delivered.json"));
    }

    #[test]
    fn toml_overrides_defaults() {
        let s = Settings::from_toml_str(
            r#"
[keywords]
medical = ["医療"]
technology = ["AI"]
exclude = []
exclude_domains = ["spam.example"]

[selection]
lookback_hours = 12
max_items = 3

[ledger]
path = "tmp/sent.json"
"#,
        )
        .unwrap();
        assert_eq!(s.keywords.medical, vec!["医療"]);
        assert_eq!(s.keywords.exclude_domains, vec!["spam.example"]);
        assert_eq!(s.selection.lookback_hours, 12);
        assert_eq!(s.selection.max_items, 3);
        // untouched sections keep defaults
        assert_eq!(s.selection.manual_max_items, 5);
        assert_eq!(s.ledger.path, PathBuf::from("tmp/sent.json"));
    }

    #[test]
    fn source_ranks_follow_configured_order() {
        let s = Settings::from_toml_str(
            r#"
[sources]
priority = ["medicaltech_news", "press_release"]
display = ["news_aggregator"]
"#,
        )
        .unwrap();
        let ranks = s.source_ranks().unwrap();
        assert!(ranks.rank(Source::MedicalTechNews) < ranks.rank(Source::PressRelease));
        // unlisted sources follow in default order
        assert!(ranks.rank(Source::PressRelease) < ranks.rank(Source::HealthTechWatch));
        assert_eq!(ranks.display_order()[0], Source::NewsAggregator);
        assert_eq!(ranks.display_order().len(), Source::ALL.len());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_beat_file_values() {
        std::env::set_var(ENV_SLACK_WEBHOOK, "https://hooks.slack.com/services/T/B/X");
        std::env::set_var(ENV_PRTIMES_FEEDS, "https://a.example/f.rdf, https://b.example/f.rdf");
        std::env::set_var(ENV_LEDGER_PATH, "tmp/other.json");

        let mut s = Settings::default();
        s.apply_env_overrides();
        assert_eq!(
            s.slack_webhook_url.as_deref(),
            Some("https://hooks.slack.com/services/T/B/X")
        );
        assert_eq!(
            s.sources.prtimes_feeds,
            vec!["https://a.example/f.rdf", "https://b.example/f.rdf"]
        );
        assert_eq!(s.ledger.path, PathBuf::from("tmp/other.json"));

        std::env::remove_var(ENV_SLACK_WEBHOOK);
        std::env::remove_var(ENV_PRTIMES_FEEDS);
        std::env::remove_var(ENV_LEDGER_PATH);
    }

    #[test]
    fn unknown_source_id_is_an_error() {
        let s = Settings::from_toml_str(
            r#"
[sources]
priority = ["nosuch_source"]
"#,
        )
        .unwrap();
        assert!(s.source_ranks().is_err());
    }
}
