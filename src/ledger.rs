//! Durable set of previously delivered identities.
//!
//! Backed by a human-inspectable JSON object (`identity key → RFC 3339
//! recorded-at`) at a configured path. Entries are appended, never mutated
//! or expired; the store grows monotonically so nothing is ever re-sent.
//! Writes go to a sibling temp file and are renamed into place, so an
//! interrupted run never leaves a half-written store behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::article::Identity;

/// Title identities share the store with URL identities under this prefix.
const TITLE_KEY_PREFIX: &str = "title:";

#[derive(Debug)]
pub struct DeliveryLedger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DeliveryLedger {
    /// Load the store at `path`. An absent file is a first run and yields an
    /// empty ledger; a present but unreadable or malformed file is an error
    /// the caller must treat as fatal.
    pub fn load(path: &Path) -> Result<DeliveryLedger> {
        if !path.exists() {
            debug!(path = %path.display(), "ledger store absent, starting empty");
            return Ok(DeliveryLedger {
                path: path.to_path_buf(),
                entries: BTreeMap::new(),
            });
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ledger store at {}", path.display()))?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("parsing ledger store at {}", path.display()))?;
        info!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Ok(DeliveryLedger {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// True if this identity was delivered before, by URL key or title key.
    pub fn contains(&self, identity: &Identity) -> bool {
        if self.entries.contains_key(&identity.url_key) {
            return true;
        }
        identity
            .title_key
            .as_deref()
            .is_some_and(|t| self.entries.contains_key(&format!("{TITLE_KEY_PREFIX}{t}")))
    }

    /// Append an identity in memory. Existing entries are never overwritten.
    pub fn record(&mut self, identity: &Identity, at: DateTime<Utc>) {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.entries
            .entry(identity.url_key.clone())
            .or_insert_with(|| stamp.clone());
        if let Some(title) = identity.title_key.as_deref() {
            self.entries
                .entry(format!("{TITLE_KEY_PREFIX}{title}"))
                .or_insert(stamp);
        }
    }

    /// Write the store durably: serialize to a sibling temp file, then
    /// rename over the target. Creates the parent directory on demand.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating ledger directory {}", parent.display())
                })?;
            }
        }
        let tmp = self.temp_path()?;
        let json = serde_json::to_string_pretty(&self.entries)
            .context("serializing ledger entries")?;
        fs::write(&tmp, json)
            .with_context(|| format!("writing ledger temp file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("replacing ledger store at {}", self.path.display())
        })?;
        info!(path = %self.path.display(), entries = self.entries.len(), "ledger persisted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("ledger path has no file name: {}", self.path.display()))?;
        let mut tmp_name = name.to_os_string();
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(url: &str, title: &str) -> Identity {
        Identity::derive(url, title)
    }

    #[test]
    fn absent_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DeliveryLedger::load(&dir.path().join("delivered.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delivered.json");

        let mut ledger = DeliveryLedger::load(&path).unwrap();
        let id = identity("https://prtimes.jp/a?utm_source=rss", "医療AI新サービス");
        ledger.record(&id, Utc::now());
        ledger.persist().unwrap();

        let reloaded = DeliveryLedger::load(&path).unwrap();
        assert!(reloaded.contains(&id));
        // the normalized URL alone is enough
        assert!(reloaded.contains(&identity("https://prtimes.jp/a", "別のタイトル")));
    }

    #[test]
    fn title_key_matches_syndicated_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delivered.json");

        let mut ledger = DeliveryLedger::load(&path).unwrap();
        ledger.record(&identity("https://prtimes.jp/a", "医療AI新サービス"), Utc::now());

        let syndicated = identity("https://news.google.com/articles/xyz", "医療AI 新サービス");
        assert!(ledger.contains(&syndicated));
    }

    #[test]
    fn corrupt_store_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delivered.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(DeliveryLedger::load(&path).is_err());

        // wrong shape counts as corrupt too
        fs::write(&path, "[\"https://a.example\"]").unwrap();
        assert!(DeliveryLedger::load(&path).is_err());
    }

    #[test]
    fn persist_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("delivered.json");

        let mut ledger = DeliveryLedger::load(&path).unwrap();
        ledger.record(&identity("https://prtimes.jp/a", "t"), Utc::now());
        ledger.persist().unwrap();

        assert!(path.exists());
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("delivered.json")]);
    }

    #[test]
    fn existing_entries_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delivered.json");

        let mut ledger = DeliveryLedger::load(&path).unwrap();
        let id = identity("https://prtimes.jp/a", "t");
        let first = Utc::now();
        ledger.record(&id, first);
        ledger.record(&id, first + chrono::Duration::hours(1));
        ledger.persist().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(
            map.get("https://prtimes.jp/a").unwrap(),
            &first.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
}
