//! Duplicate collapse across sources.
//!
//! Two passes: first by normalized URL, then by normalized title (to catch
//! the same story republished under a different URL). A collision keeps the
//! record from the highest-priority source; ties keep the first-seen record.
//! Output order is an explicit policy, not an accident of iteration: each
//! surviving logical article sits at the position of its first occurrence,
//! and the result is never re-sorted by priority.

use std::collections::HashMap;

use tracing::info;

use crate::article::{normalize_title, normalize_url, Article};
use crate::config::SourceRanks;

pub fn dedupe_articles(articles: Vec<Article>, ranks: &SourceRanks) -> Vec<Article> {
    let before = articles.len();

    let by_url = collapse_by(articles, ranks, |a| {
        Some(normalize_url(&a.url).unwrap_or_else(|| a.url.trim().to_string()))
    });
    // An empty normalized title is not a collapse key; title-less records
    // must never be merged with each other.
    let deduped = collapse_by(by_url, ranks, |a| {
        let t = normalize_title(&a.title);
        (!t.is_empty()).then_some(t)
    });

    info!(before, after = deduped.len(), "dedup applied");
    deduped
}

fn collapse_by<F>(articles: Vec<Article>, ranks: &SourceRanks, key_of: F) -> Vec<Article>
where
    F: Fn(&Article) -> Option<String>,
{
    let mut kept: Vec<Article> = Vec::with_capacity(articles.len());
    let mut slot_for_key: HashMap<String, usize> = HashMap::new();

    for article in articles {
        let Some(key) = key_of(&article) else {
            kept.push(article);
            continue;
        };
        match slot_for_key.get(&key) {
            None => {
                slot_for_key.insert(key, kept.len());
                kept.push(article);
            }
            Some(&slot) => {
                // Replace in place so the survivor keeps the position where
                // this logical article first appeared.
                if ranks.rank(article.source) < ranks.rank(kept[slot].source) {
                    kept[slot] = article;
                }
            }
        }
    }
    kept
}
