//! Orchestrator for one run:
//! COLLECT → CLASSIFY → MERGE → WINDOW-FILTER → LEDGER-FILTER → CAP/GROUP
//! → DELIVER → COMMIT.
//!
//! `select` is the pure selection core over already-collected batches;
//! `run_once` wraps it with collection, delivery, and the ledger commit.
//! The commit happens only after delivery reports success, and only for the
//! identities actually delivered — records dropped by the cap stay eligible
//! for the next run.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::article::{Article, Identity, Source};
use crate::config::SourceRanks;
use crate::dedupe::dedupe_articles;
use crate::error::PipelineError;
use crate::filter::KeywordFilter;
use crate::ingest::{collect_batches, types::SourceProvider};
use crate::ledger::DeliveryLedger;
use crate::notify::{build_message, Notifier};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Manual mode: selection proceeds without consulting the ledger.
    /// Delivered identities are still recorded afterwards.
    pub skip_ledger_check: bool,
    /// False on dry runs: nothing is recorded or persisted.
    pub commit: bool,
    /// Total cap across all groups.
    pub max_items: usize,
    /// `None` means an unrestricted window.
    pub lookback: Option<Duration>,
    /// Whether records without a resolvable published time pass the window.
    pub include_undated: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_ledger_check: false,
            commit: true,
            max_items: 20,
            lookback: Some(Duration::hours(6)),
            include_undated: true,
        }
    }
}

/// Per-stage counts for the run log, so silent drops are diagnosable
/// without reading code.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub classified: usize,
    pub merged: usize,
    pub in_window: usize,
    pub already_sent: usize,
    pub selected: usize,
    pub delivered: usize,
}

/// The capped, grouped selection plus exactly the identities to commit if
/// delivery succeeds.
#[derive(Debug)]
pub struct Selection {
    pub groups: Vec<(Source, Vec<Article>)>,
    pub identities: Vec<Identity>,
    pub classified: usize,
    pub merged: usize,
    pub in_window: usize,
    pub already_sent: usize,
}

impl Selection {
    pub fn selected(&self) -> usize {
        self.groups.iter().map(|(_, g)| g.len()).sum()
    }
}

pub fn select(
    batches: Vec<(Source, Vec<Article>)>,
    filter: &KeywordFilter,
    ranks: &SourceRanks,
    ledger: &DeliveryLedger,
    now: DateTime<Utc>,
    opts: &RunOptions,
) -> Selection {
    // CLASSIFY, per source batch
    let mut included: Vec<Article> = Vec::new();
    for (_, batch) in batches {
        included.extend(filter.filter_articles(batch));
    }
    let classified = included.len();

    // MERGE across sources
    let merged = dedupe_articles(included, ranks);
    let merged_count = merged.len();

    // WINDOW-FILTER
    let in_window: Vec<Article> = merged
        .into_iter()
        .filter(|a| within_window(a, now, opts))
        .collect();
    let in_window_count = in_window.len();

    // LEDGER-FILTER
    let mut already_sent = 0usize;
    let fresh: Vec<Article> = if opts.skip_ledger_check {
        in_window
    } else {
        in_window
            .into_iter()
            .filter(|a| {
                let seen = ledger.contains(&a.identity());
                already_sent += seen as usize;
                !seen
            })
            .collect()
    };

    // CAP/GROUP: group by display order, newest first within a group
    // (undated last), then truncate the total count.
    let mut groups: Vec<(Source, Vec<Article>)> = ranks
        .display_order()
        .iter()
        .map(|s| (*s, Vec::new()))
        .collect();
    for article in fresh {
        match groups.iter_mut().find(|(s, _)| *s == article.source) {
            Some((_, g)) => g.push(article),
            None => groups.push((article.source, vec![article])),
        }
    }
    for (_, g) in &mut groups {
        g.sort_by_key(|a| Reverse(a.published_at));
    }
    let mut remaining = opts.max_items;
    for (_, g) in &mut groups {
        if g.len() > remaining {
            g.truncate(remaining);
        }
        remaining -= g.len();
    }
    groups.retain(|(_, g)| !g.is_empty());

    let identities = groups
        .iter()
        .flat_map(|(_, g)| g.iter().map(Article::identity))
        .collect();

    Selection {
        groups,
        identities,
        classified,
        merged: merged_count,
        in_window: in_window_count,
        already_sent,
    }
}

fn within_window(article: &Article, now: DateTime<Utc>, opts: &RunOptions) -> bool {
    match article.published_at {
        None => opts.include_undated,
        Some(ts) => match opts.lookback {
            None => true,
            Some(window) => now.signed_duration_since(ts) <= window,
        },
    }
}

/// One full run against live collaborators. Delivery failure returns an
/// error without touching the ledger; a ledger persist failure after
/// successful delivery is its own, louder error.
pub async fn run_once(
    providers: &[Box<dyn SourceProvider>],
    filter: &KeywordFilter,
    ranks: &SourceRanks,
    ledger: &mut DeliveryLedger,
    notifier: &dyn Notifier,
    opts: &RunOptions,
) -> Result<RunSummary, PipelineError> {
    let batches = collect_batches(providers).await;
    let fetched: usize = batches.iter().map(|(_, b)| b.len()).sum();

    // Pre-exclusion keyword diagnostics over the raw batches.
    let (mut med, mut tech, mut both) = (0usize, 0usize, 0usize);
    for (_, batch) in &batches {
        let (m, t, b) = filter.keyword_hit_stats(batch);
        med += m;
        tech += t;
        both += b;
    }
    info!(med, tech, both, "keyword hits before exclusion");

    let now = Utc::now();
    let selection = select(batches, filter, ranks, ledger, now, opts);
    let selected = selection.selected();
    info!(
        fetched,
        classified = selection.classified,
        merged = selection.merged,
        in_window = selection.in_window,
        already_sent = selection.already_sent,
        selected,
        "selection complete"
    );

    let message = build_message(&selection.groups, now);
    notifier
        .send(&message)
        .await
        .map_err(|e| PipelineError::Delivery { source: e })?;
    info!(delivered = selected, "digest delivered");

    if opts.commit && !selection.identities.is_empty() {
        for identity in &selection.identities {
            ledger.record(identity, now);
        }
        ledger
            .persist()
            .map_err(|e| PipelineError::LedgerPersist { source: e })?;
    }

    Ok(RunSummary {
        fetched,
        classified: selection.classified,
        merged: selection.merged,
        in_window: selection.in_window,
        already_sent: selection.already_sent,
        selected,
        delivered: selected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use chrono::TimeZone;

    fn fixtures() -> (KeywordFilter, SourceRanks) {
        let settings = Settings::default();
        (
            KeywordFilter::new(&settings.keywords),
            settings.source_ranks().unwrap(),
        )
    }

    fn empty_ledger() -> DeliveryLedger {
        let dir = tempfile::tempdir().unwrap();
        // the handle outlives the tempdir; fine for read-only selection tests
        DeliveryLedger::load(&dir.path().join("delivered.json")).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 4, 12, 0, 0).unwrap()
    }

    fn article(url: &str, title: &str, source: Source, age_hours: i64) -> Article {
        Article {
            url: url.to_string(),
            title: title.to_string(),
            description: "クラウドで医療DXを支援".to_string(),
            source,
            published_at: Some(now() - Duration::hours(age_hours)),
            published_raw: None,
        }
    }

    #[test]
    fn window_filter_drops_stale_and_keeps_undated() {
        let (filter, ranks) = fixtures();
        let ledger = empty_ledger();

        let mut undated = article("https://prtimes.jp/c", "病院DXアプリ登場", Source::PressRelease, 0);
        undated.published_at = None;
        let batches = vec![(
            Source::PressRelease,
            vec![
                article("https://prtimes.jp/a", "医療AI新サービス", Source::PressRelease, 1),
                article("https://prtimes.jp/b", "製薬システム刷新", Source::PressRelease, 10),
                undated,
            ],
        )];

        let opts = RunOptions::default();
        let sel = select(batches, &filter, &ranks, &ledger, now(), &opts);
        assert_eq!(sel.in_window, 2);
        let urls: Vec<&str> = sel.groups[0].1.iter().map(|a| a.url.as_str()).collect();
        assert!(urls.contains(&"https://prtimes.jp/a"));
        assert!(urls.contains(&"https://prtimes.jp/c"));
    }

    #[test]
    fn undated_can_be_excluded_by_policy() {
        let (filter, ranks) = fixtures();
        let ledger = empty_ledger();

        let mut undated = article("https://prtimes.jp/c", "病院DXアプリ登場", Source::PressRelease, 0);
        undated.published_at = None;
        let batches = vec![(Source::PressRelease, vec![undated])];

        let opts = RunOptions {
            include_undated: false,
            ..RunOptions::default()
        };
        let sel = select(batches, &filter, &ranks, &ledger, now(), &opts);
        assert_eq!(sel.in_window, 0);
        assert!(sel.groups.is_empty());
    }

    #[test]
    fn cap_truncates_total_across_groups_in_display_order() {
        let (filter, ranks) = fixtures();
        let ledger = empty_ledger();

        let pr: Vec<Article> = (0..3)
            .map(|i| {
                article(
                    &format!("https://prtimes.jp/{i}"),
                    &format!("医療AIサービス{i}"),
                    Source::PressRelease,
                    i,
                )
            })
            .collect();
        let hw: Vec<Article> = (0..3)
            .map(|i| {
                article(
                    &format!("https://ht-watch.com/{i}"),
                    &format!("診療クラウド記事{i}"),
                    Source::HealthTechWatch,
                    i,
                )
            })
            .collect();
        let batches = vec![
            (Source::HealthTechWatch, hw),
            (Source::PressRelease, pr),
        ];

        let opts = RunOptions {
            max_items: 4,
            ..RunOptions::default()
        };
        let sel = select(batches, &filter, &ranks, &ledger, now(), &opts);
        assert_eq!(sel.selected(), 4);
        // default display order puts the press-release group first, intact
        assert_eq!(sel.groups[0].0, Source::PressRelease);
        assert_eq!(sel.groups[0].1.len(), 3);
        assert_eq!(sel.groups[1].0, Source::HealthTechWatch);
        assert_eq!(sel.groups[1].1.len(), 1);
        // identities cover only the capped selection
        assert_eq!(sel.identities.len(), 4);
    }

    #[test]
    fn groups_sort_newest_first_with_undated_last() {
        let (filter, ranks) = fixtures();
        let ledger = empty_ledger();

        let mut undated = article("https://prtimes.jp/u", "医療ITコラム", Source::PressRelease, 0);
        undated.published_at = None;
        let batches = vec![(
            Source::PressRelease,
            vec![
                undated,
                article("https://prtimes.jp/old", "医療AI記事(旧)", Source::PressRelease, 5),
                article("https://prtimes.jp/new", "医療AI記事(新)", Source::PressRelease, 1),
            ],
        )];

        let sel = select(
            batches,
            &filter,
            &ranks,
            &ledger,
            now(),
            &RunOptions::default(),
        );
        let urls: Vec<&str> = sel.groups[0].1.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://prtimes.jp/new",
                "https://prtimes.jp/old",
                "https://prtimes.jp/u"
            ]
        );
    }

    #[test]
    fn ledger_filter_drops_already_sent_unless_skipped() {
        let (filter, ranks) = fixtures();
        let mut ledger = empty_ledger();
        let sent = article("https://prtimes.jp/a", "医療AI新サービス", Source::PressRelease, 1);
        ledger.record(&sent.identity(), now());

        let batches = vec![(Source::PressRelease, vec![sent.clone()])];
        let sel = select(
            batches.clone(),
            &filter,
            &ranks,
            &ledger,
            now(),
            &RunOptions::default(),
        );
        assert_eq!(sel.already_sent, 1);
        assert_eq!(sel.selected(), 0);

        let manual = RunOptions {
            skip_ledger_check: true,
            ..RunOptions::default()
        };
        let sel = select(batches, &filter, &ranks, &ledger, now(), &manual);
        assert_eq!(sel.already_sent, 0);
        assert_eq!(sel.selected(), 1);
    }
}
