pub mod slack;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::article::{Article, Source};
use crate::ingest::jst;

/// Delivery channel for one rendered digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Prints the digest to stdout instead of delivering it. Used by dry runs.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

const MAX_DESCRIPTION_CHARS: usize = 120;

/// Render the grouped selection as one message. An empty selection becomes
/// an explicit notice so operators can see the run executed.
pub fn build_message(groups: &[(Source, Vec<Article>)], now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&jst());
    if groups.iter().all(|(_, articles)| articles.is_empty()) {
        return "🩺🤖 本時間帯の医療×IT 新着はありませんでした。".to_string();
    }

    let mut lines = vec![
        format!(
            "🩺🤖 医療×ITニュースまとめ（{} JST）",
            local.format("%Y-%m-%d %H:%M")
        ),
        String::new(),
    ];
    for (source, articles) in groups {
        if articles.is_empty() {
            continue;
        }
        lines.push(format!("▼ {}", source.label()));
        for article in articles {
            lines.push(format!("・{}", article.title));
            lines.push(format!("  {}", article.url));
            if let Some(published) = article.published_raw.as_deref() {
                lines.push(format!("  公開: {published}"));
            }
            if !article.description.is_empty() {
                lines.push(format!(
                    "  {}",
                    truncate_chars(&article.description, MAX_DESCRIPTION_CHARS)
                ));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
