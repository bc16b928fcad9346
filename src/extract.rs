//! Content-extraction collaborator: pull a human-readable description out of
//! an article page. Best effort only — any failure leaves the description
//! empty and the record stays eligible for classification on its title.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::ingest::normalize_text;

static RE_META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("meta regex"));
static RE_META_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:name|property)\s*=\s*["'](og:description|description)["']"#)
        .expect("meta name regex")
});
static RE_META_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)content\s*=\s*["']([^"']+)["']"#).expect("meta content regex"));
static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article[^>]*>(.*?)</article>").expect("article regex"));
static RE_PARA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("paragraph regex"));

const MIN_META_CHARS: usize = 20;
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Fetch the page and extract a description. `None` on any failure.
pub async fn enrich_description(client: &reqwest::Client, url: &str) -> Option<String> {
    let html = match fetch_page(client, url).await {
        Ok(html) => html,
        Err(e) => {
            debug!(error = ?e, url, "description fetch failed");
            return None;
        }
    };
    extract_description(&html)
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> anyhow::Result<String> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.text().await?)
}

/// Extraction order: `<meta name="description">` / `og:description` if long
/// enough to be article-specific, otherwise the first sufficiently long
/// paragraph — preferring the `<article>` region over the whole page.
pub fn extract_description(html: &str) -> Option<String> {
    if let Some(meta) = meta_description(html) {
        if meta.chars().count() > MIN_META_CHARS {
            return Some(meta);
        }
    }

    for region in RE_ARTICLE.captures_iter(html) {
        if let Some(p) = first_long_paragraph(region.get(1).map_or("", |m| m.as_str())) {
            return Some(p);
        }
    }
    first_long_paragraph(html)
}

fn meta_description(html: &str) -> Option<String> {
    for tag in RE_META_TAG.find_iter(html) {
        let tag = tag.as_str();
        if !RE_META_NAME.is_match(tag) {
            continue;
        }
        if let Some(content) = RE_META_CONTENT.captures(tag).and_then(|c| c.get(1)) {
            let cleaned = normalize_text(content.as_str());
            if !cleaned.is_empty() {
                return Some(cleaned);
            }
        }
    }
    None
}

fn first_long_paragraph(html: &str) -> Option<String> {
    RE_PARA
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| normalize_text(m.as_str())))
        .find(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_description_wins_when_present() {
        let html = r#"<html><head>
            <meta name="description" content="病院向けのクラウド電子カルテを提供する新サービスの発表です。">
        </head><body><p>short</p></body></html>"#;
        assert_eq!(
            extract_description(html).unwrap(),
            "病院向けのクラウド電子カルテを提供する新サービスの発表です。"
        );
    }

    #[test]
    fn og_description_with_reversed_attribute_order() {
        let html = r#"<meta content="医療機関のDXを支援するプラットフォームに関する詳細なお知らせ。" property="og:description">"#;
        assert_eq!(
            extract_description(html).unwrap(),
            "医療機関のDXを支援するプラットフォームに関する詳細なお知らせ。"
        );
    }

    #[test]
    fn short_meta_falls_back_to_article_paragraph() {
        let html = r#"
            <meta name="description" content="ニュースサイト">
            <article><p>株式会社サンプルは、全国の診療所に向けてクラウド型の電子カルテと予約システムを統合した新しいサービスの提供を開始したと発表しました。</p></article>"#;
        let out = extract_description(html).unwrap();
        assert!(out.starts_with("株式会社サンプル"));
    }

    #[test]
    fn page_without_usable_content_yields_none() {
        let html = "<html><body><p>短い</p><div>no paragraphs here</div></body></html>";
        assert!(extract_description(html).is_none());
    }

    #[test]
    fn paragraph_markup_is_stripped() {
        let html = "<p>株式会社サンプルは、<strong>医療AI</strong>を活用した診療支援サービスを開始しました。導入により診療記録の作成時間を大幅に短縮できるとしています。</p>";
        let out = extract_description(html).unwrap();
        assert!(!out.contains('<'));
    }
}
