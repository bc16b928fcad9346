//! Keyword gate: decides whether a candidate article passes the
//! medical-AND-technology inclusion policy.
//!
//! Veto precedence, first hit wins: excluded domain → exclusion keyword →
//! dual-category inclusion (at least one medical AND one technology keyword
//! over title+description, case-insensitive substring match). Pure function
//! of the record and the configured sets; an empty description is fine.

use tracing::info;
use url::Url;

use crate::article::Article;
use crate::config::KeywordPolicy;

/// Outcome of one classification, with enough detail for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    DomainExcluded,
    KeywordExcluded,
    MissingMedical,
    MissingTechnology,
    /// Matched keywords in their configured casing, medical first.
    Included { matched: Vec<String> },
}

impl Verdict {
    pub fn is_included(&self) -> bool {
        matches!(self, Verdict::Included { .. })
    }
}

pub struct KeywordFilter {
    medical: Vec<String>,
    technology: Vec<String>,
    exclude: Vec<String>,
    exclude_domains: Vec<String>,
    /// Original casing, index-aligned with the lowercased lists above.
    medical_display: Vec<String>,
    technology_display: Vec<String>,
}

impl KeywordFilter {
    pub fn new(policy: &KeywordPolicy) -> Self {
        let lower = |v: &[String]| v.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();
        Self {
            medical: lower(&policy.medical),
            technology: lower(&policy.technology),
            exclude: lower(&policy.exclude),
            exclude_domains: lower(&policy.exclude_domains),
            medical_display: policy.medical.clone(),
            technology_display: policy.technology.clone(),
        }
    }

    pub fn evaluate(&self, article: &Article) -> Verdict {
        if self.domain_excluded(&article.url) {
            return Verdict::DomainExcluded;
        }

        let text = article.matchable_text().to_lowercase();
        if self.exclude.iter().any(|k| text.contains(k.as_str())) {
            return Verdict::KeywordExcluded;
        }

        let med_hits: Vec<usize> = self
            .medical
            .iter()
            .enumerate()
            .filter(|(_, k)| text.contains(k.as_str()))
            .map(|(i, _)| i)
            .collect();
        if med_hits.is_empty() {
            return Verdict::MissingMedical;
        }

        let tech_hits: Vec<usize> = self
            .technology
            .iter()
            .enumerate()
            .filter(|(_, k)| text.contains(k.as_str()))
            .map(|(i, _)| i)
            .collect();
        if tech_hits.is_empty() {
            return Verdict::MissingTechnology;
        }

        let mut matched = Vec::with_capacity(med_hits.len() + tech_hits.len());
        matched.extend(med_hits.iter().map(|&i| self.medical_display[i].clone()));
        matched.extend(tech_hits.iter().map(|&i| self.technology_display[i].clone()));
        Verdict::Included { matched }
    }

    pub fn is_included(&self, article: &Article) -> bool {
        self.evaluate(article).is_included()
    }

    /// Classify a batch, keeping only included records. Logs the reduction.
    pub fn filter_articles(&self, articles: Vec<Article>) -> Vec<Article> {
        let before = articles.len();
        let kept: Vec<Article> = articles
            .into_iter()
            .filter(|a| self.is_included(a))
            .collect();
        info!(before, after = kept.len(), "keyword filter applied");
        kept
    }

    /// Pre-exclusion hit counts over a raw batch: (medical, technology, both).
    /// Diagnostic only; exclusion rules are not applied here.
    pub fn keyword_hit_stats(&self, articles: &[Article]) -> (usize, usize, usize) {
        let mut med = 0usize;
        let mut tech = 0usize;
        let mut both = 0usize;
        for a in articles {
            let text = a.matchable_text().to_lowercase();
            let has_med = self.medical.iter().any(|k| text.contains(k.as_str()));
            let has_tech = self.technology.iter().any(|k| text.contains(k.as_str()));
            med += has_med as usize;
            tech += has_tech as usize;
            both += (has_med && has_tech) as usize;
        }
        (med, tech, both)
    }

    fn domain_excluded(&self, link: &str) -> bool {
        if self.exclude_domains.is_empty() {
            return false;
        }
        match Url::parse(link.trim()).ok().and_then(|u| {
            u.host_str().map(|h| h.to_lowercase())
        }) {
            Some(host) => self
                .exclude_domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}"))),
            // Unparseable link: fall back to a substring check so a veto is
            // never lost to a malformed URL.
            None => {
                let link_lower = link.to_lowercase();
                self.exclude_domains.iter().any(|d| link_lower.contains(d.as_str()))
            }
        }
    }
}
