// src/ingest/types.rs
use anyhow::Result;

use crate::article::{Article, Source};

/// One article source behind a uniform interface. Source-specific parsing
/// lives entirely inside each implementation; the pipeline only sees
/// batches of records.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>>;
    fn source(&self) -> Source;
}
