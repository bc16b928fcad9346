//! Failure taxonomy for one run.
//!
//! The variants matter operationally: a ledger load failure aborts before
//! any delivery, a ledger persist failure happens after a successful
//! delivery and must be unmistakable in logs, and a delivery failure means
//! the ledger was deliberately not committed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The ledger store exists but could not be read or parsed. A corrupt
    /// ledger treated as empty would mass re-deliver, so this is fatal.
    #[error("delivery ledger at {path} is unreadable: {source}")]
    LedgerLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Delivery succeeded but the ledger could not be persisted. The next
    /// run may re-deliver what was just sent; operators must see this.
    #[error("ledger write failed AFTER successful delivery; next run may re-deliver: {source}")]
    LedgerPersist {
        #[source]
        source: anyhow::Error,
    },

    #[error("delivery failed, ledger not committed: {source}")]
    Delivery {
        #[source]
        source: anyhow::Error,
    },
}
