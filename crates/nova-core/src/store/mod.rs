//! Durable persistence for canonical metadata, the harvest backlog, and run
//! audit records.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::StageError;
use crate::types::{CanonicalCandidateMetadata, HarvestQueueEntry, RunRecord};

pub mod memory;
#[cfg(feature = "runtime")]
pub mod pg;

pub use memory::MemoryStore;
#[cfg(feature = "runtime")]
pub use pg::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "runtime")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record failed to decode. Not retryable.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(msg) => StageError::Permanent(format!("corrupt stored record: {msg}")),
            other => StageError::Transient(other.to_string()),
        }
    }
}

/// Abstract durable store. All write operations are idempotent by
/// construction so concurrent runs for different candidates, and retries of
/// the same candidate, are safe without locking.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Upsert keyed by `name_norm`; last write wins by `created_at`.
    async fn upsert_candidate(&self, meta: &CanonicalCandidateMetadata) -> Result<(), StoreError>;

    /// Insert-if-absent keyed by bibcode. Returns true iff a new entry was
    /// created. Existing entries are never modified here; status transitions
    /// belong to the downstream harvester.
    async fn enqueue_if_absent(&self, entry: &HarvestQueueEntry) -> Result<bool, StoreError>;

    async fn fetch_candidate(
        &self,
        name_norm: &str,
    ) -> Result<Option<CanonicalCandidateMetadata>, StoreError>;

    async fn queue_entries_for(
        &self,
        candidate_name: &str,
    ) -> Result<Vec<HarvestQueueEntry>, StoreError>;

    /// Upsert the audit record for a run (keyed by run id).
    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError>;

    async fn fetch_run(&self, run_id: Uuid) -> Result<Option<RunRecord>, StoreError>;
}
