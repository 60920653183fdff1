//! In-memory store used by tests and the CLI dry-run path.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{MetadataStore, StoreError};
use crate::types::{CanonicalCandidateMetadata, HarvestQueueEntry, RunRecord};

#[derive(Default)]
struct Inner {
    candidates: BTreeMap<String, CanonicalCandidateMetadata>,
    queue: BTreeMap<String, HarvestQueueEntry>,
    runs: BTreeMap<Uuid, RunRecord>,
}

/// Mutex-guarded maps with the same idempotency semantics as the Postgres
/// store: candidate upserts are last-write-wins by timestamp, queue inserts
/// are first-writer-wins by bibcode.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queue entries, across all candidates.
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of stored candidate records.
    pub fn candidate_count(&self) -> usize {
        self.lock().candidates.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a writer panicked mid-update; the maps
        // themselves are still structurally sound.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn upsert_candidate(&self, meta: &CanonicalCandidateMetadata) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.candidates.get(&meta.name_norm) {
            Some(existing) if existing.created_at > meta.created_at => {}
            _ => {
                inner.candidates.insert(meta.name_norm.clone(), meta.clone());
            }
        }
        Ok(())
    }

    async fn enqueue_if_absent(&self, entry: &HarvestQueueEntry) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.queue.contains_key(&entry.bibcode) {
            return Ok(false);
        }
        inner.queue.insert(entry.bibcode.clone(), entry.clone());
        Ok(true)
    }

    async fn fetch_candidate(
        &self,
        name_norm: &str,
    ) -> Result<Option<CanonicalCandidateMetadata>, StoreError> {
        Ok(self.lock().candidates.get(name_norm).cloned())
    }

    async fn queue_entries_for(
        &self,
        candidate_name: &str,
    ) -> Result<Vec<HarvestQueueEntry>, StoreError> {
        Ok(self
            .lock()
            .queue
            .values()
            .filter(|entry| entry.candidate_name == candidate_name)
            .cloned()
            .collect())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.lock().runs.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn fetch_run(&self, run_id: Uuid) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.lock().runs.get(&run_id).cloned())
    }
}
