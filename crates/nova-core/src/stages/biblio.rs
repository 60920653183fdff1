//! Stage 4: bibliographic harvest and durable staging.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::StageError;
use crate::services::{BiblioDoc, BibliographicArchive};
use crate::store::MetadataStore;
use crate::types::{
    BibliographicRecord, CandidateRequest, CanonicalCandidateMetadata, HarvestQueueEntry,
    HostGalaxyResult, QueueStatus, ResolvedMetadata,
};

const SCORE_OBJECT_TAGGED: f64 = 1.0;
const SCORE_MENTION: f64 = 0.5;

/// Query the bibliographic archive with the candidate's full alias set,
/// merge everything into the canonical record, persist it, and enqueue each
/// newly seen bibcode into the harvest backlog.
pub async fn harvest_and_stage(
    archive: &dyn BibliographicArchive,
    store: &dyn MetadataStore,
    request: &CandidateRequest,
    resolved: &ResolvedMetadata,
    host: &HostGalaxyResult,
    run_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CanonicalCandidateMetadata, StageError> {
    let docs = archive.search(&resolved.aliases).await?;
    let bibliography = collate(docs);

    let meta = CanonicalCandidateMetadata {
        candidate_name: request.candidate_name.clone(),
        name_norm: resolved.name_norm.clone(),
        resolved: resolved.clone(),
        host: host.clone(),
        bibliography,
        created_at: now,
        run_id,
    };

    stage(store, &meta).await?;
    Ok(meta)
}

/// Deduplicate by bibcode (an object-tagged doc wins over a mention of the
/// same bibcode) and order by relevance, then bibcode. Scoring is advisory
/// metadata; nothing is filtered out.
fn collate(docs: Vec<BiblioDoc>) -> Vec<BibliographicRecord> {
    let mut by_code: BTreeMap<String, BibliographicRecord> = BTreeMap::new();
    for doc in docs {
        let bibcode = doc.bibcode.trim().to_string();
        if bibcode.is_empty() {
            continue;
        }
        let record = BibliographicRecord {
            bibcode: bibcode.clone(),
            title: doc.title,
            year: doc.year,
            authors: doc.authors,
            relevance_score: if doc.object_tagged {
                SCORE_OBJECT_TAGGED
            } else {
                SCORE_MENTION
            },
            object_tagged: doc.object_tagged,
        };
        match by_code.entry(bibcode) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.object_tagged && !slot.get().object_tagged {
                    slot.insert(record);
                }
            }
        }
    }

    let mut records: Vec<BibliographicRecord> = by_code.into_values().collect();
    records.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bibcode.cmp(&b.bibcode))
    });
    records
}

/// Persist the canonical record, then the queue entries.
///
/// The two writes may target different durable stores, so there is no
/// cross-store transaction: both operations are idempotent, and replaying
/// the whole stage completes whichever half a previous attempt lost.
pub async fn stage(
    store: &dyn MetadataStore,
    meta: &CanonicalCandidateMetadata,
) -> Result<(), StageError> {
    store.upsert_candidate(meta).await?;
    let enqueued = enqueue_bibliography(store, meta).await?;
    info!(
        candidate = %meta.candidate_name,
        records = meta.bibliography.len(),
        enqueued,
        "staged canonical metadata"
    );
    Ok(())
}

/// Replay the queue inserts for an already-persisted candidate, repairing a
/// run that wrote the metadata half but lost the backlog half. Returns the
/// number of entries inserted.
pub async fn repair(store: &dyn MetadataStore, name_norm: &str) -> Result<usize, StageError> {
    let Some(meta) = store.fetch_candidate(name_norm).await? else {
        return Err(StageError::NotFound(format!(
            "no canonical metadata stored for '{name_norm}'"
        )));
    };
    enqueue_bibliography(store, &meta).await
}

async fn enqueue_bibliography(
    store: &dyn MetadataStore,
    meta: &CanonicalCandidateMetadata,
) -> Result<usize, StageError> {
    let mut inserted = 0;
    for record in &meta.bibliography {
        let entry = HarvestQueueEntry {
            bibcode: record.bibcode.clone(),
            candidate_name: meta.candidate_name.clone(),
            enqueued_at: meta.created_at,
            status: QueueStatus::Pending,
        };
        if store.enqueue_if_absent(&entry).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}
