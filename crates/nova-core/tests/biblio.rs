mod support;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use nova_core::stages::biblio::{harvest_and_stage, repair, stage};
use nova_core::store::{MemoryStore, MetadataStore, StoreError};
use nova_core::types::{
    normalize_name, CandidateRequest, CanonicalCandidateMetadata, EquatorialCoords,
    HarvestQueueEntry, HostGalaxyResult, QueueStatus, ResolutionConfidence, ResolvedMetadata,
    RunRecord,
};

use support::{biblio_doc, StaticArchive};

fn resolved(name: &str) -> ResolvedMetadata {
    ResolvedMetadata {
        canonical_name: name.to_string(),
        name_norm: normalize_name(name),
        coords: Some(EquatorialCoords::new(270.1, -32.8)),
        epoch: "J2000".to_string(),
        object_types: vec!["No*".to_string()],
        cross_identifiers: BTreeMap::new(),
        aliases: vec![name.to_string()],
        confidence: ResolutionConfidence::Unique,
    }
}

fn undetermined() -> HostGalaxyResult {
    HostGalaxyResult::Undetermined {
        reason: "no galaxy within 2.0 deg".to_string(),
    }
}

#[tokio::test]
async fn stages_metadata_and_backlog() {
    let archive = StaticArchive::new(vec![
        biblio_doc("2012ATel.4157....1W", true),
        biblio_doc("2015ApJ...809..160F", true),
        biblio_doc("2018A&A...609A.120F", false),
    ]);
    let store = MemoryStore::new();
    let request = CandidateRequest::new("V1324 Sco");

    let meta = harvest_and_stage(
        &archive,
        &store,
        &request,
        &resolved("V1324 Sco"),
        &undetermined(),
        Uuid::new_v4(),
        Utc::now(),
    )
    .await
    .expect("staged");

    assert_eq!(meta.bibliography.len(), 3);
    assert_eq!(store.candidate_count(), 1);

    let entries = store.queue_entries_for("V1324 Sco").await.expect("entries");
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.status == QueueStatus::Pending));
}

#[tokio::test]
async fn rerun_with_identical_responses_is_idempotent() {
    let archive = StaticArchive::new(vec![
        biblio_doc("2012ATel.4157....1W", true),
        biblio_doc("2015ApJ...809..160F", false),
    ]);
    let store = MemoryStore::new();
    let request = CandidateRequest::new("V1324 Sco");

    for _ in 0..2 {
        harvest_and_stage(
            &archive,
            &store,
            &request,
            &resolved("V1324 Sco"),
            &undetermined(),
            Uuid::new_v4(),
            Utc::now(),
        )
        .await
        .expect("staged");
    }

    assert_eq!(store.candidate_count(), 1);
    assert_eq!(store.queue_len(), 2);
}

#[tokio::test]
async fn duplicate_bibcodes_collapse_and_tagged_wins() {
    let archive = StaticArchive::new(vec![
        biblio_doc("2012ATel.4157....1W", false),
        biblio_doc("2012ATel.4157....1W", true),
        biblio_doc("2015ApJ...809..160F", false),
    ]);
    let store = MemoryStore::new();
    let request = CandidateRequest::new("V1324 Sco");

    let meta = harvest_and_stage(
        &archive,
        &store,
        &request,
        &resolved("V1324 Sco"),
        &undetermined(),
        Uuid::new_v4(),
        Utc::now(),
    )
    .await
    .expect("staged");

    assert_eq!(meta.bibliography.len(), 2);
    let atel = meta
        .bibliography
        .iter()
        .find(|r| r.bibcode == "2012ATel.4157....1W")
        .expect("atel record");
    assert!(atel.object_tagged);
    assert!((atel.relevance_score - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn records_are_ordered_by_relevance_then_bibcode() {
    let archive = StaticArchive::new(vec![
        biblio_doc("2018A&A...609A.120F", false),
        biblio_doc("2015ApJ...809..160F", true),
        biblio_doc("2012ATel.4157....1W", true),
    ]);
    let store = MemoryStore::new();
    let request = CandidateRequest::new("V1324 Sco");

    let meta = harvest_and_stage(
        &archive,
        &store,
        &request,
        &resolved("V1324 Sco"),
        &undetermined(),
        Uuid::new_v4(),
        Utc::now(),
    )
    .await
    .expect("staged");

    let codes: Vec<&str> = meta.bibliography.iter().map(|r| r.bibcode.as_str()).collect();
    assert_eq!(
        codes,
        vec![
            "2012ATel.4157....1W",
            "2015ApJ...809..160F",
            "2018A&A...609A.120F",
        ]
    );
}

#[tokio::test]
async fn queue_entry_for_known_bibcode_is_not_duplicated() {
    let store = MemoryStore::new();
    // Another candidate already enqueued this bibcode.
    store
        .enqueue_if_absent(&HarvestQueueEntry {
            bibcode: "2012ATel.4157....1W".to_string(),
            candidate_name: "Some Other Nova".to_string(),
            enqueued_at: Utc::now(),
            status: QueueStatus::Pending,
        })
        .await
        .expect("enqueue");

    let archive = StaticArchive::new(vec![biblio_doc("2012ATel.4157....1W", true)]);
    let request = CandidateRequest::new("V1324 Sco");
    harvest_and_stage(
        &archive,
        &store,
        &request,
        &resolved("V1324 Sco"),
        &undetermined(),
        Uuid::new_v4(),
        Utc::now(),
    )
    .await
    .expect("staged");

    assert_eq!(store.queue_len(), 1);
    let entries = store.queue_entries_for("Some Other Nova").await.expect("entries");
    assert_eq!(entries.len(), 1, "first sighting keeps the back-reference");
}

/// Store decorator that drops queue writes, simulating the metadata half
/// landing while the backlog half is lost.
struct QueuelessStore {
    inner: MemoryStore,
}

#[async_trait]
impl MetadataStore for QueuelessStore {
    async fn upsert_candidate(&self, meta: &CanonicalCandidateMetadata) -> Result<(), StoreError> {
        self.inner.upsert_candidate(meta).await
    }

    async fn enqueue_if_absent(&self, _entry: &HarvestQueueEntry) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("backlog store offline".to_string()))
    }

    async fn fetch_candidate(
        &self,
        name_norm: &str,
    ) -> Result<Option<CanonicalCandidateMetadata>, StoreError> {
        self.inner.fetch_candidate(name_norm).await
    }

    async fn queue_entries_for(
        &self,
        candidate_name: &str,
    ) -> Result<Vec<HarvestQueueEntry>, StoreError> {
        self.inner.queue_entries_for(candidate_name).await
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.inner.record_run(run).await
    }

    async fn fetch_run(&self, run_id: Uuid) -> Result<Option<RunRecord>, StoreError> {
        self.inner.fetch_run(run_id).await
    }
}

#[tokio::test]
async fn partial_write_is_repaired_by_replay() {
    let broken = QueuelessStore {
        inner: MemoryStore::new(),
    };
    let archive = StaticArchive::new(vec![
        biblio_doc("2012ATel.4157....1W", true),
        biblio_doc("2015ApJ...809..160F", false),
    ]);
    let request = CandidateRequest::new("V1324 Sco");

    // First attempt: metadata lands, backlog writes fail.
    let err = harvest_and_stage(
        &archive,
        &broken,
        &request,
        &resolved("V1324 Sco"),
        &undetermined(),
        Uuid::new_v4(),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(err.is_retryable());

    let healthy = broken.inner;
    assert_eq!(healthy.candidate_count(), 1);
    assert_eq!(healthy.queue_len(), 0);

    // Replay against the healthy store completes the missing half.
    let inserted = repair(&healthy, &normalize_name("V1324 Sco"))
        .await
        .expect("repair");
    assert_eq!(inserted, 2);
    assert_eq!(healthy.queue_len(), 2);

    // Repairing again inserts nothing new.
    let inserted = repair(&healthy, &normalize_name("V1324 Sco"))
        .await
        .expect("repair");
    assert_eq!(inserted, 0);
}

#[tokio::test]
async fn stage_alone_can_replay_a_persisted_record() {
    let store = MemoryStore::new();
    let meta = CanonicalCandidateMetadata {
        candidate_name: "V1324 Sco".to_string(),
        name_norm: normalize_name("V1324 Sco"),
        resolved: resolved("V1324 Sco"),
        host: undetermined(),
        bibliography: vec![],
        created_at: Utc::now(),
        run_id: Uuid::new_v4(),
    };
    stage(&store, &meta).await.expect("stage");
    stage(&store, &meta).await.expect("stage replay");
    assert_eq!(store.candidate_count(), 1);
}
