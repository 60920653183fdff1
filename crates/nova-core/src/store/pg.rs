//! Postgres-backed store. Raw queries with explicit binds; idempotency
//! comes from `ON CONFLICT` clauses rather than locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{MetadataStore, StoreError};
use crate::db::DbPool;
use crate::types::{
    BibliographicRecord, CanonicalCandidateMetadata, HarvestQueueEntry, HostGalaxyResult,
    QueueStatus, ResolvedMetadata, RunRecord,
};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgStore {
    async fn upsert_candidate(&self, meta: &CanonicalCandidateMetadata) -> Result<(), StoreError> {
        let resolved = serde_json::to_value(&meta.resolved)
            .map_err(|err| StoreError::Corrupt(format!("resolved metadata encode: {err}")))?;
        let host = serde_json::to_value(&meta.host)
            .map_err(|err| StoreError::Corrupt(format!("host result encode: {err}")))?;

        let mut tx = self.pool.begin().await?;

        // Last write wins by run timestamp; an older rerun leaves the row
        // (and its bibliography) untouched.
        let result = sqlx::query(
            r#"
            INSERT INTO candidate_metadata
                (name_norm, candidate_name, canonical_name, resolved, host, run_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (name_norm) DO UPDATE SET
                candidate_name = EXCLUDED.candidate_name,
                canonical_name = EXCLUDED.canonical_name,
                resolved = EXCLUDED.resolved,
                host = EXCLUDED.host,
                run_id = EXCLUDED.run_id,
                updated_at = EXCLUDED.updated_at
            WHERE candidate_metadata.updated_at <= EXCLUDED.updated_at
            "#,
        )
        .bind(&meta.name_norm)
        .bind(&meta.candidate_name)
        .bind(&meta.resolved.canonical_name)
        .bind(&resolved)
        .bind(&host)
        .bind(meta.run_id)
        .bind(meta.created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            sqlx::query(r#"DELETE FROM bibliographic_records WHERE name_norm = $1"#)
                .bind(&meta.name_norm)
                .execute(&mut *tx)
                .await?;

            for (position, record) in meta.bibliography.iter().enumerate() {
                let authors = serde_json::to_value(&record.authors)
                    .map_err(|err| StoreError::Corrupt(format!("authors encode: {err}")))?;
                sqlx::query(
                    r#"
                    INSERT INTO bibliographic_records
                        (name_norm, position, bibcode, title, year, authors, relevance_score, object_tagged)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(&meta.name_norm)
                .bind(position as i32)
                .bind(&record.bibcode)
                .bind(&record.title)
                .bind(record.year)
                .bind(&authors)
                .bind(record.relevance_score)
                .bind(record.object_tagged)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn enqueue_if_absent(&self, entry: &HarvestQueueEntry) -> Result<bool, StoreError> {
        let failure_reason = match &entry.status {
            QueueStatus::Failed { reason } => Some(reason.as_str()),
            _ => None,
        };
        let result = sqlx::query(
            r#"
            INSERT INTO harvest_queue (bibcode, candidate_name, enqueued_at, status, failure_reason)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (bibcode) DO NOTHING
            "#,
        )
        .bind(&entry.bibcode)
        .bind(&entry.candidate_name)
        .bind(entry.enqueued_at)
        .bind(entry.status.as_str())
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_candidate(
        &self,
        name_norm: &str,
    ) -> Result<Option<CanonicalCandidateMetadata>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT candidate_name, resolved, host, run_id, updated_at
            FROM candidate_metadata
            WHERE name_norm = $1
            "#,
        )
        .bind(name_norm)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let candidate_name: String = row.try_get("candidate_name")?;
        let resolved_value: serde_json::Value = row.try_get("resolved")?;
        let host_value: serde_json::Value = row.try_get("host")?;
        let run_id: Uuid = row.try_get("run_id")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        let resolved: ResolvedMetadata = serde_json::from_value(resolved_value)
            .map_err(|err| StoreError::Corrupt(format!("resolved metadata for '{name_norm}': {err}")))?;
        let host: HostGalaxyResult = serde_json::from_value(host_value)
            .map_err(|err| StoreError::Corrupt(format!("host result for '{name_norm}': {err}")))?;

        let biblio_rows = sqlx::query(
            r#"
            SELECT bibcode, title, year, authors, relevance_score, object_tagged
            FROM bibliographic_records
            WHERE name_norm = $1
            ORDER BY position
            "#,
        )
        .bind(name_norm)
        .fetch_all(&self.pool)
        .await?;

        let mut bibliography = Vec::with_capacity(biblio_rows.len());
        for row in biblio_rows {
            let authors_value: serde_json::Value = row.try_get("authors")?;
            let authors: Vec<String> = serde_json::from_value(authors_value)
                .map_err(|err| StoreError::Corrupt(format!("authors for '{name_norm}': {err}")))?;
            bibliography.push(BibliographicRecord {
                bibcode: row.try_get("bibcode")?,
                title: row.try_get("title")?,
                year: row.try_get("year")?,
                authors,
                relevance_score: row.try_get("relevance_score")?,
                object_tagged: row.try_get("object_tagged")?,
            });
        }

        Ok(Some(CanonicalCandidateMetadata {
            candidate_name,
            name_norm: name_norm.to_string(),
            resolved,
            host,
            bibliography,
            created_at: updated_at,
            run_id,
        }))
    }

    async fn queue_entries_for(
        &self,
        candidate_name: &str,
    ) -> Result<Vec<HarvestQueueEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT bibcode, candidate_name, enqueued_at, status, failure_reason
            FROM harvest_queue
            WHERE candidate_name = $1
            ORDER BY bibcode
            "#,
        )
        .bind(candidate_name)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let status_text: String = row.try_get("status")?;
            let failure_reason: Option<String> = row.try_get("failure_reason")?;
            let status = QueueStatus::from_parts(&status_text, failure_reason)
                .map_err(StoreError::Corrupt)?;
            entries.push(HarvestQueueEntry {
                bibcode: row.try_get("bibcode")?,
                candidate_name: row.try_get("candidate_name")?,
                enqueued_at: row.try_get("enqueued_at")?,
                status,
            });
        }
        Ok(entries)
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs
                (run_id, candidate_name, state, failed_stage, failure_kind, attempts, message, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (run_id) DO UPDATE SET
                state = EXCLUDED.state,
                failed_stage = EXCLUDED.failed_stage,
                failure_kind = EXCLUDED.failure_kind,
                attempts = EXCLUDED.attempts,
                message = EXCLUDED.message,
                finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(run.run_id)
        .bind(&run.candidate_name)
        .bind(run.state.as_str())
        .bind(run.failed_stage.map(|s| s.as_str()))
        .bind(run.failure_kind.map(|k| k.as_str()))
        .bind(run.attempts as i32)
        .bind(&run.message)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_run(&self, run_id: Uuid) -> Result<Option<RunRecord>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT run_id, candidate_name, state, failed_stage, failure_kind, attempts, message, started_at, finished_at
            FROM pipeline_runs
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let state_text: String = row.try_get("state")?;
        let failed_stage_text: Option<String> = row.try_get("failed_stage")?;
        let failure_kind_text: Option<String> = row.try_get("failure_kind")?;
        let attempts: i32 = row.try_get("attempts")?;

        let state = state_text.parse().map_err(StoreError::Corrupt)?;
        let failed_stage = failed_stage_text
            .map(|s| s.parse().map_err(StoreError::Corrupt))
            .transpose()?;
        let failure_kind = failure_kind_text
            .map(|s| s.parse().map_err(StoreError::Corrupt))
            .transpose()?;

        Ok(Some(RunRecord {
            run_id: row.try_get("run_id")?,
            candidate_name: row.try_get("candidate_name")?,
            state,
            failed_stage,
            failure_kind,
            attempts: attempts.max(0) as u32,
            message: row.try_get("message")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        }))
    }
}
