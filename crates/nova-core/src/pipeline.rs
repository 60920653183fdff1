//! Orchestrator: sequences the four stages for one candidate, applying
//! retry/backoff and timeout policy uniformly and recording run state for
//! audit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{FailureKind, Stage, StageError};
use crate::services::{BibliographicArchive, GalaxyCatalog, NameResolver};
use crate::stages::{biblio, host, resolve, validate};
use crate::store::MetadataStore;
use crate::types::{
    CandidateRequest, CanonicalCandidateMetadata, RunRecord, RunState, ValidationResult,
};

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded(CanonicalCandidateMetadata),
    Failed {
        stage: Stage,
        kind: FailureKind,
        attempts: u32,
        message: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub candidate_name: String,
    pub outcome: RunOutcome,
}

/// The candidate resolution pipeline. Holds the capability interfaces and
/// the store; each `run` is independent, so one pipeline value can serve
/// concurrent runs for different candidates.
pub struct Pipeline {
    resolver: Arc<dyn NameResolver>,
    catalog: Arc<dyn GalaxyCatalog>,
    archive: Arc<dyn BibliographicArchive>,
    store: Arc<dyn MetadataStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn NameResolver>,
        catalog: Arc<dyn GalaxyCatalog>,
        archive: Arc<dyn BibliographicArchive>,
        store: Arc<dyn MetadataStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            resolver,
            catalog,
            archive,
            store,
            config,
        }
    }

    /// Execute the full pipeline for one candidate. Never returns an error:
    /// every failure mode is folded into the report, and the audit record is
    /// written for both terminal states.
    pub async fn run(&self, request: CandidateRequest) -> RunReport {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, candidate = %request.candidate_name, "pipeline run started");

        let mut record = RunRecord::started(run_id, &request.candidate_name, Utc::now());
        self.audit(&record).await;

        let outcome = self.execute(&request, run_id, &mut record).await;

        record.finished_at = Some(Utc::now());
        match &outcome {
            RunOutcome::Succeeded(meta) => {
                record.state = RunState::Succeeded;
                info!(
                    run_id = %run_id,
                    candidate = %request.candidate_name,
                    bibcodes = meta.bibliography.len(),
                    host_determined = meta.host.is_determined(),
                    "pipeline run succeeded"
                );
            }
            RunOutcome::Failed {
                stage,
                kind,
                attempts,
                message,
            } => {
                record.state = RunState::Failed;
                record.failed_stage = Some(*stage);
                record.failure_kind = Some(*kind);
                record.attempts = *attempts;
                record.message = Some(message.clone());
                error!(
                    run_id = %run_id,
                    candidate = %request.candidate_name,
                    stage = %stage,
                    kind = %kind,
                    attempts,
                    "pipeline run failed: {message}"
                );
            }
        }
        self.audit(&record).await;

        RunReport {
            run_id,
            candidate_name: request.candidate_name.clone(),
            outcome,
        }
    }

    async fn execute(
        &self,
        request: &CandidateRequest,
        run_id: Uuid,
        record: &mut RunRecord,
    ) -> RunOutcome {
        // Stage 1: resolve.
        let mut resolved = match self
            .with_retries(Stage::Resolving, record, || {
                resolve::resolve(self.resolver.as_ref(), &request.candidate_name)
            })
            .await
        {
            Ok(resolved) => resolved,
            Err(outcome) => return outcome,
        };

        // Caller-supplied coordinates fill in only when the resolver came
        // back empty-handed.
        if resolved.coords.is_none() {
            if let Some(known) = request.known_coords {
                resolved.coords = Some(known);
            }
        }

        // Stage 2: validate. Pure and terminal on rejection; rejection is
        // bad input data, not infrastructure, so there is nothing to retry.
        record.state = RunState::Validating;
        self.audit(record).await;
        let validated = match validate::validate(&resolved) {
            ValidationResult::Valid(meta) => meta,
            ValidationResult::Rejected(reason) => {
                return RunOutcome::Failed {
                    stage: Stage::Validating,
                    kind: FailureKind::Rejected,
                    attempts: 1,
                    message: reason.to_string(),
                }
            }
        };
        let Some(coords) = validated.coords else {
            // validate() only accepts metadata with coordinates.
            return RunOutcome::Failed {
                stage: Stage::Validating,
                kind: FailureKind::Permanent,
                attempts: 1,
                message: "validator accepted metadata without coordinates".to_string(),
            };
        };

        // Stage 3: host determination. `Undetermined` flows forward.
        record.state = RunState::DeterminingHost;
        self.audit(record).await;
        let host = match self
            .with_retries(Stage::DeterminingHost, record, || {
                host::determine_host(
                    self.catalog.as_ref(),
                    coords,
                    &validated.aliases,
                    &self.config.host_search,
                )
            })
            .await
        {
            Ok(host) => host,
            Err(outcome) => return outcome,
        };

        // Stage 4: harvest and stage.
        record.state = RunState::Staging;
        self.audit(record).await;
        let staged = self
            .with_retries(Stage::Staging, record, || {
                biblio::harvest_and_stage(
                    self.archive.as_ref(),
                    self.store.as_ref(),
                    request,
                    &validated,
                    &host,
                    run_id,
                    Utc::now(),
                )
            })
            .await;

        match staged {
            Ok(meta) => RunOutcome::Succeeded(meta),
            Err(outcome) => outcome,
        }
    }

    /// Run one stage with the uniform retry policy: every attempt is bounded
    /// by the call timeout, transient failures back off exponentially, and
    /// anything else fails the run immediately.
    async fn with_retries<T, F, Fut>(
        &self,
        stage: Stage,
        record: &mut RunRecord,
        mut op: F,
    ) -> Result<T, RunOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            record.attempts = attempt;

            let result = match tokio::time::timeout(self.config.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Transient(format!(
                    "{stage} timed out after {:?}",
                    self.config.call_timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = backoff_delay(&self.config, attempt);
                    warn!(
                        stage = %stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off: {err}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(RunOutcome::Failed {
                        stage,
                        kind: err.kind(),
                        attempts: attempt,
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    /// Best-effort audit write. Bookkeeping failures are logged but must
    /// never mask the pipeline outcome.
    async fn audit(&self, record: &RunRecord) {
        if let Err(err) = self.store.record_run(record).await {
            warn!(run_id = %record.run_id, "failed to record run state: {err}");
        }
    }
}

fn backoff_delay(config: &PipelineConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = config.backoff_base.saturating_mul(1u32 << exp);
    delay.min(config.backoff_cap)
}
