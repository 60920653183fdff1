use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FailureKind, Stage};

/// A nova candidate submitted for resolution. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRequest {
    pub candidate_name: String,
    /// Caller-supplied coordinates, used only when the resolver cannot
    /// produce its own.
    pub known_coords: Option<EquatorialCoords>,
}

impl CandidateRequest {
    pub fn new(candidate_name: impl Into<String>) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            known_coords: None,
        }
    }

    pub fn with_known_coords(mut self, coords: EquatorialCoords) -> Self {
        self.known_coords = Some(coords);
        self
    }
}

/// ICRS equatorial coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialCoords {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl EquatorialCoords {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    /// RA in [0, 360), Dec in [-90, 90].
    pub fn in_range(&self) -> bool {
        (0.0..360.0).contains(&self.ra_deg) && (-90.0..=90.0).contains(&self.dec_deg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionConfidence {
    /// Exactly one usable match.
    Unique,
    /// Multiple matches with no single exact name match; downstream policy
    /// decides what to do with it.
    Ambiguous { matches: usize },
}

/// Output of the metadata resolver (stage 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    /// Main identifier according to the resolution service.
    pub canonical_name: String,
    /// Normalized canonical name; the idempotency key for persistence.
    pub name_norm: String,
    /// `None` means the resolver returned no usable coordinates. Absent
    /// coordinates are never encoded as zeroes or sentinels.
    pub coords: Option<EquatorialCoords>,
    pub epoch: String,
    pub object_types: Vec<String>,
    /// Catalog name -> identifier within that catalog.
    pub cross_identifiers: BTreeMap<String, String>,
    /// Ordered, deduplicated: canonical name first, then catalog
    /// identifiers, then the original input.
    pub aliases: Vec<String>,
    pub confidence: ResolutionConfidence,
}

/// Lowercase alphanumeric-only form of a name, used for idempotent keys.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Outcome of the coordinate/identity validator (stage 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid(ResolvedMetadata),
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    CoordinatesOutOfRange { ra_deg: f64, dec_deg: f64 },
    MissingCoordinates,
    ConflictingObjectTypes { conflicting: Vec<String> },
    AmbiguousResolution { matches: usize },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::CoordinatesOutOfRange { ra_deg, dec_deg } => {
                write!(f, "coordinates out of range: ra={ra_deg}, dec={dec_deg}")
            }
            RejectionReason::MissingCoordinates => {
                write!(f, "resolver returned no usable coordinates")
            }
            RejectionReason::ConflictingObjectTypes { conflicting } => {
                write!(
                    f,
                    "object types conflict with a nova classification: {}",
                    conflicting.join(", ")
                )
            }
            RejectionReason::AmbiguousResolution { matches } => {
                write!(f, "resolver returned {matches} ambiguous matches")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMethod {
    /// The galaxy's name appears among the candidate's aliases.
    NameMatch,
    /// Chosen purely by angular proximity.
    Positional,
}

/// Outcome of host-galaxy determination (stage 3). `Undetermined` is a
/// normal terminal value for the stage; the pipeline continues with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostGalaxyResult {
    Determined {
        galaxy_id: String,
        separation_deg: f64,
        method: HostMethod,
    },
    Undetermined {
        reason: String,
    },
}

impl HostGalaxyResult {
    pub fn is_determined(&self) -> bool {
        matches!(self, HostGalaxyResult::Determined { .. })
    }
}

/// One discovered publication, deduplicated by bibcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibliographicRecord {
    pub bibcode: String,
    pub title: String,
    pub year: Option<i32>,
    /// Author names in publication order.
    pub authors: Vec<String>,
    /// Advisory only; all discovered records are retained regardless.
    pub relevance_score: f64,
    /// True when the source database tags the publication as being about
    /// this object rather than merely mentioning it.
    pub object_tagged: bool,
}

/// The canonical persisted record for one candidate. Upserted by
/// `name_norm`, last write wins by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCandidateMetadata {
    pub candidate_name: String,
    pub name_norm: String,
    pub resolved: ResolvedMetadata,
    pub host: HostGalaxyResult,
    /// Ordered by relevance (descending), then bibcode.
    pub bibliography: Vec<BibliographicRecord>,
    pub created_at: DateTime<Utc>,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    InProgress,
    Done,
    Failed { reason: String },
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::InProgress => "in_progress",
            QueueStatus::Done => "done",
            QueueStatus::Failed { .. } => "failed",
        }
    }

    pub fn from_parts(status: &str, failure_reason: Option<String>) -> Result<Self, String> {
        match status {
            "pending" => Ok(QueueStatus::Pending),
            "in_progress" => Ok(QueueStatus::InProgress),
            "done" => Ok(QueueStatus::Done),
            "failed" => Ok(QueueStatus::Failed {
                reason: failure_reason.unwrap_or_default(),
            }),
            other => Err(format!("unknown queue status '{other}'")),
        }
    }
}

/// One harvest-backlog entry. Created by the staging stage on first sighting
/// of a bibcode; status transitions belong to the downstream harvester, and
/// the resolution pipeline never deletes entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestQueueEntry {
    pub bibcode: String,
    /// Back-reference, not ownership.
    pub candidate_name: String,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueStatus,
}

/// State of a pipeline run, as recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Resolving,
    Validating,
    DeterminingHost,
    Staging,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Resolving => "resolving",
            RunState::Validating => "validating",
            RunState::DeterminingHost => "determining_host",
            RunState::Staging => "staging",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolving" => Ok(RunState::Resolving),
            "validating" => Ok(RunState::Validating),
            "determining_host" => Ok(RunState::DeterminingHost),
            "staging" => Ok(RunState::Staging),
            "succeeded" => Ok(RunState::Succeeded),
            "failed" => Ok(RunState::Failed),
            other => Err(format!("unknown run state '{other}'")),
        }
    }
}

/// Audit record for one pipeline run, queryable by run id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub candidate_name: String,
    pub state: RunState,
    pub failed_stage: Option<Stage>,
    pub failure_kind: Option<FailureKind>,
    /// Attempts made at the stage the run last executed.
    pub attempts: u32,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn started(run_id: Uuid, candidate_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            candidate_name: candidate_name.into(),
            state: RunState::Resolving,
            failed_stage: None,
            failure_kind: None,
            attempts: 0,
            message: None,
            started_at,
            finished_at: None,
        }
    }
}
