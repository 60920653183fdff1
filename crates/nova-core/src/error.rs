use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RejectionReason;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolving,
    Validating,
    DeterminingHost,
    Staging,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Validating => "validating",
            Stage::DeterminingHost => "determining_host",
            Stage::Staging => "staging",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolving" => Ok(Stage::Resolving),
            "validating" => Ok(Stage::Validating),
            "determining_host" => Ok(Stage::DeterminingHost),
            "staging" => Ok(Stage::Staging),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// Classification of a stage failure. `Transient` is the only retryable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
    NotFound,
    Rejected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
            FailureKind::NotFound => "not_found",
            FailureKind::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transient" => Ok(FailureKind::Transient),
            "permanent" => Ok(FailureKind::Permanent),
            "not_found" => Ok(FailureKind::NotFound),
            "rejected" => Ok(FailureKind::Rejected),
            other => Err(format!("unknown failure kind '{other}'")),
        }
    }
}

/// Failure raised by an individual pipeline stage.
///
/// `Undetermined` host lookups are deliberately *not* represented here: a
/// missing host galaxy is a valid stage outcome, not a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    /// Infrastructure fault worth retrying: timeout, connection reset, 5xx.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed or unexpected response shape. Retrying will not help.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The external source has no record of the candidate.
    #[error("not found: {0}")]
    NotFound(String),

    /// Domain-level validation failure; reflects bad input data rather than
    /// an infrastructure fault. Terminal for the run.
    #[error("rejected: {0}")]
    Rejected(RejectionReason),
}

impl StageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Transient(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Transient(_) => FailureKind::Transient,
            StageError::Permanent(_) => FailureKind::Permanent,
            StageError::NotFound(_) => FailureKind::NotFound,
            StageError::Rejected(_) => FailureKind::Rejected,
        }
    }
}
