//! Capability interfaces over the external data sources.
//!
//! Pipeline stages only ever see these traits, so tests substitute fixtures
//! without touching stage logic, and production wires in the HTTP clients
//! from [`crate::clients`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StageError;
use crate::types::EquatorialCoords;

/// Failure of an external service call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Service unavailable, timed out, or rate-limited. Retryable.
    #[error("service unavailable: {0}")]
    Transient(String),

    /// Response arrived but did not have the expected shape. Not retryable.
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl From<ServiceError> for StageError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Transient(msg) => StageError::Transient(msg),
            ServiceError::Protocol(msg) => StageError::Permanent(msg),
        }
    }
}

/// One match returned by the name-resolution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverMatch {
    pub main_id: String,
    pub ra_deg: Option<f64>,
    pub dec_deg: Option<f64>,
    pub epoch: String,
    pub object_types: Vec<String>,
    /// Raw catalog identifiers, e.g. `"Gaia DR3 4056440101596201600"`.
    pub identifiers: Vec<String>,
}

/// A galaxy within the search radius of a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalaxyNeighbor {
    pub galaxy_id: String,
    pub separation_deg: f64,
    pub distance_mpc: Option<f64>,
}

/// One publication returned by the bibliographic database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiblioDoc {
    pub bibcode: String,
    pub title: String,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    /// True when the database tags the publication as about the object
    /// itself rather than a passing mention.
    pub object_tagged: bool,
}

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// All matches for a candidate name. Zero matches is a successful empty
    /// response, not an error.
    async fn lookup(&self, name: &str) -> Result<Vec<ResolverMatch>, ServiceError>;
}

#[async_trait]
pub trait GalaxyCatalog: Send + Sync {
    /// Galaxies within `radius_deg` of `coords`, ordered by separation.
    async fn neighbors(
        &self,
        coords: EquatorialCoords,
        radius_deg: f64,
    ) -> Result<Vec<GalaxyNeighbor>, ServiceError>;
}

#[async_trait]
pub trait BibliographicArchive: Send + Sync {
    /// Publications referencing any of the given aliases. May contain
    /// duplicate bibcodes across aliases; callers deduplicate.
    async fn search(&self, aliases: &[String]) -> Result<Vec<BiblioDoc>, ServiceError>;
}
