//! Test fixtures implementing the capability interfaces.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use nova_core::services::{
    BiblioDoc, BibliographicArchive, GalaxyCatalog, GalaxyNeighbor, NameResolver, ResolverMatch,
    ServiceError,
};
use nova_core::types::EquatorialCoords;

pub fn resolver_match(main_id: &str, ra_deg: f64, dec_deg: f64) -> ResolverMatch {
    ResolverMatch {
        main_id: main_id.to_string(),
        ra_deg: Some(ra_deg),
        dec_deg: Some(dec_deg),
        epoch: "J2000".to_string(),
        object_types: vec!["No*".to_string()],
        identifiers: Vec::new(),
    }
}

pub fn biblio_doc(bibcode: &str, tagged: bool) -> BiblioDoc {
    BiblioDoc {
        bibcode: bibcode.to_string(),
        title: format!("Publication {bibcode}"),
        year: Some(2012),
        authors: vec!["Finzell, T.".to_string(), "Chomiuk, L.".to_string()],
        object_tagged: tagged,
    }
}

/// Resolver returning a fixed match list.
pub struct StaticResolver {
    matches: Vec<ResolverMatch>,
    calls: AtomicU32,
}

impl StaticResolver {
    pub fn new(matches: Vec<ResolverMatch>) -> Self {
        Self {
            matches,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn lookup(&self, _name: &str) -> Result<Vec<ResolverMatch>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.clone())
    }
}

/// Resolver that always fails with the given error, counting attempts.
pub struct FailingResolver {
    error: ServiceError,
    calls: AtomicU32,
}

impl FailingResolver {
    pub fn new(error: ServiceError) -> Self {
        Self {
            error,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameResolver for FailingResolver {
    async fn lookup(&self, _name: &str) -> Result<Vec<ResolverMatch>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Resolver that never answers within any reasonable timeout.
pub struct StallingResolver {
    delay: Duration,
    calls: AtomicU32,
}

impl StallingResolver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameResolver for StallingResolver {
    async fn lookup(&self, _name: &str) -> Result<Vec<ResolverMatch>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

/// Catalog over a fixed neighbor set; `neighbors` filters by the requested
/// radius and records every radius it was asked about.
pub struct StaticCatalog {
    entries: Vec<GalaxyNeighbor>,
    radii: Mutex<Vec<f64>>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<GalaxyNeighbor>) -> Self {
        Self {
            entries,
            radii: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn requested_radii(&self) -> Vec<f64> {
        self.radii.lock().expect("radii lock").clone()
    }
}

#[async_trait]
impl GalaxyCatalog for StaticCatalog {
    async fn neighbors(
        &self,
        _coords: EquatorialCoords,
        radius_deg: f64,
    ) -> Result<Vec<GalaxyNeighbor>, ServiceError> {
        self.radii.lock().expect("radii lock").push(radius_deg);
        let mut found: Vec<GalaxyNeighbor> = self
            .entries
            .iter()
            .filter(|entry| entry.separation_deg <= radius_deg)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.separation_deg
                .partial_cmp(&b.separation_deg)
                .expect("finite separations")
        });
        Ok(found)
    }
}

/// Archive returning a fixed document list.
pub struct StaticArchive {
    docs: Vec<BiblioDoc>,
    calls: AtomicU32,
}

impl StaticArchive {
    pub fn new(docs: Vec<BiblioDoc>) -> Self {
        Self {
            docs,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BibliographicArchive for StaticArchive {
    async fn search(&self, _aliases: &[String]) -> Result<Vec<BiblioDoc>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.clone())
    }
}
