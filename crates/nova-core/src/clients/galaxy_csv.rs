//! Galaxy catalog backed by a local CSV reference file.
//!
//! Expected columns: `Primary_Name`, `RA_deg`, `DEC_deg`, and optionally
//! `Distance_Mpc`. Malformed rows are skipped; an empty catalog is an error.

use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::services::{GalaxyCatalog, GalaxyNeighbor, ServiceError};
use crate::stages::host::angular_separation_deg;
use crate::types::EquatorialCoords;

#[derive(Debug, Deserialize)]
struct GalaxyRow {
    #[serde(rename = "Primary_Name")]
    primary_name: String,
    #[serde(rename = "RA_deg")]
    ra_deg: f64,
    #[serde(rename = "DEC_deg")]
    dec_deg: f64,
    #[serde(rename = "Distance_Mpc", default)]
    distance_mpc: Option<f64>,
}

#[derive(Debug, Clone)]
struct GalaxyEntry {
    name: String,
    coords: EquatorialCoords,
    distance_mpc: Option<f64>,
}

#[derive(Debug)]
pub struct CsvGalaxyCatalog {
    galaxies: Vec<GalaxyEntry>,
}

impl CsvGalaxyCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open galaxy catalog {}", path.display()))?;

        let mut galaxies = Vec::new();
        for result in reader.deserialize::<GalaxyRow>() {
            let Ok(row) = result else {
                continue;
            };
            let name = row.primary_name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            galaxies.push(GalaxyEntry {
                name,
                coords: EquatorialCoords::new(row.ra_deg, row.dec_deg),
                distance_mpc: row.distance_mpc,
            });
        }

        if galaxies.is_empty() {
            bail!("galaxy catalog {} is empty or malformed", path.display());
        }
        Ok(Self { galaxies })
    }

    pub fn len(&self) -> usize {
        self.galaxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.galaxies.is_empty()
    }
}

#[async_trait]
impl GalaxyCatalog for CsvGalaxyCatalog {
    async fn neighbors(
        &self,
        coords: EquatorialCoords,
        radius_deg: f64,
    ) -> Result<Vec<GalaxyNeighbor>, ServiceError> {
        let mut neighbors: Vec<GalaxyNeighbor> = self
            .galaxies
            .iter()
            .filter_map(|galaxy| {
                let separation_deg = angular_separation_deg(coords, galaxy.coords);
                (separation_deg <= radius_deg).then(|| GalaxyNeighbor {
                    galaxy_id: galaxy.name.clone(),
                    separation_deg,
                    distance_mpc: galaxy.distance_mpc,
                })
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.separation_deg
                .partial_cmp(&b.separation_deg)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(neighbors)
    }
}
