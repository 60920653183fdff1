//! SIMBAD name resolution over the TAP sync endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::classify_reqwest;
use crate::services::{NameResolver, ResolverMatch, ServiceError};

pub const DEFAULT_TAP_URL: &str = "https://simbad.cds.unistra.fr/simbad/sim-tap/sync";

/// SIMBAD reports ICRS coordinates at epoch J2000.
const COORDINATE_EPOCH: &str = "J2000";

pub struct SimbadTapResolver {
    http: reqwest::Client,
    endpoint: String,
}

impl SimbadTapResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build SIMBAD HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

/// TAP JSON response: column metadata plus row-major data.
#[derive(Debug, Deserialize)]
struct TapResponse {
    metadata: Vec<TapColumn>,
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct TapColumn {
    name: String,
}

impl TapResponse {
    fn column(&self, name: &str) -> Result<usize, ServiceError> {
        self.metadata
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ServiceError::Protocol(format!("TAP response missing column '{name}'")))
    }
}

fn adql_escape(name: &str) -> String {
    name.replace('\'', "''")
}

fn as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn as_f64(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

#[async_trait::async_trait]
impl NameResolver for SimbadTapResolver {
    async fn lookup(&self, name: &str) -> Result<Vec<ResolverMatch>, ServiceError> {
        let query = format!(
            "SELECT basic.main_id, basic.ra, basic.dec, basic.otype, ids.ids \
             FROM ident \
             JOIN basic ON ident.oidref = basic.oid \
             JOIN ids ON ids.oidref = basic.oid \
             WHERE ident.id = '{}'",
            adql_escape(name)
        );
        debug!(candidate = name, "SIMBAD TAP lookup");

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("request", "doQuery"),
                ("lang", "adql"),
                ("format", "json"),
                ("query", query.as_str()),
            ])
            .send()
            .await
            .map_err(|err| classify_reqwest("SIMBAD TAP request", err))?;

        let response = response
            .error_for_status()
            .map_err(|err| classify_reqwest("SIMBAD TAP status", err))?;

        let body: TapResponse = response
            .json()
            .await
            .map_err(|err| classify_reqwest("SIMBAD TAP body", err))?;

        let main_id_col = body.column("main_id")?;
        let ra_col = body.column("ra")?;
        let dec_col = body.column("dec")?;
        let otype_col = body.column("otype")?;
        let ids_col = body.column("ids")?;

        let mut matches = Vec::with_capacity(body.data.len());
        for row in &body.data {
            let Some(main_id) = row.get(main_id_col).and_then(as_string) else {
                return Err(ServiceError::Protocol(
                    "TAP row without a main identifier".to_string(),
                ));
            };
            let object_types = row
                .get(otype_col)
                .and_then(as_string)
                .map(|otype| vec![otype])
                .unwrap_or_default();
            // SIMBAD stores every identifier pipe-separated in ids.ids.
            let identifiers = row
                .get(ids_col)
                .and_then(as_string)
                .map(|ids| {
                    ids.split('|')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            matches.push(ResolverMatch {
                main_id,
                ra_deg: row.get(ra_col).and_then(as_f64),
                dec_deg: row.get(dec_col).and_then(as_f64),
                epoch: COORDINATE_EPOCH.to_string(),
                object_types,
                identifiers,
            });
        }
        Ok(matches)
    }
}
