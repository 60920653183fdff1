//! ADS bibliographic search client.
//!
//! Two queries per candidate: an `object:` field search for publications the
//! database tags as being about the object, and a `full:` alias-union search
//! for passing mentions. Stage 4 deduplicates the union by bibcode.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::classify_reqwest;
use crate::services::{BiblioDoc, BibliographicArchive, ServiceError};

pub const DEFAULT_API_URL: &str = "https://api.adsabs.harvard.edu/v1/search/query";

const FIELDS: &str = "bibcode,title,year,author";
const MAX_ROWS: u32 = 2000;

pub struct AdsArchive {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl AdsArchive {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ADS HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    async fn query(&self, q: &str, object_tagged: bool) -> Result<Vec<BiblioDoc>, ServiceError> {
        debug!(query = q, "ADS search");
        let rows = MAX_ROWS.to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(&self.token)
            .query(&[
                ("q", q),
                ("fl", FIELDS),
                ("rows", rows.as_str()),
                ("sort", "date asc"),
            ])
            .send()
            .await
            .map_err(|err| classify_reqwest("ADS request", err))?;

        if response.status().as_u16() == 401 {
            return Err(ServiceError::Protocol(
                "ADS unauthorized (check ADS token)".to_string(),
            ));
        }
        let response = response
            .error_for_status()
            .map_err(|err| classify_reqwest("ADS status", err))?;

        let body: AdsResponse = response
            .json()
            .await
            .map_err(|err| classify_reqwest("ADS body", err))?;

        Ok(body
            .response
            .docs
            .into_iter()
            .filter_map(|doc| doc.into_biblio(object_tagged))
            .collect())
    }
}

#[async_trait::async_trait]
impl BibliographicArchive for AdsArchive {
    async fn search(&self, aliases: &[String]) -> Result<Vec<BiblioDoc>, ServiceError> {
        let quoted = quote_aliases(aliases);
        if quoted.is_empty() {
            return Ok(Vec::new());
        }
        let joined = quoted.join(" OR ");

        let mut docs = self.query(&format!("object:({joined})"), true).await?;
        let mentions = self
            .query(&format!("full:({joined}) AND collection:astronomy"), false)
            .await?;
        docs.extend(mentions);
        Ok(docs)
    }
}

fn quote_aliases(aliases: &[String]) -> Vec<String> {
    aliases
        .iter()
        .filter_map(|alias| {
            let trimmed = alias.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(format!("\"{}\"", trimmed.replace('"', "\\\"")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AdsResponse {
    response: AdsDocs,
}

#[derive(Debug, Deserialize)]
struct AdsDocs {
    #[serde(default)]
    docs: Vec<AdsDoc>,
}

#[derive(Debug, Deserialize)]
struct AdsDoc {
    bibcode: Option<String>,
    /// ADS returns the title as a singleton list.
    title: Option<Vec<String>>,
    year: Option<String>,
    #[serde(default)]
    author: Vec<String>,
}

impl AdsDoc {
    fn into_biblio(self, object_tagged: bool) -> Option<BiblioDoc> {
        let bibcode = self.bibcode?;
        Some(BiblioDoc {
            bibcode,
            title: self
                .title
                .and_then(|titles| titles.into_iter().next())
                .unwrap_or_default(),
            year: self.year.and_then(|y| y.parse().ok()),
            authors: self.author,
            object_tagged,
        })
    }
}
