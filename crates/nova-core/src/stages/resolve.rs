//! Stage 1: resolve a candidate name against the astronomical
//! name-resolution service.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::StageError;
use crate::services::{NameResolver, ResolverMatch};
use crate::types::{normalize_name, EquatorialCoords, ResolutionConfidence, ResolvedMetadata};

/// Resolve a candidate name to canonical metadata.
///
/// Read-only. Ambiguity is not an error: when several matches exist and no
/// single exact name match disambiguates them, the first match is returned
/// flagged `Ambiguous` and downstream policy decides what to do with it.
pub async fn resolve(
    resolver: &dyn NameResolver,
    candidate_name: &str,
) -> Result<ResolvedMetadata, StageError> {
    let name = candidate_name.trim();
    if name.is_empty() {
        return Err(StageError::Permanent("candidate name is empty".to_string()));
    }

    debug!(candidate = name, "querying name-resolution service");
    let matches = resolver.lookup(name).await?;

    if matches.is_empty() {
        return Err(StageError::NotFound(format!(
            "no resolution for candidate '{name}'"
        )));
    }

    let (selected, confidence) = select_match(&matches, name);
    Ok(build_metadata(name, selected, confidence))
}

/// Pick one match. A lone match wins outright; among several, exactly one
/// exact case-insensitive name match wins, anything else is ambiguous.
fn select_match<'a>(
    matches: &'a [ResolverMatch],
    name: &str,
) -> (&'a ResolverMatch, ResolutionConfidence) {
    if matches.len() == 1 {
        return (&matches[0], ResolutionConfidence::Unique);
    }

    let mut exact = matches.iter().filter(|m| m.main_id.eq_ignore_ascii_case(name));
    match (exact.next(), exact.next()) {
        (Some(single), None) => (single, ResolutionConfidence::Unique),
        _ => (
            &matches[0],
            ResolutionConfidence::Ambiguous {
                matches: matches.len(),
            },
        ),
    }
}

fn build_metadata(
    input_name: &str,
    selected: &ResolverMatch,
    confidence: ResolutionConfidence,
) -> ResolvedMetadata {
    // Missing RA or Dec stays an explicit absence; never substitute zeroes.
    let coords = match (selected.ra_deg, selected.dec_deg) {
        (Some(ra_deg), Some(dec_deg)) => Some(EquatorialCoords { ra_deg, dec_deg }),
        _ => None,
    };

    let mut aliases: Vec<String> = Vec::new();
    add_alias(&mut aliases, &selected.main_id);
    for identifier in &selected.identifiers {
        add_alias(&mut aliases, identifier);
    }
    add_alias(&mut aliases, input_name);

    let mut cross_identifiers = BTreeMap::new();
    for identifier in &selected.identifiers {
        if let Some((catalog, id)) = split_catalog_identifier(identifier) {
            cross_identifiers.entry(catalog).or_insert(id);
        }
    }

    ResolvedMetadata {
        canonical_name: selected.main_id.clone(),
        name_norm: normalize_name(&selected.main_id),
        coords,
        epoch: selected.epoch.clone(),
        object_types: selected.object_types.clone(),
        cross_identifiers,
        aliases,
        confidence,
    }
}

/// Append with whitespace collapsed, deduplicated case-insensitively while
/// preserving first-seen order.
fn add_alias(aliases: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return;
    }
    let lowered = collapsed.to_lowercase();
    if aliases.iter().any(|a| a.to_lowercase() == lowered) {
        return;
    }
    aliases.push(collapsed);
}

/// Split `"Gaia DR3 40564401..."` into `("Gaia", "DR3 40564401...")`. The
/// catalog name is the leading token; identifiers without a separable tail
/// are skipped.
fn split_catalog_identifier(identifier: &str) -> Option<(String, String)> {
    let trimmed = identifier.trim();
    let (catalog, rest) = trimmed.split_once(' ')?;
    let rest = rest.trim();
    if catalog.is_empty() || rest.is_empty() {
        return None;
    }
    Some((catalog.to_string(), rest.to_string()))
}
