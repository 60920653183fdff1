//! Stage 2: pure sanity checks on resolved metadata.
//!
//! No external calls and fully deterministic, so upstream retries can replay
//! through it safely.

use once_cell::sync::Lazy;

use crate::types::{RejectionReason, ResolutionConfidence, ResolvedMetadata, ValidationResult};

/// SIMBAD object-type codes that are mutually exclusive with a classical
/// nova (a stellar transient). A resolution carrying one of these points at
/// the wrong kind of object entirely.
static CONFLICTING_OBJECT_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "PN",  // planetary nebula
        "G",   // galaxy
        "GiG", // galaxy in group
        "QSO", // quasar
        "AGN", // active galactic nucleus
        "Cl*", // star cluster
        "SNR", // supernova remnant
    ]
});

/// Validate resolved metadata. Runs every check in order and rejects on the
/// first violation; acceptance clones the metadata through unchanged.
pub fn validate(meta: &ResolvedMetadata) -> ValidationResult {
    if let ResolutionConfidence::Ambiguous { matches } = meta.confidence {
        return ValidationResult::Rejected(RejectionReason::AmbiguousResolution { matches });
    }

    let Some(coords) = meta.coords else {
        return ValidationResult::Rejected(RejectionReason::MissingCoordinates);
    };

    if !coords.in_range() {
        return ValidationResult::Rejected(RejectionReason::CoordinatesOutOfRange {
            ra_deg: coords.ra_deg,
            dec_deg: coords.dec_deg,
        });
    }

    let conflicting = conflicting_object_types(&meta.object_types);
    if !conflicting.is_empty() {
        return ValidationResult::Rejected(RejectionReason::ConflictingObjectTypes { conflicting });
    }

    ValidationResult::Valid(meta.clone())
}

fn conflicting_object_types(object_types: &[String]) -> Vec<String> {
    object_types
        .iter()
        .filter(|otype| {
            CONFLICTING_OBJECT_TYPES
                .iter()
                .any(|conflict| otype.eq_ignore_ascii_case(conflict))
        })
        .cloned()
        .collect()
}
