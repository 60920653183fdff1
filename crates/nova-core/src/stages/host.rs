//! Stage 3: host-galaxy determination by widening spatial search.

use tracing::debug;

use crate::config::HostSearchPolicy;
use crate::error::StageError;
use crate::services::{GalaxyCatalog, GalaxyNeighbor};
use crate::types::{EquatorialCoords, HostGalaxyResult, HostMethod};

/// Determine the most probable host galaxy for a position.
///
/// Searches outward in geometrically widening shells; the first radius with
/// any neighbor decides the result. Finding nothing inside the maximum
/// radius yields `Undetermined`, which is a normal outcome, not a failure:
/// most Galactic novae have no identifiable external host.
pub async fn determine_host(
    catalog: &dyn GalaxyCatalog,
    coords: EquatorialCoords,
    aliases: &[String],
    policy: &HostSearchPolicy,
) -> Result<HostGalaxyResult, StageError> {
    let mut radius_deg = policy.initial_radius_deg.min(policy.max_radius_deg);

    loop {
        let neighbors = catalog.neighbors(coords, radius_deg).await?;
        if let Some(winner) = pick_neighbor(&neighbors, policy.tie_epsilon_deg) {
            let method = if name_matches(&winner.galaxy_id, aliases) {
                HostMethod::NameMatch
            } else {
                HostMethod::Positional
            };
            debug!(
                galaxy = %winner.galaxy_id,
                separation_deg = winner.separation_deg,
                radius_deg,
                "host galaxy determined"
            );
            return Ok(HostGalaxyResult::Determined {
                galaxy_id: winner.galaxy_id.clone(),
                separation_deg: winner.separation_deg,
                method,
            });
        }

        if radius_deg >= policy.max_radius_deg {
            break;
        }
        // A growth factor at or below 1.0 (or a zero initial radius) would
        // otherwise loop on the same shell forever.
        let next = (radius_deg * policy.growth_factor).min(policy.max_radius_deg);
        if next <= radius_deg {
            break;
        }
        radius_deg = next;
    }

    Ok(HostGalaxyResult::Undetermined {
        reason: format!(
            "no galaxy within {:.4} deg of ra={:.4}, dec={:.4}",
            policy.max_radius_deg, coords.ra_deg, coords.dec_deg
        ),
    })
}

/// Minimum separation wins; separations within `epsilon` of each other
/// count as ties, broken in favor of a neighbor with a cataloged distance.
fn pick_neighbor(neighbors: &[GalaxyNeighbor], epsilon: f64) -> Option<&GalaxyNeighbor> {
    let mut best = neighbors.first()?;
    for candidate in &neighbors[1..] {
        if candidate.separation_deg + epsilon < best.separation_deg {
            best = candidate;
        } else if (candidate.separation_deg - best.separation_deg).abs() <= epsilon
            && candidate.distance_mpc.is_some()
            && best.distance_mpc.is_none()
        {
            best = candidate;
        }
    }
    Some(best)
}

/// True when the galaxy's normalized name appears inside any alias.
fn name_matches(galaxy_id: &str, aliases: &[String]) -> bool {
    let galaxy_norm = normalize(galaxy_id);
    if galaxy_norm.is_empty() {
        return false;
    }
    aliases
        .iter()
        .any(|alias| normalize(alias).contains(&galaxy_norm))
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Great-circle angular separation in degrees (haversine form, stable for
/// small separations).
pub fn angular_separation_deg(a: EquatorialCoords, b: EquatorialCoords) -> f64 {
    let ra_a = a.ra_deg.to_radians();
    let dec_a = a.dec_deg.to_radians();
    let ra_b = b.ra_deg.to_radians();
    let dec_b = b.dec_deg.to_radians();

    let sin_ddec = ((dec_b - dec_a) / 2.0).sin();
    let sin_dra = ((ra_b - ra_a) / 2.0).sin();
    let h = sin_ddec * sin_ddec + dec_a.cos() * dec_b.cos() * sin_dra * sin_dra;
    2.0 * h.sqrt().clamp(-1.0, 1.0).asin().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separation_zero_for_same_point() {
        let p = EquatorialCoords::new(270.1, -32.8);
        assert!(angular_separation_deg(p, p) < 1e-12);
    }

    #[test]
    fn separation_handles_ra_wraparound() {
        let a = EquatorialCoords::new(359.5, 0.0);
        let b = EquatorialCoords::new(0.5, 0.0);
        let sep = angular_separation_deg(a, b);
        assert!((sep - 1.0).abs() < 1e-9, "got {sep}");
    }

    #[test]
    fn separation_one_degree_in_dec() {
        let a = EquatorialCoords::new(10.0, 20.0);
        let b = EquatorialCoords::new(10.0, 21.0);
        let sep = angular_separation_deg(a, b);
        assert!((sep - 1.0).abs() < 1e-9, "got {sep}");
    }
}
