//! Independent zones evolved on the rayon pool. Each zone owns its whole state, so the only shared
//! data are the immutable networks behind `Arc`. One result per zone, in input order.
use crate::Evolution::evolve_zone::{EvolveZoneSummary, ThermoHistory, evolve_zone, evolve_zone_with_history};
use crate::errors::EvolutionError;
use crate::Zone::nuc_zone::Zone;
use log::{info, warn};
use rayon::prelude::*;

pub fn evolve_zones(zones: &mut [Zone], t_end: f64) -> Vec<Result<EvolveZoneSummary, EvolutionError>> {
    let results: Vec<_> = zones
        .par_iter_mut()
        .map(|zone| evolve_zone(zone, t_end))
        .collect();
    log_outcome(&results);
    results
}

/// every zone follows the same history
pub fn evolve_zones_with_history(
    zones: &mut [Zone],
    history: &ThermoHistory,
    t_end: f64,
) -> Vec<Result<EvolveZoneSummary, EvolutionError>> {
    let results: Vec<_> = zones
        .par_iter_mut()
        .map(|zone| evolve_zone_with_history(zone, history, t_end))
        .collect();
    log_outcome(&results);
    results
}

fn log_outcome(results: &[Result<EvolveZoneSummary, EvolutionError>]) {
    let failed = results.iter().filter(|r| r.is_err()).count();
    for e in results.iter().filter_map(|r| r.as_ref().err()) {
        warn!("{}", e);
    }
    info!(
        "{} zones evolved, {} failed",
        results.len() - failed,
        failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::two_species_network;
    use crate::Zone::zone_properties::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_failing_zone_does_not_stop_the_others() {
        let network = Arc::new(two_species_network(2.0, 1.0));
        let mut zones: Vec<Zone> = (0..4)
            .map(|k| {
                let mut zone = Zone::new(&format!("z{}", k), Arc::clone(&network));
                zone.set_mass_fraction("c12", 1.0).unwrap();
                zone.properties.update_property(S_T9_0, 1.0 + k as f64);
                zone.properties.update_property(S_RHO_0, 1.0);
                zone.properties.update_property(S_TAU, 1.0);
                zone
            })
            .collect();
        // no mass to normalize
        zones[2].set_mass_fraction("c12", 0.0).unwrap();
        let results = evolve_zones(&mut zones, 2.0);
        assert_eq!(results.len(), 4);
        for (k, r) in results.iter().enumerate() {
            if k == 2 {
                assert!(matches!(r, Err(EvolutionError::ZoneFailure { zone, .. }) if zone == "z2"));
            } else {
                let summary = r.as_ref().unwrap();
                assert_eq!(summary.label, format!("z{}", k));
                assert_relative_eq!(summary.final_time, 2.0, epsilon = 1e-12);
            }
        }
        // constant rates: every healthy zone ends in the same state
        assert_relative_eq!(zones[0].abundances(), zones[3].abundances(), epsilon = 1e-14);
    }
}
