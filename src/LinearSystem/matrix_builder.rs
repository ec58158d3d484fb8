//! # Linear-system builder
//!
//! Prepares the rates of the evolution network and asks the zone's rate physics for the Jacobian
//! and the flow vector. Preparation order:
//! 1. rate-data update hook
//! 2. rates at the zone's T9 and density
//! 3. screening hook, one factor per reaction applied to forward and reverse rates
//! 4. weak detailed balance, when the zone property `weak detailed balance` is set
//! 5. rate modification hook, or the default rate-modification views
//! 6. small rates zeroed, when `small rates threshold` is set
//!
//! Nothing is retried here; an error from any step goes straight back to the caller.
use crate::Evolution::network_limiter::zero_out_small_rates;
use crate::Evolution::rate_modifiers::{modify_rates, set_weak_detailed_balance};
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::{S_SMALL_RATES_THRESHOLD, S_WEAK_DETAILED_BALANCE};
use crate::errors::EvolutionError;
use log::debug;
use nalgebra::DVector;
use std::sync::Arc;

pub fn set_zone_for_evolution(zone: &mut Zone) -> Result<(), EvolutionError> {
    if let Some(update) = zone.hooks.rate_data_update.clone() {
        update(zone)?;
    }

    let (t9, rho) = (zone.t9()?, zone.rho()?);
    zone.physics().compute_rates(zone, t9, rho)?;

    if let Some(screening) = zone.hooks.screening.clone() {
        let view = zone.evolution_view();
        let network = Arc::clone(zone.network());
        let factors: Vec<(usize, f64)> = view
            .reactions()
            .iter()
            .map(|&r| (r, screening(&network.reactions()[r], zone)))
            .collect();
        for (r, factor) in factors {
            let (forward, reverse) = zone.rates().get_rates_for_reaction(r);
            zone.rates_mut()
                .update_rates_for_reaction(r, forward * factor, reverse * factor);
        }
    }

    if zone.properties.is_flag_set(S_WEAK_DETAILED_BALANCE) {
        set_weak_detailed_balance(zone)?;
    }

    match zone.hooks.rate_modification.clone() {
        Some(modification) => modification(zone)?,
        None => modify_rates(zone)?,
    }

    if let Some(threshold) = zone.properties.get_optional_f64(S_SMALL_RATES_THRESHOLD)? {
        zero_out_small_rates(zone, threshold);
    }
    Ok(())
}

/// freshly assembled Jacobian `-dYdot/dY` and flow vector over the evolution network
pub fn get_evolution_matrix_and_vector(
    zone: &mut Zone,
) -> Result<(SparseMatrix, DVector<f64>), EvolutionError> {
    set_zone_for_evolution(zone)?;
    let physics = zone.physics();
    let matrix = physics.compute_jacobian_matrix(zone)?;
    let flow = physics.compute_flow_vector(zone)?;
    debug!(
        "zone {}: evolution matrix {}x{} with {} nonzeros",
        zone.label(),
        matrix.nrows(),
        matrix.ncols(),
        matrix.nnz()
    );
    Ok((matrix, flow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Evolution::rate_modifiers::{K_B_MEV_PER_T9, RateModificationView};
    use crate::Examples::example_networks::two_species_network;
    use crate::Network::net_view::{NetSelector, Network};
    use crate::Network::reaction::{RateLaw, Reaction};
    use crate::Network::species::Species;
    use crate::Zone::zone_properties::S_TIME;
    use approx::assert_relative_eq;

    fn toy_zone(kf: f64, kr: f64) -> Zone {
        let mut zone = Zone::new("0", Arc::new(two_species_network(kf, kr)));
        zone.properties.update_property("t9", 1.0);
        zone.properties.update_property("rho", 1.0);
        zone.update_abundances(DVector::from_vec(vec![0.05, 0.03]))
            .unwrap();
        zone
    }

    #[test]
    fn test_hooks_run_in_order() {
        let mut zone = toy_zone(2.0, 1.0);
        zone.hooks.rate_data_update = Some(Arc::new(|z: &mut Zone| {
            z.properties.update_property(S_TIME, 1.0);
            Ok(())
        }));
        zone.hooks.screening = Some(Arc::new(|_: &Reaction, _: &Zone| 3.0));
        // the hook replaces the default modification views
        zone.rate_modification_views
            .push(RateModificationView::new("ignored", NetSelector::all(), 100.0));
        zone.hooks.rate_modification = Some(Arc::new(|z: &mut Zone| {
            let (f, r) = z.rates().get_rates_for_reaction(0);
            z.rates_mut().update_rates_for_reaction(0, f + 1.0, r);
            Ok(())
        }));
        set_zone_for_evolution(&mut zone).unwrap();
        assert!(zone.properties.has_property(S_TIME));
        assert_eq!(zone.rates().get_rates_for_reaction(0), (7.0, 3.0));
    }

    #[test]
    fn test_default_modification_and_small_rates() {
        let mut zone = toy_zone(2.0, 1.0);
        zone.rate_modification_views
            .push(RateModificationView::new("slow", NetSelector::all(), 1e-30));
        set_zone_for_evolution(&mut zone).unwrap();
        assert_relative_eq!(zone.rates().get_rates_for_reaction(0).0, 2e-30);
        zone.properties.update_property(S_SMALL_RATES_THRESHOLD, 1e-20);
        set_zone_for_evolution(&mut zone).unwrap();
        assert_eq!(zone.rates().get_rates_for_reaction(0), (0.0, 0.0));
    }

    #[test]
    fn test_weak_detailed_balance() {
        let mut net = Network::new();
        net.add_species(Species::from_name("n13").unwrap());
        net.add_species(Species::from_name("c13").unwrap());
        net.add_reaction(
            Reaction::new("n13 decay", &["n13"], &["c13", "positron", "neutrino_e"], RateLaw::Constant(1e-3))
                .with_q_value(2.22),
        )
        .unwrap();
        let mut zone = Zone::new("0", Arc::new(net));
        zone.properties.update_property("t9", 2.0);
        zone.properties.update_property("rho", 1.0);
        zone.properties.update_property(S_WEAK_DETAILED_BALANCE, "yes");
        set_zone_for_evolution(&mut zone).unwrap();
        let (forward, reverse) = zone.rates().get_rates_for_reaction(0);
        assert_relative_eq!(forward, 1e-3);
        assert_relative_eq!(reverse, 1e-3 * (-2.22 / (K_B_MEV_PER_T9 * 2.0)).exp(), epsilon = 1e-18);
    }

    #[test]
    fn test_matrix_and_vector() {
        let mut zone = toy_zone(2.0, 1.0);
        let (matrix, flow) = get_evolution_matrix_and_vector(&mut zone).unwrap();
        assert_eq!(matrix.nrows(), 2);
        // F = 2*0.05 - 0.03
        assert_relative_eq!(flow[1], 0.07, epsilon = 1e-15);
        assert_relative_eq!(matrix.get(0, 0), 2.0);
        zone.properties.remove_property("t9");
        assert!(matches!(
            get_evolution_matrix_and_vector(&mut zone),
            Err(EvolutionError::MissingProperty(_))
        ));
    }
}
