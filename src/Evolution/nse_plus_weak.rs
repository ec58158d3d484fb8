//! NSE plus weak rates: at high temperature the strong reactions are fast enough to keep the zone
//! in statistical equilibrium and only the electron fraction evolves, through the weak reactions.
//! The step solves the implicit equation
//!
//! `(Ye - Ye_old)/dt - dYe/dt(Ye) = 0`
//!
//! for log10 Ye, where `dYe/dt` is evaluated on the equilibrium abundances at (T9, rho, Ye).
use crate::LinearSystem::matrix_builder::set_zone_for_evolution;
use crate::Network::rate_physics::compute_reaction_flows;
use crate::Utils::root_finding::compute_1d_root;
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::S_YE;
use crate::errors::EvolutionError;
use log::debug;
use std::sync::Arc;

/// bracketing factor around the starting log10 Ye
pub const YE_ROOT_BRACKET_FACTOR: f64 = 1.1;

/// `sum_r dZ_r F_r` over the weak reactions of the evolution network, with the rates already set
pub fn compute_yedot(zone: &Zone) -> Result<f64, EvolutionError> {
    let network = zone.network();
    let mut yedot = 0.0;
    for (r, flow) in compute_reaction_flows(zone)? {
        let dz = network.reactions()[r].charge_change(&network.nuc)?;
        if dz != 0 {
            yedot += dz as f64 * flow;
        }
    }
    Ok(yedot)
}

/// equilibrium abundances at `ye`, then the residual of the implicit Ye equation
fn ye_residual(zone: &mut Zone, ye: f64, ye_old: f64, dt: f64) -> Result<f64, EvolutionError> {
    let solver = zone.equilibrium.clone().ok_or_else(|| {
        EvolutionError::Configuration(format!(
            "zone {} evolves NSE plus weak rates without an equilibrium solver",
            zone.label()
        ))
    })?;
    let network = Arc::clone(zone.network());
    let abundances = solver.compute_equilibrium(&network, zone.t9()?, zone.rho()?, ye)?;
    zone.update_abundances(abundances)?;
    zone.properties.update_property(S_YE, ye);
    set_zone_for_evolution(zone)?;
    Ok((ye - ye_old) / dt - compute_yedot(zone)?)
}

pub fn evolve_nse_plus_weak_rates(zone: &mut Zone) -> Result<(), EvolutionError> {
    let dt = zone.dt()?;
    let y_old = zone.abundances().clone();
    let ye_old = zone.compute_z_moment(1);
    if !(ye_old > 0.0) {
        return Err(EvolutionError::Equilibrium(format!(
            "zone {} has electron fraction {}",
            zone.label(),
            ye_old
        )));
    }
    // Ye above 1 has no equilibrium; the residual is held at its Ye = 1 value there
    let mut residual =
        |log10_ye: f64| ye_residual(zone, 10f64.powf(log10_ye.min(0.0)), ye_old, dt);
    let root = compute_1d_root(&mut residual, ye_old.log10(), YE_ROOT_BRACKET_FACTOR)?;
    // leaves the zone at the root
    residual(root)?;
    debug!(
        "zone {}: NSE plus weak rates, Ye {:.8} -> {:.8}",
        zone.label(),
        ye_old,
        10f64.powf(root.min(0.0))
    );
    let changes = zone.abundances() - &y_old;
    zone.update_abundance_changes(changes);
    Ok(())
}
