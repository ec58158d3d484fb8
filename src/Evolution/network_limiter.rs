//! # Network limiter
//!
//! Shrinks the evolution network between timesteps. Starting from the zone's base view, a reaction
//! survives when all its nuclide reactants or all its nuclide products have abundances at or above
//! the cutoff. Species of the base view that no surviving reaction touches and whose abundance is
//! below the cutoff are set to exactly zero; isolated species with a meaningful abundance keep it.
//! The species set of the view is never reduced, so the linear system keeps its dimension and
//! every retained species is either reachable or explicitly zeroed.
//!
//! The limiter only ever looks at the base view and the abundances, so applying it twice with the
//! same cutoff gives the same view.
use crate::Network::net_view::{NetSelector, NetView, Network};
use crate::Network::reaction::Reaction;
use crate::Zone::nuc_zone::Zone;
use crate::errors::EvolutionError;
use log::debug;
use nalgebra::DVector;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_ABUNDANCE_CUTOFF: f64 = 1.0e-25;

pub fn limit_evolution_network(zone: &mut Zone) -> Result<(), EvolutionError> {
    limit_evolution_network_with_cutoff(zone, DEFAULT_ABUNDANCE_CUTOFF)
}

pub fn limit_evolution_network_with_cutoff(
    zone: &mut Zone,
    cutoff: f64,
) -> Result<(), EvolutionError> {
    let base = zone.base_view();
    let network = Arc::clone(zone.network());
    let y = zone.abundances();

    let removed: HashSet<usize> = base
        .reactions()
        .iter()
        .copied()
        .filter(|&r| !is_reaction_active(&network, &base, &network.reactions()[r], y, cutoff))
        .collect();
    let reduced = base.without_reactions(&removed);

    let touched = touched_species(&network, &reduced);
    let zeroed: Vec<usize> = reduced
        .species()
        .iter()
        .copied()
        .filter(|&i| !touched.contains(&i) && y[i] < cutoff)
        .collect();
    for &i in &zeroed {
        zone.abundances_mut()[i] = 0.0;
    }
    debug!(
        "zone {}: evolution network has {} of {} reactions, {} isolated species zeroed",
        zone.label(),
        reduced.number_of_reactions(),
        base.number_of_reactions(),
        zeroed.len()
    );
    zone.set_evolution_view(reduced);
    Ok(())
}

/// false for reactions with a nuclide outside the view or with both sides depleted
fn is_reaction_active(
    network: &Network,
    view: &NetView,
    reaction: &Reaction,
    y: &DVector<f64>,
    cutoff: f64,
) -> bool {
    let reactants = side_above_cutoff(reaction.nuclide_reactants(), network, view, y, cutoff);
    let products = side_above_cutoff(reaction.nuclide_products(), network, view, y, cutoff);
    match (reactants, products) {
        (Some(reactants), Some(products)) => reactants || products,
        _ => false,
    }
}

/// None when a species is missing from the view
fn side_above_cutoff<'a>(
    mut names: impl Iterator<Item = &'a String>,
    network: &Network,
    view: &NetView,
    y: &DVector<f64>,
    cutoff: f64,
) -> Option<bool> {
    names.try_fold(true, |all, name| {
        let i = network
            .nuc
            .index_of(name)
            .filter(|&i| view.contains_species(i))?;
        Some(all && y[i] >= cutoff)
    })
}

fn touched_species(network: &Network, view: &NetView) -> HashSet<usize> {
    view.reactions()
        .iter()
        .flat_map(|&r| network.reactions()[r].nuclides())
        .filter_map(|name| network.nuc.index_of(name))
        .collect()
}

/// zeroes forward and reverse rates of evolution reactions whose rates are both below `threshold`
pub fn zero_out_small_rates(zone: &mut Zone, threshold: f64) {
    let view = zone.evolution_view();
    let mut count = 0;
    for &r in view.reactions() {
        let (forward, reverse) = zone.rates().get_rates_for_reaction(r);
        if forward < threshold && reverse < threshold {
            zone.rates_mut().update_rates_for_reaction(r, 0.0, 0.0);
            count += 1;
        }
    }
    debug!("zone {}: {} small rates zeroed", zone.label(), count);
}

/// sets abundances with |Y| below `threshold` to zero
pub fn zero_out_small_abundances(zone: &mut Zone, threshold: f64) {
    for y in zone.abundances_mut().iter_mut() {
        if y.abs() < threshold {
            *y = 0.0;
        }
    }
}

/// names of the species of the selected view that no selected reaction touches
pub fn get_isolated_species(network: &Network, selector: &NetSelector) -> Vec<String> {
    let view = NetView::new(network, selector);
    let touched = touched_species(network, &view);
    view.species()
        .iter()
        .filter(|i| !touched.contains(i))
        .filter_map(|&i| network.nuc.get(i).map(|s| s.name.clone()))
        .collect()
}
