//! Rates, Jacobian and flow vector of the evolution network of a zone.
//!
//! For a reaction r with nuclide reactants R and products P the net flow is
//! `F_r = lf_r * prod_{i in R} Y_i - lr_r * prod_{j in P} Y_j`
//! and `dY_k/dt = sum_r nu_kr F_r`, with nu_kr the number of times k appears among the products
//! minus the number of times it appears among the reactants. The rate coefficients include the
//! density factor and the division by the duplicate factor:
//! `lf = k_f(T9) rho^(|R|-1) / dup(R)`, and the same over the products for `lr`.
//!
//! The Jacobian returned is `-d(dY/dt)/dY` over the species of the evolution view, so the Newton
//! matrix of implicit Euler is this matrix with 1/dt added to the diagonal.
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::Network::net_view::{NetView, Network};
use crate::Network::reaction::Reaction;
use crate::Zone::nuc_zone::Zone;
use crate::errors::EvolutionError;
use nalgebra::DVector;

pub trait RatePhysics {
    /// fills the zone's rate table for the reactions of its evolution view
    fn compute_rates(&self, zone: &mut Zone, t9: f64, rho: f64) -> Result<(), EvolutionError>;
    fn compute_jacobian_matrix(&self, zone: &Zone) -> Result<SparseMatrix, EvolutionError>;
    fn compute_flow_vector(&self, zone: &Zone) -> Result<DVector<f64>, EvolutionError>;
}

/// mass-action kinetics with the rate laws stored on the reactions
#[derive(Debug, Clone, Copy, Default)]
pub struct MassActionRates;

/// network indices of the nuclide reactants and products of a reaction, with repetitions
fn nuclide_indices(
    network: &Network,
    reaction: &Reaction,
) -> Result<(Vec<usize>, Vec<usize>), EvolutionError> {
    let lookup = |name: &String| {
        network
            .nuc
            .index_of(name)
            .ok_or_else(|| EvolutionError::SpeciesNotFound(name.clone()))
    };
    let reactants = reaction
        .nuclide_reactants()
        .map(lookup)
        .collect::<Result<Vec<_>, _>>()?;
    let products = reaction
        .nuclide_products()
        .map(lookup)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((reactants, products))
}

/// sum over the occurrences m of d(prod_l Y_l)/dY_{idx[m]}, as (species, derivative) pairs
fn product_derivatives(indices: &[usize], y: &DVector<f64>) -> Vec<(usize, f64)> {
    (0..indices.len())
        .map(|m| {
            let d: f64 = indices
                .iter()
                .enumerate()
                .filter(|(l, _)| *l != m)
                .map(|(_, &i)| y[i])
                .product();
            (indices[m], d)
        })
        .collect()
}

fn product_of(indices: &[usize], y: &DVector<f64>) -> f64 {
    indices.iter().map(|&i| y[i]).product()
}

impl MassActionRates {
    fn view_and_network(zone: &Zone) -> (std::sync::Arc<NetView>, &Network) {
        (zone.evolution_view(), zone.network().as_ref())
    }
}

impl RatePhysics for MassActionRates {
    fn compute_rates(&self, zone: &mut Zone, t9: f64, rho: f64) -> Result<(), EvolutionError> {
        if t9 <= 0.0 || rho <= 0.0 {
            return Err(EvolutionError::Configuration(format!(
                "rates need positive T9 and density, got T9 = {}, rho = {}",
                t9, rho
            )));
        }
        let view = zone.evolution_view();
        let network = std::sync::Arc::clone(zone.network());
        for &r in view.reactions() {
            let reaction = &network.reactions()[r];
            let n_reactants = reaction.nuclide_reactants().count() as i32;
            let n_products = reaction.nuclide_products().count() as i32;
            let forward = reaction.forward.evaluate(t9) * rho.powi(n_reactants - 1)
                / reaction.reactant_duplicate_factor();
            let reverse = match &reaction.reverse {
                Some(law) => {
                    law.evaluate(t9) * rho.powi(n_products - 1) / reaction.product_duplicate_factor()
                }
                None => 0.0,
            };
            zone.rates_mut().update_rates_for_reaction(r, forward, reverse);
        }
        Ok(())
    }

    fn compute_jacobian_matrix(&self, zone: &Zone) -> Result<SparseMatrix, EvolutionError> {
        let (view, network) = Self::view_and_network(zone);
        let y = zone.abundances();
        let n = view.number_of_species();
        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        for &r in view.reactions() {
            let (reactants, products) = nuclide_indices(network, &network.reactions()[r])?;
            let (lf, lr) = zone.rates().get_rates_for_reaction(r);
            // dF_r/dY_k
            let mut d_flow: Vec<(usize, f64)> = product_derivatives(&reactants, y)
                .into_iter()
                .map(|(k, d)| (k, lf * d))
                .collect();
            d_flow.extend(
                product_derivatives(&products, y)
                    .into_iter()
                    .map(|(k, d)| (k, -lr * d)),
            );
            for &(k, d) in &d_flow {
                let Some(col) = view.position(k) else { continue };
                // -d(dY_i/dt)/dY_k = -nu_i dF/dY_k
                for &i in &reactants {
                    if let Some(row) = view.position(i) {
                        triplets.push((row, col, d));
                    }
                }
                for &j in &products {
                    if let Some(row) = view.position(j) {
                        triplets.push((row, col, -d));
                    }
                }
            }
        }
        Ok(SparseMatrix::from_triplets(n, n, &triplets))
    }

    fn compute_flow_vector(&self, zone: &Zone) -> Result<DVector<f64>, EvolutionError> {
        let (view, network) = Self::view_and_network(zone);
        let y = zone.abundances();
        let mut flow = DVector::zeros(view.number_of_species());
        for &r in view.reactions() {
            let (reactants, products) = nuclide_indices(network, &network.reactions()[r])?;
            let (lf, lr) = zone.rates().get_rates_for_reaction(r);
            let net = lf * product_of(&reactants, y) - lr * product_of(&products, y);
            for &i in &reactants {
                if let Some(pos) = view.position(i) {
                    flow[pos] -= net;
                }
            }
            for &j in &products {
                if let Some(pos) = view.position(j) {
                    flow[pos] += net;
                }
            }
        }
        Ok(flow)
    }
}

/// net flow of each reaction of the view, lf prod Y_R - lr prod Y_P
pub fn compute_reaction_flows(zone: &Zone) -> Result<Vec<(usize, f64)>, EvolutionError> {
    let view = zone.evolution_view();
    let network = zone.network();
    let y = zone.abundances();
    view.reactions()
        .iter()
        .map(|&r| {
            let (reactants, products) = nuclide_indices(network, &network.reactions()[r])?;
            let (lf, lr) = zone.rates().get_rates_for_reaction(r);
            Ok((r, lf * product_of(&reactants, y) - lr * product_of(&products, y)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::{cno_like_network, two_species_network};
    use crate::Network::reaction::RateLaw;
    use crate::Network::species::Species;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_two_species_flow_and_jacobian() {
        let mut zone = Zone::new("0", Arc::new(two_species_network(2.0, 1.0)));
        zone.update_abundances(DVector::from_vec(vec![0.06, 0.02]))
            .unwrap();
        let physics = MassActionRates;
        physics.compute_rates(&mut zone, 1.0, 1.0e5).unwrap();
        assert_eq!(zone.rates().get_rates_for_reaction(0), (2.0, 1.0));
        let f = physics.compute_flow_vector(&zone).unwrap();
        // F = 2*0.06 - 1*0.02 = 0.1
        assert_relative_eq!(f[0], -0.1, epsilon = 1e-15);
        assert_relative_eq!(f[1], 0.1, epsilon = 1e-15);
        let j = physics.compute_jacobian_matrix(&zone).unwrap().to_dense();
        assert_relative_eq!(j[(0, 0)], 2.0);
        assert_relative_eq!(j[(0, 1)], -1.0);
        assert_relative_eq!(j[(1, 0)], -2.0);
        assert_relative_eq!(j[(1, 1)], 1.0);
    }

    #[test]
    fn test_density_and_duplicate_factors() {
        let mut net = Network::new();
        net.add_species(Species::from_name("he4").unwrap());
        net.add_species(Species::from_name("c12").unwrap());
        net.add_reaction(
            Reaction::new("3a", &["he4", "he4", "he4"], &["c12", "gamma"], RateLaw::Constant(6.0))
                .with_reverse(RateLaw::Constant(3.0)),
        )
        .unwrap();
        let mut zone = Zone::new("0", Arc::new(net));
        zone.update_abundances(DVector::from_vec(vec![0.2, 0.01]))
            .unwrap();
        MassActionRates.compute_rates(&mut zone, 1.0, 10.0).unwrap();
        let (lf, lr) = zone.rates().get_rates_for_reaction(0);
        assert_relative_eq!(lf, 6.0 * 100.0 / 6.0);
        assert_relative_eq!(lr, 3.0);
        let f = MassActionRates.compute_flow_vector(&zone).unwrap();
        let net_flow = lf * 0.2f64.powi(3) - lr * 0.01;
        assert_relative_eq!(f[0], -3.0 * net_flow, epsilon = 1e-14);
        assert_relative_eq!(f[1], net_flow, epsilon = 1e-14);
        // d(Y^3)/dY = 3Y^2 and he4 appears three times among the reactants
        let j = MassActionRates.compute_jacobian_matrix(&zone).unwrap();
        assert_relative_eq!(j.get(0, 0), 9.0 * lf * 0.04, epsilon = 1e-12);
        assert_relative_eq!(j.get(1, 0), -3.0 * lf * 0.04, epsilon = 1e-12);
        assert_relative_eq!(j.get(0, 1), -3.0 * lr, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let mut zone = Zone::new("0", Arc::new(cno_like_network()));
        zone.update_abundances(DVector::from_vec(vec![0.7, 0.07, 1e-3, 2e-4, 3e-4, 1e-4, 5e-4]))
            .unwrap();
        MassActionRates.compute_rates(&mut zone, 0.5, 100.0).unwrap();
        let j = MassActionRates.compute_jacobian_matrix(&zone).unwrap().to_dense();
        let f0 = MassActionRates.compute_flow_vector(&zone).unwrap();
        for k in 0..7 {
            let h = 1e-7 * zone.abundances()[k];
            zone.abundances_mut()[k] += h;
            let f1 = MassActionRates.compute_flow_vector(&zone).unwrap();
            zone.abundances_mut()[k] -= h;
            for i in 0..7 {
                let fd = -(f1[i] - f0[i]) / h;
                assert_relative_eq!(j[(i, k)], fd, epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_non_positive_temperature_is_rejected() {
        let mut zone = Zone::new("0", Arc::new(two_species_network(1.0, 1.0)));
        assert!(MassActionRates.compute_rates(&mut zone, 0.0, 1.0).is_err());
    }
}
