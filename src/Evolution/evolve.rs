//! # Newton-Raphson driver
//!
//! One implicit-Euler step of a zone over its timestep `dt`:
//!
//! `(J + 1/dt) dY = F(Y) - (Y - Y_old)/dt`,  `Y <- Y + dY`
//!
//! iterated until the correction is small. `J` and `F` are rebuilt from the current abundances at
//! every iteration; the evolution network is not limited inside the loop.
//!
//! Failures:
//! - the iteration cap without convergence gives `NonConvergence`
//! - when `large negative abundances threshold` is set, an unconverged iterate with an abundance
//!   below `-threshold` gives `NegativeAbundance`. Negative values smaller than the threshold are
//!   set to zero.
use crate::Evolution::nse_plus_weak::evolve_nse_plus_weak_rates;
use crate::LinearSystem::matrix_builder::get_evolution_matrix_and_vector;
use crate::LinearSystem::matrix_solver::solve_matrix_for_zone;
use crate::Network::net_view::NetView;
use crate::Zone::evolution_settings::{ConvergenceMetric, NewtonSettings};
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::{S_EVOLVE_NSE_PLUS_WEAK_RATES, S_LARGE_NEG_ABUND_THRESHOLD};
use crate::errors::EvolutionError;
use log::debug;
use nalgebra::DVector;

/// allowed deviation of the mass-fraction sum from 1 in the default safety check
pub const D_X_EPS: f64 = 1.0e-8;

/// Evolves the zone over `dt` and returns the number of Newton iterations used. The net change of
/// the abundances over the step is stored as the zone's abundance changes.
pub fn evolve(zone: &mut Zone) -> Result<usize, EvolutionError> {
    if zone.properties.is_flag_set(S_EVOLVE_NSE_PLUS_WEAK_RATES) {
        evolve_nse_plus_weak_rates(zone)?;
        return Ok(1);
    }
    let settings = NewtonSettings::from_properties(&zone.properties)?;
    let dt = zone.dt()?;
    if !(dt > 0.0) {
        return Err(EvolutionError::InvalidProperty {
            name: "dt".to_string(),
            value: dt.to_string(),
        });
    }
    let y_old = zone.abundances().clone();
    let mut metric = f64::INFINITY;

    for iteration in 1..=settings.max_iterations {
        let (mut matrix, flow) = get_evolution_matrix_and_vector(zone)?;
        let view = zone.evolution_view();
        matrix.add_to_diagonal(1.0 / dt);
        let accumulated = view.gather(&(zone.abundances() - &y_old)) / dt;
        let dy = solve_matrix_for_zone(zone, matrix, flow - accumulated)?;

        metric = check_matrix_solution(zone, &view, &dy, &settings);
        zone.add_to_abundances_in_view(&view, &dy);
        debug!(
            "zone {}: Newton iteration {} metric {:.3e}",
            zone.label(),
            iteration,
            metric
        );

        if metric < settings.tolerance {
            let changes = zone.abundances() - &y_old;
            zone.update_abundance_changes(changes);
            return Ok(iteration);
        }
        if let Some(threshold) = settings.large_negative_threshold {
            clean_negative_abundances(zone, threshold)?;
        }
    }
    Err(EvolutionError::NonConvergence {
        iterations: settings.max_iterations,
        metric,
    })
}

/// size of a Newton correction, measured against the abundances it will be added to
pub fn check_matrix_solution(
    zone: &Zone,
    view: &NetView,
    dy: &DVector<f64>,
    settings: &NewtonSettings,
) -> f64 {
    let y = zone.abundances();
    let nuc = &zone.network().nuc;
    match settings.metric {
        ConvergenceMetric::Abundance => view
            .species()
            .iter()
            .enumerate()
            .filter(|&(_, &i)| y[i] > settings.significance_floor)
            .map(|(pos, &i)| (dy[pos] / y[i]).abs())
            .fold(0.0, f64::max),
        ConvergenceMetric::MassFraction => view
            .species()
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let a = nuc.get(i).map(|s| s.a as f64).unwrap_or(0.0);
                (a * dy[pos]).powi(2)
            })
            .sum::<f64>()
            .sqrt(),
    }
}

/// Sets negative abundances above `-threshold` to zero; the first one below is an error.
pub fn clean_negative_abundances(zone: &mut Zone, threshold: f64) -> Result<(), EvolutionError> {
    let network = std::sync::Arc::clone(zone.network());
    for (i, y) in zone.abundances_mut().iter_mut().enumerate() {
        if *y >= 0.0 {
            continue;
        }
        if y.abs() < threshold {
            *y = 0.0;
        } else {
            return Err(EvolutionError::NegativeAbundance {
                species: network
                    .nuc
                    .get(i)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| i.to_string()),
                abundance: *y,
            });
        }
    }
    Ok(())
}

/// true when no abundance is below minus the zone's negative threshold (0 when unset)
pub fn is_nonneg_abunds(zone: &mut Zone) -> bool {
    let threshold = zone
        .properties
        .get_optional_f64(S_LARGE_NEG_ABUND_THRESHOLD)
        .ok()
        .flatten()
        .unwrap_or(0.0);
    clean_negative_abundances(zone, threshold).is_ok()
}

/// mass fractions sum to 1 within `D_X_EPS`, or no abundance is unacceptably negative
pub fn default_safety_check(zone: &mut Zone) -> bool {
    (1.0 - zone.compute_a_moment(1)).abs() < D_X_EPS || is_nonneg_abunds(zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::{cno_like_network, two_species_network};
    use crate::Zone::zone_properties::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn toy_zone(kf: f64, kr: f64, y: [f64; 2], dt: f64) -> Zone {
        let mut zone = Zone::new("toy", Arc::new(two_species_network(kf, kr)));
        zone.update_abundances(DVector::from_vec(y.to_vec())).unwrap();
        zone.properties.update_property(S_T9, 1.0);
        zone.properties.update_property(S_RHO, 1.0);
        zone.properties.update_property(S_DTIME, dt);
        zone
    }

    #[test]
    fn test_single_step_solves_implicit_euler() {
        // linear network: one Newton iteration is exact, the second one certifies it
        let mut zone = toy_zone(2.0, 1.0, [1.0 / 12.0, 0.0], 0.1);
        let iterations = evolve(&mut zone).unwrap();
        assert!(iterations <= 3);
        // (1 + kf dt) Ya - kr dt Yb = Ya0, Ya + Yb = Ya0
        let ya0 = 1.0 / 12.0;
        let ya = ya0 * (1.0 + 0.1) / (1.0 + 0.2 + 0.1);
        assert_relative_eq!(zone.abundances()[0], ya, max_relative = 1e-8);
        assert_relative_eq!(zone.abundance_changes()[0], ya - ya0, max_relative = 1e-7);
    }

    #[test]
    fn test_equilibrium_ratio_is_independent_of_the_start() {
        for start in [[1.0 / 12.0, 0.0], [0.5 / 12.0, 0.5 / 12.0]] {
            let mut zone = toy_zone(3.0, 1.0, start, 0.05);
            let mass = zone.compute_a_moment(1);
            for _ in 0..200 {
                evolve(&mut zone).unwrap();
                let dt = zone.dt().unwrap();
                zone.properties.update_property(S_DTIME, dt * 1.1);
            }
            let y = zone.abundances();
            assert_relative_eq!(y[1] / y[0], 3.0, max_relative = 1e-6);
            assert_relative_eq!(zone.compute_a_moment(1), mass, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_mass_conservation_on_a_nonlinear_network() {
        let mut zone = Zone::new("cno", Arc::new(cno_like_network()));
        zone.set_mass_fraction("h1", 0.7).unwrap();
        zone.set_mass_fraction("he4", 0.28).unwrap();
        zone.set_mass_fraction("c12", 0.02).unwrap();
        zone.properties.update_property(S_T9, 0.5);
        zone.properties.update_property(S_RHO, 100.0);
        zone.properties.update_property(S_DTIME, 1e-3);
        zone.properties.update_property(S_NEWTON_RAPHSON_CONVERGE, 1e-10);
        let before = zone.compute_a_moment(1);
        let iterations = evolve(&mut zone).unwrap();
        assert!(iterations > 1);
        assert_relative_eq!(zone.compute_a_moment(1), before, max_relative = 1e-8);
    }

    #[test]
    fn test_pinned_species_reaches_target() {
        let mut zone = toy_zone(2.0, 1.0, [1.0 / 12.0, 0.0], 0.1);
        zone.properties.update_property(S_SPECIFIC_SPECIES, "n12");
        zone.properties.update_property(S_SPECIFIC_ABUNDANCE, 0.01);
        evolve(&mut zone).unwrap();
        assert_relative_eq!(zone.get_abundance("n12").unwrap(), 0.01, epsilon = 1e-14);
    }

    #[test]
    fn test_non_convergence_is_reported() {
        let mut zone = Zone::new("cno", Arc::new(cno_like_network()));
        zone.set_mass_fraction("h1", 0.7).unwrap();
        zone.set_mass_fraction("c12", 0.3).unwrap();
        zone.properties.update_property(S_T9, 0.5);
        zone.properties.update_property(S_RHO, 1e4);
        zone.properties.update_property(S_DTIME, 10.0);
        zone.properties.update_property(S_NEWTON_RAPHSON_MAX_ITERATIONS, 1usize);
        assert!(matches!(
            evolve(&mut zone),
            Err(EvolutionError::NonConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_negative_abundance_cleanup() {
        let mut zone = toy_zone(1.0, 1.0, [-1e-20, -1e-3], 0.1);
        // without a threshold every negative value is rejected
        assert!(!is_nonneg_abunds(&mut zone));
        assert_eq!(zone.abundances()[0], -1e-20);
        zone.properties.update_property(S_LARGE_NEG_ABUND_THRESHOLD, 1e-10);
        assert!(!is_nonneg_abunds(&mut zone));
        // the small negative value was zeroed before the large one was found
        assert_eq!(zone.abundances()[0], 0.0);
        zone.properties.update_property(S_LARGE_NEG_ABUND_THRESHOLD, 1e-2);
        assert!(is_nonneg_abunds(&mut zone));
        assert_eq!(zone.abundances()[1], 0.0);
        let err = clean_negative_abundances(
            &mut toy_zone(1.0, 1.0, [0.0, -1.0], 0.1),
            1e-2,
        )
        .unwrap_err();
        assert!(err.is_recoverable_by_smaller_step());
    }

    #[test]
    fn test_metrics() {
        let zone = toy_zone(1.0, 1.0, [0.5, 1e-12], 0.1);
        let view = zone.evolution_view();
        let dy = DVector::from_vec(vec![0.05, 1.0]);
        let mut settings = NewtonSettings::from_properties(&zone.properties).unwrap();
        // n12 is below the significance floor
        assert_relative_eq!(check_matrix_solution(&zone, &view, &dy, &settings), 0.1);
        settings.metric = ConvergenceMetric::MassFraction;
        assert_relative_eq!(
            check_matrix_solution(&zone, &view, &dy, &settings),
            (0.6f64.powi(2) + 12.0f64.powi(2)).sqrt()
        );
    }
}
