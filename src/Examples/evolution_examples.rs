use crate::errors::EvolutionError;
use log::error;

pub fn evolution_examples(task: usize) {
    if let Err(e) = run_example(task) {
        error!("example {} failed: {}", task, e);
    }
}

fn run_example(task: usize) -> Result<(), EvolutionError> {
    use crate::Examples::example_networks::*;
    use crate::Zone::nuc_zone::Zone;
    use crate::Zone::zone_properties::*;
    use nalgebra::DVector;
    use std::sync::Arc;

    match task {
        0 => {
            // A <-> B relaxes to Y(B)/Y(A) = kf/kr from any start
            use crate::Evolution::evolve::evolve;
            for start in [[1.0 / 12.0, 0.0], [0.5 / 12.0, 0.5 / 12.0]] {
                let mut zone = Zone::new("toy", Arc::new(two_species_network(3.0, 1.0)));
                zone.update_abundances(DVector::from_vec(start.to_vec()))?;
                zone.properties.update_property(S_T9, 1.0);
                zone.properties.update_property(S_RHO, 1.0);
                let mut dt = 0.01;
                for _ in 0..100 {
                    zone.properties.update_property(S_DTIME, dt);
                    evolve(&mut zone)?;
                    dt *= 1.1;
                }
                let y = zone.abundances();
                println!("start {:?}: Y(B)/Y(A) = {:.8}", start, y[1] / y[0]);
                zone.pretty_print_abundances(1e-30);
            }
        }
        1 => {
            // adaptive sub-steps over one long step of a CN-like network
            use crate::Evolution::safe_evolve::safe_evolve_default;
            let mut zone = Zone::new("cno", Arc::new(cno_like_network()));
            zone.set_mass_fraction("h1", 0.7)?;
            zone.set_mass_fraction("he4", 0.28)?;
            zone.set_mass_fraction("c12", 0.02)?;
            zone.properties.update_property(S_T9, 0.5);
            zone.properties.update_property(S_RHO, 100.0);
            zone.properties.update_property(S_DTIME, 1e-4);
            zone.properties.update_property(S_LARGE_NEG_ABUND_THRESHOLD, 1e-12);
            let report = safe_evolve_default(&mut zone, 0.1)?;
            println!(
                "{} sub-steps, {} Newton iterations, {} halvings",
                report.sub_steps.len(),
                report.newton_iterations,
                report.halvings
            );
            report.table().printstd();
            zone.pretty_print_abundances(1e-20);
        }
        2 => {
            // alpha burning in an expanding zone, arrow solver
            use crate::Evolution::evolve_zone::{EvolveZoneSummary, evolve_zone};
            let mut zone = Zone::new("alpha", Arc::new(alpha_chain_network()));
            zone.set_mass_fraction("he4", 0.9)?;
            zone.set_mass_fraction("c12", 0.1)?;
            zone.properties.update_property(S_T9_0, 2.5);
            zone.properties.update_property(S_RHO_0, 1.0);
            zone.properties.update_property(S_TAU, 0.5);
            zone.properties.update_property(S_SOLVER, S_ARROW);
            zone.properties.update_property(S_ARROW_WIDTH, 1usize);
            let summary = evolve_zone(&mut zone, 1.0)?;
            EvolveZoneSummary::table(&[summary]).printstd();
            zone.pretty_print_abundances(1e-20);
        }
        3 => {
            // independent zones in parallel; one of them is misconfigured
            use crate::Evolution::evolve_zone::EvolveZoneSummary;
            use crate::Evolution::multi_zone::evolve_zones;
            let network = Arc::new(alpha_chain_network());
            let mut zones: Vec<Zone> = (0..6)
                .map(|k| {
                    let mut zone = Zone::new(&format!("shell {}", k), Arc::clone(&network));
                    zone.properties.update_property(S_T9_0, 1.5 + 0.25 * k as f64);
                    zone.properties.update_property(S_RHO_0, 1.0);
                    zone.properties.update_property(S_TAU, 0.5);
                    zone
                })
                .collect();
            for zone in zones.iter_mut().skip(1) {
                zone.set_mass_fraction("he4", 1.0)?;
            }
            let results = evolve_zones(&mut zones, 0.5);
            let summaries: Vec<EvolveZoneSummary> =
                results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
            EvolveZoneSummary::table(&summaries).printstd();
            for e in results.iter().filter_map(|r| r.as_ref().err()) {
                println!("failed: {}", e);
            }
        }
        4 => {
            // NSE start above T9 = 7, then cooling along a tabulated trajectory
            use crate::Evolution::evolve_zone::{EvolveZoneSummary, evolve_zone_along_trajectory};
            use crate::Evolution::statistical_equilibrium::SahaEquilibrium;
            use crate::Evolution::trajectory::{InterpolationType, Trajectory};
            let mut zone = Zone::new("nse", Arc::new(iron_peak_network()))
                .with_equilibrium(Arc::new(SahaEquilibrium::default()));
            zone.set_mass_fraction("ni56", 1.0)?;
            let trajectory = Trajectory::new(
                vec![0.0, 0.05, 0.1, 0.2, 0.4],
                vec![9.0, 7.5, 6.0, 4.5, 3.0],
                vec![8.0, 7.8, 7.5, 7.0, 6.5],
            )?;
            let summary =
                evolve_zone_along_trajectory(&mut zone, &trajectory, InterpolationType::Spline, 0.4)?;
            EvolveZoneSummary::table(&[summary]).printstd();
            zone.pretty_print_abundances(1e-12);
        }
        5 => {
            // ILU-preconditioned Krylov solves against the direct solver
            use crate::LinearSystem::matrix_builder::get_evolution_matrix_and_vector;
            use crate::LinearSystem::matrix_solver::solve_matrix_for_zone;
            let mut zone = Zone::new("chain", Arc::new(isobar_chain_network(56, 20, 30, 1.0)));
            zone.set_mass_fraction("ni56", 0.5)?;
            zone.set_mass_fraction("fe56", 0.5)?;
            zone.properties.update_property(S_T9, 1.0);
            zone.properties.update_property(S_RHO, 1.0);
            zone.properties.update_property(S_DTIME, 0.1);
            let (mut matrix, rhs) = get_evolution_matrix_and_vector(&mut zone)?;
            matrix.add_to_diagonal(10.0);
            let direct = matrix.solve_direct(&rhs)?;
            zone.properties.update_property(S_ITER_SOLVER_T9, 5.0);
            zone.properties.update_property(S_ITER_SOLVER_REL_TOL, 1e-12);
            for method in ["bicgstab", "gmres", "bicg"] {
                zone.properties.update_property(S_ITER_SOLVER, method);
                let x = solve_matrix_for_zone(&zone, matrix.clone(), rhs.clone())?;
                println!("{}: |x - x_direct| = {:.3e}", method, (x - &direct).norm());
            }
        }
        _ => println!("no example {}", task),
    }
    Ok(())
}
