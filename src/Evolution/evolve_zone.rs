//! # Single-zone driver
//!
//! Steps a zone from t = 0 (or the NSE start time) to `t_end` along a thermodynamic history:
//! - `Expansion`: the parametrised expansion T9 = T9_0 exp(-t/3tau) (floored at 1e-6),
//!   rho = rho_0 exp(-t/tau) (floored at 1e-18), read from the zone properties `t9_0`, `rho_0`, `tau`
//! - `Tabulated`: a (time, T9, log10 rho) table interpolated by `trajectory`
//!
//! After each Newton step the timestep is updated from the abundance changes, clamped so the run
//! ends exactly at `t_end`, and the evolution network is limited for the next step. Every error is
//! returned wrapped in `ZoneFailure` with the zone label and the stage that failed.
use crate::Evolution::evolve::evolve;
use crate::Evolution::network_limiter::limit_evolution_network;
use crate::Evolution::trajectory::{
    InterpolationType, Trajectory, update_t9_rho_in_zone_by_interpolation,
};
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::*;
use crate::errors::EvolutionError;
use log::info;
use prettytable::{Cell, Row, Table};
use std::sync::Arc;

pub const DEFAULT_NSE_T9_CEILING: f64 = 7.0;
pub const NSE_START_DT: f64 = 1.0e-6;
pub const DEFAULT_START_DT: f64 = 1.0e-6;
const T9_FLOOR: f64 = 1.0e-6;
const RHO_FLOOR: f64 = 1.0e-18;
/// arguments of `Zone::update_time_step`
const TIME_STEP_REGT: f64 = 0.15;
const TIME_STEP_REGY: f64 = 0.15;
const TIME_STEP_YMIN: f64 = 1.0e-10;

#[derive(Debug, Clone)]
pub enum ThermoHistory {
    Expansion { t9_0: f64, rho_0: f64, tau: f64 },
    Tabulated {
        trajectory: Trajectory,
        kind: InterpolationType,
    },
}

impl ThermoHistory {
    /// the parametrised expansion from the zone properties
    pub fn expansion_from_properties(props: &ZoneProperties) -> Result<Self, EvolutionError> {
        let (t9_0, rho_0, tau) = (
            props.get_f64(S_T9_0)?,
            props.get_f64(S_RHO_0)?,
            props.get_f64(S_TAU)?,
        );
        if !(t9_0 > 0.0 && rho_0 > 0.0 && tau > 0.0) {
            return Err(EvolutionError::Configuration(format!(
                "expansion needs positive t9_0, rho_0 and tau, got {}, {}, {}",
                t9_0, rho_0, tau
            )));
        }
        Ok(ThermoHistory::Expansion { t9_0, rho_0, tau })
    }

    fn initial_point(&self) -> Result<(f64, f64, f64), EvolutionError> {
        match self {
            ThermoHistory::Expansion { t9_0, rho_0, .. } => Ok((0.0, *t9_0, *rho_0)),
            ThermoHistory::Tabulated { trajectory, kind } => {
                let t0 = trajectory.start_time()?;
                let (t9, rho) = trajectory.evaluate(t0, *kind)?;
                Ok((t0, t9, rho))
            }
        }
    }

    /// time at which the history cools down to `t9`, and the density there
    fn time_at_t9(&self, t9: f64) -> Result<(f64, f64), EvolutionError> {
        match self {
            ThermoHistory::Expansion { t9_0, rho_0, tau } => {
                let rho = (t9 / t9_0).powi(3) * rho_0;
                Ok((tau * (rho_0 / rho).ln(), rho))
            }
            ThermoHistory::Tabulated { trajectory, kind } => {
                let k = trajectory
                    .t9
                    .iter()
                    .position(|&v| v <= t9)
                    .ok_or_else(|| {
                        EvolutionError::Configuration(format!(
                            "trajectory never cools below T9 = {}",
                            t9
                        ))
                    })?;
                let t = trajectory.time[k];
                Ok((t, trajectory.evaluate(t, *kind)?.1))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvolveZoneSummary {
    pub label: String,
    pub steps: usize,
    pub newton_iterations: usize,
    pub final_time: f64,
    pub final_t9: f64,
    pub final_rho: f64,
    pub started_from_nse: bool,
}

impl EvolveZoneSummary {
    pub fn table(summaries: &[EvolveZoneSummary]) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(
            ["zone", "steps", "NR iterations", "time", "T9", "rho", "NSE start"]
                .iter()
                .map(|h| Cell::new(h))
                .collect(),
        ));
        for s in summaries {
            table.add_row(Row::new(vec![
                Cell::new(&s.label),
                Cell::new(&s.steps.to_string()),
                Cell::new(&s.newton_iterations.to_string()),
                Cell::new(&format!("{:.4e}", s.final_time)),
                Cell::new(&format!("{:.4e}", s.final_t9)),
                Cell::new(&format!("{:.4e}", s.final_rho)),
                Cell::new(if s.started_from_nse { "yes" } else { "no" }),
            ]));
        }
        table
    }
}

/// evolves the zone to `t_end` along the expansion set by its `t9_0`, `rho_0` and `tau`
pub fn evolve_zone(zone: &mut Zone, t_end: f64) -> Result<EvolveZoneSummary, EvolutionError> {
    let history = ThermoHistory::expansion_from_properties(&zone.properties)
        .map_err(|e| e.in_zone(zone.label(), "initialization"))?;
    evolve_zone_with_history(zone, &history, t_end)
}

/// evolves the zone to `t_end` along a tabulated trajectory
pub fn evolve_zone_along_trajectory(
    zone: &mut Zone,
    trajectory: &Trajectory,
    kind: InterpolationType,
    t_end: f64,
) -> Result<EvolveZoneSummary, EvolutionError> {
    let history = ThermoHistory::Tabulated {
        trajectory: trajectory.clone(),
        kind,
    };
    evolve_zone_with_history(zone, &history, t_end)
}

pub fn evolve_zone_with_history(
    zone: &mut Zone,
    history: &ThermoHistory,
    t_end: f64,
) -> Result<EvolveZoneSummary, EvolutionError> {
    let label = zone.label().to_string();
    let (mut t, mut dt, started_from_nse) =
        initialize(zone, history).map_err(|e| e.in_zone(&label, "initialization"))?;
    let mut steps = 0;
    let mut newton_iterations = 0;

    while t < t_end {
        steps += 1;
        match history {
            ThermoHistory::Expansion { t9_0, rho_0, tau } => {
                let t_new = t + dt;
                let t9 = (t9_0 * (-t_new / (3.0 * tau)).exp()).max(T9_FLOOR);
                let rho = (rho_0 * (-t_new / tau).exp()).max(RHO_FLOOR);
                zone.properties.update_property(S_T9, t9);
                zone.properties.update_property(S_RHO, rho);
            }
            ThermoHistory::Tabulated { trajectory, kind } => {
                zone.properties.update_property(S_TIME, t);
                dt = update_t9_rho_in_zone_by_interpolation(zone, *kind, trajectory)
                    .map_err(|e| e.in_zone(&label, "interpolation"))?;
            }
        }
        t += dt;
        newton_iterations += evolve(zone).map_err(|e| e.in_zone(&label, "evolve"))?;

        zone.properties.update_property(S_TIME, t);
        dt = zone.update_time_step(dt, TIME_STEP_REGT, TIME_STEP_REGY, TIME_STEP_YMIN);
        if t + dt > t_end {
            dt = t_end - t;
        }
        zone.properties.update_property(S_DTIME, dt);
        zone.properties.update_property(S_STEPS, steps);
        limit_evolution_network(zone).map_err(|e| e.in_zone(&label, "network limiter"))?;
    }

    let summary = EvolveZoneSummary {
        label,
        steps,
        newton_iterations,
        final_time: t,
        final_t9: zone.t9().unwrap_or(0.0),
        final_rho: zone.rho().unwrap_or(0.0),
        started_from_nse,
    };
    info!(
        "zone {}: reached t = {:.4e} in {} steps ({} Newton iterations)",
        summary.label, summary.final_time, summary.steps, summary.newton_iterations
    );
    Ok(summary)
}

/// normalizes the zone and, when the history starts above the NSE ceiling, replaces the
/// abundances by the equilibrium ones at the ceiling; returns (t, dt, started from NSE)
fn initialize(
    zone: &mut Zone,
    history: &ThermoHistory,
) -> Result<(f64, f64, bool), EvolutionError> {
    zone.normalize_abundances()?;
    let (mut t, t9, rho) = history.initial_point()?;
    let ceiling = zone
        .properties
        .get_f64_or(S_NSE_T9_CEILING, DEFAULT_NSE_T9_CEILING)?;
    let mut dt = zone.properties.get_f64_or(S_DTIME, DEFAULT_START_DT)?;
    let started_from_nse = t9 > ceiling;

    if started_from_nse {
        let solver = zone.equilibrium.clone().ok_or_else(|| {
            EvolutionError::Configuration(format!(
                "zone {} starts at T9 = {} above the NSE ceiling but has no equilibrium solver",
                zone.label(),
                t9
            ))
        })?;
        let (t_nse, rho_nse) = history.time_at_t9(ceiling)?;
        let ye = zone.compute_z_moment(1);
        let network = Arc::clone(zone.network());
        let abundances = solver.compute_equilibrium(&network, ceiling, rho_nse, ye)?;
        zone.update_abundances(abundances)?;
        zone.properties.update_property(S_YE, ye);
        zone.properties.update_property(S_T9, ceiling);
        zone.properties.update_property(S_RHO, rho_nse);
        t = t_nse;
        dt = NSE_START_DT;
        info!(
            "zone {}: NSE start at T9 = {}, rho = {:.4e}, t = {:.4e}, Ye = {:.5}",
            zone.label(),
            ceiling,
            rho_nse,
            t,
            ye
        );
    } else {
        zone.properties.update_property(S_T9, t9);
        zone.properties.update_property(S_RHO, rho);
    }
    zone.properties.update_property(S_TIME, t);
    zone.properties.update_property(S_DTIME, dt);
    zone.interpolation_memory = None;
    limit_evolution_network(zone)?;
    Ok((t, dt, started_from_nse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Evolution::statistical_equilibrium::SahaEquilibrium;
    use crate::Examples::example_networks::{alpha_chain_network, two_species_network};
    use crate::Network::net_view::Network;
    use crate::Network::species::Species;
    use approx::assert_relative_eq;

    fn expanding_zone(t9_0: f64) -> Zone {
        let mut zone = Zone::new("expanding", Arc::new(alpha_chain_network()));
        zone.set_mass_fraction("he4", 0.5).unwrap();
        zone.set_mass_fraction("c12", 0.5).unwrap();
        zone.properties.update_property(S_T9_0, t9_0);
        zone.properties.update_property(S_RHO_0, 1.0);
        zone.properties.update_property(S_TAU, 0.1);
        zone
    }

    #[test]
    fn test_expansion_run_ends_at_t_end() {
        let mut zone = expanding_zone(2.0);
        let summary = evolve_zone(&mut zone, 0.05).unwrap();
        assert!(summary.steps > 1);
        assert!(!summary.started_from_nse);
        assert_relative_eq!(summary.final_time, 0.05, epsilon = 1e-15);
        assert_relative_eq!(summary.final_t9, 2.0 * (-0.05f64 / 0.3).exp(), max_relative = 1e-12);
        assert_relative_eq!(zone.compute_a_moment(1), 1.0, max_relative = 1e-8);
        assert_eq!(
            zone.properties.get_usize_or(S_STEPS, 0).unwrap(),
            summary.steps
        );
    }

    #[test]
    fn test_nse_start_above_the_ceiling() {
        let mut net = Network::new();
        for (name, z, a, me, spin) in [
            ("n", 0, 1, 8.071_317, 0.5),
            ("h1", 1, 1, 7.288_971, 0.5),
            ("he4", 2, 4, 2.424_916, 0.0),
            ("ni56", 28, 56, -53.904_1, 0.0),
        ] {
            net.add_species(Species::new(name, z, a, me, spin));
        }
        let mut zone = Zone::new("hot", Arc::new(net))
            .with_equilibrium(Arc::new(SahaEquilibrium::default()));
        zone.set_mass_fraction("ni56", 1.0).unwrap();
        zone.properties.update_property(S_T9_0, 10.0);
        zone.properties.update_property(S_RHO_0, 1e8);
        zone.properties.update_property(S_TAU, 0.1);
        let history = ThermoHistory::expansion_from_properties(&zone.properties).unwrap();
        let (t, dt, nse) = initialize(&mut zone, &history).unwrap();
        assert!(nse);
        assert_eq!(dt, NSE_START_DT);
        // rho scaled by (7/10)^3, t = tau ln(rho_0/rho)
        assert_relative_eq!(zone.rho().unwrap(), 1e8 * 0.343, max_relative = 1e-12);
        assert_relative_eq!(t, 0.1 * (1.0f64 / 0.343).ln(), max_relative = 1e-12);
        assert_relative_eq!(zone.compute_z_moment(1), 0.5, epsilon = 1e-9);
        assert!(zone.get_abundance("he4").unwrap() > 0.0);
    }

    #[test]
    fn test_failures_name_the_zone_and_stage() {
        let mut zone = expanding_zone(10.0);
        // above the ceiling without an equilibrium solver
        match evolve_zone(&mut zone, 1.0) {
            Err(EvolutionError::ZoneFailure { zone, stage, .. }) => {
                assert_eq!(zone, "expanding");
                assert_eq!(stage, "initialization");
            }
            other => panic!("unexpected {:?}", other),
        }
        let mut zone = Zone::new("empty", Arc::new(two_species_network(1.0, 1.0)));
        zone.properties.update_property(S_T9_0, 1.0);
        zone.properties.update_property(S_RHO_0, 1.0);
        zone.properties.update_property(S_TAU, 1.0);
        assert!(matches!(
            evolve_zone(&mut zone, 1.0),
            Err(EvolutionError::ZoneFailure { .. })
        ));
    }

    #[test]
    fn test_tabulated_history() {
        let trajectory = Trajectory::new(
            vec![0.0, 0.5, 1.0],
            vec![1.0, 0.9, 0.8],
            vec![3.0, 2.9, 2.8],
        )
        .unwrap();
        let mut zone = Zone::new("table", Arc::new(two_species_network(1.0, 1.0)));
        zone.set_mass_fraction("c12", 1.0).unwrap();
        zone.properties.update_property(S_DTIME, 1e-3);
        let summary =
            evolve_zone_along_trajectory(&mut zone, &trajectory, InterpolationType::Spline, 1.0)
                .unwrap();
        assert_relative_eq!(summary.final_time, 1.0, epsilon = 1e-12);
        assert_relative_eq!(summary.final_t9, 0.8, epsilon = 1e-12);
        // A <-> B with equal rates relaxes towards equal abundances
        let y = zone.abundances();
        assert!(y[1] > 0.3 * y[0]);
    }
}
