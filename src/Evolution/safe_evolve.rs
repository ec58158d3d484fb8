//! # Adaptive step controller
//!
//! `safe_evolve` covers an interval `[0, dt]` of a zone with implicit-Euler sub-steps:
//! 1. a trial sub-step of `dt1` is taken and the safety check (the zone's hook, or
//!    `default_safety_check`) judges the result. On failure, or when the Newton driver reports a
//!    large negative abundance, the abundances are restored and `dt1` is halved;
//! 2. when halving would take `dt1` below `dt_min` the step-floor policy decides: `accept` keeps
//!    the last attempt (even one the Newton driver rejected for a negative abundance), `fail`
//!    restores the zone and returns `StepSizeExhausted`;
//! 3. the remaining interval is covered with sub-steps growing by 15% each, the last one clamped
//!    so the sub-steps add up to `dt`.
//!
//! Non-convergence and configuration errors of the Newton driver are not retried. Whenever an error
//! is returned the zone's abundances and abundance changes are back at their starting values and
//! `dt` holds the requested interval.
use crate::Evolution::evolve::{default_safety_check, evolve};
use crate::Zone::evolution_settings::StepFloorPolicy;
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::{S_DEBUG, S_DTIME};
use crate::errors::EvolutionError;
use log::{debug, info, warn};
use nalgebra::DVector;
use prettytable::{Cell, Row, Table};

pub const DEFAULT_DT_MIN: f64 = 1.0e-20;
pub const SUB_STEP_GROWTH: f64 = 1.15;

#[derive(Debug, Clone, Default)]
pub struct SafeEvolveReport {
    /// accepted sub-step sizes in order
    pub sub_steps: Vec<f64>,
    pub newton_iterations: usize,
    pub halvings: usize,
    /// the first sub-step was accepted at the floor without passing the safety check
    pub floor_reached: bool,
}

impl SafeEvolveReport {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("sub-step"), Cell::new("dt")]));
        for (k, dt) in self.sub_steps.iter().enumerate() {
            table.add_row(Row::new(vec![
                Cell::new(&(k + 1).to_string()),
                Cell::new(&format!("{:.6e}", dt)),
            ]));
        }
        table
    }
}

struct StartState {
    abundances: DVector<f64>,
    abundance_changes: DVector<f64>,
    dt: f64,
}

impl StartState {
    fn restore(&self, zone: &mut Zone) -> Result<(), EvolutionError> {
        zone.update_abundances(self.abundances.clone())?;
        zone.update_abundance_changes(self.abundance_changes.clone());
        zone.properties.update_property(S_DTIME, self.dt);
        Ok(())
    }

    /// puts the zone back and hands `e` on
    fn fail_with(&self, zone: &mut Zone, e: EvolutionError) -> EvolutionError {
        match self.restore(zone) {
            Ok(()) => e,
            Err(restore_error) => restore_error,
        }
    }
}

fn run_safety_check(zone: &mut Zone) -> bool {
    match zone.hooks.safety_check.clone() {
        Some(check) => check(zone),
        None => default_safety_check(zone),
    }
}

/// safe_evolve from the zone's current timestep over `dt`, with the default floor
pub fn safe_evolve_default(zone: &mut Zone, dt: f64) -> Result<SafeEvolveReport, EvolutionError> {
    let dt1 = zone.dt()?;
    safe_evolve(zone, dt1, dt, DEFAULT_DT_MIN)
}

pub fn safe_evolve(
    zone: &mut Zone,
    dt1: f64,
    dt: f64,
    dt_min: f64,
) -> Result<SafeEvolveReport, EvolutionError> {
    if !(dt > 0.0 && dt1 > 0.0 && dt_min > 0.0) {
        return Err(EvolutionError::Configuration(format!(
            "safe_evolve needs positive steps, got dt1 = {}, dt = {}, dt_min = {}",
            dt1, dt, dt_min
        )));
    }
    let policy = StepFloorPolicy::from_properties(&zone.properties)?;
    let verbose = zone.properties.is_flag_set(S_DEBUG);
    let start = StartState {
        abundances: zone.abundances().clone(),
        abundance_changes: zone.abundance_changes().clone(),
        dt,
    };
    let mut report = SafeEvolveReport::default();
    let mut dt1 = dt1.min(dt);

    loop {
        zone.properties.update_property(S_DTIME, dt1);
        let mut rejected_by = None;
        let passed = match evolve(zone) {
            Ok(iterations) => {
                report.newton_iterations += iterations;
                run_safety_check(zone)
            }
            Err(e) if e.is_recoverable_by_smaller_step() => {
                rejected_by = Some(e);
                false
            }
            Err(e) => return Err(start.fail_with(zone, e)),
        };
        if passed {
            break;
        }
        if 0.5 * dt1 < dt_min {
            match policy {
                StepFloorPolicy::Fail => {
                    return Err(start.fail_with(zone, EvolutionError::StepSizeExhausted { dt_min }));
                }
                StepFloorPolicy::AcceptBestEffort => {
                    let reason = match &rejected_by {
                        Some(e) => e.to_string(),
                        None => "safety check failed".to_string(),
                    };
                    let message = format!(
                        "zone {}: sub-step reached the floor {:e}, accepting dt1 = {:e} ({})",
                        zone.label(),
                        dt_min,
                        dt1,
                        reason
                    );
                    if verbose {
                        warn!("{}", message);
                    } else {
                        debug!("{}", message);
                    }
                    report.floor_reached = true;
                    break;
                }
            }
        }
        zone.update_abundances(start.abundances.clone())?;
        dt1 *= 0.5;
        report.halvings += 1;
        if verbose {
            info!("zone {}: safety check failed, dt1 -> {:e}", zone.label(), dt1);
        }
    }
    report.sub_steps.push(dt1);

    let mut t = dt1;
    while t < dt {
        dt1 *= SUB_STEP_GROWTH;
        let last = t + dt1 >= dt;
        if last {
            dt1 = dt - t;
        }
        zone.properties.update_property(S_DTIME, dt1);
        match evolve(zone) {
            Ok(iterations) => report.newton_iterations += iterations,
            Err(e) => return Err(start.fail_with(zone, e)),
        }
        report.sub_steps.push(dt1);
        t = if last { dt } else { t + dt1 };
    }

    zone.properties.update_property(S_DTIME, dt);
    let changes = zone.abundances() - &start.abundances;
    zone.update_abundance_changes(changes);
    debug!(
        "zone {}: safe_evolve covered {:e} in {} sub-steps ({} halvings)",
        zone.label(),
        dt,
        report.sub_steps.len(),
        report.halvings
    );
    Ok(report)
}
