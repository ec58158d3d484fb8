//! Thermodynamic trajectories given as tables of (time, T9, log10 rho).
//!
//! Between knots T9 and log10 rho are interpolated linearly or with a natural cubic spline.
//! Outside the table the end values are held. The previous interpolated point is remembered by the
//! zone itself (`Zone::interpolation_memory`), so two zones following the same trajectory never
//! see each other's history.
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::{S_DTIME, S_RHO, S_T9, S_TIME};
use crate::errors::EvolutionError;
use log::debug;
use serde::{Deserialize, Serialize};

/// largest relative change of T9 or rho accepted over one interpolated step
pub const INTERPOLATION_MAX_RELATIVE_CHANGE: f64 = 1.0e-2;
/// dt is not halved below this
pub const INTERPOLATION_DT_FLOOR: f64 = 1.0e-20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationType {
    #[default]
    Linear,
    Spline,
}

/// last (T9, rho) set by interpolation in a zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationMemory {
    pub t9: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub t9: Vec<f64>,
    pub log10_rho: Vec<f64>,
}

impl Trajectory {
    pub fn new(time: Vec<f64>, t9: Vec<f64>, log10_rho: Vec<f64>) -> Result<Self, EvolutionError> {
        let trajectory = Self {
            time,
            t9,
            log10_rho,
        };
        trajectory.validate()?;
        Ok(trajectory)
    }

    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.time.len() < 2
            || self.t9.len() != self.time.len()
            || self.log10_rho.len() != self.time.len()
        {
            return Err(EvolutionError::Configuration(format!(
                "trajectory needs at least two points and columns of equal length, got {}/{}/{}",
                self.time.len(),
                self.t9.len(),
                self.log10_rho.len()
            )));
        }
        if self.time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EvolutionError::Configuration(
                "trajectory times must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn start_time(&self) -> Result<f64, EvolutionError> {
        self.time.first().copied().ok_or_else(empty_trajectory)
    }
    pub fn end_time(&self) -> Result<f64, EvolutionError> {
        self.time.last().copied().ok_or_else(empty_trajectory)
    }

    /// (T9, rho) at `time`
    pub fn evaluate(&self, time: f64, kind: InterpolationType) -> Result<(f64, f64), EvolutionError> {
        self.validate()?;
        let time = time.clamp(self.start_time()?, self.end_time()?);
        let (t9, log10_rho) = match kind {
            InterpolationType::Linear => (
                linear(&self.time, &self.t9, time),
                linear(&self.time, &self.log10_rho, time),
            ),
            InterpolationType::Spline => (
                natural_spline(&self.time, &self.t9, time),
                natural_spline(&self.time, &self.log10_rho, time),
            ),
        };
        Ok((t9, 10f64.powf(log10_rho)))
    }
}

/// index i with xs[i] <= x < xs[i+1], clamped to the last segment
fn find_interval(xs: &[f64], x: f64) -> usize {
    match xs.partition_point(|&v| v <= x) {
        0 => 0,
        p => (p - 1).min(xs.len() - 2),
    }
}

fn linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let i = find_interval(xs, x);
    let w = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + w * (ys[i + 1] - ys[i])
}

/// natural cubic spline (zero second derivative at both ends) through the knots
fn natural_spline(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if n < 3 {
        return linear(xs, ys, x);
    }
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

    // Thomas algorithm for the interior second derivatives
    let mut m = vec![0.0; n];
    let mut cp = vec![0.0; n];
    let mut dp = vec![0.0; n];
    for i in 1..n - 1 {
        let diag = 2.0 * (h[i - 1] + h[i]) - h[i - 1] * cp[i - 1];
        cp[i] = h[i] / diag;
        dp[i] = (6.0 * (delta[i] - delta[i - 1]) - h[i - 1] * dp[i - 1]) / diag;
    }
    for i in (1..n - 1).rev() {
        m[i] = dp[i] - if i + 1 < n - 1 { cp[i] * m[i + 1] } else { 0.0 };
    }

    let i = find_interval(xs, x);
    let dx = x - xs[i];
    let b = delta[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0;
    let c = m[i] / 2.0;
    let d = (m[i + 1] - m[i]) / (6.0 * h[i]);
    ys[i] + dx * (b + dx * (c + dx * d))
}

fn relative_change(new: f64, old: f64) -> f64 {
    if old == 0.0 {
        if new == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        ((new - old) / old).abs()
    }
}

fn empty_trajectory() -> EvolutionError {
    EvolutionError::Configuration("trajectory has no time points".to_string())
}

/// Sets T9 and rho of the zone to the trajectory values at `time + dt`. While either differs by more
/// than 1% from the previous interpolated values the timestep is halved, so the zone never jumps
/// over a steep part of the trajectory. Returns the timestep finally used, also stored as `dt`.
pub fn update_t9_rho_in_zone_by_interpolation(
    zone: &mut Zone,
    kind: InterpolationType,
    trajectory: &Trajectory,
) -> Result<f64, EvolutionError> {
    let time = zone.properties.get_f64_or(S_TIME, trajectory.start_time()?)?;
    let mut dt = zone.dt()?;
    let previous = match zone.interpolation_memory {
        Some(memory) => memory,
        None => {
            let (t9, rho) = trajectory.evaluate(time, kind)?;
            InterpolationMemory { t9, rho }
        }
    };
    let (t9, rho) = loop {
        let (t9, rho) = trajectory.evaluate(time + dt, kind)?;
        let too_steep = relative_change(t9, previous.t9) > INTERPOLATION_MAX_RELATIVE_CHANGE
            || relative_change(rho, previous.rho) > INTERPOLATION_MAX_RELATIVE_CHANGE;
        if !too_steep || 0.5 * dt < INTERPOLATION_DT_FLOOR {
            break (t9, rho);
        }
        dt *= 0.5;
    };
    debug!(
        "zone {}: interpolated T9 = {:.5}, rho = {:.5e} at t = {:.5e} (dt = {:.3e})",
        zone.label(),
        t9,
        rho,
        time + dt,
        dt
    );
    zone.properties.update_property(S_T9, t9);
    zone.properties.update_property(S_RHO, rho);
    zone.properties.update_property(S_DTIME, dt);
    zone.interpolation_memory = Some(InterpolationMemory { t9, rho });
    Ok(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::two_species_network;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn cooling() -> Trajectory {
        Trajectory::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![5.0, 4.0, 3.0, 2.0, 1.0],
            vec![8.0, 7.5, 7.0, 6.5, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn test_linear_and_spline_agree_on_linear_data() {
        let tr = cooling();
        for t in [0.0, 0.3, 1.7, 3.99, 4.0] {
            let (t9_l, rho_l) = tr.evaluate(t, InterpolationType::Linear).unwrap();
            let (t9_s, rho_s) = tr.evaluate(t, InterpolationType::Spline).unwrap();
            assert_relative_eq!(t9_l, 5.0 - t, epsilon = 1e-12);
            assert_relative_eq!(t9_s, t9_l, epsilon = 1e-12);
            assert_relative_eq!(rho_s, rho_l, max_relative = 1e-12);
        }
        // held outside the table
        assert_relative_eq!(tr.evaluate(10.0, InterpolationType::Linear).unwrap().0, 1.0);
    }

    #[test]
    fn test_spline_passes_through_knots() {
        let tr = Trajectory::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 0.0, 0.0],
        )
        .unwrap();
        for (t, v) in [(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0)] {
            assert_relative_eq!(
                tr.evaluate(t, InterpolationType::Spline).unwrap().0,
                v,
                epsilon = 1e-13
            );
        }
    }

    #[test]
    fn test_bad_trajectories() {
        let empty = Trajectory {
            time: vec![],
            t9: vec![],
            log10_rho: vec![],
        };
        assert!(empty.start_time().is_err());
        assert!(empty.end_time().is_err());
        assert!(empty.evaluate(0.0, InterpolationType::Linear).is_err());
        assert!(Trajectory::new(vec![0.0], vec![1.0], vec![1.0]).is_err());
        assert!(Trajectory::new(vec![0.0, 0.0], vec![1.0, 1.0], vec![1.0, 1.0]).is_err());
        assert!(Trajectory::new(vec![0.0, 1.0], vec![1.0], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_dt_is_halved_on_steep_changes() {
        let tr = cooling();
        let mut zone = Zone::new("0", Arc::new(two_species_network(1.0, 1.0)));
        zone.properties.update_property(S_TIME, 0.0);
        zone.properties.update_property(S_DTIME, 1.0);
        let dt = update_t9_rho_in_zone_by_interpolation(&mut zone, InterpolationType::Linear, &tr)
            .unwrap();
        // log10 rho falls by 0.5 per unit time: rho limits the step, 1/64 still moves it by 1.8%
        assert_relative_eq!(dt, 1.0 / 128.0);
        assert_relative_eq!(zone.t9().unwrap(), 5.0 - dt, epsilon = 1e-12);
        let memory = zone.interpolation_memory.unwrap();
        assert_relative_eq!(memory.t9, zone.t9().unwrap());

        // a second zone keeps its own memory
        let mut other = Zone::new("1", Arc::new(two_species_network(1.0, 1.0)));
        other.properties.update_property(S_TIME, 2.0);
        other.properties.update_property(S_DTIME, 1e-3);
        let dt2 =
            update_t9_rho_in_zone_by_interpolation(&mut other, InterpolationType::Spline, &tr)
                .unwrap();
        assert_eq!(dt2, 1e-3);
        assert_eq!(zone.interpolation_memory.unwrap(), memory);
    }
}
