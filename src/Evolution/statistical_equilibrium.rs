//! # Nuclear statistical equilibrium
//!
//! In NSE every nuclide is in equilibrium with free protons and neutrons, so its abundance is
//! fixed by the Saha equation
//!
//! `ln Y_i = ln G_i + 1.5 ln A_i - A_i ln 2 + (A_i - 1) ln(rho N_A lambda^3) + B_i/kT + Z_i ln Y_p + N_i ln Y_n`
//!
//! with `lambda = sqrt(2 pi (hbar c)^2 / (m_u c^2 kT))` the nucleon thermal wavelength, `G_i` the
//! ground state weight `2J+1` and `B_i` the binding energy. Free nucleons follow the same formula,
//! so the network should give h1 and n spin 1/2.
//!
//! `ln Y_p` and `ln Y_n` are fixed by `sum A_i Y_i = 1` and `sum Z_i Y_i = Ye`. Sums are evaluated
//! as log-sum-exp, abundances spanning hundreds of decades do not overflow.
//! - inner solve: for a given `ln Y_p` the log of the mass sum is convex and increasing in
//!   `ln Y_n`, Newton iteration converges monotonically after the first step
//! - outer solve: the charge constraint as a function of `ln Y_p` alone, bracketed and refined by
//!   Brent's method. Where protons alone already exceed the mass (no `ln Y_n` can satisfy the
//!   mass sum) the charge residual is continued with the neutron-free terms, which keeps it finite
//!   and positive.
use crate::Network::net_view::Network;
use crate::Utils::root_finding::{RootSettings, bracket_root, brent};
use crate::errors::EvolutionError;
use log::debug;
use nalgebra::DVector;

/// hbar c, MeV fm
pub const HBAR_C: f64 = 197.326_98;
/// atomic mass unit, MeV
pub const M_U_C2: f64 = 931.494_10;
/// Avogadro's number, 1/mol
pub const N_A: f64 = 6.022_140_76e23;
/// kT in MeV for T9 = 1
pub const K_B_T9: f64 = 0.086_173_3;

pub trait EquilibriumSolver {
    /// equilibrium abundances over the whole network at (T9, rho, Ye)
    fn compute_equilibrium(
        &self,
        network: &Network,
        t9: f64,
        rho: f64,
        ye: f64,
    ) -> Result<DVector<f64>, EvolutionError>;
}

#[derive(Debug, Clone)]
pub struct SahaEquilibrium {
    pub max_iterations: usize, // inner Newton and outer Brent
    pub tolerance: f64,        // on ln sum A Y
}

impl Default for SahaEquilibrium {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1.0e-13,
        }
    }
}

/// per-species constant part of ln Y and the Z, N multipliers of ln Y_p, ln Y_n
struct SahaTerms {
    c: Vec<f64>,
    z: Vec<f64>,
    n: Vec<f64>,
    a: Vec<f64>,
}

/// ln sum w_i e^(l_i) and the w-weighted mean of `x`, computed with a max shift
struct WeightedSum {
    ln_sum: f64,
    mean: f64,
}

impl WeightedSum {
    fn new(ln_y: &[f64], w: &[f64], x: &[f64], keep: impl Fn(usize) -> bool) -> Option<Self> {
        let included: Vec<usize> = (0..ln_y.len()).filter(|&i| w[i] > 0.0 && keep(i)).collect();
        let shift = included
            .iter()
            .map(|&i| ln_y[i] + w[i].ln())
            .fold(f64::NEG_INFINITY, f64::max);
        if !shift.is_finite() {
            return None;
        }
        let (mut sum, mut sum_x) = (0.0, 0.0);
        for &i in &included {
            let e = (ln_y[i] + w[i].ln() - shift).exp();
            sum += e;
            sum_x += x[i] * e;
        }
        Some(Self {
            ln_sum: shift + sum.ln(),
            mean: sum_x / sum,
        })
    }
}

impl SahaTerms {
    fn new(network: &Network, t9: f64, rho: f64) -> Self {
        let kt = K_B_T9 * t9;
        // thermal wavelength in cm
        let lambda =
            (2.0 * std::f64::consts::PI * HBAR_C * HBAR_C / (M_U_C2 * kt)).sqrt() * 1.0e-13;
        let ln_density_term = (rho * N_A * lambda.powi(3)).ln();
        let mut terms = Self {
            c: Vec::with_capacity(network.number_of_species()),
            z: Vec::new(),
            n: Vec::new(),
            a: Vec::new(),
        };
        for s in network.nuc.iter() {
            let a = s.a as f64;
            terms.c.push(
                s.statistical_weight().ln() + 1.5 * a.ln() - a * std::f64::consts::LN_2
                    + (a - 1.0) * ln_density_term
                    + s.binding_energy() / kt,
            );
            terms.z.push(s.z as f64);
            terms.n.push(s.n() as f64);
            terms.a.push(a);
        }
        terms
    }

    fn ln_y(&self, ln_yp: f64, ln_yn: f64) -> Vec<f64> {
        (0..self.c.len())
            .map(|i| self.c[i] + self.z[i] * ln_yp + self.n[i] * ln_yn)
            .collect()
    }

    /// ln sum A Y over neutron-free species, the limit of the mass sum for ln Y_n -> -inf
    fn neutron_free_mass(&self, ln_yp: f64) -> Option<f64> {
        WeightedSum::new(&self.ln_y(ln_yp, 0.0), &self.a, &self.n, |i| self.n[i] == 0.0)
            .map(|s| s.ln_sum)
    }

    /// ln Y_n that makes sum A Y = 1 at the given ln Y_p
    fn solve_mass(
        &self,
        ln_yp: f64,
        guess: f64,
        settings: &SahaEquilibrium,
    ) -> Result<f64, EvolutionError> {
        let mut ln_yn = guess;
        for _ in 0..settings.max_iterations {
            let mass = WeightedSum::new(&self.ln_y(ln_yp, ln_yn), &self.a, &self.n, |_| true)
                .ok_or_else(|| EvolutionError::Equilibrium("network has no nuclides".to_string()))?;
            if mass.ln_sum.abs() < settings.tolerance {
                return Ok(ln_yn);
            }
            // the slope is the mass-weighted mean neutron number
            if mass.mean < 1.0e-12 {
                ln_yn += (-mass.ln_sum).max(1.0);
            } else {
                ln_yn -= mass.ln_sum / mass.mean;
            }
        }
        Err(EvolutionError::Equilibrium(format!(
            "mass constraint not met at ln Yp = {}",
            ln_yp
        )))
    }

    /// ln(sum Z Y) - ln Ye with the mass constraint enforced through ln Y_n
    fn charge_residual(
        &self,
        ln_yp: f64,
        ln_ye: f64,
        ln_yn: &mut f64,
        settings: &SahaEquilibrium,
    ) -> Result<f64, EvolutionError> {
        let no_charge =
            || EvolutionError::Equilibrium("network has no charged nuclides".to_string());
        if self.neutron_free_mass(ln_yp).is_some_and(|m| m >= 0.0) {
            let charge =
                WeightedSum::new(&self.ln_y(ln_yp, 0.0), &self.z, &self.z, |i| self.n[i] == 0.0)
                    .ok_or_else(no_charge)?;
            return Ok(charge.ln_sum - ln_ye);
        }
        *ln_yn = self.solve_mass(ln_yp, *ln_yn, settings)?;
        let charge = WeightedSum::new(&self.ln_y(ln_yp, *ln_yn), &self.z, &self.z, |_| true)
            .ok_or_else(no_charge)?;
        Ok(charge.ln_sum - ln_ye)
    }
}

impl EquilibriumSolver for SahaEquilibrium {
    fn compute_equilibrium(
        &self,
        network: &Network,
        t9: f64,
        rho: f64,
        ye: f64,
    ) -> Result<DVector<f64>, EvolutionError> {
        if !(t9 > 0.0 && rho > 0.0 && ye > 0.0 && ye <= 1.0) {
            return Err(EvolutionError::Equilibrium(format!(
                "no equilibrium for T9 = {}, rho = {}, Ye = {}",
                t9, rho, ye
            )));
        }
        let terms = SahaTerms::new(network, t9, rho);
        let ln_ye = ye.ln();
        // free nucleons as the starting point
        let mut ln_yn = (1.0 - ye).max(1.0e-10).ln();
        let mut residual = |ln_yp: f64| terms.charge_residual(ln_yp, ln_ye, &mut ln_yn, self);
        let (lo, hi) = bracket_root(&mut residual, ln_ye.min(-1.0e-3), 1.5, self.max_iterations)?;
        let root_settings = RootSettings {
            x_tol: 1.0e-14,
            f_tol: 1.0e-13,
            max_iter: self.max_iterations,
        };
        let ln_yp = brent(&mut residual, lo, hi, &root_settings)?;
        // leaves ln_yn consistent with the root
        residual(ln_yp)?;
        debug!(
            "NSE at T9 = {}, rho = {:e}, Ye = {}: ln Yp = {:.6}, ln Yn = {:.6}",
            t9, rho, ye, ln_yp, ln_yn
        );
        let ln_y = terms.ln_y(ln_yp, ln_yn);
        Ok(DVector::from_iterator(
            ln_y.len(),
            ln_y.into_iter().map(f64::exp),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Examples::example_networks::iron_peak_network;
    use crate::Network::species::Species;
    use approx::assert_relative_eq;

    fn moments(net: &Network, y: &DVector<f64>) -> (f64, f64) {
        net.nuc
            .iter()
            .zip(y.iter())
            .fold((0.0, 0.0), |(xa, xz), (s, y)| {
                (xa + s.a as f64 * y, xz + s.z as f64 * y)
            })
    }

    #[test]
    fn test_constraints_are_met() {
        let net = iron_peak_network();
        for (t9, rho, ye) in [(10.0, 1.0e7, 0.5), (7.0, 1.0e8, 0.48), (5.0, 1.0e9, 0.5)] {
            let y = SahaEquilibrium::default()
                .compute_equilibrium(&net, t9, rho, ye)
                .unwrap();
            let (xsum, ye_out) = moments(&net, &y);
            assert_relative_eq!(xsum, 1.0, epsilon = 1e-10);
            assert_relative_eq!(ye_out, ye, epsilon = 1e-10);
            assert!(y.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_hot_matter_is_free_nucleons_and_cool_matter_is_iron_peak() {
        let net = iron_peak_network();
        let hot = SahaEquilibrium::default()
            .compute_equilibrium(&net, 30.0, 1.0e6, 0.5)
            .unwrap();
        assert!(hot[0] + hot[1] > 0.9);
        let cool = SahaEquilibrium::default()
            .compute_equilibrium(&net, 4.0, 1.0e8, 0.5)
            .unwrap();
        // ni56 dominates symmetric matter at moderate temperature
        assert!(56.0 * cool[7] > 0.5);
    }

    #[test]
    fn test_proton_rich_matter() {
        let net = iron_peak_network();
        let y = SahaEquilibrium::default()
            .compute_equilibrium(&net, 6.0, 1.0e7, 0.9)
            .unwrap();
        let (xsum, ye) = moments(&net, &y);
        assert_relative_eq!(xsum, 1.0, epsilon = 1e-10);
        assert_relative_eq!(ye, 0.9, epsilon = 1e-10);
        assert!(y[1] > 0.7);
    }

    #[test]
    fn test_bad_inputs() {
        let net = iron_peak_network();
        let solver = SahaEquilibrium::default();
        assert!(solver.compute_equilibrium(&net, -1.0, 1.0, 0.5).is_err());
        assert!(solver.compute_equilibrium(&net, 5.0, 1.0, 1.5).is_err());
        let mut neutrons = Network::new();
        neutrons.add_species(Species::new("n", 0, 1, 8.071_317, 0.5));
        assert!(matches!(
            solver.compute_equilibrium(&neutrons, 5.0, 1.0e8, 0.5),
            Err(EvolutionError::Equilibrium(_))
        ));
    }
}
