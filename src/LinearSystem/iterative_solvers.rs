//! # Preconditioned Krylov solvers
//!
//! Right-preconditioned BiCGSTAB and restarted GMRES, and BiCG which needs the transposed matrix
//! and the transposed preconditioner. All of them take an `IluPreconditioner` built for the same
//! matrix and report non-convergence as `Ok(None)`: failing to converge is a reason for the caller
//! to fall back to a direct solver, not an error.
//!
//! Convergence: `||r|| <= rel_tol * ||ref|| + abs_tol`, with `ref` the right-hand side or the
//! initial residual.
use crate::LinearSystem::ilu_preconditioner::IluPreconditioner;
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::errors::EvolutionError;
use enum_dispatch::enum_dispatch;
use log::info;
use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResidualReference {
    RightHandSide,
    InitialResidual,
}

#[derive(Debug, Clone)]
pub struct IterativeControl {
    pub max_iterations: usize,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub reference: ResidualReference,
    pub debug: bool,
}

impl Default for IterativeControl {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            rel_tol: 1.0e-16,
            abs_tol: 0.0,
            reference: ResidualReference::RightHandSide,
            debug: false,
        }
    }
}

impl IterativeControl {
    fn target(&self, b: &DVector<f64>, r0: &DVector<f64>) -> f64 {
        let reference = match self.reference {
            ResidualReference::RightHandSide => b.norm(),
            ResidualReference::InitialResidual => r0.norm(),
        };
        self.rel_tol * reference + self.abs_tol
    }
    fn trace(&self, method: &str, iteration: usize, residual: f64) {
        if self.debug {
            info!("{} iteration {}: residual {:e}", method, iteration, residual);
        }
    }
}

#[enum_dispatch]
pub trait KrylovSolver {
    /// `Ok(None)` when the iteration budget runs out or the method breaks down
    fn solve(
        &self,
        matrix: &SparseMatrix,
        rhs: &DVector<f64>,
        guess: &DVector<f64>,
        precond: &IluPreconditioner,
        control: &IterativeControl,
    ) -> Result<Option<DVector<f64>>, EvolutionError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct BiCgStab;

#[derive(Debug, Clone)]
pub struct Gmres {
    pub restart: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BiCg;

#[derive(Debug, Clone)]
#[enum_dispatch(KrylovSolver)]
pub enum IterativeMethod {
    BiCgStab(BiCgStab),
    Gmres(Gmres),
    BiCg(BiCg),
}

impl IterativeMethod {
    /// "bicgstab" (or "bcgstab"), "gmres", "bicg" (or "bcg")
    pub fn from_name(name: &str, gmres_restart: usize) -> Result<Self, EvolutionError> {
        match name.trim().to_lowercase().as_str() {
            "bicgstab" | "bcgstab" => Ok(IterativeMethod::BiCgStab(BiCgStab)),
            "gmres" => Ok(IterativeMethod::Gmres(Gmres {
                restart: gmres_restart.max(1),
            })),
            "bicg" | "bcg" => Ok(IterativeMethod::BiCg(BiCg)),
            other => Err(EvolutionError::Configuration(format!(
                "unknown iterative solver '{}'",
                other
            ))),
        }
    }
}

impl KrylovSolver for BiCgStab {
    fn solve(
        &self,
        matrix: &SparseMatrix,
        rhs: &DVector<f64>,
        guess: &DVector<f64>,
        precond: &IluPreconditioner,
        control: &IterativeControl,
    ) -> Result<Option<DVector<f64>>, EvolutionError> {
        let mut x = guess.clone();
        let mut r = rhs - matrix.mul_vector(&x)?;
        let target = control.target(rhs, &r);
        if r.norm() <= target {
            return Ok(Some(x));
        }
        let r_hat = r.clone();
        let mut p = DVector::zeros(r.len());
        let mut v = DVector::zeros(r.len());
        let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        for it in 1..=control.max_iterations {
            let rho_new = r_hat.dot(&r);
            if rho_new == 0.0 {
                return Ok(None);
            }
            if it == 1 {
                p = r.clone();
            } else {
                let beta = (rho_new / rho) * (alpha / omega);
                p = &r + beta * (&p - omega * &v);
            }
            let p_hat = precond.apply(&p);
            v = matrix.mul_vector(&p_hat)?;
            let denom = r_hat.dot(&v);
            if denom == 0.0 {
                return Ok(None);
            }
            alpha = rho_new / denom;
            let s = &r - alpha * &v;
            let s_norm = s.norm();
            if s_norm <= target {
                x += alpha * p_hat;
                control.trace(self.name(), it, s_norm);
                return Ok(Some(x));
            }
            let s_hat = precond.apply(&s);
            let t = matrix.mul_vector(&s_hat)?;
            let tt = t.dot(&t);
            if tt == 0.0 {
                return Ok(None);
            }
            omega = t.dot(&s) / tt;
            x += alpha * p_hat + omega * s_hat;
            r = s - omega * t;
            let r_norm = r.norm();
            control.trace(self.name(), it, r_norm);
            if !r_norm.is_finite() {
                return Ok(None);
            }
            if r_norm <= target {
                return Ok(Some(x));
            }
            if omega == 0.0 {
                return Ok(None);
            }
            rho = rho_new;
        }
        Ok(None)
    }
    fn name(&self) -> &'static str {
        "BiCGSTAB"
    }
}

impl KrylovSolver for Gmres {
    fn solve(
        &self,
        matrix: &SparseMatrix,
        rhs: &DVector<f64>,
        guess: &DVector<f64>,
        precond: &IluPreconditioner,
        control: &IterativeControl,
    ) -> Result<Option<DVector<f64>>, EvolutionError> {
        let m = self.restart.max(1);
        let mut x = guess.clone();
        let r0 = rhs - matrix.mul_vector(&x)?;
        let target = control.target(rhs, &r0);
        let mut total = 0;
        loop {
            let r = rhs - matrix.mul_vector(&x)?;
            let beta = r.norm();
            if beta <= target {
                return Ok(Some(x));
            }
            if total >= control.max_iterations || !beta.is_finite() {
                return Ok(None);
            }
            // Arnoldi with modified Gram-Schmidt, Givens rotations on the Hessenberg matrix
            let mut basis: Vec<DVector<f64>> = vec![r / beta];
            let mut z_vectors: Vec<DVector<f64>> = Vec::with_capacity(m);
            let mut h = vec![vec![0.0; m]; m + 1];
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            let mut g = vec![0.0; m + 1];
            g[0] = beta;
            let mut k = 0;
            for j in 0..m {
                total += 1;
                let z = precond.apply(&basis[j]);
                let mut w = matrix.mul_vector(&z)?;
                for i in 0..=j {
                    h[i][j] = w.dot(&basis[i]);
                    w -= h[i][j] * &basis[i];
                }
                let h_next = w.norm();
                h[j + 1][j] = h_next;
                for i in 0..j {
                    let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
                    h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                    h[i][j] = temp;
                }
                let denom = h[j][j].hypot(h[j + 1][j]);
                if denom == 0.0 {
                    return Ok(None);
                }
                cs[j] = h[j][j] / denom;
                sn[j] = h[j + 1][j] / denom;
                h[j][j] = denom;
                h[j + 1][j] = 0.0;
                g[j + 1] = -sn[j] * g[j];
                g[j] *= cs[j];
                z_vectors.push(z);
                k = j + 1;
                control.trace(self.name(), total, g[j + 1].abs());
                if g[j + 1].abs() <= target || total >= control.max_iterations || h_next == 0.0 {
                    break;
                }
                basis.push(w / h_next);
            }
            // back substitution for the least-squares coefficients
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut s = g[i];
                for l in (i + 1)..k {
                    s -= h[i][l] * y[l];
                }
                y[i] = s / h[i][i];
            }
            for (yi, zi) in y.iter().zip(z_vectors.iter()) {
                x += *yi * zi;
            }
        }
    }
    fn name(&self) -> &'static str {
        "GMRES"
    }
}

impl KrylovSolver for BiCg {
    fn solve(
        &self,
        matrix: &SparseMatrix,
        rhs: &DVector<f64>,
        guess: &DVector<f64>,
        precond: &IluPreconditioner,
        control: &IterativeControl,
    ) -> Result<Option<DVector<f64>>, EvolutionError> {
        let mut x = guess.clone();
        let mut r = rhs - matrix.mul_vector(&x)?;
        let target = control.target(rhs, &r);
        if r.norm() <= target {
            return Ok(Some(x));
        }
        let mut r_t = r.clone();
        let mut z = precond.apply(&r);
        let mut z_t = precond.apply_transpose(&r_t);
        let mut p = z.clone();
        let mut p_t = z_t.clone();
        let mut rho = z.dot(&r_t);
        for it in 1..=control.max_iterations {
            if rho == 0.0 {
                return Ok(None);
            }
            let q = matrix.mul_vector(&p)?;
            let q_t = matrix.transpose_mul_vector(&p_t)?;
            let denom = p_t.dot(&q);
            if denom == 0.0 {
                return Ok(None);
            }
            let alpha = rho / denom;
            x += alpha * &p;
            r -= alpha * q;
            r_t -= alpha * q_t;
            let r_norm = r.norm();
            control.trace(self.name(), it, r_norm);
            if !r_norm.is_finite() {
                return Ok(None);
            }
            if r_norm <= target {
                return Ok(Some(x));
            }
            z = precond.apply(&r);
            z_t = precond.apply_transpose(&r_t);
            let rho_new = z.dot(&r_t);
            let beta = rho_new / rho;
            p = &z + beta * &p;
            p_t = &z_t + beta * &p_t;
            rho = rho_new;
        }
        Ok(None)
    }
    fn name(&self) -> &'static str {
        "BiCG"
    }
}
