//! # Incomplete LU (ILUT) Preconditioner
//!
//! ## Aim
//! Approximate factorization A ≈ LU used to precondition the Krylov solvers. Unlike ILU(0) the
//! sparsity pattern is not fixed in advance: fill-in is computed row by row and then trimmed by a
//! dual threshold,
//! - entries smaller than `drop_tolerance` times the mean absolute value of the row are dropped,
//! - at most `lfil = nnz/n + fill_delta` entries are kept in each row of L and each row of U.
//!
//! ## Storage
//! L (unit lower, diagonal implied) and U (strictly upper) are CSR arrays; the diagonal of U is
//! kept inverted in `diag_inv`.
//!
//! ## Lifetime
//! A factorization belongs to a single linear solve. The Jacobian changes at every Newton iteration,
//! so nothing is cached: the preconditioner is built, used by one Krylov solve and dropped, on the
//! success path and on every error path alike.
//!
//! ## Failure
//! A zero pivot or an empty row is reported as `EvolutionError::SingularPreconditioner`; no
//! diagonal shift is applied behind the caller's back.
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::errors::EvolutionError;
use nalgebra::DVector;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct IluPreconditioner {
    n: usize,
    l_ptr: Vec<usize>,
    l_idx: Vec<usize>,
    l_val: Vec<f64>,
    u_ptr: Vec<usize>,
    u_idx: Vec<usize>,
    u_val: Vec<f64>,
    diag_inv: Vec<f64>,
}

/// keeps the `lfil` entries of largest magnitude, returned in increasing column order
fn keep_largest(row: &mut Vec<(usize, f64)>, lfil: usize) {
    if row.len() > lfil {
        row.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        row.truncate(lfil);
    }
    row.sort_by_key(|e| e.0);
}

impl IluPreconditioner {
    pub fn build(
        matrix: &SparseMatrix,
        fill_delta: usize,
        drop_tolerance: f64,
    ) -> Result<Self, EvolutionError> {
        let n = matrix.nrows();
        if n != matrix.ncols() || n == 0 {
            return Err(EvolutionError::Configuration(format!(
                "ILU needs a non-empty square matrix, got {}x{}",
                n,
                matrix.ncols()
            )));
        }
        let lfil = matrix.nnz() / n + fill_delta;
        let mut ilu = Self {
            n,
            l_ptr: vec![0],
            l_idx: Vec::new(),
            l_val: Vec::new(),
            u_ptr: vec![0],
            u_idx: Vec::new(),
            u_val: Vec::new(),
            diag_inv: Vec::with_capacity(n),
        };
        // dense work row and its pattern
        let mut w = vec![0.0; n];
        let mut in_pattern = vec![false; n];

        for ii in 0..n {
            let row = matrix.row_entries(ii);
            let tnorm = if row.is_empty() {
                0.0
            } else {
                row.iter().map(|(_, v)| v.abs()).sum::<f64>() / row.len() as f64
            };
            if tnorm == 0.0 {
                return Err(EvolutionError::SingularPreconditioner { row: ii });
            }
            let threshold = drop_tolerance * tnorm;

            let mut lower: BTreeSet<usize> = BTreeSet::new();
            let mut upper: Vec<usize> = Vec::new();
            in_pattern[ii] = true;
            w[ii] = 0.0;
            for &(j, v) in &row {
                w[j] = v;
                in_pattern[j] = true;
                if j < ii {
                    lower.insert(j);
                } else if j > ii {
                    upper.push(j);
                }
            }

            // eliminate the lower part in increasing column order, fill-in included
            let mut l_row: Vec<(usize, f64)> = Vec::new();
            while let Some(k) = lower.pop_first() {
                let fact = w[k] * ilu.diag_inv[k];
                w[k] = 0.0;
                in_pattern[k] = false;
                if fact.abs() <= threshold {
                    continue;
                }
                for p in ilu.u_ptr[k]..ilu.u_ptr[k + 1] {
                    let j = ilu.u_idx[p];
                    if !in_pattern[j] {
                        in_pattern[j] = true;
                        w[j] = 0.0;
                        if j < ii {
                            lower.insert(j);
                        } else if j > ii {
                            upper.push(j);
                        }
                    }
                    w[j] -= fact * ilu.u_val[p];
                }
                l_row.push((k, fact));
            }

            let pivot = w[ii];
            w[ii] = 0.0;
            in_pattern[ii] = false;
            let mut u_row: Vec<(usize, f64)> = Vec::with_capacity(upper.len());
            for &j in &upper {
                if w[j].abs() > threshold {
                    u_row.push((j, w[j]));
                }
                w[j] = 0.0;
                in_pattern[j] = false;
            }
            if pivot == 0.0 || !pivot.is_finite() {
                return Err(EvolutionError::SingularPreconditioner { row: ii });
            }

            keep_largest(&mut l_row, lfil);
            keep_largest(&mut u_row, lfil);
            for (j, v) in l_row {
                ilu.l_idx.push(j);
                ilu.l_val.push(v);
            }
            ilu.l_ptr.push(ilu.l_idx.len());
            for (j, v) in u_row {
                ilu.u_idx.push(j);
                ilu.u_val.push(v);
            }
            ilu.u_ptr.push(ilu.u_idx.len());
            ilu.diag_inv.push(1.0 / pivot);
        }
        Ok(ilu)
    }

    pub fn size(&self) -> usize {
        self.n
    }
    /// stored entries of L and U, diagonal included
    pub fn nnz(&self) -> usize {
        self.l_val.len() + self.u_val.len() + self.n
    }

    /// z = (LU)^-1 r
    pub fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        let mut z = r.clone();
        for i in 0..self.n {
            let mut s = z[i];
            for p in self.l_ptr[i]..self.l_ptr[i + 1] {
                s -= self.l_val[p] * z[self.l_idx[p]];
            }
            z[i] = s;
        }
        for i in (0..self.n).rev() {
            let mut s = z[i];
            for p in self.u_ptr[i]..self.u_ptr[i + 1] {
                s -= self.u_val[p] * z[self.u_idx[p]];
            }
            z[i] = s * self.diag_inv[i];
        }
        z
    }

    /// z = (LU)^-T r: forward sweep with U^T, backward sweep with L^T, both column oriented
    pub fn apply_transpose(&self, r: &DVector<f64>) -> DVector<f64> {
        let mut z = r.clone();
        for i in 0..self.n {
            z[i] *= self.diag_inv[i];
            let zi = z[i];
            for p in self.u_ptr[i]..self.u_ptr[i + 1] {
                z[self.u_idx[p]] -= self.u_val[p] * zi;
            }
        }
        for i in (0..self.n).rev() {
            let zi = z[i];
            for p in self.l_ptr[i]..self.l_ptr[i + 1] {
                z[self.l_idx[p]] -= self.l_val[p] * zi;
            }
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    /// nonsymmetric, diagonally dominant, with fill-in under elimination
    fn test_matrix(n: usize) -> SparseMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 6.0 + (i % 3) as f64));
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
                t.push((i + 1, i, -2.0));
            }
            if i + 4 < n {
                t.push((i, i + 4, 0.5));
                t.push((i + 4, i, -0.7));
            }
        }
        t.push((0, n - 1, 1.0));
        t.push((n - 1, 0, 1.5));
        SparseMatrix::from_triplets(n, n, &t)
    }

    #[test]
    fn test_full_fill_reproduces_direct_solve() {
        let m = test_matrix(12);
        let b = DVector::from_fn(12, |i, _| (i as f64).sin() + 2.0);
        let ilu = IluPreconditioner::build(&m, 12, 0.0).unwrap();
        let direct = m.solve_direct(&b).unwrap();
        assert_relative_eq!(ilu.apply(&b), direct, epsilon = 1e-12);
    }

    #[test]
    fn test_transpose_apply_solves_transposed_system() {
        let m = test_matrix(10);
        let b = DVector::from_fn(10, |i, _| 1.0 + i as f64);
        let ilu = IluPreconditioner::build(&m, 10, 0.0).unwrap();
        let mt = SparseMatrix::from_dense(&m.to_dense().transpose());
        assert_relative_eq!(
            ilu.apply_transpose(&b),
            mt.solve_direct(&b).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_tridiagonal_is_exact_without_extra_fill() {
        let n = 8;
        let mut dense = DMatrix::zeros(n, n);
        for i in 0..n {
            dense[(i, i)] = 4.0;
            if i + 1 < n {
                dense[(i, i + 1)] = -1.0;
                dense[(i + 1, i)] = -1.5;
            }
        }
        let m = SparseMatrix::from_dense(&dense);
        let ilu = IluPreconditioner::build(&m, 0, 0.0).unwrap();
        let b = DVector::from_element(n, 1.0);
        assert_relative_eq!(ilu.apply(&b), m.solve_direct(&b).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_fill_limit_and_drop_tolerance_trim_factors() {
        let m = test_matrix(30);
        let full = IluPreconditioner::build(&m, 30, 0.0).unwrap();
        let trimmed = IluPreconditioner::build(&m, 0, 1e-2).unwrap();
        assert!(trimmed.nnz() < full.nnz());
        assert!(trimmed.nnz() <= 30 * (2 * (m.nnz() / 30) + 1));
        // still a usable approximation of the inverse
        let b = DVector::from_element(30, 1.0);
        let exact = m.solve_direct(&b).unwrap();
        let approx_sol = trimmed.apply(&b);
        assert!((approx_sol - &exact).norm() / exact.norm() < 0.2);
    }

    #[test]
    fn test_zero_pivot_is_an_error() {
        let m = SparseMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        assert!(matches!(
            IluPreconditioner::build(&m, 5, 0.0),
            Err(EvolutionError::SingularPreconditioner { row: 0 })
        ));
    }

    #[test]
    fn test_empty_row_is_an_error() {
        let m = SparseMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (2, 2, 1.0)]);
        assert!(matches!(
            IluPreconditioner::build(&m, 5, 0.0),
            Err(EvolutionError::SingularPreconditioner { row: 1 })
        ));
    }
}
