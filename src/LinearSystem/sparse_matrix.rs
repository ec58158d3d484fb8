//! Compressed sparse row matrix used for the Newton system. Storage is a `sprs::CsMat`; the
//! structural edits the engine needs (diagonal shift, row removal and insertion) rebuild the CSR
//! arrays from triplets, which is cheap next to a factorization of the same matrix.
use crate::LinearSystem::arrow::ArrowMatrix;
use crate::errors::EvolutionError;
use faer::Mat;
use faer::linalg::solvers::Solve;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{DMatrix, DVector};
use sprs::{CsMat, TriMat};

#[derive(Debug, Clone)]
pub struct SparseMatrix {
    csr: CsMat<f64>,
}

impl SparseMatrix {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            csr: CsMat::zero((n_rows, n_cols)),
        }
    }
    /// duplicate (row, col) entries are summed
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut tri = TriMat::new((n_rows, n_cols));
        for &(i, j, v) in triplets {
            tri.add_triplet(i, j, v);
        }
        Self { csr: tri.to_csr() }
    }
    pub fn from_dense(dense: &DMatrix<f64>) -> Self {
        let mut triplets = Vec::new();
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                if dense[(i, j)] != 0.0 {
                    triplets.push((i, j, dense[(i, j)]));
                }
            }
        }
        Self::from_triplets(dense.nrows(), dense.ncols(), &triplets)
    }
    pub fn nrows(&self) -> usize {
        self.csr.rows()
    }
    pub fn ncols(&self) -> usize {
        self.csr.cols()
    }
    /// number of stored entries
    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.csr.get(i, j).copied().unwrap_or(0.0)
    }
    /// (col, value) pairs of a row in increasing column order
    pub fn row_entries(&self, i: usize) -> Vec<(usize, f64)> {
        match self.csr.outer_view(i) {
            Some(row) => row.iter().map(|(j, &v)| (j, v)).collect(),
            None => Vec::new(),
        }
    }
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::with_capacity(self.nnz());
        for (i, row) in self.csr.outer_iterator().enumerate() {
            for (j, &v) in row.iter() {
                out.push((i, j, v));
            }
        }
        out
    }
    /////////////////////////////////STRUCTURAL EDITS/////////////////////////////////////////
    /// adds `value` to every diagonal entry, creating missing ones
    pub fn add_to_diagonal(&mut self, value: f64) {
        let mut triplets = self.triplets();
        let n = self.nrows().min(self.ncols());
        triplets.extend((0..n).map(|i| (i, i, value)));
        *self = Self::from_triplets(self.nrows(), self.ncols(), &triplets);
    }
    /// drops every entry of row `i`
    pub fn remove_row(&mut self, i: usize) {
        let triplets: Vec<_> = self.triplets().into_iter().filter(|t| t.0 != i).collect();
        *self = Self::from_triplets(self.nrows(), self.ncols(), &triplets);
    }
    /// adds (col, value) entries to row `i`, on top of whatever the row already holds
    pub fn insert_row(&mut self, i: usize, entries: &[(usize, f64)]) -> Result<(), EvolutionError> {
        if i >= self.nrows() || entries.iter().any(|&(j, _)| j >= self.ncols()) {
            return Err(EvolutionError::Configuration(format!(
                "row {} does not fit a {}x{} matrix",
                i,
                self.nrows(),
                self.ncols()
            )));
        }
        let mut triplets = self.triplets();
        triplets.extend(entries.iter().map(|&(j, v)| (i, j, v)));
        *self = Self::from_triplets(self.nrows(), self.ncols(), &triplets);
        Ok(())
    }
    /////////////////////////////////PRODUCTS/////////////////////////////////////////
    pub fn mul_vector(&self, x: &DVector<f64>) -> Result<DVector<f64>, EvolutionError> {
        if x.len() != self.ncols() {
            return Err(dimension_error(self.ncols(), x.len()));
        }
        let mut y = DVector::zeros(self.nrows());
        for (i, row) in self.csr.outer_iterator().enumerate() {
            y[i] = row.iter().map(|(j, &v)| v * x[j]).sum();
        }
        Ok(y)
    }
    pub fn transpose_mul_vector(&self, x: &DVector<f64>) -> Result<DVector<f64>, EvolutionError> {
        if x.len() != self.nrows() {
            return Err(dimension_error(self.nrows(), x.len()));
        }
        let mut y = DVector::zeros(self.ncols());
        for (i, row) in self.csr.outer_iterator().enumerate() {
            for (j, &v) in row.iter() {
                y[j] += v * x[i];
            }
        }
        Ok(y)
    }
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (i, j, v) in self.triplets() {
            dense[(i, j)] += v;
        }
        dense
    }
    /////////////////////////////////SOLVERS/////////////////////////////////////////
    /// General direct solve: the CSR entries are handed to faer as a column-compressed matrix and
    /// factored with its sparse LU (fill-reducing ordering, partial pivoting).
    pub fn solve_direct(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, EvolutionError> {
        let n = self.nrows();
        if n != self.ncols() {
            return Err(EvolutionError::SingularMatrix(format!(
                "matrix is {}x{}, not square",
                n,
                self.ncols()
            )));
        }
        if rhs.len() != n {
            return Err(dimension_error(n, rhs.len()));
        }
        if n == 0 {
            return Ok(DVector::zeros(0));
        }
        let triplets: Vec<Triplet<usize, usize, f64>> = self
            .triplets()
            .into_iter()
            .map(|(i, j, v)| Triplet::new(i, j, v))
            .collect();
        let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| EvolutionError::SingularMatrix(format!("sparse assembly failed: {:?}", e)))?;
        let lu = matrix
            .as_ref()
            .sp_lu()
            .map_err(|e| EvolutionError::SingularMatrix(format!("sparse LU failed: {:?}", e)))?;
        let mut x = Mat::<f64>::from_fn(n, 1, |i, _| rhs[i]);
        lu.solve_in_place(x.as_mut());
        let solution = DVector::from_fn(n, |i, _| x[(i, 0)]);
        if solution.iter().any(|x| !x.is_finite()) {
            return Err(EvolutionError::SingularMatrix(
                "LU solution is not finite".to_string(),
            ));
        }
        Ok(solution)
    }
    /// arrow (band plus border) form with a border of `width` rows and columns
    pub fn get_arrow(&self, width: usize) -> Result<ArrowMatrix, EvolutionError> {
        ArrowMatrix::from_sparse(self, width)
    }
}

fn dimension_error(expected: usize, got: usize) -> EvolutionError {
    EvolutionError::Configuration(format!(
        "vector of length {} where {} was expected",
        got, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> SparseMatrix {
        SparseMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 4.0), (0, 2, 1.0), (1, 1, 3.0), (2, 0, -1.0), (2, 2, 2.0), (2, 2, 1.0)],
        )
    }

    #[test]
    fn test_duplicates_are_summed() {
        let m = sample();
        assert_eq!(m.nnz(), 5);
        assert_relative_eq!(m.get(2, 2), 3.0);
        assert_relative_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.row_entries(0), vec![(0, 4.0), (2, 1.0)]);
    }

    #[test]
    fn test_diagonal_and_rows() {
        let mut m = SparseMatrix::from_triplets(3, 3, &[(0, 1, 1.0), (2, 2, 5.0)]);
        m.add_to_diagonal(10.0);
        assert_relative_eq!(m.get(0, 0), 10.0);
        assert_relative_eq!(m.get(2, 2), 15.0);
        m.remove_row(2);
        assert!(m.row_entries(2).is_empty());
        m.insert_row(2, &[(2, 0.5)]).unwrap();
        assert_eq!(m.row_entries(2), vec![(2, 0.5)]);
        assert!(m.insert_row(3, &[(0, 1.0)]).is_err());
    }

    #[test]
    fn test_products() {
        let m = sample();
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y = m.mul_vector(&x).unwrap();
        assert_eq!(y.as_slice(), &[7.0, 6.0, 8.0]);
        let yt = m.transpose_mul_vector(&x).unwrap();
        let expected = m.to_dense().transpose() * &x;
        assert_relative_eq!(yt, expected);
        assert!(m.mul_vector(&DVector::zeros(2)).is_err());
    }

    #[test]
    fn test_direct_solve() {
        let m = sample();
        let b = DVector::from_vec(vec![1.0, 1.0, 1.0]);
        let x = m.solve_direct(&b).unwrap();
        assert_relative_eq!(m.mul_vector(&x).unwrap(), b, epsilon = 1e-12);
        let singular = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (0, 1, 1.0)]);
        assert!(matches!(
            singular.solve_direct(&DVector::from_vec(vec![1.0, 1.0])),
            Err(EvolutionError::SingularMatrix(_))
        ));
        let rank_one = SparseMatrix::from_triplets(
            2,
            2,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)],
        );
        assert!(rank_one.solve_direct(&DVector::from_vec(vec![1.0, 1.0])).is_err());
    }

    #[test]
    fn test_direct_solve_of_a_long_chain() {
        // 5000 species: a dense copy of this system would hold 25 million entries
        let n = 5000;
        let mut triplets = Vec::with_capacity(3 * n);
        for i in 0..n {
            triplets.push((i, i, 4.0 + (i % 7) as f64));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -2.0));
            }
        }
        // a border row and column, as left by a pinned or arrow-shaped species
        triplets.push((n - 1, 0, 0.5));
        triplets.push((0, n - 1, 0.25));
        let m = SparseMatrix::from_triplets(n, n, &triplets);
        let b = DVector::from_fn(n, |i, _| 1.0 + (i % 3) as f64);
        let x = m.solve_direct(&b).unwrap();
        assert_relative_eq!(m.mul_vector(&x).unwrap(), b, epsilon = 1e-10);
    }
}
