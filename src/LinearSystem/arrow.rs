//! Arrow matrix: a banded interior block plus a border of `width` dense rows and columns at the
//! bottom and right. Networks ordered by (Z, A) with the light particles (n, p, alpha) moved to the
//! end have this shape: captures of the light particles couple every species to the border, while
//! the heavy species only talk to their neighbours.
//!
//! Layout for an n x n matrix with interior size `len = n - width`:
//! - `a[i][k]`: interior band, entry (i, i + k - band) with `band` the widest off-diagonal distance
//! - `b[w][i]`: right wing, entry (i, len + w)
//! - `c[w][j]`: bottom wing, entry (len + w, j)
//! - `d[w][v]`: corner block, entry (len + w, len + v)
//!
//! The solve is Gaussian elimination without pivoting followed by back substitution.
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::errors::EvolutionError;
use nalgebra::DVector;

#[derive(Debug, Clone)]
pub struct ArrowMatrix {
    len: usize,
    width: usize,
    band: usize,
    band_width: usize,
    a: Vec<Vec<f64>>,
    b: Vec<Vec<f64>>,
    c: Vec<Vec<f64>>,
    d: Vec<Vec<f64>>,
}

fn is_zero(x: f64) -> bool {
    x.abs() < f64::MIN_POSITIVE
}

impl ArrowMatrix {
    pub fn from_sparse(matrix: &SparseMatrix, width: usize) -> Result<Self, EvolutionError> {
        let n = matrix.nrows();
        if n != matrix.ncols() {
            return Err(EvolutionError::Configuration(
                "arrow form needs a square matrix".to_string(),
            ));
        }
        if width == 0 || width >= n {
            return Err(EvolutionError::Configuration(format!(
                "arrow width {} must be between 1 and {} for a {}x{} matrix",
                width,
                n.saturating_sub(1),
                n,
                n
            )));
        }
        let len = n - width;
        let triplets = matrix.triplets();
        let band = triplets
            .iter()
            .filter(|(i, j, _)| *i < len && *j < len)
            .map(|(i, j, _)| i.abs_diff(*j))
            .max()
            .unwrap_or(0);
        let band_width = 2 * band + 1;
        let mut arrow = Self {
            len,
            width,
            band,
            band_width,
            a: vec![vec![0.0; band_width]; len],
            b: vec![vec![0.0; len]; width],
            c: vec![vec![0.0; len]; width],
            d: vec![vec![0.0; width]; width],
        };
        for (i, j, v) in triplets {
            match (i < len, j < len) {
                (true, true) => arrow.a[i][j + band - i] += v,
                (true, false) => arrow.b[j - len][i] += v,
                (false, true) => arrow.c[i - len][j] += v,
                (false, false) => arrow.d[i - len][j - len] += v,
            }
        }
        Ok(arrow)
    }
    /// half-width of the interior band
    pub fn band(&self) -> usize {
        self.band
    }
    pub fn width(&self) -> usize {
        self.width
    }
    /// Solves the system. The elimination works on this copy of the matrix, hence `self` by value.
    pub fn solve(mut self, rhs: &DVector<f64>) -> Result<DVector<f64>, EvolutionError> {
        let (len, width, band, bw) = (self.len, self.width, self.band, self.band_width);
        if rhs.len() != len + width {
            return Err(EvolutionError::Configuration(format!(
                "right-hand side of length {} for an arrow matrix of size {}",
                rhs.len(),
                len + width
            )));
        }
        let mut x: Vec<f64> = rhs.iter().copied().collect();

        // interior rows: clear the band below the diagonal and the bottom wing
        for i in 0..len {
            let pivot = self.a[i][band];
            if is_zero(pivot) {
                return Err(zero_pivot(i));
            }
            for j in 1..=band {
                if i + j >= len {
                    break;
                }
                let gam = -self.a[i + j][band - j] / pivot;
                if gam == 0.0 {
                    continue;
                }
                for k in band..bw {
                    let u = self.a[i][k];
                    self.a[i + j][k - j] += gam * u;
                }
                for w in 0..width {
                    let u = self.b[w][i];
                    self.b[w][i + j] += gam * u;
                }
                x[i + j] += gam * x[i];
            }
            for w in 0..width {
                let gam = -self.c[w][i] / pivot;
                if gam == 0.0 {
                    continue;
                }
                for k in band..bw {
                    let col = i + k - band;
                    if col < len {
                        let u = self.a[i][k];
                        self.c[w][col] += gam * u;
                    }
                }
                for v in 0..width {
                    let u = self.b[v][i];
                    self.d[w][v] += gam * u;
                }
                x[len + w] += gam * x[i];
            }
        }

        // corner block: plain elimination
        for w in 0..width {
            let pivot = self.d[w][w];
            if is_zero(pivot) {
                return Err(zero_pivot(len + w));
            }
            for r in (w + 1)..width {
                let gam = -self.d[r][w] / pivot;
                if gam == 0.0 {
                    continue;
                }
                for v in w..width {
                    let u = self.d[w][v];
                    self.d[r][v] += gam * u;
                }
                x[len + r] += gam * x[len + w];
            }
        }

        // back substitution, corner first
        for w in (0..width).rev() {
            let mut s = x[len + w];
            for v in (w + 1)..width {
                s -= self.d[w][v] * x[len + v];
            }
            x[len + w] = s / self.d[w][w];
        }
        for i in (0..len).rev() {
            let mut s = x[i];
            for k in (band + 1)..bw {
                let col = i + k - band;
                if col < len {
                    s -= self.a[i][k] * x[col];
                }
            }
            for w in 0..width {
                s -= self.b[w][i] * x[len + w];
            }
            x[i] = s / self.a[i][band];
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(EvolutionError::SingularMatrix(
                "arrow solution is not finite".to_string(),
            ));
        }
        Ok(DVector::from_vec(x))
    }
}

fn zero_pivot(row: usize) -> EvolutionError {
    EvolutionError::SingularMatrix(format!("zero pivot in arrow solve at row {}", row))
}
