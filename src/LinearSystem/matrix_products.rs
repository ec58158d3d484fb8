//! Sum of products of several sparse operators with one vector, `sum_k M_k x`, as needed by
//! higher-order exponential propagators. The products are independent and run on the rayon pool;
//! the partial results are then added along a fixed pairwise tree, so the floating-point result
//! does not depend on how the pool scheduled the work.
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::errors::EvolutionError;
use nalgebra::DVector;
use rayon::prelude::*;

pub fn sum_of_matrix_vector_products(
    matrices: &[SparseMatrix],
    x: &DVector<f64>,
) -> Result<DVector<f64>, EvolutionError> {
    let n_rows = match matrices.first() {
        Some(m) => m.nrows(),
        None => return Ok(DVector::zeros(0)),
    };
    if matrices.iter().any(|m| m.nrows() != n_rows) {
        return Err(EvolutionError::Configuration(
            "operator matrices differ in row count".to_string(),
        ));
    }
    let products: Vec<DVector<f64>> = matrices
        .par_iter()
        .map(|m| m.mul_vector(x))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairwise_sum(products))
}

/// adds neighbours level by level: ((p0 + p1) + (p2 + p3)) + (p4 + ...)
fn pairwise_sum(mut level: Vec<DVector<f64>>) -> DVector<f64> {
    while level.len() > 1 {
        level = level
            .par_chunks(2)
            .map(|pair| match pair {
                [a, b] => a + b,
                [a] => a.clone(),
                _ => unreachable!("chunks of two"),
            })
            .collect();
    }
    level.pop().unwrap_or_else(|| DVector::zeros(0))
}
