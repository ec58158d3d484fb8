//! # LinearSystem module
//!
//! ## Purpose
//! Everything between the rates of a zone and the Newton correction `dY`: sparse storage, the
//! arrow (band plus border) direct solver, the ILUT preconditioner and the Krylov methods it
//! preconditions, the builder that assembles the Jacobian and flow vector, and the dispatcher that
//! picks a solver for each Newton iteration.
//!
//! ## Main Structures and functions
//! - `SparseMatrix`: CSR matrix (sprs) with row edits and a dense LU fallback (nalgebra)
//! - `ArrowMatrix`: band plus border form, Gaussian elimination without pivoting
//! - `IluPreconditioner`: dual-threshold incomplete LU with `apply` and `apply_transpose`
//! - `IterativeMethod`: BiCGSTAB, GMRES(m) and BiCG behind the `KrylovSolver` trait
//! - `get_evolution_matrix_and_vector`, `solve_matrix_for_zone`: builder and dispatcher
//! - `sum_of_matrix_vector_products`: parallel `sum_k M_k x` with a deterministic reduction
pub mod sparse_matrix;
/// band plus border matrices and their direct solve
pub mod arrow;
pub mod ilu_preconditioner;
/// preconditioned BiCGSTAB, GMRES and BiCG
pub mod iterative_solvers;
/// rates preparation and Jacobian/flow assembly for a zone
pub mod matrix_builder;
/// solver selection, iterative fallback and species pinning
pub mod matrix_solver;
pub mod matrix_products;
