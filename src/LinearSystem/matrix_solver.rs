//! # Linear-solver dispatcher
//!
//! Solves the Newton system `(J + 1/dt) dY = rhs` of a zone. The path is chosen from the zone
//! properties each time:
//! 1. user matrix-modification hook, then species pinning when `specific species` is set;
//! 2. ILU-preconditioned Krylov solve when an iterative method is configured and T9 is below
//!    `iterative solver t9`. Non-convergence or a singular ILU factor is not an error: the
//!    dispatcher logs it and falls through;
//! 3. arrow solve when `solver` = `arrow`;
//! 4. general direct solve.
//!
//! Every other failure (bad configuration, singular matrix) is returned to the caller.
use crate::LinearSystem::ilu_preconditioner::IluPreconditioner;
use crate::LinearSystem::iterative_solvers::KrylovSolver;
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::Zone::evolution_settings::{DirectSolver, IterativeSettings, SolverSettings};
use crate::Zone::nuc_zone::Zone;
use crate::Zone::zone_properties::{S_SPECIFIC_ABUNDANCE, S_SPECIFIC_SPECIES};
use crate::errors::EvolutionError;
use log::{debug, info};
use nalgebra::DVector;

pub fn solve_matrix_for_zone(
    zone: &Zone,
    mut matrix: SparseMatrix,
    mut rhs: DVector<f64>,
) -> Result<DVector<f64>, EvolutionError> {
    let settings = SolverSettings::from_properties(&zone.properties)?;

    if let Some(modify) = zone.hooks.matrix_modification.clone() {
        modify(&mut matrix, &mut rhs, zone)?;
    }
    if let Some(species) = zone.properties.get_string(S_SPECIFIC_SPECIES) {
        let target = zone.properties.get_f64(S_SPECIFIC_ABUNDANCE)?;
        set_specific_species(zone, &mut matrix, &mut rhs, &species, target)?;
    }

    if let Some(iterative) = &settings.iterative {
        if zone.t9()? < iterative.t9_threshold {
            match solve_sparse_matrix_with_ilu_preconditioner(&matrix, &rhs, iterative) {
                Ok(Some(solution)) => return Ok(solution),
                Ok(None) => log_fallback(
                    iterative,
                    &format!(
                        "zone {}: {} did not converge, falling back to the direct solver",
                        zone.label(),
                        iterative.method.name()
                    ),
                ),
                Err(EvolutionError::SingularPreconditioner { row }) => log_fallback(
                    iterative,
                    &format!(
                        "zone {}: ILU factor singular at row {}, falling back to the direct solver",
                        zone.label(),
                        row
                    ),
                ),
                Err(e) => return Err(e),
            }
        }
    }

    match settings.direct {
        DirectSolver::Arrow { width } => matrix.get_arrow(width)?.solve(&rhs),
        DirectSolver::General => matrix.solve_direct(&rhs),
    }
}

fn log_fallback(settings: &IterativeSettings, message: &str) {
    if settings.control.debug {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }
}

/// `Ok(None)` when the Krylov method does not converge; the factorization is dropped on return
pub fn solve_sparse_matrix_with_ilu_preconditioner(
    matrix: &SparseMatrix,
    rhs: &DVector<f64>,
    settings: &IterativeSettings,
) -> Result<Option<DVector<f64>>, EvolutionError> {
    let precond =
        IluPreconditioner::build(matrix, settings.ilu_fill_delta, settings.ilu_drop_tolerance)?;
    let guess = DVector::zeros(rhs.len());
    settings
        .method
        .solve(matrix, rhs, &guess, &precond, &settings.control)
}

/// Replaces the row of `species` by `dY = target - Y`, expressed as `1/dt` on the diagonal and
/// `(target - Y)/dt` on the right-hand side, so the species ends the step at `target`.
pub fn set_specific_species(
    zone: &Zone,
    matrix: &mut SparseMatrix,
    rhs: &mut DVector<f64>,
    species: &str,
    target: f64,
) -> Result<(), EvolutionError> {
    let idx = zone.network().nuc.index_of(species).ok_or_else(|| {
        EvolutionError::Configuration(format!(
            "pinned species '{}' is not in the network",
            species
        ))
    })?;
    let pos = zone.evolution_view().position(idx).ok_or_else(|| {
        EvolutionError::Configuration(format!(
            "pinned species '{}' is not in the evolution network",
            species
        ))
    })?;
    let dt = zone.dt()?;
    matrix.remove_row(pos);
    matrix.insert_row(pos, &[(pos, 1.0 / dt)])?;
    rhs[pos] = (target - zone.abundances()[idx]) / dt;
    Ok(())
}
