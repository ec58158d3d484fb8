//! Optional user strategies attached to a zone. Every hook is independently nullable; an empty slot
//! means the engine's default behaviour is used.
use crate::LinearSystem::sparse_matrix::SparseMatrix;
use crate::Network::reaction::Reaction;
use crate::Zone::nuc_zone::Zone;
use crate::errors::EvolutionError;
use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;

/// multiplicative screening factor for one reaction in the current zone state
pub type ScreeningFn = Arc<dyn Fn(&Reaction, &Zone) -> f64 + Send + Sync>;
/// refreshes rate data (tables, partition functions...) before rates are computed
pub type RateDataUpdateFn = Arc<dyn Fn(&mut Zone) -> Result<(), EvolutionError> + Send + Sync>;
/// replaces the default rate modification by rate-modification views
pub type RateModificationFn = Arc<dyn Fn(&mut Zone) -> Result<(), EvolutionError> + Send + Sync>;
/// adjusts the Newton system (matrix with 1/dt on the diagonal, right-hand side) before it is solved
pub type MatrixModificationFn = Arc<
    dyn Fn(&mut SparseMatrix, &mut DVector<f64>, &Zone) -> Result<(), EvolutionError> + Send + Sync,
>;
/// accepts or rejects the state reached by a trial step of safe_evolve
pub type SafetyCheckFn = Arc<dyn Fn(&mut Zone) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct ZoneHooks {
    pub screening: Option<ScreeningFn>,
    pub rate_data_update: Option<RateDataUpdateFn>,
    pub rate_modification: Option<RateModificationFn>,
    pub matrix_modification: Option<MatrixModificationFn>,
    pub safety_check: Option<SafetyCheckFn>,
}

impl fmt::Debug for ZoneHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneHooks")
            .field("screening", &self.screening.is_some())
            .field("rate_data_update", &self.rate_data_update.is_some())
            .field("rate_modification", &self.rate_modification.is_some())
            .field("matrix_modification", &self.matrix_modification.is_some())
            .field("safety_check", &self.safety_check.is_some())
            .finish()
    }
}
