//! # Error channel of the evolution engine
//!
//! Every fallible operation of the crate returns `Result<_, EvolutionError>`. Fatal conditions
//! (bad configuration, singular systems, Newton non-convergence) travel up to the caller instead of
//! terminating the process, so a multi-zone driver can give up on one zone and keep the others.
//! Non-fatal conditions (iterative solver fallback, step-size floor with the `accept` policy) are
//! only logged.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Zone property '{0}' is not set")]
    MissingProperty(String),
    #[error("Zone property '{name}' has invalid value '{value}'")]
    InvalidProperty { name: String, value: String },
    #[error("Species '{0}' not found")]
    SpeciesNotFound(String),
    #[error("Newton-Raphson did not converge in {iterations} iterations (last metric {metric:e})")]
    NonConvergence { iterations: usize, metric: f64 },
    #[error("Large negative abundance {abundance:e} for species '{species}'")]
    NegativeAbundance { species: String, abundance: f64 },
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
    #[error("ILU factorization is singular at row {row}")]
    SingularPreconditioner { row: usize },
    #[error("Timestep fell below the minimum {dt_min:e} without passing the safety check")]
    StepSizeExhausted { dt_min: f64 },
    #[error("Equilibrium solver failed: {0}")]
    Equilibrium(String),
    #[error("Zone {zone}: {stage} failed: {source}")]
    ZoneFailure {
        zone: String,
        stage: String,
        #[source]
        source: Box<EvolutionError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl EvolutionError {
    /// wraps an error with the zone label and the stage of the driver that failed
    pub fn in_zone(self, zone: &str, stage: &str) -> Self {
        EvolutionError::ZoneFailure {
            zone: zone.to_string(),
            stage: stage.to_string(),
            source: Box::new(self),
        }
    }
    /// true for errors a caller may answer by retrying with a smaller timestep
    pub fn is_recoverable_by_smaller_step(&self) -> bool {
        matches!(self, EvolutionError::NegativeAbundance { .. })
    }
}
