//! Typed settings read from the zone properties at the start of each operation. Reading them in one
//! place turns a misspelled or contradictory property into a `Configuration` error before any
//! numerical work starts.
use crate::LinearSystem::iterative_solvers::{IterativeControl, IterativeMethod, ResidualReference};
use crate::Zone::zone_properties::*;
use crate::errors::EvolutionError;

pub const DEFAULT_NEWTON_TOLERANCE: f64 = 1.0e-6;
pub const DEFAULT_NEWTON_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_SIGNIFICANCE_FLOOR: f64 = 1.0e-10;
pub const DEFAULT_ITER_SOLVER_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_ITER_SOLVER_REL_TOL: f64 = 1.0e-16;
pub const DEFAULT_ILU_DELTA: usize = 1;
pub const DEFAULT_GMRES_RESTART: usize = 30;

/// quantity compared with the Newton tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceMetric {
    /// max |dY_i / Y_i| over species with Y_i above the significance floor
    Abundance,
    /// sqrt(sum (A_i dY_i)^2), the size of the correction in mass fractions
    MassFraction,
}

#[derive(Debug, Clone)]
pub struct NewtonSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub significance_floor: f64,
    pub metric: ConvergenceMetric,
    pub large_negative_threshold: Option<f64>,
}

impl NewtonSettings {
    pub fn from_properties(props: &ZoneProperties) -> Result<Self, EvolutionError> {
        let metric = match props.get_string(S_NEWTON_RAPHSON_METRIC).as_deref() {
            None | Some("abundance") => ConvergenceMetric::Abundance,
            Some("mass fraction") => ConvergenceMetric::MassFraction,
            Some(other) => {
                return Err(EvolutionError::InvalidProperty {
                    name: S_NEWTON_RAPHSON_METRIC.to_string(),
                    value: other.to_string(),
                });
            }
        };
        let max_iterations =
            props.get_usize_or(S_NEWTON_RAPHSON_MAX_ITERATIONS, DEFAULT_NEWTON_MAX_ITERATIONS)?;
        if max_iterations == 0 {
            return Err(EvolutionError::Configuration(
                "Newton-Raphson needs at least one iteration".to_string(),
            ));
        }
        Ok(Self {
            max_iterations,
            tolerance: props.get_f64_or(S_NEWTON_RAPHSON_CONVERGE, DEFAULT_NEWTON_TOLERANCE)?,
            significance_floor: props
                .get_f64_or(S_NEWTON_RAPHSON_ABUNDANCE, DEFAULT_SIGNIFICANCE_FLOOR)?,
            metric,
            large_negative_threshold: props.get_optional_f64(S_LARGE_NEG_ABUND_THRESHOLD)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectSolver {
    General,
    Arrow { width: usize },
}

#[derive(Debug, Clone)]
pub struct IterativeSettings {
    pub method: IterativeMethod,
    pub t9_threshold: f64, // iterative solves are tried only below this T9
    pub control: IterativeControl,
    pub ilu_fill_delta: usize,
    pub ilu_drop_tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub direct: DirectSolver,
    pub iterative: Option<IterativeSettings>,
}

impl SolverSettings {
    pub fn from_properties(props: &ZoneProperties) -> Result<Self, EvolutionError> {
        let direct = match props.get_string(S_SOLVER).as_deref() {
            Some(S_ARROW) => {
                if !props.has_property(S_ARROW_WIDTH) {
                    return Err(EvolutionError::Configuration(format!(
                        "solver '{}' requires property '{}'",
                        S_ARROW, S_ARROW_WIDTH
                    )));
                }
                DirectSolver::Arrow {
                    width: props.get_usize_or(S_ARROW_WIDTH, 1)?,
                }
            }
            None | Some("direct") | Some("general") => DirectSolver::General,
            Some(other) => {
                return Err(EvolutionError::Configuration(format!(
                    "unknown solver '{}'",
                    other
                )));
            }
        };
        let iterative = match (
            props.get_string(S_ITER_SOLVER),
            props.has_property(S_ITER_SOLVER_T9),
        ) {
            (None, false) => None,
            (Some(name), true) => Some(Self::iterative_from_properties(props, &name)?),
            (Some(_), false) => {
                return Err(EvolutionError::Configuration(format!(
                    "iterative solver is set but '{}' is not",
                    S_ITER_SOLVER_T9
                )));
            }
            (None, true) => {
                return Err(EvolutionError::Configuration(format!(
                    "'{}' is set but no iterative solver method is",
                    S_ITER_SOLVER_T9
                )));
            }
        };
        Ok(Self { direct, iterative })
    }

    fn iterative_from_properties(
        props: &ZoneProperties,
        name: &str,
    ) -> Result<IterativeSettings, EvolutionError> {
        let restart = props.get_usize_or(S_GMRES_RESTART, DEFAULT_GMRES_RESTART)?;
        let reference = match props.get_string(S_ITER_SOLVER_CONVERGENCE_METHOD).as_deref() {
            None | Some("rhs") => ResidualReference::RightHandSide,
            Some("initial") | Some("initial residual") => ResidualReference::InitialResidual,
            Some(other) => {
                return Err(EvolutionError::InvalidProperty {
                    name: S_ITER_SOLVER_CONVERGENCE_METHOD.to_string(),
                    value: other.to_string(),
                });
            }
        };
        let control = IterativeControl {
            max_iterations: props
                .get_usize_or(S_ITER_SOLVER_MAX_ITERATIONS, DEFAULT_ITER_SOLVER_MAX_ITERATIONS)?,
            rel_tol: props.get_f64_or(S_ITER_SOLVER_REL_TOL, DEFAULT_ITER_SOLVER_REL_TOL)?,
            abs_tol: props.get_f64_or(S_ITER_SOLVER_ABS_TOL, 0.0)?,
            reference,
            debug: props.is_flag_set(S_ITER_SOLVER_DEBUG),
        };
        let ilu_drop_tolerance = props.get_f64_or(S_ILU_DROP_TOL, 0.0)?;
        if ilu_drop_tolerance < 0.0 {
            return Err(EvolutionError::InvalidProperty {
                name: S_ILU_DROP_TOL.to_string(),
                value: ilu_drop_tolerance.to_string(),
            });
        }
        Ok(IterativeSettings {
            method: IterativeMethod::from_name(name, restart)?,
            t9_threshold: props.get_f64(S_ITER_SOLVER_T9)?,
            control,
            ilu_fill_delta: props.get_usize_or(S_ILU_DELTA, DEFAULT_ILU_DELTA)?,
            ilu_drop_tolerance,
        })
    }
}

/// what safe_evolve does when the step shrinks below dt_min without passing the safety check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepFloorPolicy {
    /// accept the last attempted step and continue
    AcceptBestEffort,
    /// return `EvolutionError::StepSizeExhausted`
    Fail,
}

impl StepFloorPolicy {
    pub fn from_properties(props: &ZoneProperties) -> Result<Self, EvolutionError> {
        match props.get_string(S_SAFE_EVOLVE_FLOOR_POLICY).as_deref() {
            None | Some("accept") => Ok(StepFloorPolicy::AcceptBestEffort),
            Some("fail") => Ok(StepFloorPolicy::Fail),
            Some(other) => Err(EvolutionError::InvalidProperty {
                name: S_SAFE_EVOLVE_FLOOR_POLICY.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newton_defaults() {
        let props = ZoneProperties::new();
        let s = NewtonSettings::from_properties(&props).unwrap();
        assert_eq!(s.max_iterations, 10);
        assert_eq!(s.tolerance, 1e-6);
        assert_eq!(s.significance_floor, 1e-10);
        assert_eq!(s.metric, ConvergenceMetric::Abundance);
        assert!(s.large_negative_threshold.is_none());
    }

    #[test]
    fn test_bad_metric_is_rejected() {
        let mut props = ZoneProperties::new();
        props.update_property(S_NEWTON_RAPHSON_METRIC, "entropy");
        assert!(NewtonSettings::from_properties(&props).is_err());
    }

    #[test]
    fn test_solver_selection() {
        let mut props = ZoneProperties::new();
        let s = SolverSettings::from_properties(&props).unwrap();
        assert_eq!(s.direct, DirectSolver::General);
        assert!(s.iterative.is_none());

        props.update_property(S_SOLVER, S_ARROW);
        assert!(SolverSettings::from_properties(&props).is_err());
        props.update_property(S_ARROW_WIDTH, 2usize);
        let s = SolverSettings::from_properties(&props).unwrap();
        assert_eq!(s.direct, DirectSolver::Arrow { width: 2 });

        props.update_property(S_ITER_SOLVER, "gmres");
        assert!(matches!(
            SolverSettings::from_properties(&props),
            Err(EvolutionError::Configuration(_))
        ));
        props.update_property(S_ITER_SOLVER_T9, 10.0);
        let s = SolverSettings::from_properties(&props).unwrap();
        let iter = s.iterative.unwrap();
        assert_eq!(iter.ilu_fill_delta, 1);
        assert_eq!(iter.ilu_drop_tolerance, 0.0);
        assert_eq!(iter.control.rel_tol, 1e-16);

        props.update_property(S_SOLVER, "cholesky");
        assert!(SolverSettings::from_properties(&props).is_err());
    }

    #[test]
    fn test_floor_policy() {
        let mut props = ZoneProperties::new();
        assert_eq!(
            StepFloorPolicy::from_properties(&props).unwrap(),
            StepFloorPolicy::AcceptBestEffort
        );
        props.update_property(S_SAFE_EVOLVE_FLOOR_POLICY, "fail");
        assert_eq!(
            StepFloorPolicy::from_properties(&props).unwrap(),
            StepFloorPolicy::Fail
        );
    }
}
