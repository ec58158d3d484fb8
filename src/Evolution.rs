//! # Evolution module
//!
//! ## Purpose
//! Time integration of the abundances of a zone. The Newton driver `evolve` takes one
//! implicit-Euler step, `safe_evolve` wraps it in a step-size controller, and the drivers step a
//! zone (or many zones in parallel) along a thermodynamic history.
//!
//! ## Main functions
//! - `limit_evolution_network`: drops reactions whose both sides are below an abundance cutoff
//! - `modify_rates`, `set_weak_detailed_balance`: rate adjustments used by the linear-system builder
//! - `evolve`: Newton-Raphson over one timestep; `check_matrix_solution`, `is_nonneg_abunds`
//! - `safe_evolve`: halving on a failed safety check, 15% growth afterwards, configurable floor policy
//! - `evolve_nse_plus_weak_rates`: statistical equilibrium with Ye evolved by the weak reactions
//! - `SahaEquilibrium`: NSE abundances at (T9, rho, Ye)
//! - `evolve_zone`, `evolve_zones`: single-zone and rayon multi-zone drivers
//! - `Trajectory`: tabulated T9/rho histories with linear or spline interpolation
//!
//! ## Errors
//! Everything returns `Result<_, EvolutionError>`. Non-convergence and large negative abundances
//! are distinct variants: `safe_evolve` retries the latter with a smaller step, never the former.
pub mod network_limiter;
pub mod rate_modifiers;
/// Newton-Raphson step and the abundance checks around it
pub mod evolve;
pub mod safe_evolve;
pub mod nse_plus_weak;
pub mod statistical_equilibrium;
/// single-zone driver along an expansion or a tabulated trajectory
pub mod evolve_zone;
pub mod multi_zone;
pub mod trajectory;
