//! # Utils module
//!
//! - `logger`: simplelog terminal and file logging
//! - `load_from_file`: networks, zones, rate modifications and trajectories from JSON
//! - `root_finding`: bracketing and Brent's method for scalar equations
pub mod load_from_file;
pub mod logger;
pub mod root_finding;
