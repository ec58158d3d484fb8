//! # Zone module
//!
//! ## Purpose
//! A zone is one thermodynamic point of the calculation: abundances over the network, a property
//! map (T9, density, time, timestep, solver and tolerance settings, feature flags), the rates of the
//! current step, the network views it evolves and the optional hooks that customise the engine.
//!
//! ## Main Structures
//! - `Zone`: exclusive owner of the state above. Zones never share mutable state, so independent
//!   zones can be evolved on different threads
//! - `ZoneProperties`: name + up to two tags -> number or text
//! - `ZoneHooks`: screening, rate-data update, rate modification, matrix modification and safety
//!   check strategies, each one optional
//! - `NewtonSettings`, `SolverSettings`, `StepFloorPolicy`: typed views of the properties
pub mod evolution_settings;
pub mod nuc_zone;
pub mod zone_hooks;
pub mod zone_properties;
