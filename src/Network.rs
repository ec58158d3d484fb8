//! # Network module
//!
//! ## Purpose
//! In-memory description of a nuclear reaction network: the species catalog, the reactions with
//! their rate laws, filtered views of the network and the mass-action rate physics that turns a
//! view plus a zone state into rates, a Jacobian and a flow vector.
//!
//! ## Main Structures
//! - `Species`, `SpeciesCollection`: nuclides with charge, mass number, mass excess and spin
//! - `Reaction`, `RateLaw`: reactions between nuclides (leptons and photons are carried along but
//!   ignored when counting nuclides)
//! - `Network`, `NetView`, `NetSelector`: the full catalog and immutable filtered views of it
//! - `RatePhysics`, `MassActionRates`: rates, Jacobian `-dYdot/dY` and flow vector `dY/dt`
/// nuclides, element table and name parsing
pub mod species;
/// reactions, rate laws, weak/strong classification
pub mod reaction;
/// network catalog, species/reaction filters and views
pub mod net_view;
/// rates, Jacobian and flow vector for the evolution network of a zone
pub mod rate_physics;
