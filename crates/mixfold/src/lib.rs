//! The mixfold command line tools as a library.
//!
//! `complexes`: enumerate the complexes of a strand mixture and compute
//! their free energies with an external folding engine.
//! `concentrations`: solve for the equilibrium concentrations of these
//! complexes.
//!

pub mod input;
pub mod output;
pub mod engine;
pub mod config;
pub mod commands;
