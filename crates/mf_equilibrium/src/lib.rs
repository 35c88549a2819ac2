//! The mf_equilibrium crate.
//!
//! Computes equilibrium concentrations of the complexes of a strand
//! mixture, given the complex free energies and the total strand
//! concentrations:
//!  - Problem (stoichiometry, free energies, total concentrations)
//!  - Reformulation (removal of absent strands)
//!  - Trust-region dogleg minimization of the dual, with perturbation retries
//!  - Concentration reports in molar units
//!
//! Free energies are carried in units of kT, concentrations as mole
//! fractions. Conversions happen at the boundaries (see `units`).
//!

mod error;
mod units;
mod problem;
mod dogleg;
mod solver;
mod report;

pub use error::*;
pub use units::*;
pub use problem::*;
pub use solver::*;
pub use report::*;
