//! The mf_complexes crate.
//!
//! Enumerates the multi-stranded complexes of a strand mixture:
//!  - Strands
//!  - Permutations (ordered complexes, one necklace per rotation class)
//!  - Multisets (complexes, identified by their strand composition)
//!
//! Provides the partition-function driver that hands every ordered
//! complex to an external folding engine and numbers the feasible
//! complexes.
//!

mod error;
mod strand;
mod counting;
mod permutation;
mod multiset;
mod extra;
mod driver;

pub use error::*;
pub use strand::*;
pub use counting::*;
pub use permutation::*;
pub use multiset::*;
pub use extra::*;
pub use driver::*;

/// Strand type index: 1-based, as strands are numbered in input files.
pub type StrandIdx = u32;

