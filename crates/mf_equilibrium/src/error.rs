use thiserror::Error;

/// Fatal errors of equilibrium problem construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquilibriumError {
    #[error("dimension mismatch: {what} has {found} entries, expected {expected}")]
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    #[error("negative total concentration {value} for strand {species}")]
    NegativeConcentration { species: usize, value: f64 },

    /// A strand is present but no complex can take it up.
    #[error("strand {0} has a non-zero concentration but is part of no complex")]
    UnformableSpecies(usize),

    #[error("complex {0} has a non-finite free energy")]
    NonFiniteFreeEnergy(usize),

    #[error("complex ids must be contiguous from 1: expected {expected}, found {found}")]
    NonSequentialIds { expected: usize, found: usize },

    #[error("permutations of complex {0} have different compositions")]
    InconsistentComposition(usize),

    #[error("no complexes given")]
    NoComplexes,
}

pub type Result<T> = std::result::Result<T, EquilibriumError>;
