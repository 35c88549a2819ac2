use thiserror::Error;

use crate::StrandIdx;

/// Fatal errors of complex enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerationError {
    /// A sequence contains a character outside the nucleotide alphabet.
    #[error("invalid nucleotide '{symbol}' in strand {strand}")]
    InvalidNucleotide { strand: usize, symbol: char },

    #[error("strand {0} has an empty sequence")]
    EmptySequence(usize),

    #[error("strand name '{0}' already exists")]
    DuplicateStrandName(String),

    #[error("no strands given")]
    NoStrands,

    /// Counting formulas left the range of machine integers.
    #[error("integer overflow while counting {0}")]
    Overflow(&'static str),

    /// The predicted permutations do not fit in memory.
    #[error("cannot allocate memory for {0} permutations")]
    TooManyPermutations(usize),

    /// The generated permutations disagree with the necklace count.
    #[error("internal error: expected {expected} permutations, generated {generated}")]
    CountMismatch { expected: usize, generated: usize },

    /// The multiset grouping disagrees with the permutation bookkeeping.
    #[error("internal error: {what} (expected {expected}, found {found})")]
    GroupingMismatch { what: &'static str, expected: usize, found: usize },

    #[error("strand index {index} is out of range (1..={n_strands})")]
    StrandOutOfRange { index: StrandIdx, n_strands: usize },

    #[error("composition has {found} entries, expected {expected}")]
    CompositionLength { found: usize, expected: usize },

    #[error("extra complexes must contain at least one strand")]
    EmptyComplex,

    /// Extra complexes must be larger than the enumerated size bound.
    #[error("extra complex of size {size} is covered by enumeration up to size {max_size}")]
    ComplexTooSmall { size: usize, max_size: usize },

    #[error("ordered complex {0:?} is declared more than once")]
    DuplicateOrdering(Vec<StrandIdx>),

    #[error("invalid folding parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, EnumerationError>;

