//! Extra complexes beyond the enumerated size bound.
//!
//! Complexes larger than the maximum enumerated size can be declared
//! explicitly, either as a strand order (`1 2 2 3`) or as a composition
//! (`C 1 2 1`), which stands for every necklace with that content.

use ahash::AHashSet;

use crate::StrandIdx;
use crate::Permutation;
use crate::EnumerationError;
use crate::fixed_content_necklaces;
use crate::fixed_content_necklace_count;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ExtraComplexes {
    n_types: usize,
    max_size: usize,
    permutations: Vec<Permutation>,
    seen: AHashSet<Vec<StrandIdx>>,
    predicted: usize,
    n_orderings: usize,
    n_compositions: usize,
}

impl ExtraComplexes {
    /// An empty declaration list for `n_types` strands with automatic
    /// enumeration up to `max_size`.
    pub fn new(n_types: usize, max_size: usize) -> Self {
        Self {
            n_types,
            max_size,
            permutations: Vec::new(),
            seen: AHashSet::default(),
            predicted: 0,
            n_orderings: 0,
            n_compositions: 0,
        }
    }

    /// Declares one ordered complex.
    pub fn add_ordering(&mut self, order: Vec<StrandIdx>) -> Result<()> {
        let perm = Permutation::new(order, self.n_types)?;
        self.check_size(perm.size())?;
        self.push(perm)?;
        self.predicted += 1;
        self.n_orderings += 1;
        Ok(())
    }

    /// Declares all ordered complexes with the given strand counts.
    pub fn add_composition(&mut self, composition: Vec<u32>) -> Result<()> {
        if composition.len() != self.n_types {
            return Err(EnumerationError::CompositionLength {
                found: composition.len(),
                expected: self.n_types,
            });
        }
        let size: usize = composition.iter().map(|&c| c as usize).sum();
        if size == 0 {
            return Err(EnumerationError::EmptyComplex);
        }
        self.check_size(size)?;
        self.predicted += fixed_content_necklace_count(&composition)?;
        for perm in fixed_content_necklaces(&composition) {
            self.push(perm)?;
        }
        self.n_compositions += 1;
        Ok(())
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size <= self.max_size {
            return Err(EnumerationError::ComplexTooSmall { size, max_size: self.max_size });
        }
        Ok(())
    }

    fn push(&mut self, perm: Permutation) -> Result<()> {
        if !self.seen.insert(perm.canonical_order()) {
            return Err(EnumerationError::DuplicateOrdering(perm.order().to_vec()));
        }
        self.permutations.push(perm);
        Ok(())
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    /// Number of ordered complexes these declarations should produce.
    pub fn predicted_count(&self) -> usize {
        self.predicted
    }

    pub fn n_orderings(&self) -> usize {
        self.n_orderings
    }

    pub fn n_compositions(&self) -> usize {
        self.n_compositions
    }

    pub fn is_empty(&self) -> bool {
        self.permutations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orderings_and_compositions() {
        let mut extra = ExtraComplexes::new(3, 2);
        extra.add_ordering(vec![1, 2, 3]).unwrap();
        extra.add_composition(vec![2, 2, 0]).unwrap();
        assert_eq!(extra.predicted_count(), 3);
        assert_eq!(extra.permutations().len(), 3);
        assert_eq!(extra.n_orderings(), 1);
        assert_eq!(extra.n_compositions(), 1);
        assert_eq!(extra.permutations()[2].order(), &[1, 2, 1, 2]);
        assert_eq!(extra.permutations()[2].symmetry_factor(), 2);
    }

    #[test]
    fn test_ordering_symmetry_is_computed() {
        let mut extra = ExtraComplexes::new(2, 1);
        extra.add_ordering(vec![2, 2]).unwrap();
        assert_eq!(extra.permutations()[0].symmetry_factor(), 2);
    }

    #[test]
    fn test_size_bound_is_strict() {
        let mut extra = ExtraComplexes::new(2, 2);
        assert_eq!(
            extra.add_ordering(vec![1, 2]),
            Err(EnumerationError::ComplexTooSmall { size: 2, max_size: 2 })
        );
        assert_eq!(
            extra.add_composition(vec![1, 1]),
            Err(EnumerationError::ComplexTooSmall { size: 2, max_size: 2 })
        );
        assert!(extra.add_ordering(vec![1, 2, 2]).is_ok());
    }

    #[test]
    fn test_invalid_declarations() {
        let mut extra = ExtraComplexes::new(2, 1);
        assert_eq!(
            extra.add_ordering(vec![1, 3]),
            Err(EnumerationError::StrandOutOfRange { index: 3, n_strands: 2 })
        );
        assert_eq!(
            extra.add_composition(vec![1, 1, 1]),
            Err(EnumerationError::CompositionLength { found: 3, expected: 2 })
        );
        assert_eq!(extra.add_composition(vec![0, 0]), Err(EnumerationError::EmptyComplex));
        assert!(extra.is_empty());
    }

    #[test]
    fn test_duplicates_up_to_rotation() {
        let mut extra = ExtraComplexes::new(2, 1);
        extra.add_ordering(vec![1, 1, 2]).unwrap();
        assert_eq!(
            extra.add_ordering(vec![2, 1, 1]),
            Err(EnumerationError::DuplicateOrdering(vec![2, 1, 1]))
        );
        assert_eq!(
            extra.add_composition(vec![2, 1]),
            Err(EnumerationError::DuplicateOrdering(vec![1, 1, 2]))
        );
    }
}
