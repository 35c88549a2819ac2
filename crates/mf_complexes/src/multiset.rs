//! Multisets (complexes) and the complete enumeration.
//!
//! All permutations live in one arena, sorted such that permutations
//! of the same composition are contiguous. A multiset refers to its
//! permutations by index range.
//!
//! Order of complexes: ascending number of strands, then composition,
//! where more copies of earlier strands come first (A, B, AA, AB, BB).
//!

use std::cmp::Reverse;
use std::ops::Range;
use log::{debug, info};

use crate::Permutation;
use crate::StrandSet;
use crate::ExtraComplexes;
use crate::EnumerationError;
use crate::necklaces;
use crate::multiset_count;
use crate::total_orderings;
use crate::error::Result;

/// Rough cost model of a partition function call: seconds per nt³.
const SECONDS_PER_CUBIC_NT: f64 = 1.0e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Multiset {
    composition: Vec<u32>,
    size: usize,
    total_length: usize,
    perms: Range<usize>,
    partition_function: f64,
    complex_id: Option<usize>,
}

impl Multiset {
    pub fn composition(&self) -> &[u32] {
        &self.composition
    }

    /// Number of strands.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of nucleotides.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn n_perms(&self) -> usize {
        self.perms.len()
    }

    pub fn perm_range(&self) -> Range<usize> {
        self.perms.clone()
    }

    /// Sum of the partition functions of all member permutations.
    pub fn partition_function(&self) -> f64 {
        self.partition_function
    }

    /// Assigned only if the partition function is positive.
    pub fn complex_id(&self) -> Option<usize> {
        self.complex_id
    }

    pub fn is_feasible(&self) -> bool {
        self.complex_id.is_some()
    }

    pub(crate) fn reset(&mut self) {
        self.partition_function = 0.0;
        self.complex_id = None;
    }

    pub(crate) fn add_partition_function(&mut self, pf: f64) {
        self.partition_function += pf;
    }

    pub(crate) fn set_complex_id(&mut self, id: usize) {
        self.complex_id = Some(id);
    }
}

/// Bookkeeping numbers of an enumeration, as reported in output headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationCounts {
    pub enumerated_sets: usize,
    pub extra_sets: usize,
    pub enumerated_perms: usize,
    pub extra_perms: usize,
}

impl EnumerationCounts {
    pub fn total_sets(&self) -> usize {
        self.enumerated_sets + self.extra_sets
    }

    pub fn total_perms(&self) -> usize {
        self.enumerated_perms + self.extra_perms
    }
}

#[derive(Debug, Clone)]
pub struct ComplexEnumeration {
    n_types: usize,
    max_size: usize,
    permutations: Vec<Permutation>,
    multisets: Vec<Multiset>,
    counts: EnumerationCounts,
}

impl ComplexEnumeration {

    /// Enumerates every ordered complex of up to `max_size` strands,
    /// adds the extra complexes, and groups them by composition.
    ///
    /// The number of generated permutations is checked against the
    /// necklace counting formulas, and the grouping against the
    /// multiset count. Any disagreement is an internal error.
    pub fn enumerate(
        strands: &StrandSet,
        max_size: usize,
        extra: &ExtraComplexes
    ) -> Result<Self> {
        let n_types = strands.len();
        if n_types == 0 {
            return Err(EnumerationError::NoStrands);
        }
        if extra.n_types() != n_types || extra.max_size() != max_size {
            return Err(EnumerationError::InvalidParameters(format!(
                "extra complexes declared for {} strands up to size {}, enumerating {} strands up to size {}",
                extra.n_types(), extra.max_size(), n_types, max_size)));
        }

        let predicted_auto = total_orderings(n_types, max_size)?;
        let predicted = predicted_auto.checked_add(extra.predicted_count())
            .ok_or(EnumerationError::Overflow("permutations"))?;
        let predicted_sets = multiset_count(n_types, max_size)?;

        let mut permutations: Vec<Permutation> = Vec::new();
        permutations.try_reserve_exact(predicted)
            .map_err(|_| EnumerationError::TooManyPermutations(predicted))?;
        for size in 1..=max_size {
            permutations.extend(necklaces(size, n_types));
        }
        let enumerated_perms = permutations.len();
        permutations.extend(extra.permutations().iter().cloned());

        if permutations.len() != predicted {
            return Err(EnumerationError::CountMismatch {
                expected: predicted,
                generated: permutations.len(),
            });
        }

        permutations.sort_by(|a, b| {
            (a.size(), Reverse(a.composition()), a.order())
                .cmp(&(b.size(), Reverse(b.composition()), b.order()))
        });

        let multisets = group_by_composition(&permutations, strands);

        let grouped: usize = multisets.iter().map(Multiset::n_perms).sum();
        if grouped != permutations.len() {
            return Err(EnumerationError::GroupingMismatch {
                what: "permutations in multisets",
                expected: permutations.len(),
                found: grouped,
            });
        }
        let enumerated_sets = multisets.iter().filter(|m| m.size <= max_size).count();
        if enumerated_sets != predicted_sets {
            return Err(EnumerationError::GroupingMismatch {
                what: "enumerated multisets",
                expected: predicted_sets,
                found: enumerated_sets,
            });
        }

        let counts = EnumerationCounts {
            enumerated_sets,
            extra_sets: multisets.len() - enumerated_sets,
            enumerated_perms,
            extra_perms: permutations.len() - enumerated_perms,
        };
        info!("Permutation generation complete: {} permutations in {} complexes.",
            counts.total_perms(), counts.total_sets());

        Ok(Self { n_types, max_size, permutations, multisets, counts })
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn counts(&self) -> EnumerationCounts {
        self.counts
    }

    pub fn multisets(&self) -> &[Multiset] {
        &self.multisets
    }

    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    /// The ordered complexes of one multiset.
    pub fn members(&self, multiset: &Multiset) -> &[Permutation] {
        &self.permutations[multiset.perm_range()]
    }

    /// Largest number of strands in any complex.
    pub fn largest_complex(&self) -> usize {
        self.multisets.iter().map(Multiset::size).max().unwrap_or(0)
    }

    /// Rough wall time of the partition function calculations in seconds.
    pub fn estimated_seconds(&self) -> f64 {
        self.multisets.iter()
            .map(|m| m.n_perms() as f64 * SECONDS_PER_CUBIC_NT * (m.total_length as f64).powi(3))
            .sum()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Multiset], &mut [Permutation]) {
        (&mut self.multisets, &mut self.permutations)
    }
}

/// Splits sorted permutations into runs of equal composition.
fn group_by_composition(permutations: &[Permutation], strands: &StrandSet) -> Vec<Multiset> {
    let mut multisets = Vec::new();
    let mut start = 0;
    while start < permutations.len() {
        let composition = permutations[start].composition();
        let end = permutations[start..].iter()
            .position(|p| p.composition() != composition)
            .map_or(permutations.len(), |offset| start + offset);
        let first = &permutations[start];
        debug!("Complex {:?}: {} permutations.", composition, end - start);
        multisets.push(Multiset {
            composition: composition.to_vec(),
            size: first.size(),
            total_length: first.total_length(strands),
            perms: start..end,
            partition_function: 0.0,
            complex_id: None,
        });
        start = end;
    }
    multisets
}
