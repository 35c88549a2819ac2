//! Permutations, i.e. ordered complexes.
//!
//! An ordered complex is a cyclic arrangement of strands, so two orders
//! that are rotations of each other describe the same complex. We keep
//! one canonical representative per rotation class: the necklace, which
//! is the lexicographically smallest rotation. Its symmetry factor is
//! the number of rotations that map the order onto itself.
//!

use std::fmt;
use itertools::Itertools;

use crate::StrandIdx;
use crate::StrandSet;
use crate::EnumerationError;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Permutation {
    order: Vec<StrandIdx>,
    composition: Vec<u32>,
    symmetry: u32,
    partition_function: Option<f64>,
}

/// Sequence of an ordered complex as handed to a folding engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatenatedSequence {
    /// Strand sequences joined by `+`.
    pub sequence: String,
    /// Cumulative strand lengths at every strand boundary but the last.
    pub nicks: Vec<usize>,
}

impl Permutation {
    /// A permutation from a 1-based strand order over `n_types` strand types.
    pub fn new(order: Vec<StrandIdx>, n_types: usize) -> Result<Self> {
        if order.is_empty() {
            return Err(EnumerationError::EmptyComplex);
        }
        let mut composition = vec![0u32; n_types];
        for &s in &order {
            if s == 0 || s as usize > n_types {
                return Err(EnumerationError::StrandOutOfRange { index: s, n_strands: n_types });
            }
            composition[s as usize - 1] += 1;
        }
        let symmetry = symmetry_factor(&order);
        Ok(Self { order, composition, symmetry, partition_function: None })
    }

    fn from_symbols(symbols: &[usize], n_types: usize, symmetry: u32) -> Self {
        let mut composition = vec![0u32; n_types];
        for &s in symbols {
            composition[s] += 1;
        }
        Self {
            order: symbols.iter().map(|&s| (s + 1) as StrandIdx).collect(),
            composition,
            symmetry,
            partition_function: None,
        }
    }

    pub fn order(&self) -> &[StrandIdx] {
        &self.order
    }

    /// Per-strand-type occurrence counts.
    pub fn composition(&self) -> &[u32] {
        &self.composition
    }

    /// Number of strands in the complex.
    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn symmetry_factor(&self) -> u32 {
        self.symmetry
    }

    /// `None` until the driver has evaluated this permutation.
    pub fn partition_function(&self) -> Option<f64> {
        self.partition_function
    }

    pub(crate) fn set_partition_function(&mut self, pf: f64) {
        self.partition_function = Some(pf);
    }

    /// True if `other` is a cyclic rotation of this order.
    pub fn is_rotation_of(&self, other: &Permutation) -> bool {
        let n = self.order.len();
        n == other.order.len()
            && (0..n).any(|shift| (0..n).all(|i| self.order[(i + shift) % n] == other.order[i]))
    }

    /// The lexicographically smallest rotation (the necklace).
    pub fn canonical_order(&self) -> Vec<StrandIdx> {
        canonical_rotation(&self.order)
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical_order() == self.order
    }

    /// Joins the strand sequences in permutation order.
    pub fn concatenate(&self, strands: &StrandSet) -> ConcatenatedSequence {
        let seqs: Vec<&str> = self.order.iter()
            .map(|&s| strands.get(s).map_or("", |strand| strand.sequence()))
            .collect();
        let nicks = seqs.iter()
            .take(seqs.len().saturating_sub(1))
            .scan(0, |acc, s| {
                *acc += s.len();
                Some(*acc)
            })
            .collect();
        ConcatenatedSequence { sequence: seqs.join("+"), nicks }
    }

    /// Total number of nucleotides.
    pub fn total_length(&self, strands: &StrandSet) -> usize {
        self.order.iter()
            .filter_map(|&s| strands.get(s))
            .map(|strand| strand.len())
            .sum()
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order.iter().join(" "))
    }
}

/// Size of the rotational stabilizer of an order: L/p where p is the
/// smallest shift, dividing L, that reproduces the order.
pub fn symmetry_factor<T: PartialEq>(order: &[T]) -> u32 {
    let n = order.len();
    if n == 0 {
        return 1;
    }
    let period = (1..=n)
        .filter(|p| n % p == 0)
        .find(|&p| (0..n).all(|i| order[i] == order[(i + p) % n]))
        .unwrap_or(n);
    (n / period) as u32
}

/// The lexicographically smallest rotation of `order`.
pub fn canonical_rotation<T: Ord + Clone>(order: &[T]) -> Vec<T> {
    let n = order.len();
    (0..n)
        .map(|shift| order[shift..].iter().chain(&order[..shift]).cloned().collect::<Vec<T>>())
        .min()
        .unwrap_or_default()
}

/// All necklaces of length `size` over `n_types` strand types, in
/// lexicographic order, each with its symmetry factor.
///
/// Iterative FKM generation: every step produces a prenecklace whose
/// smallest period is the position of the last increment; it is a
/// necklace iff that period divides `size`.
pub fn necklaces(size: usize, n_types: usize) -> Vec<Permutation> {
    let mut result = Vec::new();
    if size == 0 || n_types == 0 {
        return result;
    }
    let mut a = vec![0usize; size];
    result.push(Permutation::from_symbols(&a, n_types, size as u32));
    loop {
        let Some(i) = (0..size).rev().find(|&i| a[i] + 1 < n_types) else {
            break;
        };
        a[i] += 1;
        let period = i + 1;
        for j in period..size {
            a[j] = a[j - period];
        }
        if size % period == 0 {
            let symmetry = (size / period) as u32;
            debug_assert_eq!(symmetry, symmetry_factor(&a));
            result.push(Permutation::from_symbols(&a, n_types, symmetry));
        }
    }
    result
}

/// All necklaces with the given content (`composition[i]` copies of
/// strand i+1), in lexicographic order.
pub fn fixed_content_necklaces(composition: &[u32]) -> Vec<Permutation> {
    let n_types = composition.len();
    let mut symbols: Vec<usize> = composition.iter()
        .enumerate()
        .flat_map(|(s, &c)| std::iter::repeat_n(s, c as usize))
        .collect();
    let mut result = Vec::new();
    if symbols.is_empty() {
        return result;
    }
    loop {
        if canonical_rotation(&symbols) == symbols {
            let symmetry = symmetry_factor(&symbols);
            result.push(Permutation::from_symbols(&symbols, n_types, symmetry));
        }
        if !next_permutation(&mut symbols) {
            break;
        }
    }
    result
}

/// Advances to the next lexicographic permutation; false after the last.
fn next_permutation(v: &mut [usize]) -> bool {
    let Some(i) = (1..v.len()).rev().find(|&i| v[i - 1] < v[i]) else {
        return false;
    };
    let j = (i..v.len()).rev().find(|&j| v[j] > v[i - 1]).unwrap_or(i);
    v.swap(i - 1, j);
    v[i..].reverse();
    true
}
