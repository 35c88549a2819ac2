//! Strands and the strand set shared by all downstream components.
//!
//! Strands are interned in input order and receive 1-based ids. The
//! set is immutable after loading, enumeration and the driver only
//! borrow it.

use ahash::AHashMap;

use crate::StrandIdx;
use crate::EnumerationError;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strand {
    id: StrandIdx,
    name: String,
    sequence: String,
}

impl Strand {
    /// 1-based strand id.
    pub fn id(&self) -> StrandIdx {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrandSet {
    strands: Vec<Strand>,
    names: AHashMap<String, StrandIdx>,
    counter: usize,
}

impl StrandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a strand and returns its id. Sequences are upper-cased and
    /// must only contain A, C, G, T or U.
    pub fn intern(&mut self, sequence: &str, name: Option<String>) -> Result<StrandIdx> {
        let id = (self.strands.len() + 1) as StrandIdx;
        let sequence = sequence.trim().to_ascii_uppercase();
        if sequence.is_empty() {
            return Err(EnumerationError::EmptySequence(id as usize));
        }
        if let Some(symbol) = sequence.chars().find(|c| !matches!(c, 'A' | 'C' | 'G' | 'T' | 'U')) {
            return Err(EnumerationError::InvalidNucleotide { strand: id as usize, symbol });
        }

        let assigned_name = match name {
            Some(n) => {
                if self.names.contains_key(&n) {
                    return Err(EnumerationError::DuplicateStrandName(n));
                }
                n
            }
            None => loop {
                self.counter += 1;
                let n = format!("s{}", self.counter);
                if !self.names.contains_key(&n) {
                    break n;
                }
            },
        };

        self.names.insert(assigned_name.clone(), id);
        self.strands.push(Strand { id, name: assigned_name, sequence });
        Ok(id)
    }

    /// Builds a set from unnamed sequences.
    pub fn from_sequences<S: AsRef<str>>(sequences: &[S]) -> Result<Self> {
        let mut set = Self::new();
        for seq in sequences {
            set.intern(seq.as_ref(), None)?;
        }
        if set.is_empty() {
            return Err(EnumerationError::NoStrands);
        }
        Ok(set)
    }

    /// Strand by 1-based id.
    pub fn get(&self, id: StrandIdx) -> Option<&Strand> {
        (id as usize).checked_sub(1).and_then(|i| self.strands.get(i))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Strand> {
        self.names.get(name).and_then(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.strands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strand> {
        self.strands.iter()
    }

    pub fn max_length(&self) -> usize {
        self.strands.iter().map(Strand::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_lookup() {
        let mut set = StrandSet::new();
        let a = set.intern("acgu", None).unwrap();
        let b = set.intern("GGGAAACCC", Some("hairpin".to_string())).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(set.get(1).unwrap().sequence(), "ACGU");
        assert_eq!(set.get(1).unwrap().name(), "s1");
        assert_eq!(set.get_by_name("hairpin").unwrap().id(), 2);
        assert!(set.get(0).is_none());
        assert!(set.get(3).is_none());
        assert_eq!(set.max_length(), 9);
    }

    #[test]
    fn test_auto_names_skip_taken() {
        let mut set = StrandSet::new();
        set.intern("A", Some("s1".to_string())).unwrap();
        set.intern("C", None).unwrap();
        assert_eq!(set.get(2).unwrap().name(), "s2");
    }

    #[test]
    fn test_invalid_input() {
        let mut set = StrandSet::new();
        assert_eq!(
            set.intern("ACGX", None),
            Err(EnumerationError::InvalidNucleotide { strand: 1, symbol: 'X' })
        );
        assert_eq!(set.intern("  ", None), Err(EnumerationError::EmptySequence(1)));
        set.intern("A", Some("x".to_string())).unwrap();
        assert_eq!(
            set.intern("C", Some("x".to_string())),
            Err(EnumerationError::DuplicateStrandName("x".to_string()))
        );
        let empty: [&str; 0] = [];
        assert!(matches!(StrandSet::from_sequences(&empty), Err(EnumerationError::NoStrands)));
    }
}
