//! The equilibrium problem and its reformulation.
//!
//! Species are the strand types, complexes the columns of the
//! stoichiometry matrix: `A[i][j]` is the number of strands of type i in
//! complex j. Free energies are in kT, total concentrations are mole
//! fractions.
//!

use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use nohash_hasher::IntMap;
use serde::{Deserialize, Serialize};

use crate::EquilibriumError;
use crate::error::Result;
use crate::kcal_to_kt;
use crate::molar_to_mole_fraction;

/// Complex free energies above this (in kT) are suspicious.
const POSITIVE_FREE_ENERGY_WARNING: f64 = 0.0001;

/// One ordered complex with its free energy in kcal/mol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedComplex {
    pub complex_id: usize,
    pub perm_id: usize,
    pub composition: Vec<u32>,
    pub free_energy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumProblem {
    stoichiometry: Array2<u32>,
    free_energy: Array1<f64>,
    x0: Array1<f64>,
    complex_ids: Vec<usize>,
}

impl EquilibriumProblem {
    /// Checks dimensions and values of a problem in kT and mole fractions.
    pub fn new(
        stoichiometry: Array2<u32>,
        free_energy: Array1<f64>,
        x0: Array1<f64>,
        complex_ids: Vec<usize>,
    ) -> Result<Self> {
        let (n_species, n_complexes) = stoichiometry.dim();
        if x0.len() != n_species {
            return Err(EquilibriumError::DimensionMismatch {
                what: "total concentrations",
                expected: n_species,
                found: x0.len(),
            });
        }
        if free_energy.len() != n_complexes {
            return Err(EquilibriumError::DimensionMismatch {
                what: "free energies",
                expected: n_complexes,
                found: free_energy.len(),
            });
        }
        if complex_ids.len() != n_complexes {
            return Err(EquilibriumError::DimensionMismatch {
                what: "complex ids",
                expected: n_complexes,
                found: complex_ids.len(),
            });
        }
        if let Some((i, &value)) = x0.iter().enumerate().find(|&(_, &v)| !(v >= 0.0)) {
            return Err(EquilibriumError::NegativeConcentration { species: i + 1, value });
        }
        if let Some(j) = free_energy.iter().position(|g| !g.is_finite()) {
            return Err(EquilibriumError::NonFiniteFreeEnergy(complex_ids[j]));
        }
        Ok(Self { stoichiometry, free_energy, x0, complex_ids })
    }

    /// Builds the problem from ordered complexes (kcal/mol) and molar
    /// total concentrations at `temperature` in °C.
    ///
    /// Permutations of one complex are combined into the complex free
    /// energy `G = -ln Σ exp(-G_π / kT)`. Complex ids must run from 1
    /// without gaps.
    pub fn from_ordered_complexes(
        records: &[OrderedComplex],
        concentrations: &[f64],
        temperature: f64,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(EquilibriumError::NoComplexes);
        }
        let n_species = concentrations.len();

        // complex id -> (composition, permutation energies in kT)
        let mut index: IntMap<usize, usize> = IntMap::default();
        let mut complexes: Vec<(usize, &[u32], Vec<f64>)> = Vec::new();
        for record in records {
            if record.composition.len() != n_species {
                return Err(EquilibriumError::DimensionMismatch {
                    what: "composition",
                    expected: n_species,
                    found: record.composition.len(),
                });
            }
            if !record.free_energy.is_finite() {
                return Err(EquilibriumError::NonFiniteFreeEnergy(record.complex_id));
            }
            let g = kcal_to_kt(record.free_energy, temperature);
            let k = *index.entry(record.complex_id).or_insert_with(|| {
                complexes.push((record.complex_id, record.composition.as_slice(), Vec::new()));
                complexes.len() - 1
            });
            let entry = &mut complexes[k];
            if entry.1 != record.composition.as_slice() {
                return Err(EquilibriumError::InconsistentComposition(record.complex_id));
            }
            entry.2.push(g);
        }
        complexes.sort_by_key(|c| c.0);
        for (k, c) in complexes.iter().enumerate() {
            if c.0 != k + 1 {
                return Err(EquilibriumError::NonSequentialIds { expected: k + 1, found: c.0 });
            }
        }

        let n_complexes = complexes.len();
        let mut stoichiometry = Array2::zeros((n_species, n_complexes));
        let mut free_energy = Array1::zeros(n_complexes);
        for (j, (_, composition, perms)) in complexes.iter().enumerate() {
            for (i, &count) in composition.iter().enumerate() {
                stoichiometry[[i, j]] = count;
            }
            free_energy[j] = combine_free_energies(perms);
        }
        if let Some(j) = free_energy.iter().position(|&g| g > POSITIVE_FREE_ENERGY_WARNING) {
            warn!("At least one free energy is > 0 ({} kT for complex {}), it is likely there is an input error.",
                free_energy[j], j + 1);
        }

        let x0 = concentrations.iter()
            .map(|&c| molar_to_mole_fraction(c, temperature))
            .collect();
        Self::new(stoichiometry, free_energy, x0, (1..=n_complexes).collect())
    }

    pub fn n_species(&self) -> usize {
        self.stoichiometry.nrows()
    }

    pub fn n_complexes(&self) -> usize {
        self.stoichiometry.ncols()
    }

    pub fn stoichiometry(&self) -> &Array2<u32> {
        &self.stoichiometry
    }

    /// Complex free energies in kT.
    pub fn free_energy(&self) -> &Array1<f64> {
        &self.free_energy
    }

    /// Total concentrations as mole fractions.
    pub fn x0(&self) -> &Array1<f64> {
        &self.x0
    }

    pub fn complex_ids(&self) -> &[usize] {
        &self.complex_ids
    }

    /// Removes species with zero total concentration and every complex
    /// that contains one of them. The relative order of the remaining
    /// species and complexes is kept.
    pub fn reformulate(&self) -> Result<Reformulation> {
        let species: Vec<usize> = (0..self.n_species())
            .filter(|&i| self.x0[i] > f64::MIN_POSITIVE)
            .collect();
        let complexes: Vec<usize> = (0..self.n_complexes())
            .filter(|&j| (0..self.n_species())
                .all(|i| self.stoichiometry[[i, j]] == 0 || species.contains(&i)))
            .collect();

        let stoichiometry = self.stoichiometry
            .select(Axis(0), &species)
            .select(Axis(1), &complexes);
        let free_energy = self.free_energy.select(Axis(0), &complexes);
        let x0 = self.x0.select(Axis(0), &species);
        let complex_ids = complexes.iter().map(|&j| self.complex_ids[j]).collect();

        for (k, row) in stoichiometry.rows().into_iter().enumerate() {
            if row.iter().all(|&a| a == 0) {
                return Err(EquilibriumError::UnformableSpecies(species[k] + 1));
            }
        }
        debug!("Reformulated problem: {} of {} species, {} of {} complexes.",
            species.len(), self.n_species(), complexes.len(), self.n_complexes());

        let problem = Self::new(stoichiometry, free_energy, x0, complex_ids)?;
        Ok(Reformulation {
            problem,
            species,
            complexes,
            n_complexes: self.n_complexes(),
        })
    }
}

/// A reduced problem and the map back to the full one.
#[derive(Debug, Clone, PartialEq)]
pub struct Reformulation {
    pub problem: EquilibriumProblem,
    /// Indices of the kept species in the full problem.
    pub species: Vec<usize>,
    /// Indices of the kept complexes in the full problem.
    pub complexes: Vec<usize>,
    n_complexes: usize,
}

impl Reformulation {
    pub fn is_trivial(&self) -> bool {
        self.complexes.len() == self.n_complexes
    }

    /// Mole fractions of the full problem, zero for removed complexes.
    pub fn expand(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut full = Array1::zeros(self.n_complexes);
        for (&j, &v) in self.complexes.iter().zip(x.iter()) {
            full[j] = v;
        }
        full
    }
}

/// -ln Σ exp(-g), evaluated without overflow.
fn combine_free_energies(energies: &[f64]) -> f64 {
    let min = energies.iter().copied().fold(f64::INFINITY, f64::min);
    let sum: f64 = energies.iter().map(|&g| (min - g).exp()).sum();
    min - sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use crate::kt;

    fn record(complex_id: usize, perm_id: usize, composition: &[u32], free_energy: f64) -> OrderedComplex {
        OrderedComplex { complex_id, perm_id, composition: composition.to_vec(), free_energy }
    }

    fn three_strands() -> EquilibriumProblem {
        // A, B, C, AB, AC, ABC
        EquilibriumProblem::new(
            array![[1, 0, 0, 1, 1, 1], [0, 1, 0, 1, 0, 1], [0, 0, 1, 0, 1, 1]],
            array![-12.8, -15.9, -15.9, -78.6, -78.6, -103.2],
            array![1e-7, 0.0, 2e-7],
            (1..=6).collect(),
        ).unwrap()
    }

    #[test]
    fn test_new_checks_dimensions() {
        let err = EquilibriumProblem::new(
            array![[1, 0], [0, 1]], array![0.0, 0.0], array![1.0], vec![1, 2]);
        assert_eq!(err, Err(EquilibriumError::DimensionMismatch {
            what: "total concentrations", expected: 2, found: 1 }));
        let err = EquilibriumProblem::new(
            array![[1, 0], [0, 1]], array![0.0], array![1.0, 1.0], vec![1, 2]);
        assert!(matches!(err, Err(EquilibriumError::DimensionMismatch { what: "free energies", .. })));
        let err = EquilibriumProblem::new(
            array![[1, 0], [0, 1]], array![0.0, 0.0], array![1.0, -1.0], vec![1, 2]);
        assert_eq!(err, Err(EquilibriumError::NegativeConcentration { species: 2, value: -1.0 }));
        let err = EquilibriumProblem::new(
            array![[1, 0], [0, 1]], array![0.0, f64::NAN], array![1.0, 1.0], vec![1, 2]);
        assert_eq!(err, Err(EquilibriumError::NonFiniteFreeEnergy(2)));
    }

    #[test]
    fn test_reformulate_removes_absent_species() {
        let problem = three_strands();
        let r = problem.reformulate().unwrap();
        assert!(!r.is_trivial());
        assert_eq!(r.species, vec![0, 2]);
        assert_eq!(r.complexes, vec![0, 2, 4]);
        assert_eq!(r.problem.complex_ids(), &[1, 3, 5]);
        assert_eq!(r.problem.stoichiometry(), &array![[1u32, 0, 1], [0, 1, 1]]);
        assert_eq!(r.problem.free_energy(), &array![-12.8, -15.9, -78.6]);
        assert_eq!(r.problem.x0(), &array![1e-7, 2e-7]);
        assert_eq!(r.expand(&array![1.0, 2.0, 3.0]), array![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_reformulate_is_idempotent() {
        let problem = three_strands();
        let once = problem.reformulate().unwrap().problem;
        let twice = once.reformulate().unwrap();
        assert!(twice.is_trivial());
        assert_eq!(twice.problem, once);
    }

    #[test]
    fn test_unformable_species() {
        let problem = EquilibriumProblem::new(
            array![[1, 1], [0, 1]], array![0.0, -1.0], array![0.0, 1e-6], vec![1, 2]).unwrap();
        assert_eq!(problem.reformulate(), Err(EquilibriumError::UnformableSpecies(2)));
    }

    #[test]
    fn test_from_ordered_complexes() {
        let t = 37.0;
        let records = vec![
            record(1, 1, &[1, 0], -1.0),
            record(2, 1, &[0, 1], -2.0),
            record(3, 1, &[2, 1], -10.0),
            record(3, 2, &[2, 1], -10.0),
        ];
        let p = EquilibriumProblem::from_ordered_complexes(&records, &[1e-6, 2e-6], t).unwrap();
        assert_eq!(p.n_species(), 2);
        assert_eq!(p.n_complexes(), 3);
        assert_eq!(p.complex_ids(), &[1, 2, 3]);
        assert_eq!(p.stoichiometry(), &array![[1u32, 0, 2], [0, 1, 1]]);
        assert_relative_eq!(p.free_energy()[0], -1.0 / kt(t), max_relative = 1e-12);
        // Two equal permutations double the partition function.
        assert_relative_eq!(p.free_energy()[2], -10.0 / kt(t) - 2f64.ln(), max_relative = 1e-12);
        assert_relative_eq!(p.x0()[1], 2e-6 / crate::water_molarity(t), max_relative = 1e-12);
    }

    #[test]
    fn test_from_ordered_complexes_errors() {
        let records = vec![record(1, 1, &[1, 0], -1.0), record(3, 1, &[0, 1], -1.0)];
        assert_eq!(
            EquilibriumProblem::from_ordered_complexes(&records, &[1.0, 1.0], 37.0),
            Err(EquilibriumError::NonSequentialIds { expected: 2, found: 3 })
        );
        let records = vec![record(1, 1, &[1, 1], -1.0), record(1, 2, &[2, 0], -1.0)];
        assert_eq!(
            EquilibriumProblem::from_ordered_complexes(&records, &[1.0, 1.0], 37.0),
            Err(EquilibriumError::InconsistentComposition(1))
        );
        let records = vec![record(1, 1, &[1], -1.0)];
        assert!(matches!(
            EquilibriumProblem::from_ordered_complexes(&records, &[1.0, 1.0], 37.0),
            Err(EquilibriumError::DimensionMismatch { what: "composition", .. })
        ));
        assert_eq!(
            EquilibriumProblem::from_ordered_complexes(&[], &[1.0], 37.0),
            Err(EquilibriumError::NoComplexes)
        );
    }

    #[test]
    fn test_combine_free_energies() {
        assert_relative_eq!(combine_free_energies(&[-3.0]), -3.0);
        assert_relative_eq!(combine_free_energies(&[-1000.0, -1000.0]), -1000.0 - 2f64.ln());
    }
}
