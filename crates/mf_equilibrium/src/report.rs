//! Equilibrium concentrations per ordered complex, in output units.

use std::cmp::{Ordering, Reverse};
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::OrderedComplex;
use crate::EquilibriumError;
use crate::EquilibriumProblem;
use crate::EquilibriumSolution;
use crate::error::Result;
use crate::kcal_to_kt;
use crate::water_molarity;

/// Order of output rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SortOrder {
    /// Input order.
    None,
    /// Permutation concentration, descending.
    #[default]
    PermConcentration,
    /// Complex concentration descending, then permutation concentration.
    ComplexConcentration,
    /// Complex id, then permutation id.
    ComplexId,
    /// Number of strands, then composition (A, B, AA, AB, BB).
    Composition,
}

impl TryFrom<u8> for SortOrder {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SortOrder::None),
            1 => Ok(SortOrder::PermConcentration),
            2 => Ok(SortOrder::ComplexConcentration),
            3 => Ok(SortOrder::ComplexId),
            4 => Ok(SortOrder::Composition),
            v => Err(format!("invalid sort order {v}, expected 0 to 4")),
        }
    }
}

impl From<SortOrder> for u8 {
    fn from(order: SortOrder) -> u8 {
        order as u8
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// One ordered complex at equilibrium.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcentrationRow {
    pub complex_id: usize,
    pub perm_id: usize,
    pub composition: Vec<u32>,
    /// kcal/mol
    pub free_energy: f64,
    /// Molar concentration of this ordering.
    pub perm_concentration: f64,
    /// Molar concentration of the complex, summed over its orderings.
    pub complex_concentration: f64,
}

impl ConcentrationRow {
    pub fn size(&self) -> u32 {
        self.composition.iter().sum()
    }
}

/// Splits the complex mole fractions of `solution` over the ordered
/// complexes: `x_π = x_j exp(G_j - G_π)`.
pub fn concentration_rows(
    problem: &EquilibriumProblem,
    records: &[OrderedComplex],
    solution: &EquilibriumSolution,
    temperature: f64,
) -> Result<Vec<ConcentrationRow>> {
    let n = problem.n_complexes();
    if solution.mole_fractions.len() != n {
        return Err(EquilibriumError::DimensionMismatch {
            what: "mole fractions",
            expected: n,
            found: solution.mole_fractions.len(),
        });
    }
    let molarity = water_molarity(temperature);
    records.iter().map(|record| -> Result<ConcentrationRow> {
        let j = record.complex_id.checked_sub(1)
            .filter(|&j| j < n)
            .ok_or(EquilibriumError::NonSequentialIds { expected: n, found: record.complex_id })?;
        let x = solution.mole_fractions[j];
        let g_perm = kcal_to_kt(record.free_energy, temperature);
        let x_perm = x * (problem.free_energy()[j] - g_perm).exp();
        Ok(ConcentrationRow {
            complex_id: record.complex_id,
            perm_id: record.perm_id,
            composition: record.composition.clone(),
            free_energy: record.free_energy,
            perm_concentration: x_perm * molarity,
            complex_concentration: x * molarity,
        })
    }).collect()
}

pub fn sort_rows(rows: &mut [ConcentrationRow], order: SortOrder) {
    let by_ids = |a: &ConcentrationRow, b: &ConcentrationRow| {
        (a.complex_id, a.perm_id).cmp(&(b.complex_id, b.perm_id))
    };
    match order {
        SortOrder::None => (),
        SortOrder::PermConcentration => rows.sort_by(|a, b| {
            descending(a.perm_concentration, b.perm_concentration)
                .then_with(|| by_ids(a, b))
        }),
        SortOrder::ComplexConcentration => rows.sort_by(|a, b| {
            if a.complex_id == b.complex_id {
                descending(a.perm_concentration, b.perm_concentration)
                    .then(a.perm_id.cmp(&b.perm_id))
            } else {
                descending(a.complex_concentration, b.complex_concentration)
                    .then(a.complex_id.cmp(&b.complex_id))
            }
        }),
        SortOrder::ComplexId => rows.sort_by(by_ids),
        SortOrder::Composition => rows.sort_by(|a, b| {
            (a.size(), Reverse(&a.composition))
                .cmp(&(b.size(), Reverse(&b.composition)))
                .then_with(|| by_ids(a, b))
        }),
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
