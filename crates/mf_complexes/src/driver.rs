//! Partition-function driver.
//!
//! Hands every ordered complex to a folding engine, sums the results
//! per multiset, and numbers the feasible multisets. Evaluation and
//! numbering are separate passes: evaluation order does not matter,
//! numbering always follows the enumeration order.
//!

use std::fmt;
use std::str::FromStr;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::Multiset;
use crate::Permutation;
use crate::StrandSet;
use crate::ComplexEnumeration;
use crate::EnumerationError;
use crate::error::Result;

/// Nearest-neighbor parameter set of the folding engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    /// DNA, 1998.
    Dna,
    /// RNA, 1995.
    Rna,
    /// RNA, 1999.
    Rna37,
    /// A parameter file understood by the engine.
    Custom(String),
}

impl FromStr for Material {
    type Err = EnumerationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(EnumerationError::InvalidParameters("empty material".to_string())),
            "dna" | "dna1998" => Ok(Material::Dna),
            "rna" | "rna1995" => Ok(Material::Rna),
            "rna37" | "rna1999" => Ok(Material::Rna37),
            other => Ok(Material::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Material::Dna => write!(f, "DNA, 1998"),
            Material::Rna => write!(f, "RNA, 1995"),
            Material::Rna37 => write!(f, "RNA, 1999"),
            Material::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl Material {
    /// The name the engine is called with.
    pub fn engine_name(&self) -> &str {
        match self {
            Material::Dna => "dna1998",
            Material::Rna => "rna1995",
            Material::Rna37 => "rna1999",
            Material::Custom(name) => name,
        }
    }
}

/// Treatment of dangling ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dangles {
    None,
    Some,
    All,
}

impl FromStr for Dangles {
    type Err = EnumerationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" | "none" => Ok(Dangles::None),
            "1" | "some" => Ok(Dangles::Some),
            "2" | "all" => Ok(Dangles::All),
            other => Err(EnumerationError::InvalidParameters(
                format!("invalid dangles value '{other}'"))),
        }
    }
}

impl fmt::Display for Dangles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dangles::None => "none",
            Dangles::Some => "some",
            Dangles::All => "all",
        };
        write!(f, "{name}")
    }
}

impl Dangles {
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

/// Conditions for the folding engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldingParams {
    /// Temperature in °C.
    pub temperature: f64,
    pub material: Material,
    pub dangles: Dangles,
    /// Molar sodium concentration.
    pub sodium: f64,
    /// Molar magnesium concentration.
    pub magnesium: f64,
    /// Long-helix salt correction mode.
    pub long_helix_salt: bool,
}

impl Default for FoldingParams {
    fn default() -> Self {
        Self {
            temperature: 37.0,
            material: Material::Rna,
            dangles: Dangles::Some,
            sodium: 1.0,
            magnesium: 0.0,
            long_helix_salt: false,
        }
    }
}

impl FoldingParams {
    /// Checks the salt conditions, resetting what the engine cannot use.
    pub fn validate(mut self) -> Result<Self> {
        if !self.temperature.is_finite() || self.temperature <= -273.15 {
            return Err(EnumerationError::InvalidParameters(
                format!("invalid temperature {} C", self.temperature)));
        }
        if (self.sodium != 1.0 || self.magnesium != 0.0) && self.material != Material::Dna {
            warn!("No salt corrections available for RNA. Using 1 M Na and 0 M Mg.");
            self.sodium = 1.0;
            self.magnesium = 0.0;
        }
        if self.sodium <= 0.0 {
            return Err(EnumerationError::InvalidParameters(
                "sodium concentration must be > 0".to_string()));
        }
        if self.magnesium < 0.0 {
            return Err(EnumerationError::InvalidParameters(
                "magnesium concentration must be >= 0".to_string()));
        }
        if self.sodium < 0.05 || self.sodium > 1.1 {
            warn!("Salt correction only verified for 0.05 M < [Na+] < 1.1 M, [Na+] = {} M may give erroneous results.", self.sodium);
        }
        if self.magnesium > 0.2 {
            warn!("Salt correction only verified for [Mg2+] <= 0.2 M, [Mg2+] = {} M may give erroneous results.", self.magnesium);
        }
        if self.long_helix_salt && self.magnesium > 0.0 {
            warn!("No magnesium correction parameters for the long helix salt mode. Using [Mg2+] = 0.");
            self.magnesium = 0.0;
        }
        Ok(self)
    }
}

/// One call to the folding engine.
#[derive(Debug, Clone, Copy)]
pub struct FoldingQuery<'a> {
    /// Strand sequences joined by `+`.
    pub sequence: &'a str,
    /// Cumulative strand lengths at the strand boundaries.
    pub nicks: &'a [usize],
    pub symmetry_factor: u32,
}

/// Black-box evaluation of the partition function of an ordered complex.
///
/// Returns a non-negative value, zero means there is no legal secondary
/// structure. Implementations must not fail, an engine that cannot
/// answer reports zero.
pub trait FoldingEngine {
    fn partition_function(&self, query: &FoldingQuery<'_>, params: &FoldingParams) -> f64;

    /// Number of calls so far that could not be answered and were
    /// reported as zero.
    fn failed_calls(&self) -> usize {
        0
    }
}

impl<F> FoldingEngine for F
where
    F: Fn(&FoldingQuery<'_>, &FoldingParams) -> f64,
{
    fn partition_function(&self, query: &FoldingQuery<'_>, params: &FoldingParams) -> f64 {
        self(query, params)
    }
}

/// Result of one ordered complex after evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PermutationResult<'a> {
    /// Complex id of the owning multiset, if it is feasible.
    pub complex_id: Option<usize>,
    /// 1-based index within the owning multiset.
    pub perm_id: usize,
    pub multiset: &'a Multiset,
    pub permutation: &'a Permutation,
}

impl PermutationResult<'_> {
    pub fn partition_function(&self) -> f64 {
        self.permutation.partition_function().unwrap_or(0.0)
    }

    pub fn is_feasible(&self) -> bool {
        self.partition_function() > 0.0
    }
}

/// Evaluates every permutation and numbers the feasible multisets.
/// Returns the number of feasible complexes.
///
/// `progress` is called after each multiset with the completed fraction
/// of the work, estimated as the sum of cubed complex lengths.
pub fn compute_partition_functions<E>(
    enumeration: &mut ComplexEnumeration,
    strands: &StrandSet,
    params: &FoldingParams,
    engine: &E,
    mut progress: impl FnMut(f64),
) -> usize
where
    E: FoldingEngine + ?Sized,
{
    let work: f64 = enumeration.multisets().iter()
        .map(|m| (m.total_length() as f64).powi(3))
        .sum();
    let mut done = 0.0;
    let n_sets = enumeration.multisets().len();
    let n_perms = enumeration.permutations().len();

    let (multisets, permutations) = enumeration.parts_mut();
    let mut status = 0;
    for (i, multiset) in multisets.iter_mut().enumerate() {
        info!("Status: Set {} / {}: nPerms ({}) {} / {}",
            i + 1, n_sets, multiset.n_perms(), status + 1, n_perms);
        status += multiset.n_perms();
        multiset.reset();
        for perm in &mut permutations[multiset.perm_range()] {
            let pf = evaluate(perm, strands, params, engine);
            perm.set_partition_function(pf);
            multiset.add_partition_function(pf);
        }
        done += (multiset.total_length() as f64).powi(3);
        if work > 0.0 {
            progress(done / work);
        }
    }
    assign_complex_ids(enumeration)
}

/// Numbers multisets with a positive partition function 1, 2, 3, ... in
/// enumeration order.
pub fn assign_complex_ids(enumeration: &mut ComplexEnumeration) -> usize {
    let (multisets, _) = enumeration.parts_mut();
    let mut next_id = 1;
    for multiset in multisets.iter_mut() {
        if multiset.partition_function() > 0.0 {
            multiset.set_complex_id(next_id);
            next_id += 1;
        }
    }
    next_id - 1
}

fn evaluate<E>(
    perm: &Permutation,
    strands: &StrandSet,
    params: &FoldingParams,
    engine: &E,
) -> f64
where
    E: FoldingEngine + ?Sized,
{
    let concatenated = perm.concatenate(strands);
    let query = FoldingQuery {
        sequence: &concatenated.sequence,
        nicks: &concatenated.nicks,
        symmetry_factor: perm.symmetry_factor(),
    };
    let pf = engine.partition_function(&query, params);
    debug!("{} - {} {:e}", perm, concatenated.sequence, pf);
    if pf.is_nan() || pf < 0.0 {
        warn!("Folding engine returned {pf} for {}, treating it as infeasible.", perm);
        return 0.0;
    }
    pf
}

impl ComplexEnumeration {
    /// All permutations with their complex and permutation ids, in
    /// enumeration order.
    pub fn results(&self) -> impl Iterator<Item = PermutationResult<'_>> {
        self.multisets().iter().flat_map(move |multiset| {
            self.members(multiset).iter().enumerate().map(move |(i, permutation)| {
                PermutationResult {
                    complex_id: multiset.complex_id(),
                    perm_id: i + 1,
                    multiset,
                    permutation,
                }
            })
        })
    }

    /// Number of multisets with a complex id.
    pub fn n_feasible(&self) -> usize {
        self.multisets().iter().filter(|m| m.is_feasible()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtraComplexes;

    fn setup(seqs: &[&str], max_size: usize) -> (StrandSet, ComplexEnumeration) {
        let strands = StrandSet::from_sequences(seqs).unwrap();
        let extra = ExtraComplexes::new(strands.len(), max_size);
        let e = ComplexEnumeration::enumerate(&strands, max_size, &extra).unwrap();
        (strands, e)
    }

    #[test]
    fn test_queries_and_accumulation() {
        let (strands, mut e) = setup(&["GGAA", "UUC"], 2);
        let seen = std::cell::RefCell::new(Vec::new());
        let engine = |q: &FoldingQuery<'_>, _: &FoldingParams| {
            seen.borrow_mut().push((q.sequence.to_string(), q.nicks.to_vec(), q.symmetry_factor));
            1.0 + q.nicks.len() as f64
        };
        let mut fractions = Vec::new();
        let n = compute_partition_functions(
            &mut e, &strands, &FoldingParams::default(), &engine, |f| fractions.push(f));
        assert_eq!(n, 5);
        assert_eq!(seen.borrow().as_slice(), &[
            ("GGAA".to_string(), vec![], 1),
            ("UUC".to_string(), vec![], 1),
            ("GGAA+GGAA".to_string(), vec![4], 2),
            ("GGAA+UUC".to_string(), vec![4], 1),
            ("UUC+UUC".to_string(), vec![3], 2),
        ]);
        let ids: Vec<Option<usize>> = e.multisets().iter().map(|m| m.complex_id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        assert_eq!(e.multisets()[3].partition_function(), 2.0);
        assert_eq!(fractions.len(), 5);
        approx::assert_relative_eq!(*fractions.last().unwrap(), 1.0);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_infeasible_complexes_are_skipped() {
        let (strands, mut e) = setup(&["GGAA", "UUC"], 2);
        // Homodimers have no structure.
        let engine = |q: &FoldingQuery<'_>, _: &FoldingParams| {
            if q.symmetry_factor > 1 { 0.0 } else { 3.0 }
        };
        let n = compute_partition_functions(
            &mut e, &strands, &FoldingParams::default(), &engine, |_| ());
        assert_eq!(n, 3);
        let ids: Vec<Option<usize>> = e.multisets().iter().map(|m| m.complex_id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2), None, Some(3), None]);
        assert_eq!(e.n_feasible(), 3);

        let results: Vec<_> = e.results().collect();
        assert_eq!(results.len(), 5);
        assert!(!results[2].is_feasible());
        assert_eq!(results[2].complex_id, None);
        assert_eq!(results[3].complex_id, Some(3));
        assert_eq!(results[3].perm_id, 1);
    }

    #[test]
    fn test_ids_are_contiguous_with_partial_feasibility() {
        let strands = StrandSet::from_sequences(&["GGGA", "UCCC"]).unwrap();
        let mut extra = ExtraComplexes::new(2, 1);
        extra.add_composition(vec![2, 2]).unwrap();
        let mut e = ComplexEnumeration::enumerate(&strands, 1, &extra).unwrap();
        // Only the alternating tetramer folds.
        let engine = |q: &FoldingQuery<'_>, _: &FoldingParams| {
            if q.sequence == "GGGA+UCCC+GGGA+UCCC" { 5.0 } else if q.nicks.is_empty() { 1.0 } else { 0.0 }
        };
        let n = compute_partition_functions(
            &mut e, &strands, &FoldingParams::default(), &engine, |_| ());
        assert_eq!(n, 3);
        let last = &e.multisets()[2];
        assert_eq!(last.complex_id(), Some(3));
        assert_eq!(last.partition_function(), 5.0);
        let perm_ids: Vec<(usize, bool)> = e.results()
            .filter(|r| r.complex_id == Some(3))
            .map(|r| (r.perm_id, r.is_feasible()))
            .collect();
        assert_eq!(perm_ids, vec![(1, false), (2, true)]);
    }

    #[test]
    fn test_invalid_engine_values() {
        let (strands, mut e) = setup(&["GGAA"], 1);
        let engine = |_: &FoldingQuery<'_>, _: &FoldingParams| f64::NAN;
        let n = compute_partition_functions(
            &mut e, &strands, &FoldingParams::default(), &engine, |_| ());
        assert_eq!(n, 0);
        assert_eq!(e.permutations()[0].partition_function(), Some(0.0));
    }

    #[test]
    fn test_parse_params() {
        assert_eq!("dna".parse::<Material>().unwrap(), Material::Dna);
        assert_eq!("rna1999".parse::<Material>().unwrap(), Material::Rna37);
        assert_eq!("my.par".parse::<Material>().unwrap(), Material::Custom("my.par".to_string()));
        assert_eq!("all".parse::<Dangles>().unwrap(), Dangles::All);
        assert_eq!("0".parse::<Dangles>().unwrap(), Dangles::None);
        assert_eq!(Dangles::Some.level(), 1);
        assert!("many".parse::<Dangles>().is_err());
    }

    #[test]
    fn test_validate_salt() {
        let p = FoldingParams { sodium: 0.5, ..Default::default() }.validate().unwrap();
        assert_eq!(p.sodium, 1.0); // RNA has no salt correction

        let p = FoldingParams {
            material: Material::Dna,
            sodium: 0.5,
            magnesium: 0.1,
            long_helix_salt: true,
            ..Default::default()
        }.validate().unwrap();
        assert_eq!(p.sodium, 0.5);
        assert_eq!(p.magnesium, 0.0);

        let p = FoldingParams { material: Material::Dna, sodium: 0.0, ..Default::default() };
        assert!(p.validate().is_err());
        let p = FoldingParams { material: Material::Dna, magnesium: -1.0, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_params_serde() {
        let p: FoldingParams = serde_json::from_str(r#"{"temperature": 25.0, "material": "dna"}"#).unwrap();
        assert_eq!(p.temperature, 25.0);
        assert_eq!(p.material, Material::Dna);
        assert_eq!(p.dangles, Dangles::Some);
    }
}
