//! Readers for the plain-text input files.
//!
//! `.in`: number of strands, one sequence per line, maximum complex size.
//! `.list`: extra complexes, one strand order or `C` composition per line.
//! `.ocx`: ordered complexes with free energies.
//! `.con`: one molar total concentration per strand.
//!
//! Lines starting with `%` are comments everywhere, `.in` files also
//! skip lines starting with `>`.

use std::fs;
use std::path::Path;
use anyhow::{Context, Result, anyhow, bail, ensure};
use log::warn;

use mf_complexes::StrandIdx;
use mf_complexes::StrandSet;
use mf_complexes::ExtraComplexes;
use mf_equilibrium::OrderedComplex;

const LIST_SEPARATORS: &[char] = &[' ', ',', '\t'];

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Contents of an `.in` file.
#[derive(Debug)]
pub struct StrandInput {
    pub strands: StrandSet,
    pub max_size: usize,
}

pub fn parse_strand_input(text: &str) -> Result<StrandInput> {
    let mut lines = text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('%') && !l.starts_with('>'));

    let mut next_token = |what: &str| -> Result<(usize, String)> {
        let (n, line) = lines.next().ok_or_else(|| anyhow!("Missing {what}."))?;
        let token = line.split(['%', '>'])
            .next()
            .and_then(|s| s.split_whitespace().next())
            .ok_or_else(|| anyhow!("Line {n}: expected {what}."))?;
        Ok((n, token.to_string()))
    };

    let (n, token) = next_token("number of strands")?;
    let n_strands: usize = token.parse()
        .with_context(|| format!("Line {n}: invalid number of strands '{token}'."))?;
    ensure!(n_strands > 0, "Line {n}: number of strands must be positive.");

    let mut strands = StrandSet::new();
    for _ in 0..n_strands {
        let (n, sequence) = next_token("sequence")?;
        strands.intern(&sequence, None).with_context(|| format!("Line {n}."))?;
    }

    let (n, token) = next_token("maximum complex size")?;
    let max_size: usize = token.parse()
        .with_context(|| format!("Line {n}: invalid maximum complex size '{token}'."))?;

    Ok(StrandInput { strands, max_size })
}

/// Parses a `.list` file into extra complexes beyond `max_size`.
pub fn parse_list(text: &str, n_types: usize, max_size: usize) -> Result<ExtraComplexes> {
    let mut extra = ExtraComplexes::new(n_types, max_size);
    let mut warned = false;
    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let mut tokens = line.split(LIST_SEPARATORS).filter(|t| !t.is_empty()).peekable();
        match tokens.peek().copied() {
            None => continue,
            Some(t) if t.starts_with('%') => continue,
            Some("C") => {
                if !warned {
                    warn!("'C' lines in the list file are deprecated, please specify ordered complexes directly.");
                    warned = true;
                }
                tokens.next();
                let composition = tokens
                    .map(|t| t.parse::<u32>()
                        .with_context(|| format!("Line {n}: encountered '{t}'.")))
                    .collect::<Result<Vec<_>>>()?;
                extra.add_composition(composition).with_context(|| format!("Line {n}."))?;
            }
            Some(_) => {
                let order = tokens
                    .map(|t| t.parse::<StrandIdx>()
                        .with_context(|| format!("Line {n}: encountered '{t}'.")))
                    .collect::<Result<Vec<_>>>()?;
                extra.add_ordering(order).with_context(|| format!("Line {n}."))?;
            }
        }
    }
    Ok(extra)
}

/// Contents of an `.ocx` file.
#[derive(Debug, Clone, PartialEq)]
pub struct OcxInput {
    /// From the `% T = ...` header line.
    pub temperature: Option<f64>,
    pub n_species: usize,
    pub records: Vec<OrderedComplex>,
}

pub fn parse_ocx(text: &str) -> Result<OcxInput> {
    let mut temperature = None;
    let mut n_species = None;
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('%') {
            if let Some(t) = comment.trim().strip_prefix("T =") {
                let t = t.trim();
                temperature = Some(t.parse::<f64>()
                    .with_context(|| format!("Line {n}: invalid temperature '{t}'."))?);
            }
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        ensure!(tokens.len() >= 4, "Line {n}: expected complex id, permutation id, composition and free energy.");
        let k = tokens.len() - 3;
        match n_species {
            None => n_species = Some(k),
            Some(m) if m != k => bail!("Line {n}: composition has {k} entries, expected {m}."),
            Some(_) => (),
        }
        let complex_id: usize = tokens[0].parse()
            .with_context(|| format!("Line {n}: invalid complex id '{}'.", tokens[0]))?;
        let perm_id: usize = tokens[1].parse()
            .with_context(|| format!("Line {n}: invalid permutation id '{}'.", tokens[1]))?;
        let composition = tokens[2..2 + k].iter()
            .map(|t| t.parse::<u32>().with_context(|| format!("Line {n}: invalid count '{t}'.")))
            .collect::<Result<Vec<_>>>()?;
        let free_energy: f64 = tokens[2 + k].parse()
            .with_context(|| format!("Line {n}: invalid free energy '{}'.", tokens[2 + k]))?;
        records.push(OrderedComplex { complex_id, perm_id, composition, free_energy });
    }
    let n_species = n_species.ok_or_else(|| anyhow!("No complexes in ocx input."))?;
    Ok(OcxInput { temperature, n_species, records })
}

/// Parses a `.con` file of molar concentrations.
pub fn parse_concentrations(text: &str) -> Result<Vec<f64>> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('%'))
        .map(|(n, l)| {
            let token = l.split_whitespace().next().unwrap_or(l);
            token.parse::<f64>()
                .with_context(|| format!("Line {n}: invalid concentration '{token}'."))
        })
        .collect()
}
