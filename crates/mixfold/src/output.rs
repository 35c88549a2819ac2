//! Writers for the output files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

use mf_complexes::StrandSet;
use mf_complexes::FoldingParams;
use mf_complexes::ComplexEnumeration;
use mf_equilibrium::OrderedComplex;
use mf_equilibrium::ConcentrationRow;
use mf_equilibrium::EquilibriumSolution;
use mf_equilibrium::free_energy_kcal;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `PREFIX.extension`
pub fn with_extension(prefix: &Path, extension: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

pub fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Invocation details repeated in every output header.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub program: &'static str,
    pub version: &'static str,
    pub command: String,
}

impl RunInfo {
    pub fn new(program: &'static str, command: String) -> Self {
        Self { program, version: VERSION, command }
    }

    fn write_header<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "% mixfold {}", self.version)?;
        writeln!(w, "% Program: {}", self.program)?;
        writeln!(w, "% Command: {}", self.command)?;
        Ok(())
    }
}

pub fn write_ocx_header<W: Write>(
    w: &mut W,
    info: &RunInfo,
    strands: &StrandSet,
    enumeration: &ComplexEnumeration,
    params: &FoldingParams,
) -> Result<()> {
    let counts = enumeration.counts();
    info.write_header(w)?;
    writeln!(w, "% Maximum complex size to enumerate: {}", enumeration.max_size())?;
    writeln!(w, "% Number of complexes from enumeration: {}", counts.enumerated_sets)?;
    writeln!(w, "% Additional complexes from .list file: {}", counts.extra_sets)?;
    writeln!(w, "% Total number of permutations to calculate: {}", counts.total_perms())?;
    writeln!(w, "% Parameters: {}", params.material)?;
    writeln!(w, "% Dangles setting: {}", params.dangles.level())?;
    writeln!(w, "% Temperature (C): {:.1}", params.temperature)?;
    writeln!(w, "% Sodium concentration: {:.4} M", params.sodium)?;
    writeln!(w, "% Magnesium concentration: {:.4} M", params.magnesium)?;
    writeln!(w, "%")?;
    writeln!(w, "% Do not change the comments below this line, as they may be read by other programs!")?;
    writeln!(w, "%")?;
    writeln!(w, "% Number of strands: {}", strands.len())?;
    writeln!(w, "% id sequence")?;
    for strand in strands.iter() {
        writeln!(w, "% {:>2} {}", strand.id(), strand.sequence())?;
    }
    writeln!(w, "% T = {:.1}", params.temperature)?;
    Ok(())
}

/// Feasible ordered complexes with free energies in kcal/mol.
pub fn ordered_complexes(enumeration: &ComplexEnumeration, temperature: f64) -> Vec<OrderedComplex> {
    enumeration.results()
        .filter(|r| r.is_feasible())
        .filter_map(|r| Some(OrderedComplex {
            complex_id: r.complex_id?,
            perm_id: r.perm_id,
            composition: r.multiset.composition().to_vec(),
            free_energy: free_energy_kcal(r.partition_function(), temperature),
        }))
        .collect()
}

/// One line per ordered complex. Infeasible ones are commented out.
pub fn write_ocx<W: Write>(w: &mut W, enumeration: &ComplexEnumeration, temperature: f64) -> Result<()> {
    // Infeasible multisets carry the id of the next feasible one.
    let mut next_id = 1;
    for result in enumeration.results() {
        let composition = result.multiset.composition().iter().join("\t");
        match result.complex_id {
            Some(id) if result.is_feasible() => {
                let g = free_energy_kcal(result.partition_function(), temperature);
                writeln!(w, "{id}\t{}\t{composition}\t{g:.8e}", result.perm_id)?;
            }
            Some(id) => {
                writeln!(w, "% {id}\t{}\t{composition}\tNo legal secondary structures!", result.perm_id)?;
            }
            None => {
                writeln!(w, "% {next_id}\t{}\t{composition}\tNo legal secondary structures!", result.perm_id)?;
            }
        }
        if let Some(id) = result.complex_id {
            next_id = id + 1;
        }
    }
    Ok(())
}

/// Strand orders of the feasible complexes.
pub fn write_ocx_key<W: Write>(w: &mut W, info: &RunInfo, enumeration: &ComplexEnumeration) -> Result<()> {
    info.write_header(w)?;
    writeln!(w, "% complex id, permutation id, strand order")?;
    for result in enumeration.results() {
        if let Some(id) = result.complex_id {
            writeln!(w, "{id}\t{}\t{}", result.perm_id, result.permutation.order().iter().join("\t"))?;
        }
    }
    Ok(())
}

pub fn write_progress(path: &Path, fraction: f64) -> Result<()> {
    let mut w = create_file(path)?;
    write!(w, "{fraction:.3}\n\n")?;
    w.flush()?;
    Ok(())
}

pub const NOT_CONVERGED_BANNER: &str = "TRUST REGION DID NOT CONVERGE";

pub fn write_eq<W: Write>(
    w: &mut W,
    info: &RunInfo,
    concentrations: &[f64],
    temperature: f64,
    solution: &EquilibriumSolution,
    rows: &[ConcentrationRow],
) -> Result<()> {
    info.write_header(w)?;
    writeln!(w, "% Initial monomer concentrations:")?;
    for (i, c) in concentrations.iter().enumerate() {
        writeln!(w, "%   {}: {c:e} Molar", i + 1)?;
    }
    writeln!(w, "% Temperature (C): {temperature:.1}")?;
    if solution.status.is_converged() {
        writeln!(w, "% Trust region converged after {} iterations and {} perturbations.",
            solution.iterations, solution.trials)?;
    } else {
        writeln!(w, "%")?;
        writeln!(w, "% {NOT_CONVERGED_BANNER}")?;
        writeln!(w, "% The following results are not at equilibrium.")?;
        writeln!(w, "%")?;
    }
    writeln!(w, "% Columns: complex id, permutation id, composition, free energy (kcal/mol), \
        permutation concentration (M), complex concentration (M)")?;
    for row in rows {
        writeln!(w, "{}\t{}\t{}\t{:.6e}\t{:.6e}\t{:.6e}",
            row.complex_id,
            row.perm_id,
            row.composition.iter().join("\t"),
            row.free_energy,
            row.perm_concentration,
            row.complex_concentration)?;
    }
    Ok(())
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Results were written, but the solver did not converge.
    NotConverged,
}

/// Machine-readable record of one run: invocation, parameters and results.
#[derive(Debug, Serialize)]
pub struct RunRecord<'a, P: Serialize, R: Serialize> {
    #[serde(flatten)]
    pub info: &'a RunInfo,
    pub status: RunStatus,
    pub parameters: P,
    pub results: &'a [R],
}

/// Writes `PREFIX.<program>.json`.
pub fn write_record<P, R>(
    prefix: &Path,
    info: &RunInfo,
    status: RunStatus,
    parameters: P,
    results: &[R],
) -> Result<()>
where
    P: Serialize,
    R: Serialize,
{
    let path = with_extension(prefix, &format!("{}.json", info.program));
    let mut w = create_file(&path)?;
    serde_json::to_writer_pretty(&mut w, &RunRecord { info, status, parameters, results })
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}
