//! The `complexes` and `concentrations` runs, from input files to output files.

use std::io::Write;
use std::path::PathBuf;
use anyhow::{Context, Result, bail, ensure};
use log::{info, warn};
use serde_json::json;

use mf_complexes::FoldingEngine;
use mf_complexes::FoldingParams;
use mf_complexes::ExtraComplexes;
use mf_complexes::ComplexEnumeration;
use mf_complexes::compute_partition_functions;
use mf_equilibrium::SortOrder;
use mf_equilibrium::OrderedComplex;
use mf_equilibrium::SolverConfig;
use mf_equilibrium::EquilibriumProblem;
use mf_equilibrium::EquilibriumSolution;
use mf_equilibrium::concentration_rows;
use mf_equilibrium::sort_rows;
use mf_equilibrium::solve;

use crate::input;
use crate::output;
use crate::output::RunInfo;
use crate::output::RunStatus;
use crate::output::with_extension;

#[derive(Debug, Clone)]
pub struct ComplexesOptions {
    pub prefix: PathBuf,
    pub params: FoldingParams,
    /// Only estimate the running time.
    pub time_only: bool,
    /// Write `PREFIX.prog` while computing.
    pub progress: bool,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexesSummary {
    pub n_complexes: usize,
    pub n_permutations: usize,
    pub n_feasible: usize,
    pub estimated_seconds: f64,
    /// Feasible ordered complexes, empty for time estimates.
    pub ordered_complexes: Vec<OrderedComplex>,
}

/// Enumerates the complexes of `PREFIX.in` (and `PREFIX.list`), computes
/// their partition functions and writes `PREFIX.ocx` and `PREFIX.ocx-key`.
pub fn run_complexes<E>(options: &ComplexesOptions, engine: Option<&E>) -> Result<ComplexesSummary>
where
    E: FoldingEngine + ?Sized,
{
    let prefix = &options.prefix;
    let params = options.params.clone().validate()?;

    let in_path = with_extension(prefix, "in");
    let strand_input = input::parse_strand_input(&input::read_file(&in_path)?)
        .with_context(|| format!("In {}", in_path.display()))?;
    let strands = strand_input.strands;
    let max_size = strand_input.max_size;

    let list_path = with_extension(prefix, "list");
    let extra = if list_path.exists() {
        input::parse_list(&input::read_file(&list_path)?, strands.len(), max_size)
            .with_context(|| format!("In {}", list_path.display()))?
    } else {
        ExtraComplexes::new(strands.len(), max_size)
    };

    let mut enumeration = ComplexEnumeration::enumerate(&strands, max_size, &extra)?;
    let counts = enumeration.counts();
    let estimated_seconds = enumeration.estimated_seconds();
    info!("Estimated calculation time: {estimated_seconds:.3e} seconds.");

    let mut summary = ComplexesSummary {
        n_complexes: counts.total_sets(),
        n_permutations: counts.total_perms(),
        n_feasible: 0,
        estimated_seconds,
        ordered_complexes: Vec::new(),
    };
    if options.time_only {
        println!("Estimated calculation time: {estimated_seconds:.3e} seconds.");
        return Ok(summary);
    }
    let Some(engine) = engine else {
        bail!("No folding engine given.");
    };

    let info = RunInfo::new("complexes", options.command.clone());
    let prog_path = with_extension(prefix, "prog");
    let failed_before = engine.failed_calls();
    let mut progress_error = None;
    summary.n_feasible = compute_partition_functions(
        &mut enumeration, &strands, &params, engine, |fraction| {
            if options.progress && progress_error.is_none() {
                progress_error = output::write_progress(&prog_path, fraction).err();
            }
        });
    if let Some(err) = progress_error {
        warn!("Progress file not written: {err:#}");
    }
    let failed = engine.failed_calls() - failed_before;
    ensure!(failed == 0, "The folding engine failed on {failed} of {} ordered complexes.",
        summary.n_permutations);
    info!("{} of {} complexes have a secondary structure.", summary.n_feasible, summary.n_complexes);
    summary.ordered_complexes = output::ordered_complexes(&enumeration, params.temperature);

    let mut ocx = output::create_file(&with_extension(prefix, "ocx"))?;
    output::write_ocx_header(&mut ocx, &info, &strands, &enumeration, &params)?;
    output::write_ocx(&mut ocx, &enumeration, params.temperature)?;
    ocx.flush()?;

    let mut key = output::create_file(&with_extension(prefix, "ocx-key"))?;
    output::write_ocx_key(&mut key, &info, &enumeration)?;
    key.flush()?;

    output::write_record(prefix, &info, RunStatus::Success, json!({
        "folding": params,
        "max_size": max_size,
        "strands": strands.iter().map(|s| s.sequence()).collect::<Vec<_>>(),
        "complexes": summary.n_complexes,
        "permutations": summary.n_permutations,
        "feasible": summary.n_feasible,
    }), &summary.ordered_complexes)?;
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct ConcentrationsOptions {
    pub prefix: PathBuf,
    /// Overrides the temperature of the ocx header.
    pub temperature: Option<f64>,
    pub solver: SolverConfig,
    pub sort: SortOrder,
    pub command: String,
}

/// Solves for the equilibrium of `PREFIX.ocx` at the total
/// concentrations of `PREFIX.con` and writes `PREFIX.eq`.
pub fn run_concentrations(options: &ConcentrationsOptions) -> Result<EquilibriumSolution> {
    let prefix = &options.prefix;

    let ocx_path = with_extension(prefix, "ocx");
    let ocx = input::parse_ocx(&input::read_file(&ocx_path)?)
        .with_context(|| format!("In {}", ocx_path.display()))?;
    let con_path = with_extension(prefix, "con");
    let concentrations = input::parse_concentrations(&input::read_file(&con_path)?)
        .with_context(|| format!("In {}", con_path.display()))?;
    ensure!(concentrations.len() == ocx.n_species,
        "{} lists {} concentrations for {} strands.",
        con_path.display(), concentrations.len(), ocx.n_species);

    let temperature = match (options.temperature, ocx.temperature) {
        (Some(t), _) => t,
        (None, Some(t)) => t,
        (None, None) => {
            let t = FoldingParams::default().temperature;
            warn!("No temperature given, using {t} C.");
            t
        }
    };

    let problem = EquilibriumProblem::from_ordered_complexes(&ocx.records, &concentrations, temperature)?;
    let solution = solve(&problem, &options.solver)?;
    let mut rows = concentration_rows(&problem, &ocx.records, &solution, temperature)?;
    sort_rows(&mut rows, options.sort);

    let info = RunInfo::new("concentrations", options.command.clone());
    let mut eq = output::create_file(&with_extension(prefix, "eq"))?;
    output::write_eq(&mut eq, &info, &concentrations, temperature, &solution, &rows)?;
    eq.flush()?;

    let status = if solution.status.is_converged() {
        RunStatus::Success
    } else {
        RunStatus::NotConverged
    };
    output::write_record(prefix, &info, status, json!({
        "temperature": temperature,
        "concentrations": concentrations,
        "solver": options.solver,
        "sort": options.sort,
        "solver_status": solution.status,
        "iterations": solution.iterations,
        "trials": solution.trials,
    }), &rows)?;
    Ok(solution)
}
