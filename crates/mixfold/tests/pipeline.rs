use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use approx::assert_relative_eq;

use mf_complexes::FoldingEngine;
use mf_complexes::FoldingParams;
use mf_complexes::FoldingQuery;
use mf_equilibrium::SortOrder;
use mf_equilibrium::SolverConfig;
use mf_equilibrium::SolverStatus;

use mixfold::engine::CommandEngine;
use mixfold::input::{parse_ocx, read_file};
use mixfold::output::with_extension;
use mixfold::commands::{ComplexesOptions, ConcentrationsOptions};
use mixfold::commands::{run_complexes, run_concentrations};

fn workdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mixfold-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn complexes_options(prefix: PathBuf) -> ComplexesOptions {
    ComplexesOptions {
        prefix,
        params: FoldingParams::default(),
        time_only: false,
        progress: true,
        command: "mixfold complexes test".to_string(),
    }
}

/// Monomers fold trivially, only the heterodimer binds.
fn heterodimer_engine(q: &FoldingQuery<'_>, _: &FoldingParams) -> f64 {
    match q.sequence {
        "GGGGAAAA" | "UUUUCCCC" => 1.0,
        "GGGGAAAA+UUUUCCCC" => 10f64.exp(),
        _ => 0.0,
    }
}

#[test]
fn test_complexes_then_concentrations() {
    let dir = workdir("pipeline");
    let prefix = dir.join("dimer");
    fs::write(with_extension(&prefix, "in"), "% two strands\n2\nGGGGAAAA\nUUUUCCCC\n2\n").unwrap();

    let summary = run_complexes(&complexes_options(prefix.clone()), Some(&heterodimer_engine)).unwrap();
    assert_eq!(summary.n_complexes, 5);
    assert_eq!(summary.n_permutations, 5);
    assert_eq!(summary.n_feasible, 3);

    let ocx_text = read_file(&with_extension(&prefix, "ocx")).unwrap();
    assert!(ocx_text.contains("% T = 37.0\n"));
    assert!(ocx_text.contains("% 3\t1\t2\t0\tNo legal secondary structures!\n"));
    let ocx = parse_ocx(&ocx_text).unwrap();
    assert_eq!(ocx.temperature, Some(37.0));
    let ids: Vec<(usize, usize, Vec<u32>)> = ocx.records.iter()
        .map(|r| (r.complex_id, r.perm_id, r.composition.clone()))
        .collect();
    assert_eq!(ids, vec![(1, 1, vec![1, 0]), (2, 1, vec![0, 1]), (3, 1, vec![1, 1])]);
    assert_relative_eq!(ocx.records[2].free_energy, -10.0 * mf_equilibrium::kt(37.0), max_relative = 1e-7);
    assert_eq!(summary.ordered_complexes.len(), ocx.records.len());
    for (record, written) in summary.ordered_complexes.iter().zip(&ocx.records) {
        assert_eq!((record.complex_id, record.perm_id), (written.complex_id, written.perm_id));
        assert_eq!(record.composition, written.composition);
        assert_relative_eq!(record.free_energy, written.free_energy, max_relative = 1e-7, epsilon = 1e-12);
    }

    let key = read_file(&with_extension(&prefix, "ocx-key")).unwrap();
    assert!(key.contains("\n3\t1\t1\t2\n"));
    let prog = read_file(&with_extension(&prefix, "prog")).unwrap();
    assert_eq!(prog, "1.000\n\n");
    let record: serde_json::Value = serde_json::from_str(
        &read_file(&with_extension(&prefix, "complexes.json")).unwrap()).unwrap();
    assert_eq!(record["status"], "success");
    assert_eq!(record["parameters"]["feasible"], 3);
    let results = record["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2]["complex_id"], 3);
    assert_eq!(results[2]["composition"], serde_json::json!([1, 1]));

    fs::write(with_extension(&prefix, "con"), "1e-6\n1e-6\n").unwrap();
    let options = ConcentrationsOptions {
        prefix: prefix.clone(),
        temperature: None,
        solver: SolverConfig { seed: Some(3), ..Default::default() },
        sort: SortOrder::ComplexId,
        command: "mixfold concentrations test".to_string(),
    };
    let solution = run_concentrations(&options).unwrap();
    assert_eq!(solution.status, SolverStatus::Converged);

    let eq = read_file(&with_extension(&prefix, "eq")).unwrap();
    let rows: Vec<Vec<f64>> = eq.lines()
        .filter(|l| !l.starts_with('%'))
        .map(|l| l.split('\t').map(|t| t.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 3);
    // Strand 1 is either free or in the heterodimer.
    assert_relative_eq!(rows[0][5] + rows[2][5], 1e-6, max_relative = 1e-5);
    assert!(rows[2][5] > 0.0);
    let record: serde_json::Value = serde_json::from_str(
        &read_file(&with_extension(&prefix, "concentrations.json")).unwrap()).unwrap();
    assert_eq!(record["program"], "concentrations");
    assert_eq!(record["status"], "success");
    assert_eq!(record["parameters"]["solver_status"], "converged");
    let results = record["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for (result, row) in results.iter().zip(&rows) {
        assert_eq!(result["complex_id"].as_f64().unwrap(), row[0]);
        assert_relative_eq!(result["complex_concentration"].as_f64().unwrap(), row[6],
            max_relative = 1e-6);
    }

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_list_file_adds_complexes() {
    let dir = workdir("list");
    let prefix = dir.join("trimer");
    fs::write(with_extension(&prefix, "in"), "2\nGGGGAAAA\nUUUUCCCC\n1\n").unwrap();
    fs::write(with_extension(&prefix, "list"), "% extra\n1 2 2\n").unwrap();

    let engine = |q: &FoldingQuery<'_>, _: &FoldingParams| if q.nicks.len() == 2 { 5.0 } else { 1.0 };
    let summary = run_complexes(&complexes_options(prefix.clone()), Some(&engine)).unwrap();
    assert_eq!(summary.n_complexes, 3);
    assert_eq!(summary.n_feasible, 3);
    let ocx = parse_ocx(&read_file(&with_extension(&prefix, "ocx")).unwrap()).unwrap();
    assert_eq!(ocx.records.last().unwrap().composition, vec![1, 2]);

    fs::write(with_extension(&prefix, "list"), "2\n").unwrap();
    assert!(run_complexes(&complexes_options(prefix.clone()), Some(&engine)).is_err());

    fs::remove_dir_all(&dir).unwrap();
}

/// Answers monomers only and counts everything else as a failed call.
struct MonomerEngine {
    failures: AtomicUsize,
}

impl FoldingEngine for MonomerEngine {
    fn partition_function(&self, query: &FoldingQuery<'_>, _: &FoldingParams) -> f64 {
        if query.nicks.is_empty() {
            return 1.0;
        }
        self.failures.fetch_add(1, Ordering::Relaxed);
        0.0
    }

    fn failed_calls(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

#[test]
fn test_engine_failures_abort_the_run() {
    let dir = workdir("failures");
    let prefix = dir.join("f");
    fs::write(with_extension(&prefix, "in"), "2\nGGGGAAAA\nUUUUCCCC\n2\n").unwrap();

    let engine = MonomerEngine { failures: AtomicUsize::new(0) };
    let err = run_complexes(&complexes_options(prefix.clone()), Some(&engine)).unwrap_err();
    assert!(format!("{err}").contains("failed on 3 of 5"));
    assert!(!with_extension(&prefix, "ocx").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_time_only_needs_no_engine() {
    let dir = workdir("timeonly");
    let prefix = dir.join("t");
    fs::write(with_extension(&prefix, "in"), "1\nACGU\n3\n").unwrap();

    let mut options = complexes_options(prefix.clone());
    options.time_only = true;
    let summary = run_complexes::<CommandEngine>(&options, None).unwrap();
    assert_eq!(summary.n_permutations, 3);
    assert!(summary.estimated_seconds > 0.0);
    assert!(summary.ordered_complexes.is_empty());
    assert!(!with_extension(&prefix, "ocx").exists());

    options.time_only = false;
    assert!(run_complexes::<CommandEngine>(&options, None).is_err());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_concentration_count_must_match() {
    let dir = workdir("con");
    let prefix = dir.join("c");
    fs::write(with_extension(&prefix, "ocx"), "% T = 25.0\n1\t1\t1\t0\t-1.0\n2\t1\t0\t1\t-1.0\n").unwrap();
    fs::write(with_extension(&prefix, "con"), "1e-6\n").unwrap();
    let options = ConcentrationsOptions {
        prefix,
        temperature: None,
        solver: SolverConfig::default(),
        sort: SortOrder::default(),
        command: String::new(),
    };
    assert!(run_concentrations(&options).is_err());

    fs::remove_dir_all(&dir).unwrap();
}
