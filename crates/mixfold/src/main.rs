use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use itertools::Itertools;
use log::error;

use mf_complexes::Dangles;
use mf_complexes::Material;
use mf_equilibrium::SortOrder;

use mixfold::config::Config;
use mixfold::engine::CommandEngine;
use mixfold::output::NOT_CONVERGED_BANNER;
use mixfold::commands::{ComplexesOptions, ConcentrationsOptions};
use mixfold::commands::{run_complexes, run_concentrations};

/// Equilibrium analysis of interacting nucleic acid strands.
#[derive(Parser, Debug)]
#[command(name = "mixfold")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print debug output (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file, flags take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate complexes and compute their free energies.
    ///
    /// Reads PREFIX.in and, if present, PREFIX.list. Writes PREFIX.ocx
    /// and PREFIX.ocx-key.
    Complexes(ComplexesArgs),

    /// Compute equilibrium concentrations.
    ///
    /// Reads PREFIX.ocx and PREFIX.con. Writes PREFIX.eq.
    Concentrations(ConcentrationsArgs),
}

#[derive(Args, Debug)]
struct ComplexesArgs {
    /// Input file prefix.
    prefix: PathBuf,

    /// Folding engine executable.
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Temperature in C.
    #[arg(short = 'T', long)]
    temperature: Option<f64>,

    /// Parameter set: dna, rna, rna37 or a parameter file.
    #[arg(long)]
    material: Option<Material>,

    /// Dangles: none, some or all.
    #[arg(long)]
    dangles: Option<Dangles>,

    /// Sodium concentration in M.
    #[arg(long)]
    sodium: Option<f64>,

    /// Magnesium concentration in M.
    #[arg(long)]
    magnesium: Option<f64>,

    /// Use the long-helix salt correction.
    #[arg(long)]
    long_helix_salt: bool,

    /// Only print the estimated calculation time.
    #[arg(long)]
    timeonly: bool,

    /// Write the progress to PREFIX.prog.
    #[arg(long)]
    progress: bool,
}

#[derive(Args, Debug)]
struct ConcentrationsArgs {
    /// Input file prefix.
    prefix: PathBuf,

    /// Temperature in C, instead of the one in PREFIX.ocx.
    #[arg(short = 'T', long)]
    temperature: Option<f64>,

    /// Sort order of the output: 0 none, 1 concentration, 2 complex
    /// concentration, 3 complex id, 4 composition.
    #[arg(long, value_parser = parse_sort_order)]
    sort: Option<SortOrder>,

    /// Maximum iterations per trial.
    #[arg(long)]
    max_iters: Option<usize>,

    /// Relative convergence tolerance.
    #[arg(long)]
    tol: Option<f64>,

    /// Maximum number of perturbations.
    #[arg(long)]
    max_trials: Option<usize>,

    /// Scale of random perturbations.
    #[arg(long)]
    perturb_scale: Option<f64>,

    /// Random seed.
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_sort_order(s: &str) -> Result<SortOrder, String> {
    let code: u8 = s.parse().map_err(|_| format!("invalid sort order '{s}'"))?;
    SortOrder::try_from(code)
}

fn complexes(args: ComplexesArgs, mut config: Config, command: String) -> Result<ExitCode> {
    let params = &mut config.folding;
    if let Some(t) = args.temperature {
        params.temperature = t;
    }
    if let Some(m) = args.material {
        params.material = m;
    }
    if let Some(d) = args.dangles {
        params.dangles = d;
    }
    if let Some(na) = args.sodium {
        params.sodium = na;
    }
    if let Some(mg) = args.magnesium {
        params.magnesium = mg;
    }
    params.long_helix_salt |= args.long_helix_salt;

    let engine = match (&args.engine, args.timeonly) {
        (Some(path), false) => Some(CommandEngine::new(path)?),
        _ => None,
    };
    let options = ComplexesOptions {
        prefix: args.prefix,
        params: config.folding,
        time_only: args.timeonly,
        progress: args.progress,
        command,
    };
    run_complexes(&options, engine.as_ref())?;
    Ok(ExitCode::SUCCESS)
}

fn concentrations(args: ConcentrationsArgs, mut config: Config, command: String) -> Result<ExitCode> {
    let solver = &mut config.solver;
    if let Some(n) = args.max_iters {
        solver.max_iters = n;
    }
    if let Some(tol) = args.tol {
        solver.tol = tol;
    }
    if let Some(n) = args.max_trials {
        solver.max_trials = n;
    }
    if let Some(s) = args.perturb_scale {
        solver.perturb_scale = s;
    }
    if args.seed.is_some() {
        solver.seed = args.seed;
    }

    let options = ConcentrationsOptions {
        prefix: args.prefix,
        temperature: args.temperature,
        solver: config.solver,
        sort: args.sort.unwrap_or(config.sort),
        command,
    };
    let solution = run_concentrations(&options)?;
    if solution.status.is_converged() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", NOT_CONVERGED_BANNER.red().bold());
        eprintln!("{}", "Results written, but they are not at equilibrium.".yellow());
        Ok(ExitCode::from(2))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let command = std::env::args().join(" ");
    let result = Config::load(cli.config.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Complexes(args) => complexes(args, config, command),
            Commands::Concentrations(args) => concentrations(args, config, command),
        }
    });
    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
