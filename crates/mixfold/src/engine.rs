//! Folding engine backed by an external program.
//!
//! The program gets the `+`-joined sequence of an ordered complex on
//! stdin and the folding conditions as arguments, and prints the
//! partition function as the first token on stdout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use anyhow::{Context, Result, anyhow, ensure};
use log::error;

use mf_complexes::FoldingEngine;
use mf_complexes::FoldingParams;
use mf_complexes::FoldingQuery;

#[derive(Debug)]
pub struct CommandEngine {
    program: PathBuf,
    failures: AtomicUsize,
}

impl CommandEngine {
    pub fn new(program: &Path) -> Result<Self> {
        ensure!(program.exists(), "Folding engine {} not found.", program.display());
        Ok(Self { program: program.to_path_buf(), failures: AtomicUsize::new(0) })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments describing the folding conditions of one call.
    pub fn arguments(query: &FoldingQuery<'_>, params: &FoldingParams) -> Vec<String> {
        let mut args = vec![
            "--temperature".to_string(), params.temperature.to_string(),
            "--material".to_string(), params.material.engine_name().to_string(),
            "--dangles".to_string(), params.dangles.to_string(),
            "--sodium".to_string(), params.sodium.to_string(),
            "--magnesium".to_string(), params.magnesium.to_string(),
            "--symmetry".to_string(), query.symmetry_factor.to_string(),
        ];
        if params.long_helix_salt {
            args.push("--long-helix-salt".to_string());
        }
        args
    }

    fn run(&self, query: &FoldingQuery<'_>, params: &FoldingParams) -> Result<f64> {
        let mut child = Command::new(&self.program)
            .args(Self::arguments(query, params))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        {
            let stdin = child.stdin.as_mut().ok_or_else(|| anyhow!("No stdin for engine."))?;
            writeln!(stdin, "{}", query.sequence)?;
        }
        let output = child.wait_with_output()?;
        ensure!(output.status.success(), "Engine exited with {}.", output.status);
        parse_partition_function(&String::from_utf8_lossy(&output.stdout))
    }
}

impl FoldingEngine for CommandEngine {
    fn partition_function(&self, query: &FoldingQuery<'_>, params: &FoldingParams) -> f64 {
        match self.run(query, params) {
            Ok(pf) => pf,
            Err(err) => {
                error!("Folding engine failed on {}: {err:#}", query.sequence);
                self.failures.fetch_add(1, Ordering::Relaxed);
                0.0
            }
        }
    }

    fn failed_calls(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

pub fn parse_partition_function(stdout: &str) -> Result<f64> {
    let token = stdout.split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("Engine printed nothing."))?;
    token.parse::<f64>().with_context(|| format!("Invalid partition function '{token}'."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_complexes::Material;

    #[test]
    fn test_arguments() {
        let params = FoldingParams {
            material: Material::Dna,
            long_helix_salt: true,
            ..Default::default()
        };
        let query = FoldingQuery { sequence: "GGAA+UUCC", nicks: &[4], symmetry_factor: 2 };
        let args = CommandEngine::arguments(&query, &params);
        assert_eq!(&args[..4], &["--temperature", "37", "--material", "dna1998"]);
        assert_eq!(&args[10..], &["--symmetry", "2", "--long-helix-salt"]);
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_partition_function("  1.5e3\n").unwrap(), 1500.0);
        assert!(parse_partition_function("").is_err());
        assert!(parse_partition_function("nan?").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_calls_are_counted() {
        let engine = CommandEngine::new(Path::new("/bin/false")).unwrap();
        let query = FoldingQuery { sequence: "GGAA", nicks: &[], symmetry_factor: 1 };
        assert_eq!(engine.partition_function(&query, &FoldingParams::default()), 0.0);
        assert_eq!(engine.partition_function(&query, &FoldingParams::default()), 0.0);
        assert_eq!(engine.failed_calls(), 2);
    }

    #[test]
    fn test_missing_program() {
        assert!(CommandEngine::new(Path::new("/nonexistent/engine")).is_err());
    }
}
