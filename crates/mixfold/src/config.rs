//! Optional JSON configuration, overridden by command-line flags.

use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mf_complexes::FoldingParams;
use mf_equilibrium::SortOrder;
use mf_equilibrium::SolverConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub folding: FoldingParams,
    pub solver: SolverConfig,
    pub sort: SortOrder,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid configuration")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = crate::input::read_file(path)?;
                Self::from_json(&text).with_context(|| format!("In {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }
}
