//! Trust-region solver for equilibrium mole fractions.
//!
//! One call runs through the states
//! `Initialized -> Reformulated -> Optimizing -> Converged | Failed`.
//! Optimization restarts from a randomly perturbed point when it stalls
//! or runs out of iterations, up to a maximum number of trials. Running
//! out of trials is not an error: the last iterate is returned with
//! status `Failed`.
//!

use std::fmt;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::EquilibriumProblem;
use crate::error::Result;
use crate::dogleg::{Dual, Local, dogleg_step, predicted_reduction};

/// Mass balances are not resolved below this many ulps of their terms.
const ROUNDING_ULPS: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iterations per trial.
    pub max_iters: usize,
    /// Relative tolerance, scaled by the smallest total concentration.
    pub tol: f64,
    /// Upper bound on the trust-region radius.
    pub max_trust_radius: f64,
    /// Minimal ratio of actual to predicted reduction to accept a step.
    pub eta: f64,
    /// Rejected steps in a row before perturbing.
    pub max_no_step: usize,
    /// Maximum number of perturbations.
    pub max_trials: usize,
    pub perturb_scale: f64,
    /// Random seed for perturbations, OS entropy if unset.
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iters: 10000,
            tol: 1e-7,
            max_trust_radius: 1000.0,
            eta: 0.125,
            max_no_step: 50,
            max_trials: 100000,
            perturb_scale: 100.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Initialized,
    Reformulated,
    Optimizing,
    Converged,
    Failed,
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverState::Initialized => "initialized",
            SolverState::Reformulated => "reformulated",
            SolverState::Optimizing => "optimizing",
            SolverState::Converged => "converged",
            SolverState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStatus {
    Converged,
    Failed,
}

impl SolverStatus {
    pub fn is_converged(&self) -> bool {
        *self == SolverStatus::Converged
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumSolution {
    /// Mole fraction of every complex of the full problem.
    pub mole_fractions: Array1<f64>,
    pub status: SolverStatus,
    /// Iterations over all trials.
    pub iterations: usize,
    /// Number of perturbations applied.
    pub trials: usize,
}

/// Outcome of one trial.
enum Trial {
    Converged,
    Stalled,
    OutOfIterations,
}

pub struct EquilibriumSolver<'a> {
    config: &'a SolverConfig,
    state: SolverState,
    rng: StdRng,
    iterations: usize,
    trials: usize,
}

impl<'a> EquilibriumSolver<'a> {
    pub fn new(config: &'a SolverConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            state: SolverState::Initialized,
            rng,
            iterations: 0,
            trials: 0,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    fn transition(&mut self, state: SolverState) {
        debug!("Solver state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Computes the equilibrium mole fractions of all complexes.
    pub fn solve(&mut self, problem: &EquilibriumProblem) -> Result<EquilibriumSolution> {
        self.iterations = 0;
        self.trials = 0;
        self.state = SolverState::Initialized;

        let reformulation = problem.reformulate()?;
        self.transition(SolverState::Reformulated);
        let reduced = &reformulation.problem;

        if reduced.n_species() == 0 {
            self.transition(SolverState::Converged);
            return Ok(EquilibriumSolution {
                mole_fractions: reformulation.expand(&Array1::zeros(0)),
                status: SolverStatus::Converged,
                iterations: 0,
                trials: 0,
            });
        }

        let dual = Dual::new(
            DMatrix::from_fn(reduced.n_species(), reduced.n_complexes(),
                |i, j| f64::from(reduced.stoichiometry()[[i, j]])),
            DVector::from_iterator(reduced.n_complexes(), reduced.free_energy().iter().copied()),
            DVector::from_iterator(reduced.n_species(), reduced.x0().iter().copied()),
        );
        let abs_tol = self.config.tol * dual.x0().min();

        let mut lambda = dual.x0().map(f64::ln);
        dual.guard_overflow(&mut lambda);

        self.transition(SolverState::Optimizing);
        loop {
            match self.trial(&dual, &mut lambda, abs_tol) {
                Trial::Converged => {
                    self.transition(SolverState::Converged);
                    break;
                }
                outcome if self.trials >= self.config.max_trials => {
                    if matches!(outcome, Trial::OutOfIterations) {
                        warn!("Maximum number of iterations reached in the last trial.");
                    }
                    self.transition(SolverState::Failed);
                    break;
                }
                _ => {
                    if self.trials == 0 {
                        warn!("Trust region stalled, retrying from perturbed points.");
                    }
                    self.trials += 1;
                    self.perturb(&dual, &mut lambda);
                    debug!("Perturbation {} of {}.", self.trials, self.config.max_trials);
                }
            }
        }

        let status = match self.state {
            SolverState::Converged => {
                info!("Trust region converged after {} iterations and {} perturbations.",
                    self.iterations, self.trials);
                SolverStatus::Converged
            }
            _ => {
                warn!("Trust region did not converge after {} iterations and {} perturbations.",
                    self.iterations, self.trials);
                SolverStatus::Failed
            }
        };
        let x = dual.mole_fractions(&lambda);
        let mole_fractions = reformulation.expand(&Array1::from_iter(x.iter().copied()));
        Ok(EquilibriumSolution {
            mole_fractions,
            status,
            iterations: self.iterations,
            trials: self.trials,
        })
    }

    /// Trust-region iterations from the current point.
    fn trial(&mut self, dual: &Dual, lambda: &mut DVector<f64>, abs_tol: f64) -> Trial {
        let mut delta = 0.99 * self.config.max_trust_radius;
        let mut no_step = 0;
        let mut local = dual.local(lambda);
        for _ in 0..self.config.max_iters {
            if converged(&local, dual.x0(), abs_tol) {
                return Trial::Converged;
            }
            self.iterations += 1;

            let (p, boundary) = dogleg_step(&local, delta);
            let predicted = predicted_reduction(&local, &p);
            let actual = dual.actual_reduction(&local, &p);
            let rho = if predicted > 0.0 && actual.is_finite() {
                actual / predicted
            } else {
                0.0
            };

            if rho < 0.25 {
                delta = p.norm() / 4.0;
            } else if rho > 0.75 && boundary {
                delta = (2.0 * delta).min(self.config.max_trust_radius);
            }

            if rho > self.config.eta {
                *lambda += &p;
                local = dual.local(lambda);
                no_step = 0;
            } else {
                no_step += 1;
                if no_step > self.config.max_no_step {
                    debug!("No step taken in {} iterations.", no_step);
                    return Trial::Stalled;
                }
            }
        }
        if converged(&local, dual.x0(), abs_tol) {
            Trial::Converged
        } else {
            Trial::OutOfIterations
        }
    }

    fn perturb(&mut self, dual: &Dual, lambda: &mut DVector<f64>) {
        let scale = self.config.perturb_scale;
        for l in lambda.iter_mut() {
            *l += scale * (2.0 * self.rng.random::<f64>() - 1.0);
        }
        dual.guard_overflow(lambda);
    }
}

/// Mass balance `|(A x - x0)_i|` below the absolute tolerance, or below
/// the rounding error of species i when that is larger.
fn converged(local: &Local, x0: &DVector<f64>, abs_tol: f64) -> bool {
    local.gradient.iter().zip(x0.iter()).all(|(&g, &total)| {
        let rounding = ROUNDING_ULPS * f64::EPSILON * ((g + total).abs() + total);
        g.abs() < abs_tol.max(rounding)
    })
}

/// Solves `problem` with a fresh solver.
pub fn solve(problem: &EquilibriumProblem, config: &SolverConfig) -> Result<EquilibriumSolution> {
    EquilibriumSolver::new(config).solve(problem)
}
