//! Dual objective and the dogleg step.
//!
//! With dual variables λ (one per species) the complex mole fractions
//! are `x_j = exp(-G_j + Σ_i A_ij λ_i)` and the objective is
//! `f(λ) = Σ_j x_j - Σ_i x0_i λ_i`, convex in λ. Its minimum satisfies
//! mass conservation `A x = x0`.

use nalgebra::{DMatrix, DVector};

/// Exponents larger than this are shifted down before evaluation.
pub(crate) const MAX_LOG_X: f64 = 250.0;

pub(crate) struct Dual {
    /// Stoichiometry, species × complexes.
    a: DMatrix<f64>,
    g: DVector<f64>,
    x0: DVector<f64>,
}

/// Objective derivatives at one point.
pub(crate) struct Local {
    pub x: DVector<f64>,
    pub gradient: DVector<f64>,
    pub hessian: DMatrix<f64>,
}

impl Dual {
    pub fn new(a: DMatrix<f64>, g: DVector<f64>, x0: DVector<f64>) -> Self {
        Self { a, g, x0 }
    }

    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    pub fn log_x(&self, lambda: &DVector<f64>) -> DVector<f64> {
        self.a.tr_mul(lambda) - &self.g
    }

    pub fn mole_fractions(&self, lambda: &DVector<f64>) -> DVector<f64> {
        self.log_x(lambda).map(f64::exp)
    }

    /// Gradient `A x - x0` and Hessian `A diag(x) Aᵀ`.
    pub fn local(&self, lambda: &DVector<f64>) -> Local {
        let x = self.mole_fractions(lambda);
        let gradient = &self.a * &x - &self.x0;
        let mut scaled = self.a.clone();
        for (j, mut column) in scaled.column_iter_mut().enumerate() {
            column *= x[j];
        }
        let hessian = &scaled * self.a.transpose();
        Local { x, gradient, hessian }
    }

    /// `f(λ) - f(λ + p)`, evaluated as a sum of small terms.
    pub fn actual_reduction(&self, local: &Local, p: &DVector<f64>) -> f64 {
        let shift = self.a.tr_mul(p);
        let complexes: f64 = local.x.iter()
            .zip(shift.iter())
            .map(|(&x, &s)| -x * s.exp_m1())
            .sum();
        complexes + self.x0.dot(p)
    }

    /// Shifts all λ down so that no exponent exceeds `MAX_LOG_X`.
    pub fn guard_overflow(&self, lambda: &mut DVector<f64>) {
        let excess = self.log_x(lambda).max() - MAX_LOG_X;
        if excess > 0.0 {
            lambda.add_scalar_mut(-excess);
        }
    }
}

/// Predicted reduction of the quadratic model for step `p`.
pub(crate) fn predicted_reduction(local: &Local, p: &DVector<f64>) -> f64 {
    -(local.gradient.dot(p) + 0.5 * p.dot(&(&local.hessian * p)))
}

/// Dogleg step within radius `delta`. Returns the step and whether it
/// ends on the trust-region boundary.
pub(crate) fn dogleg_step(local: &Local, delta: f64) -> (DVector<f64>, bool) {
    let g = &local.gradient;
    let h = &local.hessian;
    let g_norm = g.norm();
    let curvature = g.dot(&(h * g));

    let newton = h.clone().cholesky().map(|c| c.solve(&(-g)));
    let Some(newton) = newton else {
        return cauchy_step(g, g_norm, curvature, delta);
    };
    if newton.norm() <= delta {
        return (newton, false);
    }
    if !(curvature > 0.0) {
        return (g * (-delta / g_norm), true);
    }

    let steepest = g * (-(g_norm * g_norm) / curvature);
    let steepest_norm = steepest.norm();
    if steepest_norm >= delta {
        return (steepest * (delta / steepest_norm), true);
    }

    // Point on the segment steepest -> newton at distance delta.
    let d = &newton - &steepest;
    let a = d.norm_squared();
    let b = 2.0 * steepest.dot(&d);
    let c = steepest_norm * steepest_norm - delta * delta;
    let tau = (-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a);
    (steepest + d * tau, true)
}

fn cauchy_step(g: &DVector<f64>, g_norm: f64, curvature: f64, delta: f64) -> (DVector<f64>, bool) {
    let tau = if curvature <= 0.0 {
        1.0
    } else {
        (g_norm.powi(3) / (delta * curvature)).min(1.0)
    };
    (g * (-tau * delta / g_norm), tau >= 1.0)
}
