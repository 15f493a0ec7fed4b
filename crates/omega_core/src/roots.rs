//! Scalar and two-dimensional root finders.
//!
//! Bisection follows a single bracket policy everywhere it is used: when the
//! initial bracket `[a, b]` shows no sign change, `b` is grown geometrically
//! by `growth_factor` until it does, and the search fails with
//! [`LensError::NoBracket`] once `b` would pass `bracket_ceiling`. Passing a
//! ceiling no larger than `b` disables growth entirely.

use crate::error::{LensError, Result};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BisectionSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub growth_factor: f64,
    pub bracket_ceiling: f64,
}

impl Default for BisectionSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 100,
            growth_factor: 1.5,
            bracket_ceiling: 1e6,
        }
    }
}

impl BisectionSettings {
    /// Settings that never widen the initial bracket.
    pub fn strict(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            growth_factor: 1.5,
            bracket_ceiling: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub tolerance: f64,
    /// Forward-difference step used for every Jacobian column.
    pub jacobian_step: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 50,
            tolerance: 1e-10,
            jacobian_step: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonSolution {
    pub x: [f64; 2],
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Finds a root of `f` inside `[a, b]`, widening `b` when needed.
///
/// Returns the midpoint of the final bracket once `|f(mid)|` or the bracket
/// half-width drops below the tolerance.
pub fn bisect<F>(f: F, a: f64, b: f64, settings: &BisectionSettings) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    validate_bisection(a, b, settings)?;

    let mut lo = a;
    let mut hi = b;
    let mut f_lo = evaluate_scalar(&f, lo)?;
    let mut f_hi = evaluate_scalar(&f, hi)?;

    while same_sign(f_lo, f_hi) {
        let next = hi * settings.growth_factor;
        if hi <= 0.0 || next > settings.bracket_ceiling {
            return Err(LensError::NoBracket {
                a,
                b: hi,
                ceiling: settings.bracket_ceiling,
            });
        }
        hi = next;
        f_hi = evaluate_scalar(&f, hi)?;
    }

    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }

    let mut residual = f64::INFINITY;
    for iteration in 0..settings.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = evaluate_scalar(&f, mid)?;
        residual = f_mid.abs();

        if residual < settings.tolerance || 0.5 * (hi - lo) < settings.tolerance {
            debug!(root = mid, iterations = iteration + 1, "bisection converged");
            return Ok(mid);
        }

        if same_sign(f_lo, f_mid) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(LensError::Convergence {
        solver: "bisection",
        iterations: settings.max_iterations,
        residual,
    })
}

fn validate_bisection(a: f64, b: f64, settings: &BisectionSettings) -> Result<()> {
    if !a.is_finite() || !b.is_finite() || a >= b {
        return Err(LensError::config(format!(
            "bisection bracket must be finite with a < b (got [{a}, {b}])"
        )));
    }
    if settings.tolerance <= 0.0 {
        return Err(LensError::config("bisection tolerance must be positive"));
    }
    if settings.max_iterations == 0 {
        return Err(LensError::config(
            "bisection max_iterations must be greater than zero",
        ));
    }
    if settings.growth_factor <= 1.0 {
        return Err(LensError::config(
            "bisection growth_factor must be greater than one",
        ));
    }
    Ok(())
}

fn evaluate_scalar<F: Fn(f64) -> f64>(f: &F, x: f64) -> Result<f64> {
    let value = f(x);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LensError::NonFinite {
            solver: "bisection",
            location: format!("x = {x}"),
        })
    }
}

/// Both values non-zero with the same sign. Products of tiny values underflow.
fn same_sign(a: f64, b: f64) -> bool {
    a != 0.0 && b != 0.0 && a.is_sign_negative() == b.is_sign_negative()
}

/// Solves `F(x) = 0` for `F: R² → R²` with undamped Newton steps.
///
/// The Jacobian is estimated by forward differences. There is no line search,
/// so a poor initial guess can diverge or land on a singular Jacobian; both
/// surface as errors.
pub fn newton_raphson_2d<F>(f: F, x0: [f64; 2], settings: &NewtonSettings) -> Result<NewtonSolution>
where
    F: Fn(f64, f64) -> [f64; 2],
{
    if settings.max_steps == 0 {
        return Err(LensError::config("max_steps must be greater than zero"));
    }
    if settings.tolerance <= 0.0 {
        return Err(LensError::config("Newton tolerance must be positive"));
    }
    if settings.jacobian_step <= 0.0 {
        return Err(LensError::config("jacobian_step must be positive"));
    }

    let mut x = Vector2::new(x0[0], x0[1]);
    let mut residual = evaluate_vector(&f, &x)?;
    let mut residual_norm = residual.norm();

    for iteration in 0..settings.max_steps {
        if residual_norm < settings.tolerance {
            return Ok(converged(&x, residual_norm, iteration));
        }

        let jacobian = forward_jacobian(&f, &x, &residual, settings.jacobian_step)?;
        let delta = solve_2x2(&jacobian, &(-residual)).ok_or(LensError::SingularJacobian {
            at: [x[0], x[1]],
        })?;

        x += delta;
        residual = evaluate_vector(&f, &x)?;
        residual_norm = residual.norm();

        if delta.norm() < settings.tolerance {
            return Ok(converged(&x, residual_norm, iteration + 1));
        }
    }

    if residual_norm < settings.tolerance {
        return Ok(converged(&x, residual_norm, settings.max_steps));
    }

    Err(LensError::Convergence {
        solver: "Newton-Raphson",
        iterations: settings.max_steps,
        residual: residual_norm,
    })
}

fn converged(x: &Vector2<f64>, residual_norm: f64, iterations: usize) -> NewtonSolution {
    debug!(
        x = x[0],
        y = x[1],
        residual_norm,
        iterations,
        "Newton-Raphson converged"
    );
    NewtonSolution {
        x: [x[0], x[1]],
        residual_norm,
        iterations,
    }
}

fn evaluate_vector<F: Fn(f64, f64) -> [f64; 2]>(f: &F, x: &Vector2<f64>) -> Result<Vector2<f64>> {
    let [f1, f2] = f(x[0], x[1]);
    if f1.is_finite() && f2.is_finite() {
        Ok(Vector2::new(f1, f2))
    } else {
        Err(LensError::NonFinite {
            solver: "Newton-Raphson",
            location: format!("({}, {})", x[0], x[1]),
        })
    }
}

fn forward_jacobian<F: Fn(f64, f64) -> [f64; 2]>(
    f: &F,
    x: &Vector2<f64>,
    f0: &Vector2<f64>,
    h: f64,
) -> Result<Matrix2<f64>> {
    let mut jacobian = Matrix2::zeros();
    for j in 0..2 {
        let mut stepped = *x;
        stepped[j] += h;
        let fj = evaluate_vector(f, &stepped)?;
        jacobian.set_column(j, &((fj - f0) / h));
    }
    Ok(jacobian)
}

fn solve_2x2(jacobian: &Matrix2<f64>, rhs: &Vector2<f64>) -> Option<Vector2<f64>> {
    let det = jacobian.determinant();
    if !det.is_finite() || det.abs() <= f64::EPSILON * jacobian.norm_squared() {
        return None;
    }
    jacobian
        .lu()
        .solve(rhs)
        .filter(|delta| delta.iter().all(|v| v.is_finite()))
}
