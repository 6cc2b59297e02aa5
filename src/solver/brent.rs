//! Brent's method for bracketed scalar roots.
//!
//! Combines bisection with secant and inverse quadratic interpolation. Every
//! iterate stays inside the starting bracket, which matters here: outside the
//! bracket a MOS device attached to the node would see an illegal terminal
//! ordering.

use log::trace;

use super::{SolverConfig, MAX_ROOT_ITERATIONS, ROOT_XTOL};
use crate::error::{MosdcError, Result};

/// Bracketed root finder.
#[derive(Debug, Clone)]
pub struct Brent {
    /// Absolute tolerance on the root location, in volts
    pub xtol: f64,
    /// Maximum number of function evaluations after the endpoints
    pub max_iterations: usize,
}

impl Default for Brent {
    fn default() -> Self {
        Self::new()
    }
}

impl Brent {
    /// Create a root finder with default tolerances.
    pub fn new() -> Self {
        Self {
            xtol: ROOT_XTOL,
            max_iterations: MAX_ROOT_ITERATIONS,
        }
    }

    /// Create a root finder using the limits in a solver configuration.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            xtol: config.root_xtol,
            max_iterations: config.max_root_iterations,
        }
    }

    /// Find a root of `f` in `[a, b]`, given `fa = f(a)` and `fb = f(b)`.
    ///
    /// `label` names the node in error messages. Errors from `f` propagate
    /// unchanged; a missing sign change or an exhausted iteration budget
    /// becomes [`MosdcError::ConvergenceError`].
    pub fn find_root<F>(&self, label: &str, mut f: F, a: f64, b: f64, fa: f64, fb: f64) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let fail = |a: f64, b: f64, fa: f64, fb: f64, reason: &str| MosdcError::ConvergenceError {
            node: label.to_string(),
            a,
            b,
            fa,
            fb,
            reason: reason.to_string(),
        };

        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        if fa.signum() == fb.signum() || fa.is_nan() || fb.is_nan() {
            return Err(fail(a, b, fa, fb, "endpoints do not bracket a sign change"));
        }

        let (mut a, mut b, mut fa, mut fb) = (a, b, fa, fb);
        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for iter in 0..self.max_iterations {
            // Keep the root between b and c.
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            // b is the best estimate so far.
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.xtol;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol || fb == 0.0 {
                trace!("{}: root {:.9} after {} iterations", label, b, iter);
                return Ok(b);
            }

            if e.abs() >= tol && fa.abs() > fb.abs() {
                // Try interpolation.
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    // Secant
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    // Inverse quadratic
                    let qa = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                    q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();

                let min1 = 3.0 * xm * q - (tol * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                // Bisection
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(xm) };
            fb = f(b)?;
        }

        Err(fail(b, c, fb, fc, "iteration limit reached"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn solve<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> Result<f64> {
        let (fa, fb) = (f(a), f(b));
        Brent::new().find_root("test", |x| Ok(f(x)), a, b, fa, fb)
    }

    #[test]
    fn test_finds_polynomial_root() {
        let root = solve(|x| x * x * x - 2.0 * x - 5.0, 2.0, 3.0).unwrap();
        assert_abs_diff_eq!(root, 2.094_551_481_542_326_6, epsilon = 1e-10);
    }

    #[test]
    fn test_decreasing_function() {
        let root = solve(|x| 1.0 - x * x, 0.0, 3.0).unwrap();
        assert_abs_diff_eq!(root, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_flat_piecewise_function() {
        // Zero on a whole interval: any point inside is acceptable.
        let f = |x: f64| {
            if x < 1.0 {
                1.0 - x
            } else if x > 2.0 {
                2.0 - x
            } else {
                0.0
            }
        };
        let root = solve(f, 0.0, 3.0).unwrap();
        assert!((1.0 - 1e-9..=2.0 + 1e-9).contains(&root));
        assert!(f(root).abs() < 1e-9);
    }

    #[test]
    fn test_no_sign_change() {
        match solve(|x| x * x + 1.0, -1.0, 1.0) {
            Err(MosdcError::ConvergenceError { node, fa, fb, .. }) => {
                assert_eq!(node, "test");
                assert_eq!(fa, 2.0);
                assert_eq!(fb, 2.0);
            }
            other => panic!("expected convergence error, got {:?}", other),
        }
    }

    #[test]
    fn test_iteration_budget() {
        let brent = Brent {
            xtol: 0.0,
            max_iterations: 2,
        };
        let f = |x: f64| x.powi(3) - 0.3;
        let result = brent.find_root("tight", |x| Ok(f(x)), 0.0, 1.0, f(0.0), f(1.0));
        assert!(matches!(result, Err(MosdcError::ConvergenceError { .. })));
    }

    #[test]
    fn test_errors_from_residual_propagate() {
        let result = Brent::new().find_root(
            "n",
            |_| Err(MosdcError::underdetermined("inner", "boom")),
            0.0,
            1.0,
            -1.0,
            1.0,
        );
        assert!(matches!(result, Err(MosdcError::Underdetermined { .. })));
    }
}
