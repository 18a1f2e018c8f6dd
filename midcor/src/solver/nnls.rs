//! Non-negative least squares via the Lawson-Hanson active-set method.
//!
//! The correction fit minimizes ||v - A x||^2 subject to x >= 0. The
//! active-set method terminates in a finite number of steps and yields a
//! solution satisfying the KKT stationarity conditions: for every index,
//! either x_i = 0 and the gradient component is non-negative, or x_i > 0
//! and the gradient component vanishes (to tolerance), with
//! grad f(x) = -2 A^T (v - A x).
//!
//! The matrix can get badly conditioned when the tracer count is large
//! and the purity vector is close to the identity; the passive-set
//! subproblem is therefore solved through an SVD, which also yields the
//! minimum-norm solution when columns become numerically dependent.

use nalgebra::{
    DMatrix,
    DVector,
};
use tracing::trace;

use crate::errors::{
    CorrectionError,
    Result,
};
use crate::solver::CancelToken;

/// Iteration cap and tolerances for the NNLS fit.
///
/// Held by value at construction time so tests can tighten or loosen
/// them without recompiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NnlsConfig {
    /// Upper bound on active-set iterations (outer and inner combined).
    pub max_iterations: usize,
    /// Stationarity threshold on the projected gradient.
    pub gradient_tolerance: f64,
    /// Relative objective-change threshold for early termination.
    pub objective_tolerance: f64,
}

impl Default for NnlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            gradient_tolerance: 1e-10,
            objective_tolerance: 1e-12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NnlsSolution {
    pub x: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize ||b - A x||^2 over x >= 0.
///
/// Returns the best solution found together with the iteration count and
/// a convergence flag; the caller decides whether a non-converged fit is
/// an error. Cancellation is checked once per iteration.
pub fn solve_nnls(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    config: &NnlsConfig,
    cancel: Option<&CancelToken>,
) -> Result<NnlsSolution> {
    let n = a.ncols();
    let mut x = DVector::<f64>::zeros(n);
    let mut passive = vec![false; n];
    let mut iterations = 0;
    let mut objective = b.norm_squared();

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(CorrectionError::Cancelled);
        }
        if iterations >= config.max_iterations {
            return Ok(NnlsSolution {
                x,
                iterations,
                converged: false,
            });
        }
        iterations += 1;

        // w = A^T (b - A x) is -grad/2; stationarity holds when no
        // inactive coordinate still has positive descent direction.
        let residual = b - a * &x;
        let w = a.transpose() * &residual;
        let candidate = (0..n)
            .filter(|&i| !passive[i])
            .map(|i| (i, w[i]))
            .max_by(|lhs, rhs| lhs.1.total_cmp(&rhs.1));
        let entering = match candidate {
            Some((i, wi)) if wi > config.gradient_tolerance => i,
            _ => {
                return Ok(NnlsSolution {
                    x,
                    iterations,
                    converged: true,
                });
            }
        };
        passive[entering] = true;

        // Inner loop: solve the unconstrained problem on the passive set
        // and walk back until the passive solution is feasible.
        loop {
            if iterations >= config.max_iterations {
                return Ok(NnlsSolution {
                    x,
                    iterations,
                    converged: false,
                });
            }
            let z = solve_passive(a, b, &passive)?;
            let infeasible = passive_indices(&passive)
                .zip(z.iter())
                .filter(|&(_, &zi)| zi <= 0.0)
                .map(|(i, &zi)| (i, zi))
                .collect::<Vec<_>>();
            if infeasible.is_empty() {
                scatter(&mut x, &passive, &z);
                break;
            }
            iterations += 1;

            let mut alpha = f64::INFINITY;
            for &(i, zi) in infeasible.iter() {
                let step = x[i] / (x[i] - zi);
                if step < alpha {
                    alpha = step;
                }
            }
            // Interpolate x towards z on the passive set and drop every
            // coordinate that just hit the bound.
            let mut k = 0;
            for i in 0..n {
                if passive[i] {
                    x[i] += alpha * (z[k] - x[i]);
                    k += 1;
                }
            }
            for i in 0..n {
                if passive[i] && x[i] <= f64::EPSILON {
                    x[i] = 0.0;
                    passive[i] = false;
                }
            }
        }

        let new_objective = (b - a * &x).norm_squared();
        trace!(
            "NNLS iteration {}: objective {} -> {}",
            iterations,
            objective,
            new_objective,
        );
        let change = (objective - new_objective).abs();
        if change <= config.objective_tolerance * new_objective.max(1.0) {
            return Ok(NnlsSolution {
                x,
                iterations,
                converged: true,
            });
        }
        objective = new_objective;
    }
}

fn passive_indices(passive: &[bool]) -> impl Iterator<Item = usize> + '_ {
    passive
        .iter()
        .enumerate()
        .filter(|(_, &p)| p)
        .map(|(i, _)| i)
}

fn scatter(x: &mut DVector<f64>, passive: &[bool], z: &DVector<f64>) {
    let mut k = 0;
    for i in 0..x.len() {
        if passive[i] {
            x[i] = z[k];
            k += 1;
        } else {
            x[i] = 0.0;
        }
    }
}

/// Singular values below this are treated as zero when solving the
/// passive-set subproblem.
const SVD_RANK_EPSILON: f64 = 1e-12;

/// Least-squares solution restricted to the passive columns.
fn solve_passive(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    passive: &[bool],
) -> Result<DVector<f64>> {
    let columns = passive_indices(passive)
        .map(|i| a.column(i).into_owned())
        .collect::<Vec<_>>();
    let sub = DMatrix::from_columns(&columns);
    let solution = sub
        .svd(true, true)
        .solve(b, SVD_RANK_EPSILON)
        .map_err(|err| CorrectionError::InternalInvariant {
            details: format!("least-squares subproblem failed: {}", err),
        })?;
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(CorrectionError::InternalInvariant {
            details: "least-squares subproblem produced non-finite values".to_string(),
        });
    }
    Ok(solution)
}
