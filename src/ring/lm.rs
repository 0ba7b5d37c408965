//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Levenberg-Marquardt least-squares solver.
//!

use std::time::{Duration, Instant};

/// Damping above which the solver gives up improving the fit.
const MAX_LAMBDA: f64 = 1e10;

/// Pivots smaller than this are treated as singular.
const MIN_PIVOT: f64 = 1e-12;

/// Hessian diagonal entries below this fraction of the largest one mark a parameter the data does not constrain.
const VANISHING_DIAGONAL: f64 = 1e-14;

#[derive(Debug, Clone)]
pub struct LMConfig {
    pub max_iterations: usize,
    /// The fit has converged when no parameter changes by more than this in an accepted step.
    pub convergence_threshold: f64,
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step.
    pub lambda_up: f64,
    /// Damping multiplier after an accepted step.
    pub lambda_down: f64,
    /// Wall-clock limit for a single optimization.
    pub time_limit: Option<Duration>
}

impl Default for LMConfig {
    fn default() -> LMConfig {
        LMConfig{
            max_iterations: 200,
            convergence_threshold: 1e-8,
            initial_lambda: 0.001,
            lambda_up: 10.0,
            lambda_down: 0.1,
            time_limit: None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LMResult<const N: usize> {
    pub params: [f64; N],
    /// Sum of squared residuals at `params`.
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
    /// Set if the time limit was reached; `params` are then the best found so far.
    pub timed_out: bool
}

/// Model of N parameters sampled at 2D points.
pub trait LMModel<const N: usize> {
    fn evaluate(&self, x: f64, y: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives of `evaluate` with respect to each parameter.
    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; N]) -> [f64; N];
}

pub fn chi2<const N: usize, M: LMModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    data_z: &[f64],
    params: &[f64; N]
) -> f64 {
    data_x.iter().zip(data_y.iter()).zip(data_z.iter())
        .map(|((&x, &y), &z)| {
            let residual = z - model.evaluate(x, y, params);
            residual * residual
        })
        .sum()
}

/// Minimizes the sum of squared residuals `data_z - model(data_x, data_y)`, starting at `initial_params`.
///
/// Stops on convergence, after `max_iterations`, when damping grows beyond any useful step,
/// or when the time limit elapses. Non-finite values are passed through to the caller.
///
pub fn optimize<const N: usize, M: LMModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    data_z: &[f64],
    initial_params: [f64; N],
    config: &LMConfig
) -> LMResult<N> {
    assert!(data_x.len() == data_y.len() && data_y.len() == data_z.len());

    let t_start = Instant::now();
    let mut params = initial_params;
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = chi2(model, data_x, data_y, data_z, &params);
    let mut converged = false;
    let mut timed_out = false;
    let mut iterations = 0;

    let mut jacobian = Vec::with_capacity(data_x.len());
    let mut residuals = Vec::with_capacity(data_x.len());

    if !prev_chi2.is_finite() {
        return LMResult{ params, chi2: prev_chi2, converged, iterations, timed_out };
    }

    for iter in 0..config.max_iterations {
        if prev_chi2 == 0.0 {
            converged = true;
            break;
        }
        if let Some(limit) = config.time_limit {
            if t_start.elapsed() >= limit {
                timed_out = true;
                break;
            }
        }
        iterations = iter + 1;

        jacobian.clear();
        residuals.clear();
        for ((&x, &y), &z) in data_x.iter().zip(data_y.iter()).zip(data_z.iter()) {
            jacobian.push(model.jacobian_row(x, y, &params));
            residuals.push(z - model.evaluate(x, y, &params));
        }
        let (mut hessian, mut gradient) = hessian_gradient(&jacobian, &residuals);
        hold_vanishing_parameters(&mut hessian, &mut gradient);

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let delta = match solve(&damped, &gradient) {
            Some(delta) => delta,
            None => break
        };

        let mut new_params = params;
        for (p, d) in new_params.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        let new_chi2 = chi2(model, data_x, data_y, data_z, &new_params);

        if new_chi2 < prev_chi2 {
            params = new_params;
            prev_chi2 = new_chi2;
            lambda *= config.lambda_down;

            let max_delta = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
            if max_delta < config.convergence_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > MAX_LAMBDA {
                break;
            }
        }
    }

    LMResult{ params, chi2: prev_chi2, converged, iterations, timed_out }
}

/// Returns J^T J and J^T r.
pub fn hessian_gradient<const N: usize>(jacobian: &[[f64; N]], residuals: &[f64]) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (row, &r) in jacobian.iter().zip(residuals.iter()) {
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}

/// Freezes parameters whose Jacobian column is (numerically) zero, so that the step leaves them unchanged.
///
/// Example: the ellipse orientation of a circular ring.
///
fn hold_vanishing_parameters<const N: usize>(hessian: &mut [[f64; N]; N], gradient: &mut [f64; N]) {
    let max_diag = (0..N).fold(0.0f64, |acc, i| acc.max(hessian[i][i]));
    for i in 0..N {
        if hessian[i][i] <= max_diag * VANISHING_DIAGONAL {
            for j in 0..N {
                hessian[i][j] = 0.0;
                hessian[j][i] = 0.0;
            }
            hessian[i][i] = 1.0;
            gradient[i] = 0.0;
        }
    }
}

/// Solves `a` * x = `b` by Gaussian elimination with partial pivoting; returns `None` if `a` is singular.
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut matrix = *a;
    let mut rhs = *b;

    for col in 0..N {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..N {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }

        if !(max_val >= MIN_PIVOT) {
            return None;
        }

        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..N {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_row = matrix[col];
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= matrix[i][j] * xj;
        }
        x[i] = sum / matrix[i][i];
    }

    Some(x)
}
