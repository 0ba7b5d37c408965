//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Fitting of the ring Gaussian model to an image patch.
//!

use crate::image::{Image, PixelFormat};
use crate::ring::{lm, CoordinateGrid, RingGaussian, NUM_PARAMS, ring_gradient, ring_value};
use std::time::Duration;

#[derive(Debug)]
pub enum FitError {
    /// Patch size (width, height) differs from the grid size.
    ShapeMismatch{ patch: (u32, u32), grid: (u32, u32) },
    /// Residual sum or parameters became non-finite.
    NonFinite,
    TimedOut(Duration)
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::ShapeMismatch{ patch, grid } => write!(
                f, "patch size {}x{} does not match grid size {}x{}", patch.0, patch.1, grid.0, grid.1
            ),
            FitError::NonFinite => write!(f, "fit diverged (non-finite values)"),
            FitError::TimedOut(limit) => write!(f, "fit did not finish within {} ms", limit.as_millis())
        }
    }
}

impl std::error::Error for FitError {}

#[derive(Copy, Clone, Debug)]
pub struct FitResult {
    /// Fitted parameters; semi-axes are not sorted.
    pub params: RingGaussian,
    pub chi2: f64,
    pub iterations: usize,
    /// False if the iteration limit was reached first; such results are still usable.
    pub converged: bool
}

struct RingModel;

impl lm::LMModel<NUM_PARAMS> for RingModel {
    fn evaluate(&self, x: f64, y: f64, params: &[f64; NUM_PARAMS]) -> f64 {
        ring_value(params, x, y)
    }

    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; NUM_PARAMS]) -> [f64; NUM_PARAMS] {
        ring_gradient(params, x, y)
    }
}

/// Fits `RingGaussian` to patches. Holds no per-fit state; may be shared between threads.
#[derive(Clone, Debug)]
pub struct RingFitter {
    config: lm::LMConfig
}

impl RingFitter {
    pub fn new(time_limit: Option<Duration>) -> RingFitter {
        RingFitter{ config: lm::LMConfig{ time_limit, ..lm::LMConfig::default() } }
    }

    /// Fits the model to `patch` (a `Mono64f` image sampled at `grid`) starting from `initial`.
    pub fn fit(&self, patch: &Image, grid: &CoordinateGrid, initial: &RingGaussian) -> Result<FitResult, FitError> {
        assert!(patch.pixel_format() == PixelFormat::Mono64f);

        if patch.width() != grid.width() || patch.height() != grid.height() {
            return Err(FitError::ShapeMismatch{
                patch: (patch.width(), patch.height()),
                grid: (grid.width(), grid.height())
            });
        }

        let result = lm::optimize(
            &RingModel,
            grid.xs(),
            grid.ys(),
            patch.pixels::<f64>(),
            initial.to_array(),
            &self.config
        );

        if result.timed_out {
            return Err(FitError::TimedOut(self.config.time_limit.unwrap_or_default()));
        }

        let params = RingGaussian::from_array(&result.params);
        if !result.chi2.is_finite() || !params.is_finite() {
            return Err(FitError::NonFinite);
        }

        Ok(FitResult{ params, chi2: result.chi2, iterations: result.iterations, converged: result.converged })
    }
}
