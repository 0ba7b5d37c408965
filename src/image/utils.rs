//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Low-level utility functions and macros for images.
//!

/// Produces a range of specified length.
#[macro_export]
macro_rules! range { ($start:expr, $len:expr) => { $start .. $start + $len } }

/// Returns (min, max) of `values`, ignoring NaNs; `None` if there are no finite values.
pub fn finite_min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut result: Option<(f64, f64)> = None;
    for &v in values.iter().filter(|v| v.is_finite()) {
        result = Some(match result {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v))
        });
    }

    result
}

/// Linearly maps `value` from `[lo, hi]` to `[0, 255]`, clipping values outside the range.
pub fn scale_to_u8(value: f64, lo: f64, hi: f64) -> u8 {
    if !value.is_finite() || hi <= lo {
        return 0;
    }
    ((value - lo) / (hi - lo) * 255.0).round().max(0.0).min(255.0) as u8
}
