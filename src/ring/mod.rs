//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Elliptical ring Gaussian model.
//!
//! The intensity at (x, y) is a Gaussian of the distance between the point and an ellipse centered
//! at (x0, y0) with semi-axes `ma`, `mi` and orientation `angle`, measured along the ray from the center:
//!
//! ```text
//! theta = atan2(y - y0, x - x0)
//! r_ellipse = ma*mi / sqrt(ma^2 sin^2(theta + angle) + mi^2 cos^2(theta + angle))
//! f = background + amplitude * exp(-((r - r_ellipse) / width)^2)
//! ```
//!

pub mod fit;
pub mod lm;

use crate::image::{Image, PixelFormat};

pub const NUM_PARAMS: usize = 8;

/// Coordinates at which a patch is sampled: `x` is the column index, `y` the row index.
///
/// Points are stored in row-major order, matching the pixel order of a patch.
///
#[derive(Clone, Debug)]
pub struct CoordinateGrid {
    width: u32,
    height: u32,
    xs: Vec<f64>,
    ys: Vec<f64>
}

impl CoordinateGrid {
    pub fn new(width: u32, height: u32) -> CoordinateGrid {
        let mut xs = Vec::with_capacity(width as usize * height as usize);
        let mut ys = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            for col in 0..width {
                xs.push(col as f64);
                ys.push(row as f64);
            }
        }

        CoordinateGrid{ width, height, xs, ys }
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn xs(&self) -> &[f64] { &self.xs }

    pub fn ys(&self) -> &[f64] { &self.ys }

}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RingGaussian {
    pub x0: f64,
    pub y0: f64,
    /// Semi-axis along the direction given by `angle`; not necessarily the larger one.
    pub ma: f64,
    pub mi: f64,
    /// Radians.
    pub angle: f64,
    pub width: f64,
    pub amplitude: f64,
    pub background: f64
}

impl RingGaussian {
    pub fn from_array(p: &[f64; NUM_PARAMS]) -> RingGaussian {
        RingGaussian{ x0: p[0], y0: p[1], ma: p[2], mi: p[3], angle: p[4], width: p[5], amplitude: p[6], background: p[7] }
    }

    pub fn to_array(&self) -> [f64; NUM_PARAMS] {
        [self.x0, self.y0, self.ma, self.mi, self.angle, self.width, self.amplitude, self.background]
    }

    pub fn is_finite(&self) -> bool { self.to_array().iter().all(|p| p.is_finite()) }

    /// Returns (major, minor) radius: the signed semi-axes, larger first.
    ///
    /// Signs are kept: semi-axes of opposite signs describe a central blob, not a ring.
    ///
    pub fn sorted_radii(&self) -> (f64, f64) {
        (self.ma.max(self.mi), self.ma.min(self.mi))
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        ring_value(&self.to_array(), x, y)
    }

    /// Returns model values at all grid points, in grid order.
    pub fn evaluate(&self, grid: &CoordinateGrid) -> Vec<f64> {
        grid.xs().iter().zip(grid.ys().iter()).map(|(&x, &y)| self.value(x, y)).collect()
    }

    /// Renders the model over `grid` as a `Mono64f` image.
    pub fn render(&self, grid: &CoordinateGrid) -> Image {
        Image::new_from_pixels(grid.width(), grid.height(), PixelFormat::Mono64f, self.evaluate(grid))
    }
}

impl std::fmt::Display for RingGaussian {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "center ({:.3}, {:.3}), axes {:.3}/{:.3}, angle {:.3}, width {:.3}, amplitude {:.1}, background {:.1}",
            self.x0, self.y0, self.ma, self.mi, self.angle, self.width, self.amplitude, self.background
        )
    }
}

pub fn ring_value(p: &[f64; NUM_PARAMS], x: f64, y: f64) -> f64 {
    let (x0, y0, ma, mi, angle, width, amplitude, background) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);

    let dx = x - x0;
    let dy = y - y0;
    let r = (dx * dx + dy * dy).sqrt();
    let (s, c) = (dy.atan2(dx) + angle).sin_cos();
    let r_ellipse = ma * mi / (ma * ma * s * s + mi * mi * c * c).sqrt();
    let u = (r - r_ellipse) / width;

    background + amplitude * (-u * u).exp()
}

/// Returns partial derivatives of `ring_value` with respect to the parameters, in parameter order.
///
/// At the ring center the polar angle is undefined; derivatives with respect to the center are reported as 0 there.
///
pub fn ring_gradient(p: &[f64; NUM_PARAMS], x: f64, y: f64) -> [f64; NUM_PARAMS] {
    let (x0, y0, ma, mi, angle, width, amplitude) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6]);

    let dx = x - x0;
    let dy = y - y0;
    let r2 = dx * dx + dy * dy;
    let r = r2.sqrt();
    let (s, c) = (dy.atan2(dx) + angle).sin_cos();

    let d2 = ma * ma * s * s + mi * mi * c * c;
    let d = d2.sqrt();
    let d3 = d2 * d;
    let r_ellipse = ma * mi / d;

    let u = (r - r_ellipse) / width;
    let e = (-u * u).exp();
    // d f / d(r - r_ellipse)
    let df_dr = -2.0 * u * amplitude * e / width;

    let dre_dma = mi * mi * mi * c * c / d3;
    let dre_dmi = ma * ma * ma * s * s / d3;
    let dre_dphi = -ma * mi * (ma * ma - mi * mi) * s * c / d3;

    let (df_dx0, df_dy0) = if r > 0.0 {
        let dr_dx0 = -dx / r;
        let dr_dy0 = -dy / r;
        let dtheta_dx0 = dy / r2;
        let dtheta_dy0 = -dx / r2;
        (df_dr * (dr_dx0 - dre_dphi * dtheta_dx0), df_dr * (dr_dy0 - dre_dphi * dtheta_dy0))
    } else {
        (0.0, 0.0)
    };

    [
        df_dx0,
        df_dy0,
        -df_dr * dre_dma,
        -df_dr * dre_dmi,
        -df_dr * dre_dphi,
        2.0 * u * u * amplitude * e / width,
        e,
        1.0
    ]
}
