//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Distribution plot of average radii: one panel per channel, each with a box plot and a swarm of data points.
//!

use cgmath::Vector2;
use crate::image::{FileType, Image, ImageError, PixelFormat};
use crate::measure;

const PANEL_WIDTH: u32 = 240;
const PANEL_HEIGHT: u32 = 480;
const MARGIN: u32 = 30;
const BOX_HALF_WIDTH: i32 = 50;
const DOT_RADIUS: f64 = 3.0;

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];
const GRAY: [u8; 3] = [90, 90, 90];

struct Plot {
    image: Image
}

impl Plot {
    fn new(width: u32, height: u32) -> Plot {
        let mut image = Image::new(width, height, PixelFormat::RGB8);
        for v in image.pixels_mut::<u8>() { *v = 255; }
        Plot{ image }
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.image.width() as i32 || y >= self.image.height() as i32 {
            return;
        }
        let ofs = 3 * x as usize;
        self.image.line_mut::<u8>(y as u32)[ofs..ofs + 3].copy_from_slice(&color);
    }

    fn hline(&mut self, x0: i32, x1: i32, y: i32, color: [u8; 3]) {
        for x in x0.min(x1)..=x0.max(x1) { self.set_pixel(x, y, color); }
    }

    fn vline(&mut self, x: i32, y0: i32, y1: i32, color: [u8; 3]) {
        for y in y0.min(y1)..=y0.max(y1) { self.set_pixel(x, y, color); }
    }

    fn frame(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
        self.hline(x0, x1, y0, color);
        self.hline(x0, x1, y1, color);
        self.vline(x0, y0, y1, color);
        self.vline(x1, y0, y1, color);
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
        for y in y0.min(y1)..=y0.max(y1) { self.hline(x0, x1, y, color); }
    }

    fn dot(&mut self, center: Vector2<f64>, radius: f64, color: [u8; 3]) {
        let x_min = (center.x - radius).floor() as i32;
        let x_max = (center.x + radius).ceil() as i32;
        let y_min = (center.y - radius).floor() as i32;
        let y_max = (center.y + radius).ceil() as i32;

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f64 - center.x;
                let dy = y as f64 - center.y;
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }
}

/// Maps values to panel rows; larger values are higher up.
struct Scale {
    lo: f64,
    hi: f64,
    top: f64,
    bottom: f64
}

impl Scale {
    fn new(values: &[f64], top: f64, bottom: f64) -> Scale {
        let (lo, hi) = match measure::summarize(values) {
            s if s.count == 0 => (0.0, 1.0),
            s if s.max - s.min < 1e-9 => (s.min - 0.5, s.max + 0.5),
            s => {
                let pad = 0.05 * (s.max - s.min);
                (s.min - pad, s.max + pad)
            }
        };
        Scale{ lo, hi, top, bottom }
    }

    fn row(&self, value: f64) -> f64 {
        self.bottom - (value - self.lo) / (self.hi - self.lo) * (self.bottom - self.top)
    }
}

/// Horizontal offsets (multiples of the dot diameter, alternating sides) so that no two dots overlap.
fn swarm_offsets(rows: &[f64], radius: f64) -> Vec<f64> {
    let mut placed: Vec<Vector2<f64>> = vec![];
    for &row in rows {
        let mut step = 0;
        loop {
            let k = ((step + 1) / 2) as f64 * if step % 2 == 1 { 1.0 } else { -1.0 };
            let candidate = Vector2{ x: k * 2.0 * radius, y: row };
            let collides = placed.iter().any(|p| {
                let d = p - candidate;
                d.x * d.x + d.y * d.y < 4.0 * radius * radius
            });
            if !collides {
                placed.push(candidate);
                break;
            }
            step += 1;
        }
    }

    placed.iter().map(|p| p.x).collect()
}

fn draw_panel(plot: &mut Plot, x_origin: i32, values: &[f64]) {
    let top = MARGIN as i32;
    let bottom = (PANEL_HEIGHT - MARGIN) as i32;
    let center = x_origin + PANEL_WIDTH as i32 / 2;
    plot.frame(x_origin + MARGIN as i32, top, x_origin + (PANEL_WIDTH - MARGIN) as i32, bottom, BLACK);

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return;
    }

    let scale = Scale::new(&finite, top as f64 + DOT_RADIUS + 2.0, bottom as f64 - DOT_RADIUS - 2.0);
    let stats = measure::summarize(&finite);
    let row = |v: f64| scale.row(v).round() as i32;

    let iqr = stats.q75 - stats.q25;
    let whisker_lo = finite.iter().copied().filter(|&v| v >= stats.q25 - 1.5 * iqr).fold(f64::INFINITY, f64::min);
    let whisker_hi = finite.iter().copied().filter(|&v| v <= stats.q75 + 1.5 * iqr).fold(f64::NEG_INFINITY, f64::max);

    plot.fill_rect(center - BOX_HALF_WIDTH, row(stats.q75), center + BOX_HALF_WIDTH, row(stats.q25), WHITE);
    plot.frame(center - BOX_HALF_WIDTH, row(stats.q75), center + BOX_HALF_WIDTH, row(stats.q25), GRAY);
    plot.hline(center - BOX_HALF_WIDTH, center + BOX_HALF_WIDTH, row(stats.median), GRAY);
    plot.vline(center, row(stats.q75), row(whisker_hi), GRAY);
    plot.vline(center, row(stats.q25), row(whisker_lo), GRAY);
    plot.hline(center - BOX_HALF_WIDTH / 2, center + BOX_HALF_WIDTH / 2, row(whisker_hi), GRAY);
    plot.hline(center - BOX_HALF_WIDTH / 2, center + BOX_HALF_WIDTH / 2, row(whisker_lo), GRAY);

    let mut sorted = finite;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rows: Vec<f64> = sorted.iter().map(|&v| scale.row(v)).collect();
    for (&y, dx) in rows.iter().zip(swarm_offsets(&rows, DOT_RADIUS).iter()) {
        plot.dot(Vector2{ x: center as f64 + dx, y }, DOT_RADIUS, BLACK);
    }
}

/// Renders the two-panel plot of red (left) and green (right) average radii as an `RGB8` image.
pub fn radius_profile(red: &[f64], green: &[f64]) -> Image {
    let mut plot = Plot::new(2 * PANEL_WIDTH, PANEL_HEIGHT);
    draw_panel(&mut plot, 0, red);
    draw_panel(&mut plot, PANEL_WIDTH as i32, green);

    plot.image
}

pub fn save_radius_profile(file_name: &str, red: &[f64], green: &[f64]) -> Result<(), ImageError> {
    radius_profile(red, green).save(file_name, FileType::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(image: &Image, x: u32, y: u32) -> [u8; 3] {
        let line = image.line::<u8>(y);
        [line[3 * x as usize], line[3 * x as usize + 1], line[3 * x as usize + 2]]
    }

    #[test]
    fn given_no_values_draw_empty_frames() {
        let image = radius_profile(&[], &[]);
        assert_eq!((2 * PANEL_WIDTH, PANEL_HEIGHT), (image.width(), image.height()));
        assert_eq!(BLACK, pixel(&image, MARGIN, MARGIN));
        assert_eq!(BLACK, pixel(&image, PANEL_WIDTH + MARGIN, PANEL_HEIGHT - MARGIN));
        assert_eq!(WHITE, pixel(&image, PANEL_WIDTH / 2, PANEL_HEIGHT / 2));
    }

    #[test]
    fn given_values_draw_dots_in_panel() {
        let image = radius_profile(&[1.9, 2.0, 2.1], &[4.0]);
        let center = PANEL_WIDTH / 2;
        // the median dot of the left panel is centered; a single value sits mid-panel on the right
        assert_eq!(BLACK, pixel(&image, center, PANEL_HEIGHT / 2));
        assert_eq!(BLACK, pixel(&image, PANEL_WIDTH + center, PANEL_HEIGHT / 2));
    }

    #[test]
    fn given_equal_values_spread_dots_sideways() {
        let offsets = swarm_offsets(&[100.0, 100.0, 100.0], 3.0);
        assert_eq!(vec![0.0, 6.0, -6.0], offsets);

        let offsets = swarm_offsets(&[100.0, 120.0], 3.0);
        assert_eq!(vec![0.0, 0.0], offsets);
    }
}
