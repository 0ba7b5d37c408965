//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Montage layout: a grid of cells holding (raw patch, fitted patch) pairs.
//!

use crate::image::{FileType, Image, ImageError, PixelFormat, Point, Rect};

/// Position of the next montage cell, in row-major order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GridCounter {
    col: u32,
    row: u32,
    limit: u32
}

impl GridCounter {
    /// Creates a counter wrapping to the next row after `limit` columns.
    pub fn new(limit: u32) -> GridCounter {
        assert!(limit > 0);
        GridCounter{ col: 0, row: 0, limit }
    }

    /// Returns (column, row).
    pub fn position(&self) -> (u32, u32) { (self.col, self.row) }

    pub fn advance(&mut self) {
        self.col += 1;
        if self.col == self.limit {
            self.col = 0;
            self.row += 1;
        }
    }
}

/// Cell position of the `index`-th cell (counting from 0) in a grid of `columns` columns.
pub fn cell_position(index: usize, columns: u32) -> (u32, u32) {
    ((index % columns as usize) as u32, (index / columns as usize) as u32)
}

/// `Mono64f` canvas divided into square cells; grows by whole rows as needed.
#[derive(Clone, Debug)]
pub struct MontageCanvas {
    cell_size: u32,
    columns: u32,
    image: Image
}

impl MontageCanvas {
    /// Creates a canvas of one empty row.
    pub fn new(cell_size: u32, columns: u32) -> MontageCanvas {
        assert!(cell_size > 0 && columns > 0);
        MontageCanvas{ cell_size, columns, image: Image::new(columns * cell_size, cell_size, PixelFormat::Mono64f) }
    }

    pub fn rows(&self) -> u32 { self.image.height() / self.cell_size }

    pub fn image(&self) -> &Image { &self.image }

    pub fn cell_rect(&self, col: u32, row: u32) -> Rect {
        let pos = Point::new(col as i32, row as i32) * self.cell_size;
        Rect::new(pos.x, pos.y, self.cell_size, self.cell_size)
    }

    fn ensure_rows(&mut self, num_rows: u32) {
        if num_rows <= self.rows() {
            return;
        }
        let mut grown = Image::new(self.image.width(), num_rows * self.cell_size, PixelFormat::Mono64f);
        self.image.paste_into(&mut grown, Point::zero());
        self.image = grown;
    }

    /// Writes `patch` into cell (`col`, `row`) at offset (1, 1), leaving a 1-pixel margin.
    ///
    /// `patch` must be `Mono64f` and at most `cell_size - 2` pixels wide and high.
    ///
    pub fn place(&mut self, patch: &Image, col: u32, row: u32) {
        assert!(col < self.columns);
        assert!(patch.width() + 2 <= self.cell_size && patch.height() + 2 <= self.cell_size);

        self.ensure_rows(row + 1);
        let cell = self.cell_rect(col, row);
        patch.paste_into(&mut self.image, cell.get_pos() + Point::new(1, 1));
    }

    /// Draws a 1-pixel frame of `value` along the inner edge of `rect`.
    fn draw_frame(&mut self, rect: &Rect, value: f64) {
        let x0 = rect.x as u32;
        let x1 = rect.x_end() as u32 - 1;
        let y0 = rect.y as u32;
        let y1 = rect.y_end() as u32 - 1;

        for y in y0..=y1 {
            let line = self.image.line_mut::<f64>(y);
            if y == y0 || y == y1 {
                for v in &mut line[x0 as usize..=x1 as usize] { *v = value; }
            } else {
                line[x0 as usize] = value;
                line[x1 as usize] = value;
            }
        }
    }

    /// Frames the (raw, fitted) pair of cells. Cells on the same row get a single frame spanning both.
    pub fn highlight_pair(&mut self, first: (u32, u32), second: (u32, u32), value: f64) {
        self.ensure_rows(first.1.max(second.1) + 1);

        if first.1 == second.1 && second.0 == first.0 + 1 {
            let mut rect = self.cell_rect(first.0, first.1);
            rect.width *= 2;
            self.draw_frame(&rect, value);
        } else {
            let rect_first = self.cell_rect(first.0, first.1);
            let rect_second = self.cell_rect(second.0, second.1);
            self.draw_frame(&rect_first, value);
            self.draw_frame(&rect_second, value);
        }
    }

    /// Saves the canvas, linearly normalized to 8 bits.
    pub fn export(&self, file_name: &str) -> Result<(), ImageError> {
        self.image().to_mono8_normalized().save(file_name, FileType::Auto)
    }
}
