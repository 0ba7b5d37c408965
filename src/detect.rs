//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Detection of annotation markers and their fixed-size bounding boxes.
//!

use cgmath::Vector2;
use crate::image::{Image, PixelFormat, Rect};

/// Size of the window cut out around each marker.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32
}

impl WindowSize {
    pub fn square(size: u32) -> WindowSize { WindowSize{ width: size, height: size } }
}

/// Axis-aligned box; `xmax` and `ymax` are exclusive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32
}

impl BoundingBox {
    pub fn width(&self) -> u32 { (self.xmax - self.xmin) as u32 }

    pub fn height(&self) -> u32 { (self.ymax - self.ymin) as u32 }

    pub fn to_rect(&self) -> Rect { Rect::new(self.xmin, self.ymin, self.width(), self.height()) }
}

/// Limits a candidate box must respect to be accepted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum_macros::EnumIter)]
pub enum BoxBounds {
    /// X coordinates checked against image width, Y coordinates against image height.
    PerAxis,
    /// Both axes checked against the larger image dimension. On non-square images this admits boxes
    /// which overhang the shorter side; their crops are rejected later.
    LargestDimension
}

/// Returns a row-major mask of pixels whose R, G, B values are exactly `color`.
///
/// `image` must be `RGB8` or `RGB16`; `color` is compared with the raw channel values.
///
pub fn marker_mask(image: &Image, color: [u16; 3]) -> Vec<bool> {
    assert!(
        image.pixel_format() == PixelFormat::RGB8 || image.pixel_format() == PixelFormat::RGB16,
        "Marker detection requires an RGB image, got {:?}.", image.pixel_format()
    );

    let mut mask = Vec::with_capacity(image.width() as usize * image.height() as usize);
    for y in 0..image.height() {
        for x in 0..image.width() {
            mask.push((0..3).all(|ch| image.value(x, y, ch) == color[ch] as f64));
        }
    }

    mask
}

fn find_root(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        parent[x as usize] = parent[parent[x as usize] as usize];
        x = parent[x as usize];
    }
    x
}

/// Merges the higher root into the lower one, so that a component's root is its earliest label.
fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra < rb {
        parent[rb as usize] = ra;
    } else if rb < ra {
        parent[ra as usize] = rb;
    }
}

/// Labels 8-connected components of `mask` (two-pass union-find).
///
/// Returns (labels, number of components). Label 0 is background; components are numbered from 1
/// in raster order of their first pixel.
///
pub fn label_connected_components(mask: &[bool], width: u32, height: u32) -> (Vec<u32>, u32) {
    let w = width as usize;
    let h = height as usize;
    assert_eq!(w * h, mask.len());

    let mut labels = vec![0u32; w * h];
    let mut parent: Vec<u32> = vec![0];

    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            if !mask[idx] {
                continue;
            }

            // previously visited neighbors: left, above-left, above, above-right
            let mut neighbors = [0u32; 4];
            if col > 0 { neighbors[0] = labels[idx - 1]; }
            if row > 0 {
                if col > 0 { neighbors[1] = labels[idx - w - 1]; }
                neighbors[2] = labels[idx - w];
                if col + 1 < w { neighbors[3] = labels[idx - w + 1]; }
            }

            match neighbors.iter().copied().filter(|&l| l > 0).min() {
                None => {
                    let new_label = parent.len() as u32;
                    parent.push(new_label);
                    labels[idx] = new_label;
                },
                Some(min_label) => {
                    labels[idx] = min_label;
                    for &l in neighbors.iter().filter(|&&l| l > 0 && l != min_label) {
                        union(&mut parent, min_label, l);
                    }
                }
            }
        }
    }

    // second pass: resolve to roots and renumber consecutively
    let mut final_label = vec![0u32; parent.len()];
    let mut num_components = 0;
    for provisional in 1..parent.len() as u32 {
        let root = find_root(&mut parent, provisional);
        if root == provisional {
            num_components += 1;
            final_label[provisional as usize] = num_components;
        } else {
            final_label[provisional as usize] = final_label[root as usize];
        }
    }
    for label in labels.iter_mut().filter(|l| **l > 0) {
        *label = final_label[*label as usize];
    }

    (labels, num_components)
}

/// Returns centroids (x: mean column, y: mean row) of components labeled 1..=`num_components`.
pub fn component_centroids(labels: &[u32], width: u32, num_components: u32) -> Vec<Vector2<f64>> {
    let mut sums = vec![(0.0f64, 0.0f64, 0usize); num_components as usize];
    for (idx, &label) in labels.iter().enumerate().filter(|(_, &l)| l > 0) {
        let entry = &mut sums[label as usize - 1];
        entry.0 += (idx % width as usize) as f64;
        entry.1 += (idx / width as usize) as f64;
        entry.2 += 1;
    }

    sums.iter().map(|&(sx, sy, n)| Vector2{ x: sx / n as f64, y: sy / n as f64 }).collect()
}

/// Returns a box of `window` size centered on `centroid` (rounded to the nearest pixel).
fn centered_box(centroid: &Vector2<f64>, window: WindowSize) -> BoundingBox {
    let x = centroid.x.round() as i32;
    let y = centroid.y.round() as i32;
    let xmin = x - window.width as i32 / 2;
    let ymin = y - window.height as i32 / 2;

    BoundingBox{ xmin, ymin, xmax: xmin + window.width as i32, ymax: ymin + window.height as i32 }
}

fn within_bounds(bbox: &BoundingBox, image_width: u32, image_height: u32, bounds: BoxBounds) -> bool {
    let (limit_x, limit_y) = match bounds {
        BoxBounds::PerAxis => (image_width as i32, image_height as i32),
        BoxBounds::LargestDimension => {
            let max_dim = image_width.max(image_height) as i32;
            (max_dim, max_dim)
        }
    };
    let inside = |v: i32, limit: i32| v > 0 && v < limit;

    inside(bbox.xmin, limit_x) && inside(bbox.xmax, limit_x) && inside(bbox.ymin, limit_y) && inside(bbox.ymax, limit_y)
}

/// Finds regions of exactly `marker_color` and returns a `window`-sized box centered on each.
///
/// Boxes violating `bounds` are discarded. An image without markers yields an empty vector.
/// The order follows component labeling (raster order of each region's first pixel).
///
pub fn detect_boxes(image: &Image, marker_color: [u16; 3], window: WindowSize, bounds: BoxBounds) -> Vec<BoundingBox> {
    let mask = marker_mask(image, marker_color);
    let (labels, num_components) = label_connected_components(&mask, image.width(), image.height());

    component_centroids(&labels, image.width(), num_components)
        .iter()
        .map(|centroid| centered_box(centroid, window))
        .filter(|bbox| within_bounds(bbox, image.width(), image.height(), bounds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: [u16; 3] = [0, 0, 255];

    fn blank_image(width: u32, height: u32) -> Image {
        Image::new(width, height, PixelFormat::RGB8)
    }

    fn set_pixel(image: &mut Image, x: u32, y: u32, rgb: [u8; 3]) {
        let line = image.line_mut::<u8>(y);
        line[3 * x as usize..3 * x as usize + 3].copy_from_slice(&rgb);
    }

    /// Draws a blue square outline with corners at (x0, y0) and (x1, y1), inclusive.
    fn draw_marker(image: &mut Image, x0: u32, y0: u32, x1: u32, y1: u32) {
        for x in x0..=x1 {
            set_pixel(image, x, y0, [0, 0, 255]);
            set_pixel(image, x, y1, [0, 0, 255]);
        }
        for y in y0..=y1 {
            set_pixel(image, x0, y, [0, 0, 255]);
            set_pixel(image, x1, y, [0, 0, 255]);
        }
    }

    #[test]
    fn given_no_markers_return_empty() {
        let mut image = blank_image(64, 48);
        set_pixel(&mut image, 10, 10, [0, 0, 254]);
        set_pixel(&mut image, 11, 10, [1, 0, 255]);
        assert!(detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::PerAxis).is_empty());
    }

    #[test]
    fn given_single_marker_center_box() {
        let mut image = blank_image(80, 60);
        draw_marker(&mut image, 20, 15, 50, 45); // centroid (35, 30)
        let boxes = detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::PerAxis);
        assert_eq!(vec![BoundingBox{ xmin: 21, ymin: 16, xmax: 49, ymax: 44 }], boxes);
    }

    #[test]
    fn given_half_pixel_centroid_round_to_nearest() {
        let mut image = blank_image(80, 60);
        draw_marker(&mut image, 20, 15, 49, 44); // centroid (34.5, 29.5)
        let boxes = detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::PerAxis);
        assert_eq!(vec![BoundingBox{ xmin: 21, ymin: 16, xmax: 49, ymax: 44 }], boxes);
    }

    #[test]
    fn given_two_markers_keep_raster_order() {
        let mut image = blank_image(120, 100);
        draw_marker(&mut image, 70, 10, 90, 30);
        draw_marker(&mut image, 10, 50, 30, 70);
        let boxes = detect_boxes(&image, BLUE, WindowSize::square(10), BoxBounds::PerAxis);
        assert_eq!(2, boxes.len());
        assert_eq!(BoundingBox{ xmin: 75, ymin: 15, xmax: 85, ymax: 25 }, boxes[0]);
        assert_eq!(BoundingBox{ xmin: 15, ymin: 55, xmax: 25, ymax: 65 }, boxes[1]);
    }

    #[test]
    fn given_diagonal_pixels_join_components() {
        let mask = vec![
            true,  false, false, false,
            false, true,  false, true,
            false, false, true,  false,
            false, false, false, false,
        ];
        let (labels, num) = label_connected_components(&mask, 4, 4);
        assert_eq!(1, num);
        assert_eq!(labels[0], labels[10]);
        assert_eq!(labels[7], labels[5]);
    }

    #[test]
    fn given_u_shape_merge_labels() {
        let mask = vec![
            true,  false, true,
            true,  false, true,
            true,  true,  true,
            false, false, false,
            true,  false, false,
        ];
        let (labels, num) = label_connected_components(&mask, 3, 5);
        assert_eq!(2, num);
        assert_eq!(1, labels[0]);
        assert_eq!(1, labels[2]);
        assert_eq!(1, labels[7]);
        assert_eq!(2, labels[12]);

        let centroids = component_centroids(&labels, 3, num);
        assert!((centroids[0].x - 1.0).abs() < 1e-12);
        assert!((centroids[0].y - 8.0 / 7.0).abs() < 1e-12);
        assert_eq!(Vector2{ x: 0.0, y: 4.0 }, centroids[1]);
    }

    #[test]
    fn when_box_touches_edge_discard() {
        let mut image = blank_image(60, 60);
        draw_marker(&mut image, 2, 2, 20, 20); // centroid (11, 11): xmin would be -3
        draw_marker(&mut image, 34, 34, 58, 58); // centroid (46, 46): xmax would be 60
        let boxes = detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::PerAxis);
        assert!(boxes.is_empty());
    }

    #[test]
    fn when_box_reaches_image_edge_exactly_discard() {
        let window = WindowSize::square(28);

        let mut image = blank_image(60, 60);
        draw_marker(&mut image, 43, 27, 49, 33); // centroid (46, 30): xmax = 60
        assert!(detect_boxes(&image, BLUE, window, BoxBounds::PerAxis).is_empty());

        let mut image = blank_image(60, 60);
        draw_marker(&mut image, 42, 27, 48, 33); // centroid (45, 30): xmax = 59
        assert_eq!(
            vec![BoundingBox{ xmin: 31, ymin: 16, xmax: 59, ymax: 44 }],
            detect_boxes(&image, BLUE, window, BoxBounds::PerAxis)
        );

        let mut image = blank_image(60, 60);
        draw_marker(&mut image, 11, 27, 17, 33); // centroid (14, 30): xmin = 0
        assert!(detect_boxes(&image, BLUE, window, BoxBounds::PerAxis).is_empty());
    }

    #[test]
    fn for_all_markers_boxes_within_image() {
        let (width, height) = (90u32, 50u32);
        let window = WindowSize::square(12);
        for cx in (3..width - 3).step_by(7) {
            for cy in (3..height - 3).step_by(5) {
                let mut image = blank_image(width, height);
                draw_marker(&mut image, cx - 2, cy - 2, cx + 2, cy + 2);
                for bbox in detect_boxes(&image, BLUE, window, BoxBounds::PerAxis) {
                    assert!(0 < bbox.xmin && bbox.xmin < bbox.xmax && bbox.xmax <= width as i32);
                    assert!(0 < bbox.ymin && bbox.ymin < bbox.ymax && bbox.ymax <= height as i32);
                    assert_eq!(window.width, bbox.width());
                    assert_eq!(window.height, bbox.height());
                }
            }
        }
    }

    #[test]
    fn given_largest_dimension_bounds_admit_overhanging_box() {
        let mut image = blank_image(100, 30);
        draw_marker(&mut image, 40, 22, 44, 26); // centroid (42, 24): ymax = 38 > height
        assert!(detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::PerAxis).is_empty());

        let boxes = detect_boxes(&image, BLUE, WindowSize::square(28), BoxBounds::LargestDimension);
        assert_eq!(vec![BoundingBox{ xmin: 28, ymin: 10, xmax: 56, ymax: 38 }], boxes);
        assert!(image.fragment(&boxes[0].to_rect()).is_none());
    }

    #[test]
    fn given_16_bit_image_compare_raw_values() {
        let mut values = vec![0u16; 20 * 20 * 3];
        for y in 8..12 {
            for x in 8..12 {
                values[3 * (y * 20 + x) + 2] = 255;
            }
        }
        let image = Image::new_from_pixels(20, 20, PixelFormat::RGB16, values);
        let boxes = detect_boxes(&image, BLUE, WindowSize::square(6), BoxBounds::PerAxis);
        // centroid (9.5, 9.5) rounds to (10, 10)
        assert_eq!(vec![BoundingBox{ xmin: 7, ymin: 7, xmax: 13, ymax: 13 }], boxes);
    }
}
