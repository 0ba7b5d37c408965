//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Point and rectangle structs and operations.
//!

use std::ops::{Add, AddAssign, Mul};
use num_traits::{FromPrimitive, ToPrimitive};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32
}

impl Add for Point {
    type Output = Point;

    fn add(mut self, other: Point) -> Point {
        self += other;
        self
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, other: Point) {
        self.x += other.x;
        self.y += other.y;
    }
}

/// Scales both coordinates; the result is truncated towards zero.
impl<T> Mul<T> for Point
where T: Copy + Mul<Output=T> + ToPrimitive + FromPrimitive {
    type Output = Point;

    fn mul(self, rhs: T) -> Point {
        let scale = |v: i32| (T::from_i32(v).unwrap() * rhs).to_i32().unwrap();
        Point{ x: scale(self.x), y: scale(self.y) }
    }
}

impl Point {
    pub fn new(x: i32, y: i32) -> Point { Point{ x, y } }

    pub fn zero() -> Point { Point{ x: 0, y: 0 } }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Rect { Rect{ x, y, width, height } }

    /// Exclusive right boundary.
    pub fn x_end(&self) -> i32 { self.x + self.width as i32 }

    /// Exclusive bottom boundary.
    pub fn y_end(&self) -> i32 { self.y + self.height as i32 }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x && p.x < self.x_end() && p.y >= self.y && p.y < self.y_end()
    }

    /// Returns true if `other` is non-empty and lies entirely within `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.width > 0 && other.height > 0 &&
        self.contains_point(&other.get_pos()) &&
        self.contains_point(&Point{ x: other.x_end() - 1, y: other.y_end() - 1 })
    }

    pub fn get_pos(&self) -> Point { Point{ x: self.x, y: self.y } }
}
