//! Geometry primitives shared by the output device and the renderers.
//!
//! Layout coordinates are integers with y growing upwards. The conversion to
//! device coordinates (y growing downwards) happens in the renderer's `View`.

pub mod bezier;
pub mod constraints;

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

pub use bezier::{BezierCurve, CurveDir};
pub use constraints::{solve_control_point_constraints, ConstraintSolution, ControlPointConstraint};

// ═══════════════════════════════════════════════════════════════════════
// Point
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Rotate around `center` by `angle` radians (counter-clockwise in layout space).
    pub fn rotated(self, angle: f64, center: Point) -> Point {
        let (sin, cos) = angle.sin_cos();
        let dx = f64::from(self.x - center.x);
        let dy = f64::from(self.y - center.y);
        Point::new(
            center.x + (dx * cos - dy * sin).round() as i32,
            center.y + (dx * sin + dy * cos).round() as i32,
        )
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.hypot(dy)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// BoundingBox
// ═══════════════════════════════════════════════════════════════════════

/// Axis-aligned box, always normalised so that `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn top(&self) -> i32 {
        self.y2
    }

    pub fn bottom(&self) -> i32 {
        self.y1
    }

    pub fn center_x(&self) -> i32 {
        (self.x1 + self.x2) / 2
    }

    /// Whether the horizontal extent overlaps `[x_min, x_max]`.
    pub fn overlaps_horizontally(&self, x_min: i32, x_max: i32) -> bool {
        self.x2 >= x_min && self.x1 <= x_max
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.y1 <= other.y2 && other.y1 <= self.y2
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x1 <= other.x1 && self.x2 >= other.x2 && self.y1 <= other.y1 && self.y2 >= other.y2
    }

    pub fn translated(&self, dx: i32, dy: i32) -> BoundingBox {
        BoundingBox::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x1, self.y2),
            Point::new(self.x2, self.y1),
            Point::new(self.x2, self.y2),
        ]
    }
}
