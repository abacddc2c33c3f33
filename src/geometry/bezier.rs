//! Cubic Bezier curves described by their anchors and by control-point
//! parameters in the frame rotated onto the anchor chord.

use serde::{Deserialize, Serialize};

use super::Point;

/// Side of the anchor chord the curve bulges to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveDir {
    #[default]
    None,
    Above,
    Below,
}

impl CurveDir {
    /// +1 above, -1 below. An undecided direction bulges upwards.
    pub fn sign(self) -> i32 {
        match self {
            CurveDir::Below => -1,
            _ => 1,
        }
    }

    pub fn opposite(self) -> CurveDir {
        match self {
            CurveDir::Above => CurveDir::Below,
            CurveDir::Below => CurveDir::Above,
            CurveDir::None => CurveDir::None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// BezierCurve
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct BezierCurve {
    pub p1: Point,
    pub c1: Point,
    pub c2: Point,
    pub p2: Point,
    pub dir: CurveDir,
    left_offset: i32,
    right_offset: i32,
    left_height: i32,
    right_height: i32,
}

impl BezierCurve {
    /// Build from four points, deriving the control-point parameters.
    pub fn new(p1: Point, c1: Point, c2: Point, p2: Point, dir: CurveDir) -> Self {
        let mut curve = Self {
            p1,
            c1,
            c2,
            p2,
            dir,
            left_offset: 0,
            right_offset: 0,
            left_height: 0,
            right_height: 0,
        };
        curve.update_control_point_params();
        curve
    }

    /// A flat curve between two anchors; call `calc_initial_control_point_params` next.
    pub fn from_anchors(p1: Point, p2: Point, dir: CurveDir) -> Self {
        Self::new(p1, p1, p2, p2, dir)
    }

    pub fn points(&self) -> [Point; 4] {
        [self.p1, self.c1, self.c2, self.p2]
    }

    /// Angle of the anchor chord, in radians.
    pub fn angle(&self) -> f64 {
        f64::from(self.p2.y - self.p1.y).atan2(f64::from(self.p2.x - self.p1.x))
    }

    pub fn chord_length(&self) -> f64 {
        self.p1.distance_to(self.p2)
    }

    pub fn left_offset(&self) -> i32 {
        self.left_offset
    }

    pub fn right_offset(&self) -> i32 {
        self.right_offset
    }

    pub fn left_height(&self) -> i32 {
        self.left_height
    }

    pub fn right_height(&self) -> i32 {
        self.right_height
    }

    pub fn set_offsets(&mut self, left: i32, right: i32) {
        self.left_offset = left;
        self.right_offset = right;
    }

    /// Heights are magnitudes in the bulge direction and never negative.
    pub fn set_heights(&mut self, left: i32, right: i32) {
        self.left_height = left.max(0);
        self.right_height = right.max(0);
    }

    /// Initial shape: offsets at a quarter of the chord, height proportional
    /// to the chord length and clamped to `[min_height, max_height]`.
    pub fn calc_initial_control_point_params(&mut self, height_factor: f64, min_height: i32, max_height: i32) {
        let length = self.chord_length();
        let offset = (length / 4.0).round() as i32;
        let height = ((length * height_factor).round() as i32).clamp(min_height, max_height.max(min_height));
        self.set_offsets(offset, offset);
        self.set_heights(height, height);
    }

    fn frame(&self) -> ((f64, f64), (f64, f64)) {
        let (sin, cos) = self.angle().sin_cos();
        ((cos, sin), (-sin, cos))
    }

    /// Recompute `c1`/`c2` from the parameters.
    pub fn update_control_points(&mut self) {
        let ((ux, uy), (nx, ny)) = self.frame();
        let sign = f64::from(self.dir.sign());
        let lo = f64::from(self.left_offset);
        let ro = f64::from(self.right_offset);
        let lh = f64::from(self.left_height) * sign;
        let rh = f64::from(self.right_height) * sign;
        self.c1 = Point::new(
            self.p1.x + (ux * lo + nx * lh).round() as i32,
            self.p1.y + (uy * lo + ny * lh).round() as i32,
        );
        self.c2 = Point::new(
            self.p2.x + (-ux * ro + nx * rh).round() as i32,
            self.p2.y + (-uy * ro + ny * rh).round() as i32,
        );
    }

    /// Recompute the parameters from the current points.
    pub fn update_control_point_params(&mut self) {
        let ((ux, uy), (nx, ny)) = self.frame();
        let sign = f64::from(self.dir.sign());
        let v1 = (f64::from(self.c1.x - self.p1.x), f64::from(self.c1.y - self.p1.y));
        let v2 = (f64::from(self.c2.x - self.p2.x), f64::from(self.c2.y - self.p2.y));
        self.left_offset = (v1.0 * ux + v1.1 * uy).round() as i32;
        self.right_offset = (-(v2.0 * ux + v2.1 * uy)).round() as i32;
        self.left_height = ((v1.0 * nx + v1.1 * ny) * sign).round() as i32;
        self.right_height = ((v2.0 * nx + v2.1 * ny) * sign).round() as i32;
    }

    /// Move all four points by rotating around `center`.
    pub fn rotate(&mut self, angle: f64, center: Point) {
        self.p1 = self.p1.rotated(angle, center);
        self.c1 = self.c1.rotated(angle, center);
        self.c2 = self.c2.rotated(angle, center);
        self.p2 = self.p2.rotated(angle, center);
    }

    /// Point on the curve at parameter `t`.
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let mt = 1.0 - t;
        let w = [mt * mt * mt, 3.0 * t * mt * mt, 3.0 * t * t * mt, t * t * t];
        let pts = self.points();
        let x = pts.iter().zip(w).map(|(p, w)| f64::from(p.x) * w).sum();
        let y = pts.iter().zip(w).map(|(p, w)| f64::from(p.y) * w).sum();
        (x, y)
    }

    /// Express a layout point as (position along the chord, height above it
    /// in the bulge direction).
    pub fn to_chord_frame(&self, x: f64, y: f64) -> (f64, f64) {
        let ((ux, uy), (nx, ny)) = self.frame();
        let vx = x - f64::from(self.p1.x);
        let vy = y - f64::from(self.p1.y);
        (vx * ux + vy * uy, (vx * nx + vy * ny) * f64::from(self.dir.sign()))
    }

    /// Position along the chord of the curve point at `t`.
    pub fn chord_position_at(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        let length = self.chord_length();
        3.0 * t * mt * mt * f64::from(self.left_offset)
            + 3.0 * t * t * mt * (length - f64::from(self.right_offset))
            + t * t * t * length
    }

    /// Height of the curve above the chord at `t`.
    pub fn height_at(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * t * mt * mt * f64::from(self.left_height) + 3.0 * t * t * mt * f64::from(self.right_height)
    }

    /// Curve parameter whose chord position is `s`, if `s` lies on the chord.
    pub fn param_at_chord_position(&self, s: f64) -> Option<f64> {
        let length = self.chord_length();
        if s < 0.0 || s > length || length <= 0.0 {
            return None;
        }
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        for _ in 0..40 {
            let mid = 0.5 * (lo + hi);
            if self.chord_position_at(mid) < s {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Some(0.5 * (lo + hi))
    }

    /// Largest height of the curve above its chord.
    pub fn max_height(&self) -> f64 {
        (0..=32)
            .map(|i| self.height_at(f64::from(i) / 32.0))
            .fold(0.0, f64::max)
    }

    /// Slopes of the end tangents in the chord frame (left rises, right falls
    /// for a regular arch).
    pub fn end_tangent_slopes(&self) -> (f64, f64) {
        let left = if self.left_offset > 0 {
            f64::from(self.left_height) / f64::from(self.left_offset)
        } else {
            f64::INFINITY
        };
        let right = if self.right_offset > 0 {
            f64::from(self.right_height) / f64::from(self.right_offset)
        } else {
            f64::INFINITY
        };
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn horizontal(dir: CurveDir) -> BezierCurve {
        let mut curve = BezierCurve::from_anchors(Point::new(0, 0), Point::new(1000, 0), dir);
        curve.set_offsets(250, 250);
        curve.set_heights(200, 200);
        curve.update_control_points();
        curve
    }

    #[test]
    fn control_points_follow_direction() {
        let above = horizontal(CurveDir::Above);
        assert_eq!(above.c1, Point::new(250, 200));
        assert_eq!(above.c2, Point::new(750, 200));

        let below = horizontal(CurveDir::Below);
        assert_eq!(below.c1, Point::new(250, -200));
        assert_eq!(below.c2, Point::new(750, -200));
    }

    #[test]
    fn params_round_trip_on_slanted_chord() {
        let mut curve = BezierCurve::from_anchors(Point::new(0, 0), Point::new(800, 600), CurveDir::Below);
        curve.set_offsets(200, 150);
        curve.set_heights(120, 90);
        curve.update_control_points();
        let rebuilt = BezierCurve::new(curve.p1, curve.c1, curve.c2, curve.p2, CurveDir::Below);
        assert!((rebuilt.left_offset() - 200).abs() <= 1);
        assert!((rebuilt.right_offset() - 150).abs() <= 1);
        assert!((rebuilt.left_height() - 120).abs() <= 1);
        assert!((rebuilt.right_height() - 90).abs() <= 1);
    }

    #[test]
    fn height_matches_point_evaluation() {
        let curve = horizontal(CurveDir::Above);
        let (x, y) = curve.point_at(0.5);
        let (along, height) = curve.to_chord_frame(x, y);
        assert!((along - 500.0).abs() < 1e-6);
        assert!((height - curve.height_at(0.5)).abs() < 1e-6);
        assert!((curve.max_height() - 150.0).abs() < 1e-6);
    }

    #[test]
    fn chord_position_lookup_inverts_evaluation() {
        let curve = horizontal(CurveDir::Above);
        let t = curve.param_at_chord_position(300.0).expect("on chord");
        assert!((curve.chord_position_at(t) - 300.0).abs() < 1e-3);
        assert_eq!(curve.param_at_chord_position(-1.0), None);
        assert_eq!(curve.param_at_chord_position(1001.0), None);
    }

    #[test]
    fn initial_height_is_clamped() {
        let mut curve = BezierCurve::from_anchors(Point::new(0, 0), Point::new(100, 0), CurveDir::Above);
        curve.calc_initial_control_point_params(0.15, 108, 270);
        assert_eq!(curve.left_height(), 108);

        let mut long = BezierCurve::from_anchors(Point::new(0, 0), Point::new(10_000, 0), CurveDir::Above);
        long.calc_initial_control_point_params(0.15, 108, 270);
        assert_eq!(long.right_height(), 270);
        assert_eq!(long.left_offset(), 2500);
    }
}
