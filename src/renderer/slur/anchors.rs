//! Slur end points and slope handling.

use crate::geometry::{CurveDir, Point};
use crate::renderer::constants::{SLUR_ANCHOR_GAP, SLUR_MIDDLE_OFFSET, SLUR_PORTATO_GAP};

use super::{PortatoSlurType, SlurAnchor, SlurContext};

/// End points of the segment.
///
/// Attached ends sit one unit beyond the anchor's extent on the curve side;
/// a centred portato slur goes over the notehead, leaving room for the
/// articulation. Open ends of split segments run to the system edge at the
/// height of the attached end, or along the staff for a middle segment.
pub fn anchor_points(ctx: &SlurContext, dir: CurveDir, portato: PortatoSlurType) -> (Point, Point) {
    let staff = ctx.staff;
    let unit = f64::from(staff.unit);
    let sign = dir.sign();

    let attach = |anchor: &SlurAnchor| {
        let y = match portato {
            PortatoSlurType::Centered => anchor.head_extreme(dir) + sign * (SLUR_PORTATO_GAP * unit) as i32,
            _ => anchor.extreme(dir) + sign * (SLUR_ANCHOR_GAP * unit) as i32,
        };
        Point::new(anchor.x, y)
    };
    let start = ctx.start.map(attach);
    let end = ctx.end.map(attach);

    let middle_y = match dir {
        CurveDir::Below => staff.bottom() - SLUR_MIDDLE_OFFSET * staff.unit,
        _ => staff.y + SLUR_MIDDLE_OFFSET * staff.unit,
    };
    let p1 = start.unwrap_or_else(|| Point::new(ctx.system_x.0, end.map_or(middle_y, |p| p.y)));
    let p2 = end.unwrap_or_else(|| Point::new(ctx.system_x.1, start.map_or(middle_y, |p| p.y)));
    (p1, p2)
}

/// Limit the chord slope to `max_slope` degrees by moving the inner anchor
/// away from the notes. Returns the resulting chord angle in radians.
pub fn adjusted_slur_angle(p1: &mut Point, p2: &mut Point, dir: CurveDir, max_slope: f64) -> f64 {
    let dx = p2.x - p1.x;
    if dx <= 0 {
        return 0.0;
    }
    let max_dy = (f64::from(dx) * max_slope.to_radians().tan()).round() as i32;
    let dy = p2.y - p1.y;
    if dy.abs() > max_dy {
        // Above: raise the lower end. Below: lower the higher end.
        match (dir, dy > 0) {
            (CurveDir::Below, true) => p2.y = p1.y + max_dy,
            (CurveDir::Below, false) => p1.y = p2.y + max_dy,
            (_, true) => p1.y = p2.y - max_dy,
            (_, false) => p2.y = p1.y - max_dy,
        }
    }
    f64::from(p2.y - p1.y).atan2(f64::from(dx))
}

/// Rotate a slope by `degrees`, counterclockwise when `upwards`.
///
/// Beyond `bound` (see `doubling_bound`) the slope is doubled when rotating
/// further toward vertical and halved when rotating away from it, so a steep
/// tangent never flips past the vertical. The sign is always preserved there.
pub fn rotate_slope(slope: f64, degrees: f64, bound: f64, upwards: bool) -> f64 {
    let toward_vertical = if upwards { slope >= bound } else { slope <= -bound };
    let away_from_vertical = if upwards { slope <= -bound } else { slope >= bound };
    if toward_vertical {
        slope * 2.0
    } else if away_from_vertical {
        slope / 2.0
    } else {
        let delta = if upwards { degrees } else { -degrees };
        (slope.atan() + delta.to_radians()).tan()
    }
}

/// Slope at which rotating by `degrees` equals doubling the slope.
///
/// Solves `atan(2s) - atan(s) = degrees` on `s >= 1/sqrt(2)`, where the
/// difference is decreasing. Rotations larger than the maximum difference
/// give the lower end of that range.
pub fn doubling_bound(degrees: f64) -> f64 {
    let target = degrees.to_radians();
    let gap = |s: f64| (2.0 * s).atan() - s.atan();
    if target <= 0.0 {
        return f64::INFINITY;
    }
    let mut lo = std::f64::consts::FRAC_1_SQRT_2;
    if gap(lo) <= target {
        return lo;
    }
    let mut hi = 1.0e6;
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if gap(mid) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StaffContext, StemDir};
    use crate::renderer::slur::SpanningType;
    use pretty_assertions::assert_eq;

    fn staff() -> StaffContext {
        StaffContext::new(2000, Default::default())
    }

    #[test]
    fn anchors_clear_the_stem_on_the_curve_side() {
        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90).with_stem(StemDir::Up, 630);
        let b = SlurAnchor::new("b", 900, 1500, 90).with_stem(StemDir::Up, 630);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);

        let (p1, p2) = anchor_points(&ctx, CurveDir::Above, PortatoSlurType::None);
        assert_eq!(p1, Point::new(100, 2220));
        assert_eq!(p2, Point::new(900, 2220));

        let (p1, _) = anchor_points(&ctx, CurveDir::Below, PortatoSlurType::None);
        assert_eq!(p1, Point::new(100, 1320));
    }

    #[test]
    fn centred_portato_sits_over_the_head() {
        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90).with_stem(StemDir::Down, 630);
        let b = SlurAnchor::new("b", 900, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);
        let (p1, _) = anchor_points(&ctx, CurveDir::Above, PortatoSlurType::Centered);
        assert_eq!(p1, Point::new(100, 1770));
    }

    #[test]
    fn split_segments_run_to_the_system_edge() {
        let staff = staff();
        let a = SlurAnchor::new("a", 300, 1500, 90);
        let b = SlurAnchor::new("b", 900, 1200, 90);

        let ctx = SlurContext::new(&staff, &[]).between(&a, &b).spanning(SpanningType::Start, (50, 2000));
        assert_eq!(
            anchor_points(&ctx, CurveDir::Above, PortatoSlurType::None),
            (Point::new(300, 1680), Point::new(2000, 1680))
        );

        let ctx = SlurContext::new(&staff, &[]).between(&a, &b).spanning(SpanningType::End, (50, 2000));
        assert_eq!(
            anchor_points(&ctx, CurveDir::Below, PortatoSlurType::None),
            (Point::new(50, 1020), Point::new(900, 1020))
        );

        let ctx = SlurContext::new(&staff, &[]).spanning(SpanningType::Middle, (50, 2000));
        assert_eq!(
            anchor_points(&ctx, CurveDir::Above, PortatoSlurType::None),
            (Point::new(50, 2180), Point::new(2000, 2180))
        );
    }

    #[test]
    fn steep_chords_are_limited() {
        let mut p1 = Point::new(0, 0);
        let mut p2 = Point::new(100, 1000);
        let angle = adjusted_slur_angle(&mut p1, &mut p2, CurveDir::Above, 45.0);
        // The lower start is raised
        assert_eq!(p1, Point::new(0, 900));
        assert_eq!(p2, Point::new(100, 1000));
        assert!((angle - std::f64::consts::FRAC_PI_4).abs() < 1e-9);

        let mut p1 = Point::new(0, 0);
        let mut p2 = Point::new(100, 1000);
        adjusted_slur_angle(&mut p1, &mut p2, CurveDir::Below, 45.0);
        assert_eq!(p1, Point::new(0, 0));
        assert_eq!(p2, Point::new(100, 100));
    }

    #[test]
    fn doubling_bound_matches_the_rotation() {
        let bound = doubling_bound(10.0);
        let rotated = (bound.atan() + 10f64.to_radians()).tan();
        assert!((rotated - 2.0 * bound).abs() < 1e-6);
        assert!(bound > 2.5 && bound < 2.8);
        assert_eq!(doubling_bound(30.0), std::f64::consts::FRAC_1_SQRT_2);
    }

    #[test]
    fn rotate_slope_never_flips_steep_tangents() {
        let bound = doubling_bound(10.0);
        assert_eq!(rotate_slope(10.0, 10.0, bound, true), 20.0);
        assert_eq!(rotate_slope(-10.0, 10.0, bound, true), -5.0);
        assert_eq!(rotate_slope(-10.0, 10.0, bound, false), -20.0);
        assert_eq!(rotate_slope(10.0, 10.0, bound, false), 5.0);
        for slope in [-50.0, -3.0, 3.0, 50.0] {
            for upwards in [true, false] {
                assert_eq!(rotate_slope(slope, 10.0, bound, upwards).signum(), slope.signum());
            }
        }
        let flat = rotate_slope(0.0, 10.0, bound, true);
        assert!((flat - 10f64.to_radians().tan()).abs() < 1e-12);
    }
}
