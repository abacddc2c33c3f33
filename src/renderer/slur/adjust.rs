//! Collision avoidance and reshaping of a slur curve.
//!
//! All steps work in the chord frame of the current curve: an obstacle is a
//! set of check points `(s, h)` and the curve clears it when its height at
//! `s` is at least `h + margin`.

use crate::geometry::{
    solve_control_point_constraints, BezierCurve, ConstraintSolution, ControlPointConstraint,
};
use crate::options::SlurOptions;
use crate::renderer::constants::{SLUR_ANCHOR_ZONE, SLUR_END_ZONE, SLUR_MIN_OFFSET_RATIO, SLUR_TANGENT_RATIO};

use super::anchors::{doubling_bound, rotate_slope};
use super::spanned::{check_points, filter_spanned_elements};
use super::FloatingCurvePositioner;

/// Slur options converted to layout units for one staff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlurMetrics {
    pub unit: i32,
    pub margin: i32,
    pub height_factor: f64,
    pub min_height: i32,
    pub max_height: i32,
    pub curvature_ratio: f64,
    pub symmetry: f64,
    pub max_endpoint_shift: i32,
    pub max_control_shift: i32,
    pub tangent_rotation: f64,
}

impl SlurMetrics {
    pub fn new(options: &SlurOptions, unit: i32) -> Self {
        Self {
            unit,
            margin: options.to_layout(options.margin, unit),
            height_factor: options.height_factor,
            min_height: options.to_layout(options.min_height, unit),
            max_height: options.to_layout(options.max_height, unit),
            curvature_ratio: options.curvature_ratio,
            symmetry: options.symmetry,
            max_endpoint_shift: options.to_layout(options.max_endpoint_shift, unit),
            max_control_shift: options.to_layout(options.max_control_shift, unit),
            tangent_rotation: options.tangent_rotation,
        }
    }
}

/// Outcome of the horizontal control-point step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPointOffset {
    NotNeeded,
    Feasible { left: i32, right: i32 },
    /// An obstacle sits on an anchor; only vertical adjustment applies
    Infeasible,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Collision {
    s: f64,
    t: f64,
    deficit: f64,
}

fn collisions(positioner: &FloatingCurvePositioner, curve: &BezierCurve, margin: i32) -> Vec<Collision> {
    positioner
        .obstacles()
        .flat_map(|element| check_points(&element.bbox, curve))
        .filter_map(|(s, h)| {
            let t = curve.param_at_chord_position(s)?;
            let deficit = h + f64::from(margin) - curve.height_at(t);
            (deficit > 0.0).then_some(Collision { s, t, deficit })
        })
        .collect()
}

fn worst_deficit(positioner: &FloatingCurvePositioner, curve: &BezierCurve, margin: i32) -> f64 {
    collisions(positioner, curve, margin)
        .iter()
        .map(|c| c.deficit)
        .fold(0.0, f64::max)
}

// ── End points ──────────────────────────────────────────────────────

/// Vertical shift of the (left, right) end points for obstacles close to
/// an end.
///
/// Moving the ends by `(l, r)` moves the chord at relative position `ρ` by
/// `(1-ρ)·l + ρ·r`; each deficit is split with the smallest such pair, which
/// leaves most of it to the nearer end. Maxima over all obstacles are
/// capped at `max_endpoint_shift`.
pub fn calc_end_point_shift(
    positioner: &FloatingCurvePositioner,
    curve: &BezierCurve,
    metrics: &SlurMetrics,
) -> (i32, i32) {
    let length = curve.chord_length();
    if length <= 0.0 {
        return (0, 0);
    }
    let (mut left, mut right) = (0.0_f64, 0.0_f64);
    for collision in collisions(positioner, curve, metrics.margin) {
        let ratio = collision.s / length;
        if ratio >= SLUR_END_ZONE && ratio <= 1.0 - SLUR_END_ZONE {
            continue;
        }
        let (wl, wr) = (1.0 - ratio, ratio);
        let norm = wl * wl + wr * wr;
        left = left.max(collision.deficit * wl / norm);
        right = right.max(collision.deficit * wr / norm);
    }
    let cap = metrics.max_endpoint_shift;
    ((left.ceil() as i32).min(cap), (right.ceil() as i32).min(cap))
}

/// Move the end points away from the notes and restart the shape from the
/// new chord.
pub fn shift_end_points(curve: &mut BezierCurve, left: i32, right: i32, metrics: &SlurMetrics) {
    let sign = curve.dir.sign();
    curve.p1.y += sign * left;
    curve.p2.y += sign * right;
    curve.calc_initial_control_point_params(metrics.height_factor, metrics.min_height, metrics.max_height);
    curve.update_control_points();
}

// ── Control points ──────────────────────────────────────────────────

/// Pull a control point toward the obstacles on its half of the chord, not
/// closer to its anchor than a tenth of the chord.
pub fn calc_control_point_offset(
    positioner: &FloatingCurvePositioner,
    curve: &BezierCurve,
    metrics: &SlurMetrics,
) -> ControlPointOffset {
    let length = curve.chord_length();
    let collisions = collisions(positioner, curve, metrics.margin);
    if collisions.is_empty() || length <= 0.0 {
        return ControlPointOffset::NotNeeded;
    }

    let min_offset = (length * SLUR_MIN_OFFSET_RATIO).round() as i32;
    let (mut left, mut right) = (curve.left_offset(), curve.right_offset());
    for collision in &collisions {
        let ratio = collision.s / length;
        if ratio < SLUR_ANCHOR_ZONE || ratio > 1.0 - SLUR_ANCHOR_ZONE {
            return ControlPointOffset::Infeasible;
        }
        if ratio < 0.5 {
            left = left.min(collision.s.round() as i32);
        } else {
            right = right.min((length - collision.s).round() as i32);
        }
    }
    let (left, right) = (left.max(min_offset), right.max(min_offset));
    if (left, right) == (curve.left_offset(), curve.right_offset()) {
        ControlPointOffset::NotNeeded
    } else {
        ControlPointOffset::Feasible { left, right }
    }
}

/// Raise the control points just enough to clear every check point.
pub fn calc_control_point_vertical_shift(
    positioner: &FloatingCurvePositioner,
    curve: &BezierCurve,
    metrics: &SlurMetrics,
) -> ConstraintSolution {
    let constraints: Vec<ControlPointConstraint> = collisions(positioner, curve, metrics.margin)
        .iter()
        .map(|c| {
            let mt = 1.0 - c.t;
            ControlPointConstraint {
                a: 3.0 * c.t * mt * mt,
                b: 3.0 * c.t * c.t * mt,
                c: c.deficit,
            }
        })
        .collect();
    solve_control_point_constraints(&constraints, f64::from(metrics.max_control_shift))
}

// ── Shape ───────────────────────────────────────────────────────────

/// Even out the heights after collision handling.
///
/// A height below `symmetry` times the other is raised, a curve flatter than
/// the minimum height is raised on both sides, and the result is capped at
/// `curvature_ratio` times the chord without going below the heights the
/// collisions required. Finally a much steeper end tangent is rotated
/// down, unless that brings the curve closer to an obstacle.
pub fn adjust_slur_shape(curve: &mut BezierCurve, positioner: &FloatingCurvePositioner, metrics: &SlurMetrics) {
    let length = curve.chord_length();
    let (floor_left, floor_right) = (curve.left_height(), curve.right_height());
    let (mut left, mut right) = (floor_left, floor_right);

    let raised = |other: i32| (f64::from(other) * metrics.symmetry).round() as i32;
    left = left.max(raised(floor_right));
    right = right.max(raised(floor_left));

    if left.max(right) < metrics.min_height {
        left = left.max(metrics.min_height);
        right = right.max(metrics.min_height);
    }

    let cap = (length * metrics.curvature_ratio).round() as i32;
    curve.set_heights(left.min(cap).max(floor_left), right.min(cap).max(floor_right));

    balance_end_tangents(curve, positioner, metrics);
    curve.update_control_points();
}

fn balance_end_tangents(curve: &mut BezierCurve, positioner: &FloatingCurvePositioner, metrics: &SlurMetrics) {
    let (left_slope, right_slope) = curve.end_tangent_slopes();
    if !left_slope.is_finite() || !right_slope.is_finite() || left_slope <= 0.0 || right_slope <= 0.0 {
        return;
    }
    let steep_left = left_slope > right_slope;
    let (steep, flat) = if steep_left {
        (left_slope, right_slope)
    } else {
        (right_slope, left_slope)
    };
    if steep <= flat * SLUR_TANGENT_RATIO {
        return;
    }

    let before = worst_deficit(positioner, curve, metrics.margin);
    let previous = (curve.left_height(), curve.right_height());
    let bound = doubling_bound(metrics.tangent_rotation);
    let slope = rotate_slope(steep, metrics.tangent_rotation, bound, false);
    if steep_left {
        let height = ((slope * f64::from(curve.left_offset())).round() as i32).max(previous.1);
        curve.set_heights(height, previous.1);
    } else {
        let height = ((slope * f64::from(curve.right_offset())).round() as i32).max(previous.0);
        curve.set_heights(previous.0, height);
    }

    if worst_deficit(positioner, curve, metrics.margin) > before {
        curve.set_heights(previous.0, previous.1);
    }
}

/// Run the adjustment steps on the positioner's curve.
pub fn adjust_slur(positioner: &mut FloatingCurvePositioner, metrics: &SlurMetrics) {
    filter_spanned_elements(positioner, metrics.margin);
    let mut curve = positioner.curve().clone();

    let (left, right) = calc_end_point_shift(positioner, &curve, metrics);
    if left != 0 || right != 0 {
        shift_end_points(&mut curve, left, right, metrics);
    }

    match calc_control_point_offset(positioner, &curve, metrics) {
        ControlPointOffset::Feasible { left, right } => curve.set_offsets(left, right),
        ControlPointOffset::Infeasible => {
            log::debug!("Slur '{}' has an obstacle on an anchor", positioner.object_id());
        }
        ControlPointOffset::NotNeeded => {}
    }

    let shift = calc_control_point_vertical_shift(positioner, &curve, metrics);
    if !shift.feasible {
        log::debug!("Slur '{}' only partially clears its obstacles", positioner.object_id());
    }
    curve.set_heights(curve.left_height() + shift.left, curve.right_height() + shift.right);

    adjust_slur_shape(&mut curve, positioner, metrics);
    positioner.set_curve(curve);
}
