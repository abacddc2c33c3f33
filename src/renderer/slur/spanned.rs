//! Elements under a slur and the sample points checked against the curve.

use crate::geometry::{BezierCurve, BoundingBox, CurveDir};
use crate::model::MusicKind;
use crate::renderer::constants::SLUR_CHECK_POINTS;

use super::{CurveSpannedElement, FloatingCurvePositioner, PortatoSlurType, SlurContext};

/// Kinds a slur has to clear. Barlines, clefs and staff lines never count.
fn is_collision_candidate(kind: MusicKind) -> bool {
    matches!(
        kind,
        MusicKind::Note
            | MusicKind::Chord
            | MusicKind::Rest
            | MusicKind::Accidental
            | MusicKind::Articulation
            | MusicKind::Dynamic
            | MusicKind::Dot
            | MusicKind::Stem
            | MusicKind::Flag
            | MusicKind::Beam
            | MusicKind::Tuplet
    )
}

/// Candidates whose horizontal extent meets `[x_min, x_max]`.
///
/// The anchors and their parts are left out, and so are articulations under
/// a portato slur, which the slur is meant to enclose.
pub fn collect_spanned_elements(
    ctx: &SlurContext,
    x_min: i32,
    x_max: i32,
    portato: PortatoSlurType,
) -> Vec<CurveSpannedElement> {
    ctx.elements
        .iter()
        .filter(|e| is_collision_candidate(e.kind()))
        .filter(|e| !ctx.is_anchor_part(&e.id))
        .filter(|e| portato == PortatoSlurType::None || !e.is(MusicKind::Articulation))
        .filter_map(|e| match e.bbox {
            Some(bbox) => Some((e, bbox)),
            None => {
                log::debug!("{:?} '{}' has no bounding box, ignored by slurs", e.kind(), e.id);
                None
            }
        })
        .filter(|(_, bbox)| bbox.overlaps_horizontally(x_min, x_max))
        .map(|(e, bbox)| CurveSpannedElement::new(e.id.clone(), e.kind(), bbox))
        .collect()
}

/// Samples of the obstacle edge facing the curve, as (position along the
/// chord, height above it), restricted to the chord.
pub(super) fn check_points(bbox: &BoundingBox, curve: &BezierCurve) -> Vec<(f64, f64)> {
    let edge = match curve.dir {
        CurveDir::Below => bbox.bottom(),
        _ => bbox.top(),
    };
    edge_points(bbox, edge, curve)
}

fn edge_points(bbox: &BoundingBox, edge: i32, curve: &BezierCurve) -> Vec<(f64, f64)> {
    let length = curve.chord_length();
    let steps = (SLUR_CHECK_POINTS - 1) as f64;
    (0..SLUR_CHECK_POINTS)
        .map(|i| {
            let x = f64::from(bbox.x1) + f64::from(bbox.width()) * i as f64 / steps;
            curve.to_chord_frame(x, f64::from(edge))
        })
        .filter(|(s, _)| *s >= 0.0 && *s <= length)
        .collect()
}

/// Mark the elements that cannot collide with the curve as discarded:
/// those outside the chord, those entirely on the far side of it and those
/// beyond the curve's envelope plus `margin`.
pub fn filter_spanned_elements(positioner: &mut FloatingCurvePositioner, margin: i32) {
    let curve = positioner.curve().clone();
    let envelope = curve.max_height() + f64::from(margin);
    let far_edge = |bbox: &BoundingBox| match curve.dir {
        CurveDir::Below => bbox.top(),
        _ => bbox.bottom(),
    };

    for element in positioner.spanned_mut() {
        let near = check_points(&element.bbox, &curve);
        let nearest = near.iter().map(|&(_, h)| h).fold(f64::NEG_INFINITY, f64::max);
        let farthest = edge_points(&element.bbox, far_edge(&element.bbox), &curve)
            .iter()
            .map(|&(_, h)| h)
            .fold(f64::INFINITY, f64::min);

        element.discarded = near.is_empty() || nearest < 0.0 || farthest > envelope;
        if element.discarded {
            log::debug!("'{}' cannot collide with the slur", element.id);
        }
    }
}
