//! Curve direction and portato detection.

use crate::geometry::CurveDir;
use crate::model::{ElementData, Slur, StemDir};

use super::{PortatoSlurType, SlurAnchor, SlurContext, SpanningType};

/// Direction of the slur for this layout pass.
///
/// An encoded direction always wins. Slurs within one system store the
/// computed direction; split segments reuse the stored one so the direction
/// stays stable across reflow, and fall back to a transient direction that is
/// not stored.
pub fn resolve_curve_direction(slur: &mut Slur, ctx: &SlurContext) -> CurveDir {
    if let Some(dir) = slur.curvedir.filter(|dir| *dir != CurveDir::None) {
        slur.set_drawing_curvedir(dir);
        return dir;
    }
    match ctx.spanning {
        SpanningType::Whole => {
            let dir = preferred_curve_direction(ctx);
            slur.set_drawing_curvedir(dir);
            dir
        }
        _ if slur.has_drawing_curvedir() => slur.drawing_curvedir(),
        _ => {
            let dir = preferred_curve_direction(ctx);
            log::debug!("Slur '{}' split across systems, drawn {:?} without storing it", slur.id, dir);
            dir
        }
    }
}

pub fn preferred_curve_direction(ctx: &SlurContext) -> CurveDir {
    if let Some(start) = ctx.start.filter(|anchor| anchor.grace) {
        return grace_curve_direction(start, ctx.following.or(ctx.end));
    }

    match ctx.layer_stem_dir {
        Some(StemDir::Up) => return CurveDir::Above,
        Some(StemDir::Down) => return CurveDir::Below,
        None => {}
    }

    let anchor = ctx.start.or(ctx.end);
    if let Some(stem_dir) = anchor.and_then(|a| a.stem_dir) {
        return match stem_dir {
            StemDir::Up => CurveDir::Below,
            StemDir::Down => CurveDir::Above,
        };
    }

    let center = ctx.staff.vertical_center();
    let y = anchor.map_or(center, |a| a.y);
    if y >= center {
        CurveDir::Above
    } else {
        CurveDir::Below
    }
}

/// Grace notes curve toward their stem side; without a stem, toward the
/// following note, and below when there is none.
fn grace_curve_direction(grace: &SlurAnchor, following: Option<&SlurAnchor>) -> CurveDir {
    if let Some(side) = grace.stem_side() {
        return side;
    }
    match following {
        Some(next) if next.y > grace.y => CurveDir::Above,
        _ => CurveDir::Below,
    }
}

/// A slur whose start and every spanned note carry an articulation.
pub fn portato_slur_type(ctx: &SlurContext, dir: CurveDir) -> PortatoSlurType {
    let Some(start) = ctx.start else {
        return PortatoSlurType::None;
    };
    if !start.articulation {
        return PortatoSlurType::None;
    }

    let x_max = ctx.end.map_or(ctx.system_x.1, |end| end.x);
    let all_articulated = ctx
        .elements
        .iter()
        .filter(|e| e.x > start.x && e.x <= x_max && !ctx.is_anchor_part(&e.id))
        .filter_map(|e| match &e.data {
            ElementData::Note(note) => Some(note.articulation),
            ElementData::Chord(chord) => Some(chord.articulation),
            _ => None,
        })
        .all(|articulated| articulated);
    let end_articulated = ctx.end.map_or(true, |end| end.articulation);
    if !all_articulated || !end_articulated {
        return PortatoSlurType::None;
    }

    if start.stem_side() == Some(dir) {
        PortatoSlurType::StemSide
    } else {
        PortatoSlurType::Centered
    }
}
