//! Slur layout and drawing.
//!
//! `layout_slur` runs the whole adjustment for one slur segment: direction,
//! anchors, spanned obstacles, end-point and control-point adjustment and
//! reshaping. The result lives in a `FloatingCurvePositioner`, which
//! `View::draw_slur` turns into a filled double curve (or a dashed stroke).

pub mod adjust;
pub mod anchors;
pub mod direction;
pub mod spanned;

pub use adjust::{
    adjust_slur, adjust_slur_shape, calc_control_point_offset, calc_control_point_vertical_shift,
    calc_end_point_shift, shift_end_points, ControlPointOffset, SlurMetrics,
};
pub use anchors::{adjusted_slur_angle, anchor_points, doubling_bound, rotate_slope};
pub use direction::{portato_slur_type, preferred_curve_direction, resolve_curve_direction};
pub use spanned::{collect_spanned_elements, filter_spanned_elements};

use crate::device::{Colour, DeviceContext, DeviceMapping, LineCap, Pen};
use crate::error::{EngraveError, Result};
use crate::geometry::{BezierCurve, BoundingBox, CurveDir, Point};
use crate::model::{Element, ElementData, LineForm, MusicKind, Slur, StaffContext, StemDir};
use crate::options::SlurOptions;

use super::constants::SLUR_DASH_LENGTH;
use super::View;

/// How a slur segment relates to the system it is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanningType {
    /// Both ends in this system
    #[default]
    Whole,
    /// Starts here, continues in a later system
    Start,
    /// Started in an earlier system
    End,
    /// Crosses the whole system
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortatoSlurType {
    #[default]
    None,
    StemSide,
    Centered,
}

// ═══════════════════════════════════════════════════════════════════════
// Anchors
// ═══════════════════════════════════════════════════════════════════════

/// A note or chord a slur end is attached to, with its drawn extent.
#[derive(Debug, Clone, PartialEq)]
pub struct SlurAnchor {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub head_top: i32,
    pub head_bottom: i32,
    /// Extent including the stem and flags
    pub top: i32,
    pub bottom: i32,
    pub stem_dir: Option<StemDir>,
    pub grace: bool,
    pub articulation: bool,
    /// Ids of the elements drawn as part of the anchor (stem, flag, dots)
    pub children: Vec<String>,
}

impl SlurAnchor {
    /// A stemless notehead centred on `(x, y)`.
    pub fn new(id: impl Into<String>, x: i32, y: i32, unit: i32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            head_top: y + unit,
            head_bottom: y - unit,
            top: y + unit,
            bottom: y - unit,
            stem_dir: None,
            grace: false,
            articulation: false,
            children: Vec::new(),
        }
    }

    /// Anchor for a laid-out note or chord; the bounding box, when present,
    /// gives the full extent.
    pub fn from_element(element: &Element, unit: i32) -> Result<Self> {
        let (stem_dir, grace, articulation) = match &element.data {
            ElementData::Note(note) => (note.stem_dir, note.grace, note.articulation),
            ElementData::Chord(chord) => (chord.stem_dir, chord.grace, chord.articulation),
            _ => {
                return Err(EngraveError::TypeMismatch {
                    expected: MusicKind::Note,
                    found: element.kind(),
                })
            }
        };
        let mut anchor = Self::new(element.id.clone(), element.x, element.y, unit);
        anchor.stem_dir = stem_dir;
        anchor.grace = grace;
        anchor.articulation = articulation;
        if let Some(bbox) = element.bbox {
            anchor.top = bbox.top().max(anchor.head_top);
            anchor.bottom = bbox.bottom().min(anchor.head_bottom);
        }
        Ok(anchor)
    }

    pub fn with_stem(mut self, dir: StemDir, length: i32) -> Self {
        self.stem_dir = Some(dir);
        match dir {
            StemDir::Up => self.top = self.top.max(self.y + length),
            StemDir::Down => self.bottom = self.bottom.min(self.y - length),
        }
        self
    }

    pub fn with_grace(mut self) -> Self {
        self.grace = true;
        self
    }

    pub fn with_articulation(mut self) -> Self {
        self.articulation = true;
        self
    }

    pub fn with_children<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Outer extent on the side of `dir`.
    pub fn extreme(&self, dir: CurveDir) -> i32 {
        match dir {
            CurveDir::Below => self.bottom,
            _ => self.top,
        }
    }

    pub fn head_extreme(&self, dir: CurveDir) -> i32 {
        match dir {
            CurveDir::Below => self.head_bottom,
            _ => self.head_top,
        }
    }

    /// Side the stem points to, if any.
    pub fn stem_side(&self) -> Option<CurveDir> {
        self.stem_dir.map(|dir| match dir {
            StemDir::Up => CurveDir::Above,
            StemDir::Down => CurveDir::Below,
        })
    }

    fn owns(&self, id: &str) -> bool {
        self.id == id || self.children.iter().any(|child| child == id)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slur context
// ═══════════════════════════════════════════════════════════════════════

/// Everything the layout of one slur segment looks at.
#[derive(Debug, Clone, Copy)]
pub struct SlurContext<'a> {
    pub staff: &'a StaffContext,
    /// Set when other layers share the staff
    pub layer_stem_dir: Option<StemDir>,
    pub spanning: SpanningType,
    /// Horizontal extent of the system, used by split segments
    pub system_x: (i32, i32),
    /// Laid-out elements of the staff, flattened
    pub elements: &'a [Element],
    pub start: Option<&'a SlurAnchor>,
    pub end: Option<&'a SlurAnchor>,
    /// Note after the start, for grace slurs
    pub following: Option<&'a SlurAnchor>,
}

impl<'a> SlurContext<'a> {
    pub fn new(staff: &'a StaffContext, elements: &'a [Element]) -> Self {
        Self {
            staff,
            layer_stem_dir: None,
            spanning: SpanningType::Whole,
            system_x: (0, 0),
            elements,
            start: None,
            end: None,
            following: None,
        }
    }

    pub fn between(mut self, start: &'a SlurAnchor, end: &'a SlurAnchor) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Mark the segment as split across systems. The anchors missing for
    /// `spanning` are dropped.
    pub fn spanning(mut self, spanning: SpanningType, system_x: (i32, i32)) -> Self {
        self.spanning = spanning;
        self.system_x = system_x;
        match spanning {
            SpanningType::Whole => {}
            SpanningType::Start => self.end = None,
            SpanningType::End => self.start = None,
            SpanningType::Middle => {
                self.start = None;
                self.end = None;
            }
        }
        self
    }

    pub fn with_start(mut self, anchor: &'a SlurAnchor) -> Self {
        self.start = Some(anchor);
        self
    }

    pub fn with_end(mut self, anchor: &'a SlurAnchor) -> Self {
        self.end = Some(anchor);
        self
    }

    pub fn with_following(mut self, anchor: &'a SlurAnchor) -> Self {
        self.following = Some(anchor);
        self
    }

    pub fn with_layer_stem_dir(mut self, dir: StemDir) -> Self {
        self.layer_stem_dir = Some(dir);
        self
    }

    fn is_anchor_part(&self, id: &str) -> bool {
        self.start.is_some_and(|a| a.owns(id)) || self.end.is_some_and(|a| a.owns(id))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Positioner
// ═══════════════════════════════════════════════════════════════════════

/// An element under the slur, in layout coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSpannedElement {
    pub id: String,
    pub kind: MusicKind,
    pub bbox: BoundingBox,
    /// Set by the filter when the element cannot collide
    pub discarded: bool,
}

impl CurveSpannedElement {
    pub fn new(id: impl Into<String>, kind: MusicKind, bbox: BoundingBox) -> Self {
        Self {
            id: id.into(),
            kind,
            bbox,
            discarded: false,
        }
    }
}

/// The adjusted curve of one slur segment and the obstacles it avoided.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingCurvePositioner {
    object_id: String,
    curve: BezierCurve,
    thickness: i32,
    spanned: Vec<CurveSpannedElement>,
}

impl FloatingCurvePositioner {
    pub fn new(object_id: impl Into<String>, curve: BezierCurve, thickness: i32, spanned: Vec<CurveSpannedElement>) -> Self {
        Self {
            object_id: object_id.into(),
            curve,
            thickness,
            spanned,
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn curve(&self) -> &BezierCurve {
        &self.curve
    }

    pub fn set_curve(&mut self, curve: BezierCurve) {
        self.curve = curve;
    }

    pub fn dir(&self) -> CurveDir {
        self.curve.dir
    }

    /// Mid-point thickness of the drawn curve.
    pub fn thickness(&self) -> i32 {
        self.thickness
    }

    pub fn spanned(&self) -> &[CurveSpannedElement] {
        &self.spanned
    }

    pub fn spanned_mut(&mut self) -> &mut [CurveSpannedElement] {
        &mut self.spanned
    }

    /// Elements left after filtering.
    pub fn obstacles(&self) -> impl Iterator<Item = &CurveSpannedElement> {
        self.spanned.iter().filter(|e| !e.discarded)
    }

    /// Hull of the control polygon, widened by the thickness.
    pub fn bounding_box(&self) -> BoundingBox {
        let points = self.curve.points();
        let x1 = points.iter().map(|p| p.x).min().unwrap_or(0);
        let x2 = points.iter().map(|p| p.x).max().unwrap_or(0);
        let y1 = points.iter().map(|p| p.y).min().unwrap_or(0);
        let y2 = points.iter().map(|p| p.y).max().unwrap_or(0);
        BoundingBox::new(x1, y1 - self.thickness / 2, x2, y2 + self.thickness / 2)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Layout
// ═══════════════════════════════════════════════════════════════════════

/// Lay out one slur segment and store its direction and extent on the slur.
pub fn layout_slur(slur: &mut Slur, ctx: &SlurContext, options: &SlurOptions) -> FloatingCurvePositioner {
    let unit = ctx.staff.unit;
    let metrics = SlurMetrics::new(options, unit);

    let dir = resolve_curve_direction(slur, ctx);
    let portato = portato_slur_type(ctx, dir);
    let (mut p1, mut p2) = anchor_points(ctx, dir, portato);
    adjusted_slur_angle(&mut p1, &mut p2, dir, options.max_slope);

    let mut curve = BezierCurve::from_anchors(p1, p2, dir);
    curve.calc_initial_control_point_params(options.height_factor, metrics.min_height, metrics.max_height);
    curve.update_control_points();

    let spanned = collect_spanned_elements(ctx, p1.x.min(p2.x), p1.x.max(p2.x), portato);
    let thickness = options.to_layout(options.midpoint_thickness, unit);
    let mut positioner = FloatingCurvePositioner::new(slur.id.clone(), curve, thickness, spanned);
    adjust_slur(&mut positioner, &metrics);

    slur.set_drawing_bounding_box(Some(positioner.bounding_box()));
    positioner
}

impl View<'_> {
    /// Lay out and draw a slur segment in one go.
    pub fn draw_slur(&self, dc: &mut dyn DeviceContext, slur: &mut Slur, ctx: &SlurContext) -> FloatingCurvePositioner {
        let positioner = layout_slur(slur, ctx, &self.options().slur);
        self.draw_slur_curve(dc, slur, &positioner, ctx.staff);
        positioner
    }

    /// Draw an already adjusted curve.
    pub fn draw_slur_curve(
        &self,
        dc: &mut dyn DeviceContext,
        slur: &Slur,
        positioner: &FloatingCurvePositioner,
        staff: &StaffContext,
    ) {
        let options = &self.options().slur;
        let unit = staff.unit;
        let curve = positioner.curve();
        let end_width = options.to_layout(options.endpoint_thickness, unit).max(1);

        dc.start_graphic(slur, "", &slur.id, true, false);
        match slur.lform {
            LineForm::Solid => {
                let half = positioner.thickness() / 2;
                let outer = self.offset_curve(curve, half);
                let inner = self.offset_curve(curve, -half);
                dc.set_pen(Pen::new(Colour::None, end_width));
                dc.draw_cubic_bezier_path_filled(&outer, &inner);
                dc.reset_pen();
            }
            LineForm::Dashed | LineForm::Dotted => {
                let width = positioner.thickness().max(end_width);
                let pen = match slur.lform {
                    LineForm::Dotted => Pen::new(Colour::None, width)
                        .dashed(1, width * 2)
                        .with_line_cap(LineCap::Round),
                    _ => Pen::new(Colour::None, width).dashed(SLUR_DASH_LENGTH * unit, SLUR_DASH_LENGTH * unit),
                };
                dc.set_pen(pen);
                dc.draw_cubic_bezier_path(&self.device_points(curve.points()));
                dc.reset_pen();
            }
        }
        dc.end_graphic(slur, self.mapping());
    }

    /// Same anchors, control heights moved by `delta`, in device coordinates.
    fn offset_curve(&self, curve: &BezierCurve, delta: i32) -> [Point; 4] {
        let mut offset = curve.clone();
        offset.set_heights(curve.left_height() + delta, curve.right_height() + delta);
        offset.update_control_points();
        self.device_points(offset.points())
    }

    fn device_points(&self, points: [Point; 4]) -> [Point; 4] {
        points.map(|p| Point::new(self.to_device_x(p.x), self.to_device_y(p.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SvgDeviceContext;
    use crate::model::{Duration, GraphicObject, Note};
    use crate::options::EngraveOptions;
    use crate::resources::Resources;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn staff() -> StaffContext {
        StaffContext::new(2000, Default::default())
    }

    #[test]
    fn anchor_extent_follows_the_stem() {
        let anchor = SlurAnchor::new("n1", 100, 1000, 90).with_stem(StemDir::Up, 630);
        assert_eq!(anchor.extreme(CurveDir::Above), 1630);
        assert_eq!(anchor.head_extreme(CurveDir::Above), 1090);
        assert_eq!(anchor.extreme(CurveDir::Below), 910);
        assert_eq!(anchor.stem_side(), Some(CurveDir::Above));
    }

    #[test]
    fn anchor_from_element_reads_note_flags() {
        let mut note = Note::new(Duration::Minima, 2);
        note.stem_dir = Some(StemDir::Down);
        note.articulation = true;
        let element = Element::new("n1", 300, 1000, ElementData::Note(note))
            .with_bbox(BoundingBox::new(250, 300, 350, 1100));
        let anchor = SlurAnchor::from_element(&element, 90).expect("a note anchor");
        assert_eq!(anchor.bottom, 300);
        assert_eq!(anchor.top, 1100);
        assert!(anchor.articulation);
        assert_eq!(anchor.stem_dir, Some(StemDir::Down));
    }

    #[test]
    fn split_context_drops_missing_anchors() {
        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90);
        let b = SlurAnchor::new("b", 900, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b).spanning(SpanningType::Start, (0, 1200));
        assert!(ctx.start.is_some());
        assert!(ctx.end.is_none());
        assert!(ctx.is_anchor_part("a"));
        assert!(!ctx.is_anchor_part("b"));
    }

    #[test]
    fn layout_stores_direction_and_extent() {
        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90);
        let b = SlurAnchor::new("b", 1100, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);
        let mut slur = Slur::new("s1");
        slur.curvedir = Some(CurveDir::Above);
        let positioner = layout_slur(&mut slur, &ctx, &SlurOptions::default());

        assert_eq!(slur.drawing_curvedir(), CurveDir::Above);
        assert_eq!(slur.drawing_bounding_box(), Some(positioner.bounding_box()));
        let curve = positioner.curve();
        assert_eq!(curve.p1, Point::new(100, 1680));
        assert_eq!(curve.p2, Point::new(1100, 1680));
        assert!(curve.c1.y > curve.p1.y);
        assert!(curve.c2.y > curve.p2.y);
    }

    #[test]
    fn solid_slur_is_a_filled_double_curve() {
        let resources = Resources::new("Leipzig");
        let options = EngraveOptions::default();
        let view = View::new(&resources, &options, 3000);
        let mut dc = SvgDeviceContext::new(100, 100, options.svg.clone(), Arc::new(resources.clone()));
        dc.start_page();

        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90);
        let b = SlurAnchor::new("b", 1100, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);
        let mut slur = Slur::new("s1");
        view.draw_slur(&mut dc, &mut slur, &ctx);

        let scene = dc.scene();
        let group = scene.children_named(dc.current_node(), "g").next().expect("a slur group");
        assert_eq!(scene.attribute(group, "class"), Some("slur"));
        let path = scene.children_named(group, "path").next().expect("a path");
        let d = scene.attribute(path, "d").expect("path data");
        assert_eq!(d.matches('C').count(), 2);
        assert_eq!(scene.attribute(path, "stroke-width"), Some("9"));
        assert_eq!(dc.pen().width, 1);
    }

    #[test]
    fn slur_path_is_flipped_into_device_space() {
        let resources = Resources::new("Leipzig");
        let options = EngraveOptions::default();
        let view = View::new(&resources, &options, 3000);
        let mut dc = SvgDeviceContext::new(100, 100, options.svg.clone(), Arc::new(resources.clone()));
        dc.start_page();

        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90);
        let b = SlurAnchor::new("b", 1100, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);
        let mut slur = Slur::new("s1");
        slur.curvedir = Some(CurveDir::Above);
        view.draw_slur(&mut dc, &mut slur, &ctx);

        let scene = dc.scene();
        let group = scene.children_named(dc.current_node(), "g").next().expect("a slur group");
        let path = scene.children_named(group, "path").next().expect("a path");
        let d = scene.attribute(path, "d").expect("path data");
        // Anchors at y 1680 on a page 3000 high
        assert!(d.starts_with("M100,1320 C"), "{d}");
        assert!(d.ends_with(" 100,1320"), "{d}");
        assert_eq!(view.to_device_y(1680), 1320);
    }

    #[test]
    fn dashed_slur_is_stroked() {
        let resources = Resources::new("Leipzig");
        let options = EngraveOptions::default();
        let view = View::new(&resources, &options, 3000);
        let mut dc = SvgDeviceContext::new(100, 100, options.svg.clone(), Arc::new(resources.clone()));
        dc.start_page();

        let staff = staff();
        let a = SlurAnchor::new("a", 100, 1500, 90);
        let b = SlurAnchor::new("b", 1100, 1500, 90);
        let ctx = SlurContext::new(&staff, &[]).between(&a, &b);
        let mut slur = Slur::new("s1");
        slur.lform = LineForm::Dashed;
        view.draw_slur(&mut dc, &mut slur, &ctx);

        let scene = dc.scene();
        let group = scene.children_named(dc.current_node(), "g").next().expect("a slur group");
        let path = scene.children_named(group, "path").next().expect("a path");
        assert_eq!(scene.attribute(path, "fill"), Some("none"));
        assert_eq!(scene.attribute(path, "stroke-dasharray"), Some("270 270"));
    }
}
