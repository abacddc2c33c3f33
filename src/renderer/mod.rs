//! Renderer — draws laid-out elements through a `DeviceContext`.
//!
//! The layout model calls the `View` per visual element. The View delegates
//! the shape decisions to the mensural resolver or to the slur engine,
//! converts layout coordinates (y up) into device coordinates (y down) and
//! emits the primitives.

mod constants;
pub mod mensural;
pub mod slur;

use crate::device::{Brush, Colour, DeviceContext, DeviceMapping, FontInfo, Pen};
use crate::error::Result;
use crate::geometry::Point;
use crate::model::{Element, ElementData, StaffContext, StemDir};
use crate::options::EngraveOptions;
use crate::resources::{GlyphProvider, Resources};

pub use mensural::Strategy;

// ═══════════════════════════════════════════════════════════════════════
// View
// ═══════════════════════════════════════════════════════════════════════

/// Drawing front-end for one page.
pub struct View<'a> {
    resources: &'a Resources,
    options: &'a EngraveOptions,
    page_height: i32,
}

impl DeviceMapping for View<'_> {
    fn to_device_x(&self, x: i32) -> i32 {
        x
    }

    fn to_device_y(&self, y: i32) -> i32 {
        self.page_height - y
    }
}

impl<'a> View<'a> {
    /// `page_height` is in layout units; it flips the y axis.
    pub fn new(resources: &'a Resources, options: &'a EngraveOptions, page_height: i32) -> Self {
        Self {
            resources,
            options,
            page_height,
        }
    }

    pub fn resources(&self) -> &'a Resources {
        self.resources
    }

    pub fn options(&self) -> &'a EngraveOptions {
        self.options
    }

    pub fn mensural_strategy(&self) -> Strategy {
        if self.options.use_glyph_mensural {
            Strategy::PreferGlyph
        } else {
            Strategy::ConstructGeometry
        }
    }

    fn mapping(&self) -> Option<&dyn DeviceMapping> {
        Some(self as &dyn DeviceMapping)
    }

    /// Draw one layer element of a mensural staff.
    pub fn draw_layer_element(
        &self,
        dc: &mut dyn DeviceContext,
        element: &Element,
        staff: &StaffContext,
        layer_stem_dir: Option<StemDir>,
    ) -> Result<()> {
        match &element.data {
            ElementData::Note(_) => self.draw_mensural_note(dc, element, staff, layer_stem_dir),
            ElementData::Rest(_) => self.draw_mensural_rest(dc, element, staff),
            ElementData::Ligature(_) => self.draw_ligature(dc, element, staff),
            ElementData::Mensur(_) => self.draw_mensur(dc, element, staff),
            ElementData::Proport(_) => self.draw_proport(dc, element, staff),
            _ => {
                log::debug!("No mensural drawing for {:?} '{}'", element.kind(), element.id);
                Ok(())
            }
        }
    }

    // ── Drawing helpers ─────────────────────────────────────────────

    fn music_font(&self, staff: &StaffContext, cue: bool) -> FontInfo {
        FontInfo::music(self.resources.font_name(), staff.music_font_size(cue))
    }

    /// Place one glyph and return its advance, 0 when the glyph is missing.
    pub fn draw_smufl_code(
        &self,
        dc: &mut dyn DeviceContext,
        x: i32,
        y: i32,
        code: u32,
        staff: &StaffContext,
        cue: bool,
    ) -> i32 {
        dc.set_font(self.music_font(staff, cue));
        let start = self.to_device_x(x);
        let end = dc.draw_music_text(&[code], start, self.to_device_y(y));
        dc.reset_font();
        end - start
    }

    /// Width of a glyph run, in layout units.
    pub fn smufl_text_width(&self, codes: &[u32], staff: &StaffContext) -> i32 {
        let size = staff.music_font_size(false);
        codes.iter().map(|&code| self.resources.glyph_advance(code, size)).sum()
    }

    fn with_fill<F: FnOnce(&mut dyn DeviceContext)>(&self, dc: &mut dyn DeviceContext, draw: F) {
        dc.set_pen(Pen::new(Colour::None, 0));
        dc.set_brush(Brush::new(Colour::None));
        draw(dc);
        dc.reset_brush();
        dc.reset_pen();
    }

    pub fn draw_filled_rectangle(&self, dc: &mut dyn DeviceContext, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.draw_filled_rounded_rectangle(dc, x1, y1, x2, y2, 0);
    }

    pub fn draw_filled_rounded_rectangle(
        &self,
        dc: &mut dyn DeviceContext,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        radius: i32,
    ) {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (bottom, top) = (y1.min(y2), y1.max(y2));
        let x = self.to_device_x(left);
        let y = self.to_device_y(top);
        self.with_fill(dc, |dc| dc.draw_rounded_rectangle(x, y, right - left, top - bottom, radius));
    }

    /// Parallelogram on the segment `(x1, y1)`–`(x2, y2)`, extended
    /// vertically by `height`.
    pub fn draw_oblique_polygon(&self, dc: &mut dyn DeviceContext, x1: i32, y1: i32, x2: i32, y2: i32, height: i32) {
        let points = [
            Point::new(self.to_device_x(x1), self.to_device_y(y1)),
            Point::new(self.to_device_x(x2), self.to_device_y(y2)),
            Point::new(self.to_device_x(x2), self.to_device_y(y2 + height)),
            Point::new(self.to_device_x(x1), self.to_device_y(y1 + height)),
        ];
        self.with_fill(dc, |dc| dc.draw_polygon(&points, Point::default()));
    }

    pub fn draw_filled_circle(&self, dc: &mut dyn DeviceContext, x: i32, y: i32, radius: i32) {
        let (x, y) = (self.to_device_x(x), self.to_device_y(y));
        self.with_fill(dc, |dc| dc.draw_circle(x, y, radius));
    }
}
