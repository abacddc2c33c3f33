//! Output device abstraction.
//!
//! Every drawing operation of the renderers goes through `DeviceContext`:
//! primitive draw calls, the group stack (`start_graphic`/`end_graphic` and
//! friends) and the pen, brush and font stacks. `SvgDeviceContext` is the
//! concrete implementation building an SVG scene graph.
//!
//! Device coordinates have y growing downwards. Objects keep layout
//! coordinates, so operations that need an object's extent receive a
//! `DeviceMapping` to convert them.

pub mod scene;
pub mod svg;

use crate::geometry::Point;
use crate::model::{FontStyle, FontWeight, GraphicObject};

pub use scene::{NodeId, Scene};
pub use svg::SvgDeviceContext;

// ═══════════════════════════════════════════════════════════════════════
// Style values
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colour {
    /// Inherit the current colour
    #[default]
    None,
    Black,
    White,
    Red,
    Green,
    Blue,
    Cyan,
    LightGrey,
    /// 0xRRGGBB
    Rgb(u32),
}

impl Colour {
    pub fn to_svg(self) -> String {
        match self {
            Colour::None => "currentColor".to_string(),
            Colour::Black => "#000000".to_string(),
            Colour::White => "#FFFFFF".to_string(),
            Colour::Red => "#FF0000".to_string(),
            Colour::Green => "#00FF00".to_string(),
            Colour::Blue => "#0000FF".to_string(),
            Colour::Cyan => "#00FFFF".to_string(),
            Colour::LightGrey => "#777777".to_string(),
            Colour::Rgb(rgb) => format!("#{:06X}", rgb & 0x00FF_FFFF),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Unset,
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Unset,
    Arcs,
    Bevel,
    Miter,
    MiterClip,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub colour: Colour,
    pub width: i32,
    pub opacity: f64,
    pub dash_length: i32,
    pub gap_length: i32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            colour: Colour::None,
            width: 1,
            opacity: 1.0,
            dash_length: 0,
            gap_length: 0,
            line_cap: LineCap::Unset,
            line_join: LineJoin::Unset,
        }
    }
}

impl Pen {
    pub fn new(colour: Colour, width: i32) -> Self {
        Self {
            colour,
            width,
            ..Self::default()
        }
    }

    pub fn dashed(mut self, dash_length: i32, gap_length: i32) -> Self {
        self.dash_length = dash_length;
        self.gap_length = gap_length;
        self
    }

    pub fn with_line_cap(mut self, line_cap: LineCap) -> Self {
        self.line_cap = line_cap;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub colour: Colour,
    pub opacity: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            colour: Colour::None,
            opacity: 1.0,
        }
    }
}

impl Brush {
    pub fn new(colour: Colour) -> Self {
        Self { colour, opacity: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    pub face_name: String,
    /// Point size in device units, 0 to inherit
    pub point_size: i32,
    pub style: Option<FontStyle>,
    pub weight: Option<FontWeight>,
    /// The text font shipped with the music font, embedded on commit when used
    pub smufl_font: bool,
    pub width_to_height_ratio: f64,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            face_name: String::new(),
            point_size: 0,
            style: None,
            weight: None,
            smufl_font: false,
            width_to_height_ratio: 1.0,
        }
    }
}

impl FontInfo {
    pub fn music(face_name: impl Into<String>, point_size: i32) -> Self {
        Self {
            face_name: face_name.into(),
            point_size,
            ..Self::default()
        }
    }
}

/// Converts layout coordinates to device coordinates.
pub trait DeviceMapping {
    fn to_device_x(&self, x: i32) -> i32;
    fn to_device_y(&self, y: i32) -> i32;
}

// ═══════════════════════════════════════════════════════════════════════
// DeviceContext
// ═══════════════════════════════════════════════════════════════════════

/// Drawing surface. Groups form a single LIFO stack whose bottom entry (the
/// root) is never popped; style stacks are independent from it.
pub trait DeviceContext {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    // ── Style stacks ────────────────────────────────────────────────
    fn set_pen(&mut self, pen: Pen);
    fn reset_pen(&mut self);
    fn pen(&self) -> &Pen;
    fn set_brush(&mut self, brush: Brush);
    fn reset_brush(&mut self);
    fn brush(&self) -> &Brush;
    fn set_font(&mut self, font: FontInfo);
    fn reset_font(&mut self);
    fn font(&self) -> &FontInfo;

    // ── Grouping ────────────────────────────────────────────────────
    fn start_graphic(&mut self, object: &dyn GraphicObject, class: &str, id: &str, primary: bool, prepend: bool);
    fn end_graphic(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>);
    fn start_custom_graphic(&mut self, name: &str, class: &str, id: &str);
    fn end_custom_graphic(&mut self);
    fn resume_graphic(&mut self, object: &dyn GraphicObject, id: &str);
    fn end_resumed_graphic(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>);
    fn start_text_graphic(&mut self, object: &dyn GraphicObject, class: &str, id: &str);
    fn end_text_graphic(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>);
    fn rotate_graphic(&mut self, origin: Point, angle: f64);
    fn start_page(&mut self);
    fn end_page(&mut self);

    // ── Primitives ──────────────────────────────────────────────────
    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32);
    fn draw_polyline(&mut self, points: &[Point], offset: Point);
    fn draw_polygon(&mut self, points: &[Point], offset: Point);
    fn draw_rounded_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32, radius: i32);
    fn draw_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.draw_rounded_rectangle(x, y, width, height, 0);
    }
    fn draw_ellipse(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn draw_circle(&mut self, x: i32, y: i32, radius: i32) {
        self.draw_ellipse(x - radius, y - radius, 2 * radius, 2 * radius);
    }
    /// Arc of the ellipse inscribed in the rectangle, angles in degrees
    /// counter-clockwise from three o'clock.
    fn draw_elliptic_arc(&mut self, x: i32, y: i32, width: i32, height: i32, start: f64, end: f64);
    fn draw_quad_bezier_path(&mut self, bezier: &[Point; 3]);
    fn draw_cubic_bezier_path(&mut self, bezier: &[Point; 4]);
    /// Closed outline made of `bezier1` and `bezier2` walked backwards.
    fn draw_cubic_bezier_path_filled(&mut self, bezier1: &[Point; 4], bezier2: &[Point; 4]);

    // ── Text ────────────────────────────────────────────────────────
    /// Place a run of glyphs; returns the x after the last placed glyph.
    fn draw_music_text(&mut self, codes: &[u32], x: i32, y: i32) -> i32;
    fn start_text(&mut self, x: i32, y: i32, alignment: HorizontalAlignment);
    fn move_text_to(&mut self, x: i32, y: i32, alignment: Option<HorizontalAlignment>);
    fn move_text_vertically_to(&mut self, y: i32);
    /// `bounds` is `(x, y, width, height)` of a selectable area behind the text.
    fn draw_text(&mut self, text: &str, position: Option<Point>, bounds: Option<(i32, i32, i32, i32)>);
    fn end_text(&mut self);
    fn add_description(&mut self, text: &str);

    // ── Frame ───────────────────────────────────────────────────────
    fn set_logical_origin(&mut self, x: i32, y: i32);
    fn set_user_scale(&mut self, x: f64, y: f64);
    fn commit(&mut self, xml_declaration: bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn colours_are_zero_padded() {
        assert_eq!(Colour::None.to_svg(), "currentColor");
        assert_eq!(Colour::Rgb(0x00_0A_0B).to_svg(), "#000A0B");
        assert_eq!(Colour::LightGrey.to_svg(), "#777777");
    }
}
