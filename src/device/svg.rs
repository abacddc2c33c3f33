//! SVG device — accumulates the scene graph and serializes it on commit.
//!
//! Glyphs are written as `<use>` references to symbols that are copied into
//! `<defs>` once, whatever the number of references.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::scene::{NodeId, Scene};
use super::{Brush, DeviceContext, DeviceMapping, FontInfo, HorizontalAlignment, LineCap, LineJoin, Pen};
use crate::geometry::Point;
use crate::model::{AttributeBundle, CapabilityKind, GraphicObject, DEFINITION_FACTOR};
use crate::options::SvgOptions;
use crate::resources::{GlyphProvider, Resources};
use crate::smufl;

const GLOBAL_STYLE: &str = "g.page-margin{font-family:Times;} \
g.ending, g.fing, g.reh, g.tempo{font-weight:bold;} g.dir, g.dynam, \
g.mNum{font-style:italic;} g.label{font-weight:normal;}";

// ═══════════════════════════════════════════════════════════════════════
// SvgDeviceContext
// ═══════════════════════════════════════════════════════════════════════

pub struct SvgDeviceContext {
    scene: Scene,
    svg_node: NodeId,
    stack: Vec<NodeId>,
    current: NodeId,
    in_page: bool,
    width: i32,
    height: i32,
    content_height: i32,
    user_scale: (f64, f64),
    origin: (i32, i32),
    pens: Vec<Pen>,
    brushes: Vec<Brush>,
    fonts: Vec<FontInfo>,
    options: SvgOptions,
    resources: Arc<Resources>,
    used_glyphs: BTreeSet<u32>,
    text_font_used: bool,
    committed: bool,
    output: String,
}

impl SvgDeviceContext {
    /// A device for a page of `width` × `height` output units.
    pub fn new(width: i32, height: i32, options: SvgOptions, resources: Arc<Resources>) -> Self {
        let mut scene = Scene::new();
        let svg_node = scene.append_element(scene.document(), "svg");
        scene.set_attribute(svg_node, "version", "1.1");
        scene.set_attribute(svg_node, "xmlns", "http://www.w3.org/2000/svg");
        scene.set_attribute(svg_node, "xmlns:xlink", "http://www.w3.org/1999/xlink");
        scene.set_attribute(svg_node, "xmlns:mei", "http://www.music-encoding.org/ns/mei");
        scene.set_attribute(svg_node, "overflow", "visible");

        Self {
            scene,
            svg_node,
            stack: vec![svg_node],
            current: svg_node,
            in_page: false,
            width,
            height,
            content_height: height,
            user_scale: (1.0, 1.0),
            origin: (0, 0),
            pens: vec![Pen::default()],
            brushes: vec![Brush::default()],
            fonts: vec![FontInfo::default()],
            options,
            resources,
            used_glyphs: BTreeSet::new(),
            text_font_used: false,
            committed: false,
            output: String::new(),
        }
    }

    /// Height of the drawn content, used for the definition-scale viewBox.
    pub fn set_content_height(&mut self, height: i32) {
        self.content_height = height;
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn svg_node(&self) -> NodeId {
        self.svg_node
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn used_glyphs(&self) -> impl Iterator<Item = u32> + '_ {
        self.used_glyphs.iter().copied()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The serialized document, committing first when needed.
    pub fn get_svg(&mut self, xml_declaration: bool) -> String {
        if !self.committed {
            self.commit(xml_declaration);
        }
        self.output.clone()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn push(&mut self, node: NodeId) {
        self.current = node;
        self.stack.push(node);
    }

    fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "group stack popped below the root");
        if self.stack.len() <= 1 {
            log::error!("Ignoring unbalanced end of graphic group");
            return;
        }
        self.stack.pop();
        if let Some(&top) = self.stack.last() {
            self.current = top;
        }
    }

    /// Leaves go before the first child group so that groups stay last.
    fn append_child(&mut self, name: &str) -> NodeId {
        match self.scene.first_child_named(self.current, "g") {
            Some(g) => self.scene.insert_element_before(self.current, name, g),
            None => self.scene.append_element(self.current, name),
        }
    }

    fn set(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        self.scene.set_attribute(node, name, value);
    }

    /// Identity and classes of the current node.
    pub fn append_id_and_class(&mut self, id: &str, base_class: &str, added_classes: &str, primary: bool) {
        let mut class = lowercase_first(base_class);
        let node = self.current;

        if !id.is_empty() {
            if self.options.html5 {
                self.set(node, "data-id", id);
                self.set(node, "data-class", class.clone());
            } else if primary {
                self.set(node, "id", id);
            }
            if !primary {
                class.push_str(" spanning id-");
                class.push_str(id);
            }
        }
        if !added_classes.is_empty() {
            class.push(' ');
            class.push_str(added_classes);
        }
        self.set(node, "class", class);
    }

    fn append_additional_attributes(&mut self, object: &dyn GraphicObject) {
        let values: Vec<(String, String)> = self
            .options
            .additional_attributes_for(object.class_name())
            .filter_map(|attr| object.attribute(attr).map(|value| (format!("data-{attr}"), value)))
            .collect();
        for (name, value) in values {
            self.set(self.current, &name, value);
        }
    }

    fn append_capabilities(&mut self, object: &dyn GraphicObject, text_graphic: bool) {
        let node = self.current;
        if let Some(AttributeBundle::Color(color)) = object.capability(CapabilityKind::Color) {
            if !text_graphic && object.is_control_element() {
                self.set(node, "color", color.clone());
            }
            self.set(node, "fill", color);
        }
        if let Some(AttributeBundle::Label(label)) = object.capability(CapabilityKind::Label) {
            let title = self.scene.prepend_element(node, "title");
            self.set(title, "class", "labelAttr");
            self.scene.append_text(title, &label);
        }
        if let Some(AttributeBundle::Lang(lang)) = object.capability(CapabilityKind::Lang) {
            self.set(node, "xml:lang", lang);
        }
        if let Some(AttributeBundle::Typography(typography)) = object.capability(CapabilityKind::Typography) {
            if let Some(fontfam) = typography.fontfam {
                self.set(node, "font-family", fontfam);
            }
            if let Some(style) = typography.fontstyle {
                self.set(node, "font-style", style.as_str());
            }
            if let Some(weight) = typography.fontweight {
                self.set(node, "font-weight", weight.as_str());
            }
        }
        if text_graphic {
            if let Some(AttributeBundle::Whitespace(space)) = object.capability(CapabilityKind::Whitespace) {
                self.set(node, "xml:space", space);
            }
            return;
        }
        if let Some(AttributeBundle::Visibility(visible)) = object.capability(CapabilityKind::Visibility) {
            self.set(node, "visibility", if visible { "visible" } else { "hidden" });
        }
        if let Some(AttributeBundle::Linking(linking)) = object.capability(CapabilityKind::Linking) {
            if let Some(follows) = linking.follows {
                self.set(node, "mei:follows", follows);
            }
            if let Some(precedes) = linking.precedes {
                self.set(node, "mei:precedes", precedes);
            }
        }
    }

    fn open_graphic(&mut self, object: &dyn GraphicObject, class: &str, id: &str, primary: bool, prepend: bool) {
        let mut class = class.to_string();
        if let Some(type_class) = object.type_class() {
            if !class.is_empty() {
                class.push(' ');
            }
            class.push_str(type_class);
        }

        let node = if prepend {
            self.scene.prepend_element(self.current, "g")
        } else {
            self.scene.append_element(self.current, "g")
        };
        self.push(node);
        self.append_id_and_class(id, object.class_name(), &class, primary);
        self.append_additional_attributes(object);
        self.append_capabilities(object, false);
    }

    fn draw_bounding_box(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>) {
        if !self.options.bounding_boxes {
            return;
        }
        let (Some(mapping), Some(bbox)) = (mapping, object.drawing_bounding_box()) else {
            return;
        };

        let bbox_id = format!("bbox-{}", object.id());
        self.open_graphic(object, "bounding-box", &bbox_id, true, true);
        let x = mapping.to_device_x(bbox.x1);
        let y = mapping.to_device_y(bbox.y1);
        let width = mapping.to_device_x(bbox.x2) - x;
        let height = mapping.to_device_y(bbox.y2) - y;
        let (x, width) = normalize_extent(x, width);
        let (y, height) = normalize_extent(y, height);

        let rect = self.append_child("rect");
        self.set(rect, "x", x.to_string());
        self.set(rect, "y", y.to_string());
        self.set(rect, "height", height.to_string());
        self.set(rect, "width", width.to_string());
        self.set(rect, "fill", "transparent");
        self.pop();
    }

    fn append_stroke_line_cap(&mut self, node: NodeId, pen: &Pen) {
        let cap = match pen.line_cap {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
            LineCap::Unset => return,
        };
        self.set(node, "stroke-linecap", cap);
    }

    fn append_stroke_line_join(&mut self, node: NodeId, pen: &Pen) {
        let join = match pen.line_join {
            LineJoin::Arcs => "arcs",
            LineJoin::Bevel => "bevel",
            LineJoin::Miter => "miter",
            LineJoin::MiterClip => "miter-clip",
            LineJoin::Round => "round",
            LineJoin::Unset => return,
        };
        self.set(node, "stroke-linejoin", join);
    }

    fn append_stroke_dash_array(&mut self, node: NodeId, pen: &Pen) {
        if pen.dash_length > 0 {
            let gap = if pen.gap_length > 0 { pen.gap_length } else { pen.dash_length };
            self.set(node, "stroke-dasharray", format!("{} {gap}", pen.dash_length));
        }
    }

    /// Stroke attributes shared by polylines, polygons and rectangles.
    fn append_stroke(&mut self, node: NodeId, pen: &Pen) {
        if pen.width > 0 {
            self.set(node, "stroke", pen.colour.to_svg());
        }
        if pen.width > 1 {
            self.set(node, "stroke-width", pen.width.to_string());
        }
        if pen.opacity != 1.0 {
            self.set(node, "stroke-opacity", format!("{:.6}", pen.opacity));
        }
    }

    fn append_fill(&mut self, node: NodeId, brush: &Brush) {
        if brush.colour != super::Colour::None {
            self.set(node, "fill", brush.colour.to_svg());
        }
        if brush.opacity != 1.0 {
            self.set(node, "fill-opacity", format!("{:.6}", brush.opacity));
        }
    }

    fn append_font_style(&mut self, node: NodeId, font: &FontInfo) {
        if let Some(style) = font.style {
            self.set(node, "font-style", style.as_str());
        }
    }

    fn embed_text_font(&mut self) {
        let Some(xml) = self.resources.text_font() else {
            log::warn!(
                "The web font (woff2) for '{}' could not be loaded and will not be embedded in the SVG",
                self.resources.font_name()
            );
            return;
        };
        match roxmltree::Document::parse(xml) {
            Ok(doc) => {
                self.scene.import(self.svg_node, doc.root_element(), None);
            }
            Err(e) => log::warn!("Invalid web font markup for '{}': {e}", self.resources.font_name()),
        }
    }

    fn embed_glyph_definitions(&mut self) {
        let defs = self.scene.prepend_element(self.svg_node, "defs");
        let resources = Arc::clone(&self.resources);
        for &code in &self.used_glyphs {
            let Some(definition) = resources.glyph(code).and_then(|g| g.definition()) else {
                log::warn!("Glyph {} has no definition to embed", smufl::code_str(code));
                continue;
            };
            match roxmltree::Document::parse(definition) {
                Ok(doc) => {
                    self.scene
                        .import(defs, doc.root_element(), Some(&self.options.glyph_id_postfix));
                }
                Err(e) => log::warn!("Invalid definition for glyph {}: {e}", smufl::code_str(code)),
            }
        }
    }
}

fn lowercase_first(class: &str) -> String {
    let mut chars = class.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// SVG does not allow negative sizes.
fn normalize_extent(origin: i32, size: i32) -> (i32, i32) {
    if size < 0 {
        (origin + size, -size)
    } else {
        (origin, size)
    }
}

fn anchor(alignment: HorizontalAlignment) -> &'static str {
    match alignment {
        HorizontalAlignment::Left => "start",
        HorizontalAlignment::Center => "middle",
        HorizontalAlignment::Right => "end",
    }
}

impl DeviceContext for SvgDeviceContext {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    // ── Style stacks ────────────────────────────────────────────────

    fn set_pen(&mut self, pen: Pen) {
        self.pens.push(pen);
    }

    fn reset_pen(&mut self) {
        if self.pens.len() > 1 {
            self.pens.pop();
        }
    }

    fn pen(&self) -> &Pen {
        &self.pens[self.pens.len() - 1]
    }

    fn set_brush(&mut self, brush: Brush) {
        self.brushes.push(brush);
    }

    fn reset_brush(&mut self) {
        if self.brushes.len() > 1 {
            self.brushes.pop();
        }
    }

    fn brush(&self) -> &Brush {
        &self.brushes[self.brushes.len() - 1]
    }

    fn set_font(&mut self, font: FontInfo) {
        self.fonts.push(font);
    }

    fn reset_font(&mut self) {
        if self.fonts.len() > 1 {
            self.fonts.pop();
        }
    }

    fn font(&self) -> &FontInfo {
        &self.fonts[self.fonts.len() - 1]
    }

    // ── Grouping ────────────────────────────────────────────────────

    fn start_graphic(&mut self, object: &dyn GraphicObject, class: &str, id: &str, primary: bool, prepend: bool) {
        debug_assert!(self.in_page, "start_graphic called outside of a page");
        self.open_graphic(object, class, id, primary, prepend);
    }

    fn end_graphic(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>) {
        self.draw_bounding_box(object, mapping);
        self.pop();
    }

    fn start_custom_graphic(&mut self, name: &str, class: &str, id: &str) {
        let node = self.scene.append_element(self.current, "g");
        self.push(node);
        self.append_id_and_class(id, name, class, true);
    }

    fn end_custom_graphic(&mut self) {
        self.pop();
    }

    fn resume_graphic(&mut self, _object: &dyn GraphicObject, id: &str) {
        let attribute = if self.options.html5 { "data-id" } else { "id" };
        match self.scene.find_element("g", attribute, id) {
            Some(node) => self.current = node,
            None => log::debug!("No group '{id}' to resume, continuing in the current group"),
        }
        self.stack.push(self.current);
    }

    fn end_resumed_graphic(&mut self, _object: &dyn GraphicObject, _mapping: Option<&dyn DeviceMapping>) {
        self.pop();
    }

    fn start_text_graphic(&mut self, object: &dyn GraphicObject, class: &str, id: &str) {
        let node = self.append_child("tspan");
        self.push(node);
        self.append_id_and_class(id, object.class_name(), class, true);
        self.append_additional_attributes(object);
        self.append_capabilities(object, true);
    }

    fn end_text_graphic(&mut self, object: &dyn GraphicObject, mapping: Option<&dyn DeviceMapping>) {
        self.draw_bounding_box(object, mapping);
        self.pop();
    }

    fn rotate_graphic(&mut self, origin: Point, angle: f64) {
        if self.scene.has_attribute(self.current, "transform") {
            return;
        }
        self.set(
            self.current,
            "transform",
            format!("rotate({angle:.6} {},{})", origin.x, origin.y),
        );
    }

    fn start_page(&mut self) {
        debug_assert!(!self.in_page, "pages cannot be nested");
        self.text_font_used = false;

        if self.options.global_styling {
            let style = self.scene.append_element(self.current, "style");
            self.set(style, "type", "text/css");
            self.scene.append_text(style, GLOBAL_STYLE);
        }
        if !self.options.css.is_empty() {
            let css = self.options.css.clone();
            let style = self.scene.append_element(self.current, "style");
            self.set(style, "type", "text/css");
            self.scene.append_text(style, &css);
        }

        let definition_scale = self.scene.append_element(self.current, "svg");
        self.push(definition_scale);
        self.set(definition_scale, "class", "definition-scale");
        self.set(definition_scale, "color", "black");
        let view_box = if self.options.facsimile {
            format!("0 0 {} {}", self.width, self.height)
        } else {
            format!(
                "0 0 {} {}",
                self.width * DEFINITION_FACTOR,
                self.content_height * DEFINITION_FACTOR
            )
        };
        self.set(definition_scale, "viewBox", view_box);

        let page_margin = self.scene.append_element(self.current, "g");
        self.push(page_margin);
        self.set(page_margin, "class", "page-margin");
        self.set(
            page_margin,
            "transform",
            format!("translate({}, {})", self.origin.0, self.origin.1),
        );
        self.in_page = true;
    }

    fn end_page(&mut self) {
        debug_assert!(self.in_page, "end_page without start_page");
        // page-margin, then definition-scale
        self.pop();
        self.pop();
        self.in_page = false;
    }

    // ── Primitives ──────────────────────────────────────────────────

    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let pen = *self.pen();
        let path = self.append_child("path");
        self.set(path, "d", format!("M{x1} {y1} L{x2} {y2}"));
        self.set(path, "stroke", pen.colour.to_svg());
        if pen.width > 1 {
            self.set(path, "stroke-width", pen.width.to_string());
        }
        self.append_stroke_line_cap(path, &pen);
        self.append_stroke_dash_array(path, &pen);
    }

    fn draw_polyline(&mut self, points: &[Point], offset: Point) {
        let pen = *self.pen();
        let polyline = self.append_child("polyline");
        self.append_stroke(polyline, &pen);
        self.append_stroke_line_cap(polyline, &pen);
        self.append_stroke_line_join(polyline, &pen);
        self.append_stroke_dash_array(polyline, &pen);
        self.set(polyline, "fill", "none");
        self.set(polyline, "points", points_string(points, offset));
    }

    fn draw_polygon(&mut self, points: &[Point], offset: Point) {
        let pen = *self.pen();
        let brush = *self.brush();
        let polygon = self.append_child("polygon");
        self.append_stroke(polygon, &pen);
        self.append_stroke_line_join(polygon, &pen);
        self.append_stroke_dash_array(polygon, &pen);
        self.append_fill(polygon, &brush);
        self.set(polygon, "points", points_string(points, offset));
    }

    fn draw_rounded_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32, radius: i32) {
        let pen = *self.pen();
        let brush = *self.brush();
        let rect = self.append_child("rect");
        self.append_stroke(rect, &pen);
        self.append_fill(rect, &brush);

        let (x, width) = normalize_extent(x, width);
        let (y, height) = normalize_extent(y, height);
        self.set(rect, "x", x.to_string());
        self.set(rect, "y", y.to_string());
        self.set(rect, "height", height.to_string());
        self.set(rect, "width", width.to_string());
        if radius != 0 {
            self.set(rect, "rx", radius.to_string());
        }
    }

    fn draw_ellipse(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let pen = *self.pen();
        let brush = *self.brush();
        let rh = height / 2;
        let rw = width / 2;

        let ellipse = self.append_child("ellipse");
        self.set(ellipse, "cx", (x + rw).to_string());
        self.set(ellipse, "cy", (y + rh).to_string());
        self.set(ellipse, "rx", rw.to_string());
        self.set(ellipse, "ry", rh.to_string());
        if brush.opacity != 1.0 {
            self.set(ellipse, "fill-opacity", format!("{:.6}", brush.opacity));
        }
        if pen.opacity != 1.0 {
            self.set(ellipse, "stroke-opacity", format!("{:.6}", pen.opacity));
        }
        if pen.width > 0 {
            self.set(ellipse, "stroke-width", pen.width.to_string());
            self.set(ellipse, "stroke", pen.colour.to_svg());
        }
    }

    fn draw_elliptic_arc(&mut self, x: i32, y: i32, width: i32, height: i32, start: f64, end: f64) {
        let pen = *self.pen();
        let brush = *self.brush();

        let rx = f64::from(width / 2);
        let ry = f64::from(height / 2);
        let xc = f64::from(x) + rx;
        let yc = f64::from(y) + ry;

        let xs = xc + rx * start.to_radians().cos();
        let xe = xc + rx * end.to_radians().cos();
        let ys = yc - ry * start.to_radians().sin();
        let ye = yc - ry * end.to_radians().sin();

        let theta1 = (ys - yc).atan2(xs - xc);
        let theta2 = (ye - yc).atan2(xe - xc);
        let large_arc = i32::from(theta2 - theta1 > 0.0);
        let sweep = i32::from((theta2 - theta1).abs() > std::f64::consts::PI);

        let path = self.append_child("path");
        self.set(
            path,
            "d",
            format!(
                "M{} {} A{} {} 0.0 {large_arc} {sweep} {} {}",
                xs as i32,
                ys as i32,
                (rx as i32).abs(),
                (ry as i32).abs(),
                xe as i32,
                ye as i32
            ),
        );
        if brush.opacity != 1.0 {
            self.set(path, "fill-opacity", format!("{:.6}", brush.opacity));
        }
        if pen.opacity != 1.0 {
            self.set(path, "stroke-opacity", format!("{:.6}", pen.opacity));
        }
        if pen.width > 0 {
            self.set(path, "stroke-width", pen.width.to_string());
            self.set(path, "stroke", pen.colour.to_svg());
        }
    }

    fn draw_quad_bezier_path(&mut self, bezier: &[Point; 3]) {
        let pen = *self.pen();
        let path = self.append_child("path");
        let [p0, p1, p2] = bezier;
        self.set(path, "d", format!("M{},{} Q{},{} {},{}", p0.x, p0.y, p1.x, p1.y, p2.x, p2.y));
        self.set(path, "fill", "none");
        self.set(path, "stroke", pen.colour.to_svg());
        self.set(path, "stroke-linecap", "round");
        self.set(path, "stroke-linejoin", "round");
        self.set(path, "stroke-width", pen.width.to_string());
        self.append_stroke_dash_array(path, &pen);
    }

    fn draw_cubic_bezier_path(&mut self, bezier: &[Point; 4]) {
        let pen = *self.pen();
        let path = self.append_child("path");
        let [p0, p1, p2, p3] = bezier;
        self.set(
            path,
            "d",
            format!("M{},{} C{},{} {},{} {},{}", p0.x, p0.y, p1.x, p1.y, p2.x, p2.y, p3.x, p3.y),
        );
        self.set(path, "fill", "none");
        self.set(path, "stroke", pen.colour.to_svg());
        self.set(path, "stroke-linecap", "round");
        self.set(path, "stroke-linejoin", "round");
        self.set(path, "stroke-width", pen.width.to_string());
        self.append_stroke_dash_array(path, &pen);
    }

    fn draw_cubic_bezier_path_filled(&mut self, bezier1: &[Point; 4], bezier2: &[Point; 4]) {
        let pen = *self.pen();
        let brush = *self.brush();
        let path = self.append_child("path");
        let [a0, a1, a2, a3] = bezier1;
        let [b0, b1, b2, _] = bezier2;
        self.set(
            path,
            "d",
            format!(
                "M{},{} C{},{} {},{} {},{} C{},{} {},{} {},{}",
                a0.x, a0.y, a1.x, a1.y, a2.x, a2.y, a3.x, a3.y, b2.x, b2.y, b1.x, b1.y, b0.x, b0.y
            ),
        );
        self.append_fill(path, &brush);
        self.set(path, "stroke", pen.colour.to_svg());
        self.set(path, "stroke-linecap", "round");
        self.set(path, "stroke-linejoin", "round");
        self.set(path, "stroke-width", pen.width.to_string());
    }

    // ── Text ────────────────────────────────────────────────────────

    fn draw_music_text(&mut self, codes: &[u32], x: i32, y: i32) -> i32 {
        let font = self.font().clone();
        let href = if self.options.remove_xlink { "href" } else { "xlink:href" };
        let resources = Arc::clone(&self.resources);
        let mut x = x;

        for &code in codes {
            let Some(glyph) = resources.glyph(code) else {
                log::warn!("Glyph {} not found in font '{}'", smufl::code_str(code), resources.font_name());
                continue;
            };
            self.used_glyphs.insert(code);

            let node = self.append_child("use");
            self.set(
                node,
                href,
                format!("#{}-{}", glyph.code_str(), self.options.glyph_id_postfix),
            );
            self.set(node, "x", x.to_string());
            self.set(node, "y", y.to_string());
            self.set(node, "height", format!("{}px", font.point_size));
            self.set(node, "width", format!("{}px", font.point_size));
            if font.width_to_height_ratio != 1.0 {
                let ratio = font.width_to_height_ratio;
                self.set(
                    node,
                    "transform",
                    format!("matrix({ratio:.6},0,0,1,{:.6},0)", f64::from(x) * (1.0 - ratio)),
                );
            }

            let advance = if glyph.horiz_adv_x() > 0 {
                glyph.horiz_adv_x()
            } else {
                glyph.bounding_box().2
            };
            x += advance * font.point_size / glyph.units_per_em();
        }
        x
    }

    fn start_text(&mut self, x: i32, y: i32, alignment: HorizontalAlignment) {
        let font = self.font().clone();
        let text = self.scene.append_element(self.current, "text");
        self.push(text);
        self.set(text, "x", x.to_string());
        self.set(text, "y", y.to_string());
        if alignment != HorizontalAlignment::Left {
            self.set(text, "text-anchor", anchor(alignment));
        }
        // 0px so that no space is added between the tspan elements
        self.set(text, "font-size", "0px");
        if !font.face_name.is_empty() {
            self.set(text, "font-family", font.face_name.clone());
        }
        self.append_font_style(text, &font);
        if font.weight == Some(crate::model::FontWeight::Bold) {
            self.set(text, "font-weight", "bold");
        }
    }

    fn move_text_to(&mut self, x: i32, y: i32, alignment: Option<HorizontalAlignment>) {
        self.set(self.current, "x", x.to_string());
        self.set(self.current, "y", y.to_string());
        if let Some(alignment) = alignment {
            self.set(self.current, "text-anchor", anchor(alignment));
        }
    }

    fn move_text_vertically_to(&mut self, y: i32) {
        self.set(self.current, "y", y.to_string());
    }

    fn draw_text(&mut self, text: &str, position: Option<Point>, bounds: Option<(i32, i32, i32, i32)>) {
        let font = self.font().clone();

        // Leading and trailing spaces would be collapsed without xml:space
        let mut content = text.to_string();
        if content.starts_with(' ') {
            content.replace_range(0..1, "\u{A0}");
        }
        if content.ends_with(' ') {
            let last = content.len() - 1;
            content.replace_range(last.., "\u{A0}");
        }

        let current_face = self.scene.attribute(self.current, "font-family").unwrap_or_default().to_string();
        let tspan = self.append_child("tspan");
        if !font.face_name.is_empty() && font.face_name != current_face {
            self.set(tspan, "font-family", font.face_name.clone());
            if font.smufl_font {
                self.text_font_used = true;
            }
        }
        if font.point_size != 0 {
            self.set(tspan, "font-size", format!("{}px", font.point_size));
        }
        self.append_font_style(tspan, &font);
        self.set(tspan, "class", "text");
        self.scene.append_text(tspan, &content);

        if let Some((x, y, width, height)) = bounds.filter(|b| b.2 != 0 && b.3 != 0) {
            let group = self
                .scene
                .parent(self.current)
                .and_then(|parent| self.scene.parent(parent))
                .unwrap_or(self.svg_node);
            let rect = self.scene.append_element(group, "rect");
            self.set(rect, "class", "sylTextRect");
            self.set(rect, "x", x.to_string());
            self.set(rect, "y", y.to_string());
            self.set(rect, "width", width.to_string());
            self.set(rect, "height", height.to_string());
            self.set(rect, "opacity", "0.0");
        } else if let Some(position) = position {
            self.set(tspan, "x", position.x.to_string());
            self.set(tspan, "y", position.y.to_string());
        }
    }

    fn end_text(&mut self) {
        self.pop();
    }

    fn add_description(&mut self, text: &str) {
        let desc = self.scene.append_element(self.current, "desc");
        self.scene.append_text(desc, text);
    }

    // ── Frame ───────────────────────────────────────────────────────

    fn set_logical_origin(&mut self, x: i32, y: i32) {
        self.origin = (-x, -y);
    }

    fn set_user_scale(&mut self, x: f64, y: f64) {
        self.user_scale = (x, y);
    }

    fn commit(&mut self, xml_declaration: bool) {
        if self.committed {
            return;
        }

        let mut width = f64::from(self.width) * self.user_scale.0;
        let mut height = f64::from(self.height) * self.user_scale.1;
        let unit = if self.options.mm_output {
            width /= 10.0;
            height /= 10.0;
            "mm"
        } else {
            "px"
        };

        if self.options.view_box {
            self.scene
                .prepend_attribute(self.svg_node, "viewBox", format!("0 0 {width} {height}"));
        } else {
            self.scene.prepend_attribute(self.svg_node, "height", format!("{height}{unit}"));
            self.scene.prepend_attribute(self.svg_node, "width", format!("{width}{unit}"));
        }

        if self.text_font_used {
            self.embed_text_font();
        }
        if !self.used_glyphs.is_empty() {
            self.embed_glyph_definitions();
        }

        let desc = self.scene.prepend_element(self.svg_node, "desc");
        self.scene
            .append_text(desc, &format!("Engraved by engravelib {}", env!("CARGO_PKG_VERSION")));

        let indent = if self.options.indent == -1 {
            "\t".to_string()
        } else {
            " ".repeat(self.options.indent.max(0) as usize)
        };
        let indent = (!self.options.format_raw).then_some(indent.as_str());
        self.output = self.scene.serialize(indent, xml_declaration);
        self.committed = true;
    }
}

fn points_string(points: &[Point], offset: Point) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x + offset.x, p.y + offset.y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Capabilities, Element, ElementData};
    use crate::resources::Glyph;
    use pretty_assertions::assert_eq;

    fn resources() -> Arc<Resources> {
        let mut resources = Resources::new("Leipzig");
        resources.add_glyph(Glyph::new(0xE952, 1000, 0, -125, 400, 250).with_advance(420));
        resources
            .set_glyph_definition(0xE952, r#"<symbol id="E952" viewBox="0 0 1000 1000"><path d="M0 0"/></symbol>"#)
            .expect("valid definition");
        Arc::new(resources)
    }

    fn device(options: SvgOptions) -> SvgDeviceContext {
        SvgDeviceContext::new(2100, 2970, options, resources())
    }

    fn note(id: &str) -> Element {
        Element::new(id, 0, 0, ElementData::Dot)
    }

    #[test]
    fn id_and_class_in_plain_mode() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.start_graphic(&note("d1"), "extra", "d1", true, false);
        let node = dc.current_node();
        assert_eq!(dc.scene().attribute(node, "id"), Some("d1"));
        assert_eq!(dc.scene().attribute(node, "class"), Some("dot extra"));
        assert_eq!(dc.scene().attribute(node, "data-id"), None);
    }

    #[test]
    fn html5_mode_uses_data_attributes() {
        let mut dc = device(SvgOptions { html5: true, ..SvgOptions::default() });
        dc.start_page();
        dc.start_graphic(&note("d1"), "", "d1", false, false);
        let node = dc.current_node();
        assert_eq!(dc.scene().attribute(node, "id"), None);
        assert_eq!(dc.scene().attribute(node, "data-id"), Some("d1"));
        assert_eq!(dc.scene().attribute(node, "data-class"), Some("dot"));
        assert_eq!(dc.scene().attribute(node, "class"), Some("dot spanning id-d1"));
    }

    #[test]
    fn empty_id_in_html5_mode_sets_only_the_class() {
        let mut dc = device(SvgOptions { html5: true, ..SvgOptions::default() });
        dc.start_page();
        dc.start_custom_graphic("notehead", "", "");
        let node = dc.current_node();
        assert_eq!(dc.scene().attribute(node, "class"), Some("notehead"));
        for attr in ["id", "data-id", "data-class"] {
            assert_eq!(dc.scene().attribute(node, attr), None, "{attr} must not be set");
        }
    }

    #[test]
    fn capabilities_become_attributes() {
        let mut element = note("d1");
        element.capabilities = Capabilities {
            color: Some("red".into()),
            label: Some("first".into()),
            lang: Some("la".into()),
            visible: Some(false),
            ..Capabilities::default()
        };
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.start_graphic(&element, "", "d1", true, false);
        let node = dc.current_node();
        let scene = dc.scene();
        assert_eq!(scene.attribute(node, "fill"), Some("red"));
        assert_eq!(scene.attribute(node, "color"), None);
        assert_eq!(scene.attribute(node, "xml:lang"), Some("la"));
        assert_eq!(scene.attribute(node, "visibility"), Some("hidden"));
        let title = scene.children(node)[0];
        assert_eq!(scene.name(title), Some("title"));
        assert_eq!(scene.attribute(title, "class"), Some("labelAttr"));
        assert_eq!(scene.text(title), "first");
    }

    #[test]
    fn leaves_are_inserted_before_groups() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.start_custom_graphic("outer", "", "");
        let outer = dc.current_node();
        dc.start_custom_graphic("inner", "", "");
        dc.end_custom_graphic();
        dc.draw_rectangle(0, 0, 10, 10);
        dc.draw_line(0, 0, 10, 10);
        let names: Vec<_> = dc
            .scene()
            .children(outer)
            .iter()
            .map(|&c| dc.scene().name(c).unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["rect", "path", "g"]);
    }

    #[test]
    fn music_text_advances_and_skips_missing_glyphs() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.set_font(FontInfo::music("Leipzig", 720));
        let end = dc.draw_music_text(&[0xE952, 0xF702, 0xE952], 100, 50);
        assert_eq!(end, 100 + 2 * 302);
        let uses: Vec<_> = dc.scene().children_named(dc.current_node(), "use").collect();
        assert_eq!(uses.len(), 2);
        assert_eq!(dc.scene().attribute(uses[0], "xlink:href"), Some("#E952-0"));
        assert_eq!(dc.scene().attribute(uses[1], "x"), Some("402"));
        assert_eq!(dc.scene().attribute(uses[1], "width"), Some("720px"));
        assert_eq!(dc.used_glyphs().collect::<Vec<_>>(), vec![0xE952]);
    }

    #[test]
    fn rectangles_are_normalised() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.set_pen(Pen::new(super::super::Colour::None, 0));
        dc.draw_rounded_rectangle(100, 100, -20, -30, 4);
        let rect = dc.scene().children_named(dc.current_node(), "rect").next().expect("a rect");
        let scene = dc.scene();
        assert_eq!(scene.attribute(rect, "x"), Some("80"));
        assert_eq!(scene.attribute(rect, "y"), Some("70"));
        assert_eq!(scene.attribute(rect, "width"), Some("20"));
        assert_eq!(scene.attribute(rect, "height"), Some("30"));
        assert_eq!(scene.attribute(rect, "rx"), Some("4"));
        assert_eq!(scene.attribute(rect, "stroke"), None);
        assert_eq!(scene.attribute(rect, "fill"), None);
    }

    #[test]
    fn filled_bezier_walks_second_curve_backwards() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        let top = [Point::new(0, 0), Point::new(1, 1), Point::new(2, 1), Point::new(3, 0)];
        let bottom = [Point::new(0, 0), Point::new(1, 2), Point::new(2, 2), Point::new(3, 0)];
        dc.draw_cubic_bezier_path_filled(&top, &bottom);
        let path = dc.scene().children_named(dc.current_node(), "path").next().expect("a path");
        assert_eq!(
            dc.scene().attribute(path, "d"),
            Some("M0,0 C1,1 2,1 3,0 C2,2 1,2 0,0")
        );
        assert_eq!(dc.scene().attribute(path, "fill"), None);
    }

    #[test]
    fn filled_bezier_takes_the_brush_colour() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.set_brush(Brush::new(super::super::Colour::Red));
        let top = [Point::new(0, 0), Point::new(1, 1), Point::new(2, 1), Point::new(3, 0)];
        let bottom = [Point::new(0, 0), Point::new(1, 2), Point::new(2, 2), Point::new(3, 0)];
        dc.draw_cubic_bezier_path_filled(&top, &bottom);
        dc.reset_brush();
        let path = dc.scene().children_named(dc.current_node(), "path").next().expect("a path");
        assert_eq!(dc.scene().attribute(path, "fill"), Some("#FF0000"));
    }

    #[test]
    fn text_runs_replace_edge_spaces() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.set_font(FontInfo { face_name: "Times".into(), point_size: 36, ..FontInfo::default() });
        dc.start_text(10, 20, HorizontalAlignment::Center);
        let text = dc.current_node();
        dc.draw_text(" la ", None, None);
        dc.end_text();
        let scene = dc.scene();
        assert_eq!(scene.attribute(text, "text-anchor"), Some("middle"));
        assert_eq!(scene.attribute(text, "font-size"), Some("0px"));
        let tspan = scene.children(text)[0];
        assert_eq!(scene.text(tspan), "\u{A0}la\u{A0}");
        // Same family as the parent text element: not repeated
        assert_eq!(scene.attribute(tspan, "font-family"), None);
        assert_eq!(scene.attribute(tspan, "font-size"), Some("36px"));
    }

    #[test]
    fn resume_graphic_falls_back_to_current_group() {
        let mut dc = device(SvgOptions::default());
        dc.start_page();
        dc.start_graphic(&note("s1"), "", "s1", true, false);
        let first = dc.current_node();
        dc.end_graphic(&note("s1"), None);
        let page = dc.current_node();

        dc.resume_graphic(&note("s1"), "s1");
        assert_eq!(dc.current_node(), first);
        dc.end_resumed_graphic(&note("s1"), None);
        assert_eq!(dc.current_node(), page);

        let depth = dc.stack_depth();
        dc.resume_graphic(&note("missing"), "missing");
        assert_eq!(dc.current_node(), page);
        assert_eq!(dc.stack_depth(), depth + 1);
        dc.end_resumed_graphic(&note("missing"), None);
        assert_eq!(dc.stack_depth(), depth);
    }
}
