//! Glyph resource table.
//!
//! Metrics come from a bounding-box file (one `<g>` per glyph, in font units)
//! and each glyph may carry an embeddable `<symbol>` definition that the SVG
//! device copies into `<defs>` on commit. Both are parsed with roxmltree.
//!
//! On disk a font is laid out as:
//! - `<dir>/<Font>.xml` — bounding boxes and advances
//! - `<dir>/<Font>/<CODE>.xml` — one symbol definition per glyph
//! - `<dir>/<Font>.woff2.xml` — optional embeddable text font

use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngraveError, Result};
use crate::smufl;

// ═══════════════════════════════════════════════════════════════════════
// Glyph
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    code: u32,
    name: Option<String>,
    units_per_em: i32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    horiz_adv_x: i32,
    definition: Option<String>,
}

impl Glyph {
    pub fn new(code: u32, units_per_em: i32, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            code,
            name: None,
            units_per_em: units_per_em.max(1),
            x,
            y,
            width,
            height,
            horiz_adv_x: 0,
            definition: None,
        }
    }

    pub fn with_advance(mut self, horiz_adv_x: i32) -> Self {
        self.horiz_adv_x = horiz_adv_x;
        self
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn code_str(&self) -> String {
        smufl::code_str(self.code)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn units_per_em(&self) -> i32 {
        self.units_per_em
    }

    /// `(x, y, width, height)` in font units.
    pub fn bounding_box(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }

    pub fn horiz_adv_x(&self) -> i32 {
        self.horiz_adv_x
    }

    /// The `<symbol>` markup embedded on commit.
    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// GlyphProvider
// ═══════════════════════════════════════════════════════════════════════

/// Glyph lookup used by the renderers. The font set is an explicit input so
/// that font-dependent choices (private use glyphs) stay testable.
pub trait GlyphProvider {
    fn glyph(&self, code: u32) -> Option<&Glyph>;

    fn is_glyph_available(&self, code: u32) -> bool {
        self.glyph(code).is_some()
    }

    /// Glyph width in layout units for the given point size; 0 when missing.
    fn glyph_width(&self, code: u32, font_size: i32) -> i32 {
        self.glyph(code)
            .map(|g| g.width * font_size / g.units_per_em)
            .unwrap_or(0)
    }

    fn glyph_height(&self, code: u32, font_size: i32) -> i32 {
        self.glyph(code)
            .map(|g| g.height * font_size / g.units_per_em)
            .unwrap_or(0)
    }

    /// Horizontal advance in layout units, falling back to the width.
    fn glyph_advance(&self, code: u32, font_size: i32) -> i32 {
        self.glyph(code)
            .map(|g| {
                let adv = if g.horiz_adv_x > 0 { g.horiz_adv_x } else { g.width };
                adv * font_size / g.units_per_em
            })
            .unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Resources {
    font_name: String,
    glyphs: HashMap<u32, Glyph>,
    text_font: Option<String>,
}

impl Resources {
    pub fn new(font_name: impl Into<String>) -> Self {
        Self {
            font_name: font_name.into(),
            ..Self::default()
        }
    }

    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn add_glyph(&mut self, glyph: Glyph) {
        self.glyphs.insert(glyph.code, glyph);
    }

    /// Parse a bounding-box file:
    /// `<bounding-boxes font-family=".." units-per-em=".."><g c="E050" x=".." y=".." w=".." h=".." h-a-x=".."/>`.
    pub fn from_metrics_xml(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        let font_name = root.attribute("font-family").unwrap_or_default();
        let units_per_em = root
            .attribute("units-per-em")
            .and_then(|v| v.parse::<f64>().ok())
            .map_or(1000, |v| v as i32);

        let mut resources = Resources::new(font_name);
        for node in root.children().filter(|n| n.has_tag_name("g")) {
            let Some(code) = node.attribute("c").and_then(|c| u32::from_str_radix(c, 16).ok()) else {
                log::warn!("Skipping glyph entry without a valid code in font '{font_name}'");
                continue;
            };
            let num = |name: &str| {
                node.attribute(name)
                    .and_then(|v| v.parse::<f64>().ok())
                    .map_or(0, |v| v.round() as i32)
            };
            let mut glyph = Glyph::new(code, units_per_em, num("x"), num("y"), num("w"), num("h"))
                .with_advance(num("h-a-x"));
            glyph.name = node.attribute("n").map(str::to_string);
            resources.add_glyph(glyph);
        }
        Ok(resources)
    }

    /// Attach the `<symbol>` markup of a glyph. The markup is validated now so
    /// that commit never meets malformed definitions.
    pub fn set_glyph_definition(&mut self, code: u32, xml: impl Into<String>) -> Result<()> {
        let xml = xml.into();
        roxmltree::Document::parse(&xml)?;
        let glyph = self.glyphs.get_mut(&code).ok_or(EngraveError::MissingGlyph(code))?;
        glyph.definition = Some(xml);
        Ok(())
    }

    /// Markup of the embeddable text font (`<style>` with an `@font-face`).
    pub fn set_text_font(&mut self, xml: impl Into<String>) -> Result<()> {
        let xml = xml.into();
        roxmltree::Document::parse(&xml)?;
        self.text_font = Some(xml);
        Ok(())
    }

    pub fn text_font(&self) -> Option<&str> {
        self.text_font.as_deref()
    }

    /// Load a font from a resource directory.
    pub fn load_dir<P: AsRef<Path>>(dir: P, font_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let metrics_path = dir.join(format!("{font_name}.xml"));
        let metrics = std::fs::read_to_string(&metrics_path).map_err(|e| {
            EngraveError::Resource(format!("Failed to read '{}': {e}", metrics_path.display()))
        })?;
        let mut resources = Self::from_metrics_xml(&metrics)?;
        if resources.font_name.is_empty() {
            resources.font_name = font_name.to_string();
        }

        let glyph_dir = dir.join(font_name);
        let codes: Vec<u32> = resources.glyphs.keys().copied().collect();
        for code in codes {
            let path = glyph_dir.join(format!("{}.xml", smufl::code_str(code)));
            match std::fs::read_to_string(&path) {
                Ok(xml) => resources.set_glyph_definition(code, xml)?,
                Err(_) => log::warn!("No definition for glyph {} in '{}'", smufl::code_str(code), glyph_dir.display()),
            }
        }

        let woff_path = dir.join(format!("{font_name}.woff2.xml"));
        if let Ok(xml) = std::fs::read_to_string(&woff_path) {
            resources.set_text_font(xml)?;
        }
        Ok(resources)
    }
}

impl GlyphProvider for Resources {
    fn glyph(&self, code: u32) -> Option<&Glyph> {
        self.glyphs.get(&code)
    }
}
