//! Rendering options.
//!
//! All fields have defaults so a partial JSON document is enough:
//!
//! ```
//! let options = engravelib::EngraveOptions::from_json(r#"{ "svg": { "html5": true } }"#).unwrap();
//! assert!(options.svg.html5);
//! assert_eq!(options.svg.indent, 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngraveOptions {
    pub svg: SvgOptions,
    /// Prefer precomposed mensural glyphs over constructed geometry
    pub use_glyph_mensural: bool,
    pub slur: SlurOptions,
}

impl EngraveOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SVG output
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgOptions {
    /// Write width and height in millimetres instead of pixels
    pub mm_output: bool,
    /// Add a transparent rectangle for each object's bounding box
    pub bounding_boxes: bool,
    /// Write a viewBox instead of width and height
    pub view_box: bool,
    /// Use `data-id`/`data-class` so the output can be embedded in HTML
    pub html5: bool,
    /// No indentation or line breaks
    pub format_raw: bool,
    /// Write `href` instead of `xlink:href`
    pub remove_xlink: bool,
    /// Page-sized definition scale, for facsimile rendering
    pub facsimile: bool,
    /// Spaces per indentation level, -1 for a tab
    pub indent: i32,
    /// Custom CSS added in a `<style>` element
    pub css: String,
    /// Add the default page stylesheet
    pub global_styling: bool,
    /// `class@attribute` pairs written as `data-attribute`, e.g. `note@pname`
    pub additional_attributes: Vec<String>,
    /// Suffix of glyph ids in `<defs>`, keeps ids unique across embedded SVGs
    pub glyph_id_postfix: String,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            mm_output: false,
            bounding_boxes: false,
            view_box: false,
            html5: false,
            format_raw: false,
            remove_xlink: false,
            facsimile: false,
            indent: 2,
            css: String::new(),
            global_styling: false,
            additional_attributes: Vec::new(),
            glyph_id_postfix: "0".to_string(),
        }
    }
}

impl SvgOptions {
    /// Attributes requested for a class, matched case-insensitively.
    pub fn additional_attributes_for<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.additional_attributes.iter().filter_map(move |entry| {
            let (class, attr) = entry.split_once('@')?;
            class.eq_ignore_ascii_case(class_name).then_some(attr)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slurs
// ═══════════════════════════════════════════════════════════════════════

/// Slur shaping parameters. Lengths are in staff units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurOptions {
    /// Clearance kept between a slur and the elements below it
    pub margin: f64,
    /// Initial height as a fraction of the chord length
    pub height_factor: f64,
    pub min_height: f64,
    pub max_height: f64,
    /// Largest height relative to the chord length after reshaping
    pub curvature_ratio: f64,
    /// Smallest ratio of the lower control height to the higher one
    pub symmetry: f64,
    /// Largest slope of the anchor chord, in degrees
    pub max_slope: f64,
    /// Cap on the end-point shift
    pub max_endpoint_shift: f64,
    /// Bound of the control-point height search
    pub max_control_shift: f64,
    /// Rotation applied when balancing end tangents, in degrees
    pub tangent_rotation: f64,
    pub midpoint_thickness: f64,
    pub endpoint_thickness: f64,
}

impl Default for SlurOptions {
    fn default() -> Self {
        Self {
            margin: 1.0,
            height_factor: 0.15,
            min_height: 1.2,
            max_height: 3.0,
            curvature_ratio: 0.4,
            symmetry: 0.5,
            max_slope: 60.0,
            max_endpoint_shift: 4.0,
            max_control_shift: 12.0,
            tangent_rotation: 10.0,
            midpoint_thickness: 0.6,
            endpoint_thickness: 0.1,
        }
    }
}

impl SlurOptions {
    /// Convert a length in staff units to layout units.
    pub fn to_layout(&self, value: f64, unit: i32) -> i32 {
        (value * f64::from(unit)).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = EngraveOptions::from_json(r#"{ "use_glyph_mensural": true, "slur": { "margin": 1.5 } }"#)
            .expect("valid options");
        assert!(options.use_glyph_mensural);
        assert_eq!(options.slur.margin, 1.5);
        assert_eq!(options.slur.max_slope, 60.0);
        assert_eq!(options.svg, SvgOptions::default());
    }

    #[test]
    fn invalid_json_is_an_options_error() {
        let err = EngraveOptions::from_json(r#"{ "svg": { "indent": "wide" } }"#).unwrap_err();
        assert!(matches!(err, crate::EngraveError::Options(_)));
    }

    #[test]
    fn json_round_trip() {
        let mut options = EngraveOptions::default();
        options.svg.additional_attributes = vec!["note@pname".into()];
        let json = options.to_json().expect("serializable");
        assert_eq!(EngraveOptions::from_json(&json).expect("parsable"), options);
    }

    #[test]
    fn additional_attributes_match_by_class() {
        let svg = SvgOptions {
            additional_attributes: vec!["note@pname".into(), "Note@oct".into(), "rest@dur".into(), "broken".into()],
            ..SvgOptions::default()
        };
        let attrs: Vec<&str> = svg.additional_attributes_for("Note").collect();
        assert_eq!(attrs, vec!["pname", "oct"]);
    }
}
