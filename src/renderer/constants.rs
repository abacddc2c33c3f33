//! Shared constants for the renderers. Lengths are in staff units unless
//! noted otherwise.

// ── Mensural notes ──────────────────────────────────────────────────
pub(super) const STANDARD_STEM_LENGTH: i32 = 7;
pub(super) const BLACK_BREVIS_HEIGHT_FACTOR: f64 = 0.8;
pub(super) const WHITE_BREVIS_HEIGHT_FACTOR: f64 = 1.0;
/// Stroke of hollow noteheads, relative to the stem width
pub(super) const STROKE_WIDTH_FACTOR: f64 = 2.8;
pub(super) const LIGATURE_STEM_WHITE: i32 = 7;
pub(super) const LIGATURE_STEM_BLACK: i32 = 5;
pub(super) const PLICA_SHORT_STEM_WHITE: f64 = 3.5;
pub(super) const PLICA_SHORT_STEM_BLACK: f64 = 2.5;
pub(super) const STEM_SHORTENING: f64 = 0.9;
/// Fallback notehead half-width of short values when the font has no glyph
pub(super) const NOTEHEAD_RADIUS: f64 = 0.9;

// ── Ligatures ───────────────────────────────────────────────────────
pub(super) const OBLIQUE_ADJUSTMENT_BLACK: f64 = 0.5;
pub(super) const OBLIQUE_ADJUSTMENT_WHITE: f64 = 1.8;
/// Overlap of the two halves of an oblique, in layout units
pub(super) const OBLIQUE_OVERLAP: i32 = 10;

// ── Mensuration and proportion signs ────────────────────────────────
pub(super) const MENSUR_NUM_OFFSET: i32 = 6;
pub(super) const PROPORT_NUM_OFFSET: i32 = 5;

// ── Slurs ───────────────────────────────────────────────────────────
/// Relative chord position within which an obstacle moves an end point
pub(super) const SLUR_END_ZONE: f64 = 0.15;
/// Relative chord position within which an obstacle sits on an anchor
pub(super) const SLUR_ANCHOR_ZONE: f64 = 0.02;
/// Samples taken along the curve-facing edge of an obstacle
pub(super) const SLUR_CHECK_POINTS: usize = 5;
/// Smallest control-point offset, as a fraction of the chord
pub(super) const SLUR_MIN_OFFSET_RATIO: f64 = 0.1;
/// Distance between a slur end and the note it is attached to
pub(super) const SLUR_ANCHOR_GAP: f64 = 1.0;
/// Extra room left for the articulation under a centred portato slur
pub(super) const SLUR_PORTATO_GAP: f64 = 2.0;
/// Distance from the staff of the ends of a slur crossing a whole system
pub(super) const SLUR_MIDDLE_OFFSET: i32 = 2;
pub(super) const SLUR_DASH_LENGTH: i32 = 3;
/// End tangents whose slopes differ by more than this factor are balanced
pub(super) const SLUR_TANGENT_RATIO: f64 = 2.0;
