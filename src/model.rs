//! Document model consumed by the engraving core.
//!
//! These structures carry the laid-out positions and the musical attributes
//! the renderers need. Positions are in layout units with y growing upwards;
//! the layout engine that computes them is external to this crate.

use std::collections::BTreeMap;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{EngraveError, Result};
use crate::geometry::{BoundingBox, CurveDir};

/// Layout units per logical unit of the output page.
pub const DEFINITION_FACTOR: i32 = 10;

fn yes() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════
// Musical vocabulary
// ═══════════════════════════════════════════════════════════════════════

/// Notation system of a staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotationType {
    #[default]
    Cmn,
    MensuralWhite,
    MensuralBlack,
}

/// Mensural duration classes, longest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duration {
    Maxima,
    Longa,
    Brevis,
    Semibrevis,
    Minima,
    Semiminima,
    Fusa,
    Semifusa,
}

impl Duration {
    /// Position on the duration scale, the maxima being -1 and the semibrevis 2.
    pub fn index(self) -> i32 {
        self as i32 - 1
    }

    /// Maxima, longa and brevis are drawn as rectangles.
    pub fn is_brevis_or_longer(self) -> bool {
        self <= Duration::Brevis
    }

    /// Flags on the stem: in black notation the semiminima gets one, in white
    /// notation the fusa does; each shorter value adds one.
    pub fn flag_count(self, mensural_black: bool) -> i32 {
        let first_flagged = if mensural_black { Duration::Minima } else { Duration::Semiminima };
        (self.index() - first_flagged.index()).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDir {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemPos {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineForm {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
            FontStyle::Oblique => "oblique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

impl FontWeight {
    pub fn as_str(self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Staff context
// ═══════════════════════════════════════════════════════════════════════

/// Per-staff drawing context supplied by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffContext {
    /// Y of the top staff line
    pub y: i32,
    /// Number of staff lines
    pub lines: i32,
    /// Half the distance between two staff lines
    pub unit: i32,
    /// Staff size in percent
    pub staff_size: i32,
    pub notation_type: NotationType,
}

impl Default for StaffContext {
    fn default() -> Self {
        Self {
            y: 0,
            lines: 5,
            unit: 9 * DEFINITION_FACTOR,
            staff_size: 100,
            notation_type: NotationType::Cmn,
        }
    }
}

impl StaffContext {
    pub fn new(y: i32, notation_type: NotationType) -> Self {
        Self {
            y,
            notation_type,
            ..Self::default()
        }
    }

    pub fn double_unit(&self) -> i32 {
        self.unit * 2
    }

    pub fn stem_width(&self) -> i32 {
        self.unit / 5
    }

    pub fn bottom(&self) -> i32 {
        self.y - self.double_unit() * (self.lines - 1)
    }

    pub fn vertical_center(&self) -> i32 {
        self.y - self.unit * (self.lines - 1)
    }

    /// Y of a staff position, 0 being the bottom line.
    pub fn y_for_loc(&self, loc: i32) -> i32 {
        self.bottom() + loc * self.unit
    }

    pub fn is_on_staff_line(&self, y: i32) -> bool {
        (y - self.y) % self.double_unit() == 0
    }

    /// Point size of the music font for this staff.
    pub fn music_font_size(&self, cue: bool) -> i32 {
        let size = self.unit * 8 * self.staff_size / 100;
        if cue {
            size * 3 / 4
        } else {
            size
        }
    }

    pub fn is_mensural(&self) -> bool {
        self.notation_type != NotationType::Cmn
    }

    pub fn is_mensural_black(&self) -> bool {
        self.notation_type == NotationType::MensuralBlack
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════════════════════════════════

/// Optional attribute groups a drawable object may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Color,
    Label,
    Lang,
    Typography,
    Visibility,
    Linking,
    Whitespace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Typography {
    pub fontfam: Option<String>,
    pub fontstyle: Option<FontStyle>,
    pub fontweight: Option<FontWeight>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Linking {
    pub follows: Option<String>,
    pub precedes: Option<String>,
}

/// The content of one capability.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeBundle {
    Color(String),
    Label(String),
    Lang(String),
    Typography(Typography),
    Visibility(bool),
    Linking(Linking),
    Whitespace(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub color: Option<String>,
    pub label: Option<String>,
    pub lang: Option<String>,
    pub typography: Option<Typography>,
    pub visible: Option<bool>,
    pub linking: Option<Linking>,
    pub space: Option<String>,
}

impl Capabilities {
    pub fn get(&self, kind: CapabilityKind) -> Option<AttributeBundle> {
        match kind {
            CapabilityKind::Color => self.color.clone().map(AttributeBundle::Color),
            CapabilityKind::Label => self.label.clone().map(AttributeBundle::Label),
            CapabilityKind::Lang => self.lang.clone().map(AttributeBundle::Lang),
            CapabilityKind::Typography => self.typography.clone().map(AttributeBundle::Typography),
            CapabilityKind::Visibility => self.visible.map(AttributeBundle::Visibility),
            CapabilityKind::Linking => self.linking.clone().map(AttributeBundle::Linking),
            CapabilityKind::Whitespace => self.space.clone().map(AttributeBundle::Whitespace),
        }
    }
}

/// Anything the output device can open a group for.
pub trait GraphicObject {
    fn id(&self) -> &str;

    /// Class name, e.g. `Note`; the device lowercases the first letter.
    fn class_name(&self) -> &str;

    /// Value of the object's `@type`, appended as an extra class.
    fn type_class(&self) -> Option<&str> {
        None
    }

    fn capability(&self, _kind: CapabilityKind) -> Option<AttributeBundle> {
        None
    }

    fn has_capability(&self, kind: CapabilityKind) -> bool {
        self.capability(kind).is_some()
    }

    /// Raw attribute value, used for the opt-in `data-*` attributes.
    fn attribute(&self, _name: &str) -> Option<String> {
        None
    }

    fn is_control_element(&self) -> bool {
        false
    }

    /// Drawn extent in layout coordinates, when known.
    fn drawing_bounding_box(&self) -> Option<BoundingBox> {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Layer elements
// ═══════════════════════════════════════════════════════════════════════

/// Kind tag of a layer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicKind {
    Note,
    Rest,
    Chord,
    Ligature,
    Mensur,
    Proport,
    Dot,
    Accidental,
    Articulation,
    Dynamic,
    Stem,
    Flag,
    Beam,
    Tuplet,
    Barline,
    Clef,
}

impl MusicKind {
    pub fn class_name(self) -> &'static str {
        match self {
            MusicKind::Note => "Note",
            MusicKind::Rest => "Rest",
            MusicKind::Chord => "Chord",
            MusicKind::Ligature => "Ligature",
            MusicKind::Mensur => "Mensur",
            MusicKind::Proport => "Proport",
            MusicKind::Dot => "Dot",
            MusicKind::Accidental => "Accid",
            MusicKind::Articulation => "Artic",
            MusicKind::Dynamic => "Dynam",
            MusicKind::Stem => "Stem",
            MusicKind::Flag => "Flag",
            MusicKind::Beam => "Beam",
            MusicKind::Tuplet => "Tuplet",
            MusicKind::Barline => "BarLine",
            MusicKind::Clef => "Clef",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plica {
    pub id: String,
    pub dir: StemDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub dur: Duration,
    /// Staff position, 0 being the bottom line
    #[serde(default)]
    pub loc: i32,
    #[serde(default)]
    pub colored: bool,
    /// Encoded stem direction
    pub stem_dir: Option<StemDir>,
    pub stem_pos: Option<StemPos>,
    #[serde(default = "yes")]
    pub stem_visible: bool,
    #[serde(default = "yes")]
    pub head_visible: bool,
    pub plica: Option<Plica>,
    #[serde(default)]
    pub dots: u8,
    #[serde(default)]
    pub grace: bool,
    /// Carries an articulation (staccato, tenuto…)
    #[serde(default)]
    pub articulation: bool,
    /// Notehead half-width, when the layout engine fixed it
    pub radius: Option<i32>,
}

impl Note {
    pub fn new(dur: Duration, loc: i32) -> Self {
        Self {
            dur,
            loc,
            colored: false,
            stem_dir: None,
            stem_pos: None,
            stem_visible: true,
            head_visible: true,
            plica: None,
            dots: 0,
            grace: false,
            articulation: false,
            radius: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub dur: Duration,
    /// Longa rest spanning two breves instead of three
    #[serde(default)]
    pub imperfect: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub stem_dir: Option<StemDir>,
    #[serde(default)]
    pub grace: bool,
    #[serde(default)]
    pub articulation: bool,
}

/// Notes of one ligature with the shapes computed by the layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ligature {
    pub notes: Vec<Element>,
    #[serde(default)]
    pub shapes: Vec<LigatureShape>,
}

impl Ligature {
    pub fn shape_at(&self, index: usize) -> LigatureShape {
        self.shapes.get(index).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MensurSign {
    O,
    C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mensur {
    pub sign: Option<MensurSign>,
    #[serde(default)]
    pub reversed: bool,
    #[serde(default)]
    pub slash: bool,
    #[serde(default)]
    pub dot: bool,
    pub num: Option<u32>,
    pub numbase: Option<u32>,
    pub loc: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proport {
    pub num: Option<u32>,
    pub numbase: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementData {
    Note(Note),
    Rest(Rest),
    Chord(Chord),
    Ligature(Ligature),
    Mensur(Mensur),
    Proport(Proport),
    Dot,
    Accidental,
    Articulation,
    Dynamic,
    Stem,
    Flag,
    Beam,
    Tuplet,
    Barline,
    Clef,
}

/// A laid-out layer element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub x: i32,
    pub y: i32,
    /// Drawn extent in absolute layout coordinates
    pub bbox: Option<BoundingBox>,
    #[serde(default, rename = "type")]
    pub type_class: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Encoded attributes, exposed through the opt-in `data-*` attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub data: ElementData,
}

macro_rules! typed_accessors {
    ($($name:ident, $name_mut:ident => $variant:ident($ty:ty);)*) => {
        $(
            pub fn $name(&self) -> Result<&$ty> {
                match &self.data {
                    ElementData::$variant(value) => Ok(value),
                    _ => Err(EngraveError::TypeMismatch { expected: MusicKind::$variant, found: self.kind() }),
                }
            }

            pub fn $name_mut(&mut self) -> Result<&mut $ty> {
                let found = self.kind();
                match &mut self.data {
                    ElementData::$variant(value) => Ok(value),
                    _ => Err(EngraveError::TypeMismatch { expected: MusicKind::$variant, found }),
                }
            }
        )*
    };
}

impl Element {
    pub fn new(id: impl Into<String>, x: i32, y: i32, data: ElementData) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            bbox: None,
            type_class: None,
            capabilities: Capabilities::default(),
            attributes: BTreeMap::new(),
            data,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn kind(&self) -> MusicKind {
        match &self.data {
            ElementData::Note(_) => MusicKind::Note,
            ElementData::Rest(_) => MusicKind::Rest,
            ElementData::Chord(_) => MusicKind::Chord,
            ElementData::Ligature(_) => MusicKind::Ligature,
            ElementData::Mensur(_) => MusicKind::Mensur,
            ElementData::Proport(_) => MusicKind::Proport,
            ElementData::Dot => MusicKind::Dot,
            ElementData::Accidental => MusicKind::Accidental,
            ElementData::Articulation => MusicKind::Articulation,
            ElementData::Dynamic => MusicKind::Dynamic,
            ElementData::Stem => MusicKind::Stem,
            ElementData::Flag => MusicKind::Flag,
            ElementData::Beam => MusicKind::Beam,
            ElementData::Tuplet => MusicKind::Tuplet,
            ElementData::Barline => MusicKind::Barline,
            ElementData::Clef => MusicKind::Clef,
        }
    }

    pub fn is(&self, kind: MusicKind) -> bool {
        self.kind() == kind
    }

    typed_accessors! {
        as_note, as_note_mut => Note(Note);
        as_rest, as_rest_mut => Rest(Rest);
        as_chord, as_chord_mut => Chord(Chord);
        as_ligature, as_ligature_mut => Ligature(Ligature);
        as_mensur, as_mensur_mut => Mensur(Mensur);
        as_proport, as_proport_mut => Proport(Proport);
    }
}

impl GraphicObject for Element {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &str {
        self.kind().class_name()
    }

    fn type_class(&self) -> Option<&str> {
        self.type_class.as_deref()
    }

    fn capability(&self, kind: CapabilityKind) -> Option<AttributeBundle> {
        self.capabilities.get(kind)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn drawing_bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
    }
}

impl GraphicObject for Plica {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &str {
        "Plica"
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Ligature shapes
// ═══════════════════════════════════════════════════════════════════════

/// How one note of a ligature is drawn, as computed by the layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LigatureShape(u8);

impl LigatureShape {
    pub const DEFAULT: LigatureShape = LigatureShape(0);
    pub const STEM_LEFT_UP: LigatureShape = LigatureShape(1);
    pub const STEM_LEFT_DOWN: LigatureShape = LigatureShape(2);
    pub const STEM_RIGHT_UP: LigatureShape = LigatureShape(4);
    pub const STEM_RIGHT_DOWN: LigatureShape = LigatureShape(8);
    pub const STACKED: LigatureShape = LigatureShape(16);
    pub const OBLIQUE: LigatureShape = LigatureShape(32);

    pub const fn from_bits(bits: u8) -> Self {
        LigatureShape(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when any bit of `other` is set.
    pub const fn intersects(self, other: LigatureShape) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LigatureShape {
    type Output = LigatureShape;
    fn bitor(self, rhs: LigatureShape) -> LigatureShape {
        LigatureShape(self.0 | rhs.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slur
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slur {
    pub id: String,
    /// Encoded curve direction, always wins over the heuristics
    pub curvedir: Option<CurveDir>,
    #[serde(default)]
    pub lform: LineForm,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Resolved direction, kept across re-layouts of split slurs
    #[serde(skip)]
    drawing_curvedir: CurveDir,
    #[serde(skip)]
    drawing_bbox: Option<BoundingBox>,
}

impl Slur {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            curvedir: None,
            lform: LineForm::Solid,
            capabilities: Capabilities::default(),
            drawing_curvedir: CurveDir::None,
            drawing_bbox: None,
        }
    }

    pub fn drawing_curvedir(&self) -> CurveDir {
        self.drawing_curvedir
    }

    pub fn set_drawing_curvedir(&mut self, dir: CurveDir) {
        self.drawing_curvedir = dir;
    }

    pub fn has_drawing_curvedir(&self) -> bool {
        self.drawing_curvedir != CurveDir::None
    }

    pub fn set_drawing_bounding_box(&mut self, bbox: Option<BoundingBox>) {
        self.drawing_bbox = bbox;
    }

    /// Forget everything computed while drawing.
    pub fn reset_drawing(&mut self) {
        self.drawing_curvedir = CurveDir::None;
        self.drawing_bbox = None;
    }
}

impl GraphicObject for Slur {
    fn id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &str {
        "Slur"
    }

    fn capability(&self, kind: CapabilityKind) -> Option<AttributeBundle> {
        self.capabilities.get(kind)
    }

    fn is_control_element(&self) -> bool {
        true
    }

    fn drawing_bounding_box(&self) -> Option<BoundingBox> {
        self.drawing_bbox
    }
}
