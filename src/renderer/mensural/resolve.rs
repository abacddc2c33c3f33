//! Shape decisions for mensural notation.
//!
//! Each resolver takes a laid-out element and returns what has to be drawn:
//! SMuFL glyph placements or constructed primitives, sorted into the parts
//! the device wraps them in. Nothing here touches a device, so the glyph and
//! geometry choices can be checked on their own.
//!
//! All coordinates are layout coordinates (y grows upwards).

use crate::error::{EngraveError, Result};
use crate::geometry::Point;
use crate::model::{
    Duration, Element, Ligature, LigatureShape, MensurSign, Note, Rest, StaffContext, StemDir, StemPos,
};
use crate::renderer::constants::{
    BLACK_BREVIS_HEIGHT_FACTOR, LIGATURE_STEM_BLACK, LIGATURE_STEM_WHITE, MENSUR_NUM_OFFSET, NOTEHEAD_RADIUS,
    OBLIQUE_ADJUSTMENT_BLACK, OBLIQUE_ADJUSTMENT_WHITE, OBLIQUE_OVERLAP, PLICA_SHORT_STEM_BLACK,
    PLICA_SHORT_STEM_WHITE, PROPORT_NUM_OFFSET, STANDARD_STEM_LENGTH, STEM_SHORTENING, STROKE_WIDTH_FACTOR,
    WHITE_BREVIS_HEIGHT_FACTOR,
};
use crate::resources::GlyphProvider;
use crate::smufl;

pub const NOTEHEAD: &str = "notehead";
pub const STEM: &str = "stem";
pub const DOT: &str = "dot";

// ═══════════════════════════════════════════════════════════════════════
// Rendering description
// ═══════════════════════════════════════════════════════════════════════

/// How mensural shapes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Precomposed glyphs wherever the font has one that fits
    PreferGlyph,
    /// Rectangles and oblique polygons; noteheads of short values stay glyphs
    #[default]
    ConstructGeometry,
}

/// One drawing primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderItem {
    Glyph { code: u32, x: i32, y: i32 },
    Rectangle { x1: i32, y1: i32, x2: i32, y2: i32 },
    RoundedRectangle { x1: i32, y1: i32, x2: i32, y2: i32, radius: i32 },
    /// Parallelogram over the segment, extended vertically by `height`
    Oblique { x1: i32, y1: i32, x2: i32, y2: i32, height: i32 },
    Circle { x: i32, y: i32, radius: i32 },
}

/// Items drawn inside one structural group (`notehead`, `stem`, `dot`), or
/// directly in the element's group when `group` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderPart {
    pub group: Option<&'static str>,
    pub items: Vec<RenderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MensuralRendering {
    pub parts: Vec<RenderPart>,
    /// Horizontal space taken by the glyphs, carried to the next ligature note
    pub advance: i32,
}

impl MensuralRendering {
    fn single(group: Option<&'static str>, items: Vec<RenderItem>) -> Self {
        let mut rendering = Self::default();
        rendering.push(group, items);
        rendering
    }

    fn push(&mut self, group: Option<&'static str>, items: Vec<RenderItem>) {
        if !items.is_empty() {
            self.parts.push(RenderPart { group, items });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|part| part.items.is_empty())
    }

    pub fn items(&self) -> impl Iterator<Item = &RenderItem> {
        self.parts.iter().flat_map(|part| part.items.iter())
    }

    /// Glyph codes in drawing order.
    pub fn glyphs(&self) -> Vec<u32> {
        self.items()
            .filter_map(|item| match item {
                RenderItem::Glyph { code, .. } => Some(*code),
                _ => None,
            })
            .collect()
    }

    pub fn part(&self, group: &str) -> Option<&RenderPart> {
        self.parts.iter().find(|part| part.group == Some(group))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Context
// ═══════════════════════════════════════════════════════════════════════

/// Staff, strategy and font set one resolution runs against.
#[derive(Clone, Copy)]
pub struct MensuralContext<'a> {
    pub staff: &'a StaffContext,
    pub strategy: Strategy,
    pub glyphs: &'a dyn GlyphProvider,
}

impl<'a> MensuralContext<'a> {
    pub fn new(staff: &'a StaffContext, strategy: Strategy, glyphs: &'a dyn GlyphProvider) -> Self {
        Self {
            staff,
            strategy,
            glyphs,
        }
    }

    fn prefers_glyph(&self) -> bool {
        self.strategy == Strategy::PreferGlyph
    }

    fn unit(&self) -> i32 {
        self.staff.unit
    }

    fn font_size(&self) -> i32 {
        self.staff.music_font_size(false)
    }

    fn is_available(&self, code: u32) -> bool {
        self.glyphs.is_glyph_available(code)
    }

    fn glyph_width(&self, code: u32) -> i32 {
        self.glyphs.glyph_width(code, self.font_size())
    }

    fn glyph_advance(&self, code: u32) -> i32 {
        self.glyphs.glyph_advance(code, self.font_size())
    }

    /// Notehead half-width: the layout value when set, otherwise half the
    /// width of the matching glyph.
    pub fn note_radius(&self, note: &Note) -> i32 {
        if let Some(radius) = note.radius {
            return radius;
        }
        let unit = self.unit();
        let (code, fallback) = match note.dur {
            Duration::Maxima => (smufl::MENSURAL_BLACK_MAXIMA, 2 * unit),
            Duration::Longa | Duration::Brevis => (smufl::MENSURAL_BLACK_BREVIS, unit),
            _ => (
                smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_BLACK,
                (NOTEHEAD_RADIUS * f64::from(unit)) as i32,
            ),
        };
        match self.glyph_width(code) {
            0 => fallback,
            width => width / 2,
        }
    }

    fn head(&self, element: &Element, x: i32) -> Result<NoteHead> {
        let note = element.as_note()?;
        Ok(NoteHead {
            x,
            y: element.y,
            radius: self.note_radius(note),
        })
    }
}

/// Position and half-width of a notehead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHead {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
}

fn fill_notehead(mensural_black: bool, colored: bool) -> bool {
    mensural_black != colored
}

// ═══════════════════════════════════════════════════════════════════════
// Notes
// ═══════════════════════════════════════════════════════════════════════

/// Stem direction of a mensural note: encoded, then the layer's, then by
/// duration and position on the staff.
pub fn mensural_stem_dir(note: &Note, y: i32, layer_stem_dir: Option<StemDir>, staff: &StaffContext) -> StemDir {
    if let Some(dir) = note.stem_dir.or(layer_stem_dir) {
        return dir;
    }
    if note.dur < Duration::Semibrevis || y > staff.vertical_center() {
        StemDir::Down
    } else {
        StemDir::Up
    }
}

/// A note outside a ligature. Invisible noteheads resolve to nothing, and
/// neither do their plicas.
pub fn resolve_note(
    element: &Element,
    layer_stem_dir: Option<StemDir>,
    ctx: &MensuralContext,
) -> Result<MensuralRendering> {
    let note = element.as_note()?;
    if !note.head_visible {
        return Ok(MensuralRendering::default());
    }
    if note.dur.is_brevis_or_longer() {
        Ok(resolve_maxima_to_brevis(element, note, ctx))
    } else {
        Ok(resolve_semibrevis_and_shorter(element, note, layer_stem_dir, ctx))
    }
}

fn maxima_to_brevis_glyph(note: &Note) -> u32 {
    match note.dur {
        Duration::Maxima => smufl::MENSURAL_BLACK_MAXIMA,
        Duration::Longa if note.stem_dir == Some(StemDir::Up) => {
            if note.stem_pos == Some(StemPos::Left) {
                smufl::MENSURAL_BLACK_LONGA_STEM_UP_LEFT
            } else {
                smufl::MENSURAL_BLACK_LONGA_STEM_UP_RIGHT
            }
        }
        Duration::Longa => smufl::MENSURAL_BLACK_LONGA,
        _ if note.stem_dir == Some(StemDir::Down) && note.stem_pos == Some(StemPos::Left) => {
            smufl::MENSURAL_BLACK_BREVIS_STEM_DOWN_LEFT
        }
        _ => smufl::MENSURAL_BLACK_BREVIS,
    }
}

fn resolve_maxima_to_brevis(element: &Element, note: &Note, ctx: &MensuralContext) -> MensuralRendering {
    if ctx.prefers_glyph() {
        // The plica glyph carries the whole note
        if let Some(code) = plica_glyph(note, false) {
            if ctx.is_available(code) {
                return MensuralRendering::default();
            }
        }
        let code = maxima_to_brevis_glyph(note);
        if ctx.is_available(code) {
            return MensuralRendering::single(
                Some(NOTEHEAD),
                vec![RenderItem::Glyph {
                    code,
                    x: element.x,
                    y: element.y,
                }],
            );
        }
        log::debug!("No glyph for '{}', constructing it", element.id);
    }

    let staff = ctx.staff;
    let stem_width = staff.stem_width();
    let stroke_width = (STROKE_WIDTH_FACTOR * f64::from(stem_width)) as i32;
    let fill = fill_notehead(staff.is_mensural_black(), note.colored);

    let shape = if note.dur == Duration::Brevis {
        LigatureShape::DEFAULT
    } else if note.stem_dir == Some(StemDir::Up) {
        LigatureShape::STEM_RIGHT_UP
    } else {
        LigatureShape::STEM_RIGHT_DOWN
    };
    let head = NoteHead {
        x: element.x,
        y: element.y,
        radius: ctx.note_radius(note),
    };
    let BrevisPoints {
        top_left,
        bottom_right,
        sides,
    } = calc_brevis_points(head, shape, staff);

    let mut notehead = if fill {
        vec![RenderItem::Rectangle {
            x1: top_left.x + stem_width,
            y1: top_left.y,
            x2: bottom_right.x - stem_width,
            y2: bottom_right.y,
        }]
    } else {
        vec![
            RenderItem::Oblique {
                x1: top_left.x + stem_width,
                y1: top_left.y,
                x2: bottom_right.x - stem_width,
                y2: top_left.y,
                height: -stroke_width,
            },
            RenderItem::Oblique {
                x1: top_left.x + stem_width,
                y1: bottom_right.y,
                x2: bottom_right.x - stem_width,
                y2: bottom_right.y,
                height: stroke_width,
            },
        ]
    };

    let mut rendering = MensuralRendering::default();
    if note.plica.is_some() {
        // The plica draws the sides
        rendering.push(Some(NOTEHEAD), notehead);
        return rendering;
    }

    notehead.push(RenderItem::Rectangle {
        x1: top_left.x,
        y1: sides[0],
        x2: top_left.x + stem_width,
        y2: sides[1],
    });
    let right = RenderItem::Rectangle {
        x1: bottom_right.x - stem_width,
        y1: sides[2],
        x2: bottom_right.x,
        y2: sides[3],
    };
    if note.dur == Duration::Brevis {
        notehead.push(right);
        rendering.push(Some(NOTEHEAD), notehead);
    } else {
        rendering.push(Some(NOTEHEAD), notehead);
        rendering.push(Some(STEM), vec![right]);
    }
    rendering
}

fn short_note_glyph(note: &Note) -> Option<u32> {
    let explicit_down = note.stem_dir == Some(StemDir::Down);
    match note.dur {
        Duration::Semibrevis if explicit_down => Some(smufl::MENSURAL_BLACK_SEMIBREVIS_CAUDATA),
        Duration::Semibrevis => Some(smufl::MENSURAL_BLACK_SEMIBREVIS),
        Duration::Minima if explicit_down => Some(smufl::MENSURAL_BLACK_MINIMA_STEM_DOWN),
        Duration::Minima => Some(smufl::MENSURAL_BLACK_MINIMA),
        Duration::Semiminima => Some(smufl::MENSURAL_BLACK_SEMIMINIMA),
        Duration::Fusa => Some(smufl::MENSURAL_BLACK_FUSA),
        _ => None,
    }
}

/// Notehead glyph used under a constructed stem.
pub fn mensural_notehead_glyph(note: &Note, mensural_black: bool) -> u32 {
    if mensural_black {
        return if note.colored {
            smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_VOID
        } else {
            smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_BLACK
        };
    }
    match (note.colored, note.dur) {
        (false, Duration::Semibrevis) => smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_VOID,
        (false, Duration::Minima) => smufl::MENSURAL_NOTEHEAD_MINIMA_WHITE,
        (false, _) => smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_BLACK,
        (true, Duration::Semibrevis | Duration::Minima) => smufl::MENSURAL_NOTEHEAD_SEMIBREVIS_BLACK,
        (true, _) => smufl::MENSURAL_NOTEHEAD_SEMIMINIMA_WHITE,
    }
}

fn resolve_semibrevis_and_shorter(
    element: &Element,
    note: &Note,
    layer_stem_dir: Option<StemDir>,
    ctx: &MensuralContext,
) -> MensuralRendering {
    let (x, y) = (element.x, element.y);

    if ctx.prefers_glyph() {
        match short_note_glyph(note).filter(|&code| ctx.is_available(code)) {
            Some(code) => {
                return MensuralRendering::single(Some(NOTEHEAD), vec![RenderItem::Glyph { code, x, y }]);
            }
            None => log::debug!("No glyph for '{}', constructing it", element.id),
        }
    }

    let staff = ctx.staff;
    let code = mensural_notehead_glyph(note, staff.is_mensural_black());
    let mut rendering = MensuralRendering::single(Some(NOTEHEAD), vec![RenderItem::Glyph { code, x, y }]);

    // A semibrevis only gets a stem when one is encoded
    if (note.dur > Duration::Semibrevis || note.stem_dir.is_some()) && note.stem_visible {
        let dir = mensural_stem_dir(note, y, layer_stem_dir, staff);
        let stem = mensural_stem(note.dur, dir, ctx.note_radius(note), x, y, staff);
        rendering.parts.push(stem);
    }
    rendering
}

/// Stem and flags of a note, in a `stem` part. The stem never ends on the
/// near side of the staff centre.
pub fn mensural_stem(dur: Duration, dir: StemDir, radius: i32, x: i32, y: i32, staff: &StaffContext) -> RenderPart {
    let unit = staff.unit;
    let vertical_center = staff.vertical_center();
    let flag_height = staff.double_unit();
    let flags = dur.flag_count(staff.is_mensural_black());

    let mut base_stem = unit * STANDARD_STEM_LENGTH;
    let mut flag_stem_height = flag_height * (flags * 2 - 1) / 2;
    if dir == StemDir::Down {
        base_stem = -base_stem;
        flag_stem_height = -flag_stem_height;
    }

    let mut y2 = if flags > 0 {
        y + base_stem + flag_stem_height
    } else {
        y + base_stem
    };
    if (dir == StemDir::Up && y2 < vertical_center) || (dir == StemDir::Down && y2 > vertical_center) {
        y2 = vertical_center;
    }

    let x2 = x + radius;
    let shortening = (STEM_SHORTENING * f64::from(unit)) as i32;
    let stem_y1 = if dir == StemDir::Up { y + shortening } else { y - shortening };
    let half_stem_width = staff.stem_width() / 2;

    let items = if flags > 0 {
        (0..flags)
            .map(|i| match dir {
                StemDir::Up => RenderItem::Glyph {
                    code: smufl::MENSURAL_COMB_STEM_UP_FLAG_SEMIMINIMA,
                    x: x2 - half_stem_width,
                    y: stem_y1 - i * flag_height,
                },
                StemDir::Down => RenderItem::Glyph {
                    code: smufl::MENSURAL_COMB_STEM_DOWN_FLAG_SEMIMINIMA,
                    x: x2 - half_stem_width,
                    y: stem_y1 + i * flag_height,
                },
            })
            .collect()
    } else {
        vec![RenderItem::Rectangle {
            x1: x2 - half_stem_width,
            y1: stem_y1,
            x2: x2 + half_stem_width,
            y2,
        }]
    };

    RenderPart {
        group: Some(STEM),
        items,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rests, mensuration and proportion signs
// ═══════════════════════════════════════════════════════════════════════

pub fn rest_glyph(rest: &Rest) -> u32 {
    match rest.dur {
        Duration::Maxima => smufl::MENSURAL_REST_MAXIMA,
        Duration::Longa if rest.imperfect => smufl::MENSURAL_REST_LONGA_IMPERFECTA,
        Duration::Longa => smufl::MENSURAL_REST_LONGA_PERFECTA,
        Duration::Brevis => smufl::MENSURAL_REST_BREVIS,
        Duration::Semibrevis => smufl::MENSURAL_REST_SEMIBREVIS,
        Duration::Minima => smufl::MENSURAL_REST_MINIMA,
        Duration::Semiminima => smufl::MENSURAL_REST_SEMIMINIMA,
        Duration::Fusa => smufl::MENSURAL_REST_FUSA,
        Duration::Semifusa => smufl::MENSURAL_REST_SEMIFUSA,
    }
}

pub fn resolve_rest(element: &Element, _ctx: &MensuralContext) -> Result<MensuralRendering> {
    let rest = element.as_rest()?;
    Ok(MensuralRendering::single(
        None,
        vec![RenderItem::Glyph {
            code: rest_glyph(rest),
            x: element.x,
            y: element.y,
        }],
    ))
}

/// A mensuration sign with its optional slash, dot and numbers. Signs
/// without a sign glyph resolve to nothing.
pub fn resolve_mensur(element: &Element, ctx: &MensuralContext) -> Result<MensuralRendering> {
    let mensur = element.as_mensur()?;
    let Some(sign) = mensur.sign else {
        return Ok(MensuralRendering::default());
    };

    let staff = ctx.staff;
    let x = element.x;
    let y = match mensur.loc {
        Some(loc) => staff.y_for_loc(loc),
        None => staff.vertical_center(),
    };
    let code = match sign {
        MensurSign::O => smufl::MENSURAL_PROLATION_2,
        MensurSign::C if mensur.reversed => smufl::MENSURAL_PROLATION_7,
        MensurSign::C => smufl::MENSURAL_PROLATION_6,
    };

    let mut items = vec![RenderItem::Glyph { code, x, y }];
    let center = x + ctx.glyph_width(smufl::MENSURAL_PROLATION_1) / 2;
    let combining = [
        (mensur.slash, smufl::MENSURAL_PROLATION_COMBINING_STROKE),
        (mensur.dot, smufl::MENSURAL_PROLATION_COMBINING_DOT),
    ];
    for (_, code) in combining.into_iter().filter(|(present, _)| *present) {
        items.push(RenderItem::Glyph {
            code,
            x: center - ctx.glyph_width(code) / 2,
            y,
        });
    }

    if let Some(num) = mensur.num {
        let x = x + ctx.unit() * MENSUR_NUM_OFFSET;
        items.extend(proport_figures(x, y, num, mensur.numbase.unwrap_or(0), ctx));
    }
    Ok(MensuralRendering::single(None, items))
}

pub fn resolve_proport(element: &Element, ctx: &MensuralContext) -> Result<MensuralRendering> {
    let proport = element.as_proport()?;
    let Some(num) = proport.num else {
        return Ok(MensuralRendering::default());
    };
    let x = element.x + ctx.unit() * PROPORT_NUM_OFFSET;
    let items = proport_figures(x, ctx.staff.vertical_center(), num, proport.numbase.unwrap_or(0), ctx);
    Ok(MensuralRendering::single(None, items))
}

/// Numerator and denominator figures centred on `x`; `numbase` 0 puts the
/// numerator alone on `y`.
pub fn proport_figures(x: i32, y: i32, num: u32, numbase: u32, ctx: &MensuralContext) -> Vec<RenderItem> {
    let unit = ctx.unit();
    let (ynum, yden) = if numbase != 0 {
        (y + 2 * unit, y - 2 * unit)
    } else {
        (y, y)
    };
    let x = if num > 9 || numbase > 9 { x + 2 * unit } else { x };

    let mut items = centered_figures(x, ynum, num, ctx);
    if numbase != 0 {
        items.extend(centered_figures(x, yden, numbase, ctx));
    }
    items
}

fn centered_figures(x: i32, y: i32, value: u32, ctx: &MensuralContext) -> Vec<RenderItem> {
    let codes = smufl::time_sig_figures(value);
    let width: i32 = codes.iter().map(|&code| ctx.glyph_advance(code)).sum();
    let mut cursor = x - width / 2;
    codes
        .into_iter()
        .map(|code| {
            let item = RenderItem::Glyph { code, x: cursor, y };
            cursor += ctx.glyph_advance(code);
            item
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Plica
// ═══════════════════════════════════════════════════════════════════════

fn plica_glyph(note: &Note, in_ligature: bool) -> Option<u32> {
    let plica = note.plica.as_ref()?;
    let up = plica.dir == StemDir::Up;
    let code = match (note.dur == Duration::Longa, up) {
        (true, true) => smufl::PLICA_BLACK_LONGA_ASC,
        (true, false) => smufl::PLICA_BLACK_LONGA_DESC,
        (false, true) if in_ligature => smufl::MENSURAL_COMB_STEM_UP,
        (false, true) => smufl::PLICA_BLACK_BREVIS_ASC,
        (false, false) if in_ligature => smufl::MENSURAL_COMB_STEM_DOWN,
        (false, false) => smufl::PLICA_BLACK_BREVIS_DESC,
    };
    Some(code)
}

/// The plica of a note drawn at `x`, `None` when the note has none or its
/// head is hidden.
pub fn resolve_plica(
    element: &Element,
    x: i32,
    in_ligature: bool,
    ctx: &MensuralContext,
) -> Result<Option<MensuralRendering>> {
    let note = element.as_note()?;
    let Some(plica) = note.plica.as_ref().filter(|_| note.head_visible) else {
        return Ok(None);
    };
    let y = element.y;

    if ctx.prefers_glyph() {
        if let Some(code) = plica_glyph(note, in_ligature).filter(|&code| ctx.is_available(code)) {
            return Ok(Some(MensuralRendering::single(
                Some(NOTEHEAD),
                vec![RenderItem::Glyph { code, x, y }],
            )));
        }
    }

    let staff = ctx.staff;
    let unit = staff.unit;
    let black = staff.is_mensural_black();
    let stem_width = staff.stem_width();
    let head = NoteHead {
        x,
        y,
        radius: ctx.note_radius(note),
    };
    let BrevisPoints {
        top_left,
        bottom_right,
        sides,
    } = calc_brevis_points(head, LigatureShape::DEFAULT, staff);

    let stem = unit * if black { LIGATURE_STEM_BLACK } else { LIGATURE_STEM_WHITE };
    let short_stem = (f64::from(unit) * if black { PLICA_SHORT_STEM_BLACK } else { PLICA_SHORT_STEM_WHITE }) as i32;
    // Longa: short stem left, long right; brevis the other way around
    let (left, right) = if note.dur == Duration::Longa {
        (short_stem, stem)
    } else {
        (stem, short_stem)
    };
    let (side, sign) = if plica.dir == StemDir::Up { (sides[1], 1) } else { (sides[0], -1) };

    let items = vec![
        RenderItem::Rectangle {
            x1: top_left.x,
            y1: side,
            x2: top_left.x + stem_width,
            y2: side + sign * left,
        },
        RenderItem::Rectangle {
            x1: bottom_right.x,
            y1: side,
            x2: bottom_right.x - stem_width,
            y2: side + sign * right,
        },
    ];
    Ok(Some(MensuralRendering::single(None, items)))
}

// ═══════════════════════════════════════════════════════════════════════
// Ligatures
// ═══════════════════════════════════════════════════════════════════════

/// Drawing state of one ligature, threaded from note to note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LigatureDrawingContext {
    strategy: Strategy,
    next_x: Option<i32>,
}

impl LigatureDrawingContext {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy, next_x: None }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Where the next note is drawn: right after the glyphs of the previous
    /// one, or at its laid-out position.
    pub fn note_x(&self, note: &Element) -> i32 {
        self.next_x.unwrap_or(note.x)
    }

    /// Carry the advance of the note drawn at `x` over to the next one.
    pub fn apply_advance(&mut self, x: i32, advance: i32) {
        if self.strategy == Strategy::PreferGlyph {
            self.next_x = Some(x + advance);
        }
    }
}

/// One resolved ligature note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureNote {
    pub x: i32,
    pub body: MensuralRendering,
    pub plica: Option<MensuralRendering>,
}

/// Glyph ligatures need the brevis and the two stem glyphs; without them
/// the whole ligature is constructed.
fn ligature_strategy(ctx: &MensuralContext) -> Strategy {
    let glyphs = [
        smufl::MENSURAL_BLACK_BREVIS,
        smufl::MENSURAL_COMB_STEM_UP,
        smufl::MENSURAL_COMB_STEM_DOWN,
    ];
    if ctx.prefers_glyph() && glyphs.iter().all(|&code| ctx.is_available(code)) {
        Strategy::PreferGlyph
    } else {
        Strategy::ConstructGeometry
    }
}

/// All notes of a ligature, each placed after the advance of the previous.
pub fn resolve_ligature(element: &Element, ctx: &MensuralContext) -> Result<Vec<LigatureNote>> {
    let ligature = element.as_ligature()?;
    let mut drawing = LigatureDrawingContext::new(ligature_strategy(ctx));
    let mut notes = Vec::with_capacity(ligature.notes.len());

    for (index, note) in ligature.notes.iter().enumerate() {
        let x = drawing.note_x(note);
        let body = resolve_ligature_note(ligature, index, &drawing, ctx)?;
        let plica_ctx = MensuralContext {
            strategy: drawing.strategy(),
            ..*ctx
        };
        let plica = resolve_plica(note, x, true, &plica_ctx)?;
        drawing.apply_advance(x, body.advance);
        notes.push(LigatureNote { x, body, plica });
    }
    Ok(notes)
}

fn oblique_glyph(interval: i32) -> Option<u32> {
    let code = match interval {
        -1 => smufl::MENSURAL_OBLIQUE_DESC_2ND_BLACK,
        -2 => smufl::MENSURAL_OBLIQUE_DESC_3RD_BLACK,
        -3 => smufl::MENSURAL_OBLIQUE_DESC_4TH_BLACK,
        -4 => smufl::MENSURAL_OBLIQUE_DESC_5TH_BLACK,
        -5 => smufl::MENSURAL_OBLIQUE_DESC_6TH_BLACK,
        1 => smufl::MENSURAL_OBLIQUE_ASC_2ND_BLACK,
        2 => smufl::MENSURAL_OBLIQUE_ASC_3RD_BLACK,
        3 => smufl::MENSURAL_OBLIQUE_ASC_4TH_BLACK,
        4 => smufl::MENSURAL_OBLIQUE_ASC_5TH_BLACK,
        _ => return None,
    };
    Some(code)
}

fn connecting_line_glyph(interval: i32) -> Option<u32> {
    let code = match interval {
        -4 => smufl::CHANT_CONNECTING_LINE_DESC_5TH,
        -3 => smufl::CHANT_CONNECTING_LINE_DESC_4TH,
        -2 => smufl::CHANT_CONNECTING_LINE_DESC_3RD,
        2 => smufl::CHANT_CONNECTING_LINE_ASC_3RD,
        3 => smufl::CHANT_CONNECTING_LINE_ASC_4TH,
        4 => smufl::CHANT_CONNECTING_LINE_ASC_5TH,
        _ => return None,
    };
    Some(code)
}

fn note_at(ligature: &Ligature, index: Option<usize>) -> Option<&Element> {
    index
        .and_then(|i| ligature.notes.get(i))
        .filter(|element| element.as_note().is_ok())
}

/// The glyph drawing notes `index` and `index + 1` as one oblique, `None`
/// when the pair is not oblique or the font cannot draw it. Both notes then
/// get their own notehead.
fn oblique_pair_glyph(ligature: &Ligature, index: usize, ctx: &MensuralContext) -> Result<Option<u32>> {
    if !ligature.shape_at(index).intersects(LigatureShape::OBLIQUE) {
        return Ok(None);
    }
    let (Some(first), Some(second)) = (note_at(ligature, Some(index)), note_at(ligature, Some(index + 1))) else {
        return Ok(None);
    };
    let interval = second.as_note()?.loc - first.as_note()?.loc;
    Ok(oblique_glyph(interval).filter(|&code| ctx.is_available(code)))
}

fn closes_oblique_glyph(ligature: &Ligature, index: usize, ctx: &MensuralContext) -> Result<bool> {
    match index.checked_sub(1) {
        Some(previous) => Ok(oblique_pair_glyph(ligature, previous, ctx)?.is_some()),
        None => Ok(false),
    }
}

/// Note `index` of a ligature. Its `advance` is the horizontal space its
/// glyphs take, 0 for constructed ligatures.
pub fn resolve_ligature_note(
    ligature: &Ligature,
    index: usize,
    drawing: &LigatureDrawingContext,
    ctx: &MensuralContext,
) -> Result<MensuralRendering> {
    let Some(element) = ligature.notes.get(index) else {
        log::debug!("Ligature has no note {index}");
        return Ok(MensuralRendering::default());
    };
    let x = drawing.note_x(element);
    let mut rendering = match drawing.strategy() {
        Strategy::PreferGlyph => ligature_note_glyphs(ligature, index, element, x, ctx)?,
        Strategy::ConstructGeometry => ligature_note_geometry(ligature, index, element, x, ctx)?,
    };
    if let Some(dot) = resolve_dot_in_ligature(ligature, index, x, drawing.strategy(), ctx)? {
        rendering.parts.push(dot);
    }
    Ok(rendering)
}

fn ligature_note_glyphs(
    ligature: &Ligature,
    index: usize,
    element: &Element,
    x: i32,
    ctx: &MensuralContext,
) -> Result<MensuralRendering> {
    let note = element.as_note()?;
    let shape = ligature.shape_at(index);
    let oblique_code = oblique_pair_glyph(ligature, index, ctx)?;
    let oblique_end = closes_oblique_glyph(ligature, index, ctx)?;
    let oblique = oblique_code.is_some() || oblique_end;

    let interval = match note_at(ligature, Some(index + 1)) {
        Some(next) => next.as_note()?.loc - note.loc,
        None => 0,
    };

    let y = element.y;
    let mut items = Vec::new();
    let mut step = 0;

    if shape.intersects(LigatureShape::STEM_LEFT_UP | LigatureShape::STEM_LEFT_DOWN) {
        let code = if shape.intersects(LigatureShape::STEM_LEFT_UP) {
            smufl::MENSURAL_COMB_STEM_UP
        } else {
            smufl::MENSURAL_COMB_STEM_DOWN
        };
        items.push(RenderItem::Glyph { code, x, y });
        step += ctx.glyph_advance(code);
    }

    // The second note of an oblique is part of the first one's glyph
    if !oblique_end {
        let code = oblique_code.unwrap_or(if note.dur == Duration::Maxima {
            smufl::MENSURAL_NOTEHEAD_MAXIMA_BLACK
        } else {
            smufl::MENSURAL_BLACK_BREVIS
        });
        items.push(RenderItem::Glyph { code, x, y });
        step += ctx.glyph_advance(code);
    }

    if shape.intersects(LigatureShape::STEM_RIGHT_UP | LigatureShape::STEM_RIGHT_DOWN) {
        let code = if shape.intersects(LigatureShape::STEM_RIGHT_UP) {
            smufl::MENSURAL_COMB_STEM_UP
        } else {
            smufl::MENSURAL_COMB_STEM_DOWN
        };
        items.push(RenderItem::Glyph { code, x: x + step, y });
        step += ctx.glyph_advance(code);
    }

    if !oblique || oblique_end {
        if let Some(code) = connecting_line_glyph(interval).filter(|&c| ctx.is_available(c)) {
            items.push(RenderItem::Glyph { code, x: x + step, y });
            step += ctx.glyph_advance(code);
        }
    }

    let mut rendering = MensuralRendering::single(Some(NOTEHEAD), items);
    rendering.advance = step;
    Ok(rendering)
}

fn ligature_note_geometry(
    ligature: &Ligature,
    index: usize,
    element: &Element,
    x: i32,
    ctx: &MensuralContext,
) -> Result<MensuralRendering> {
    let note = element.as_note()?;
    let staff = ctx.staff;
    let shape = ligature.shape_at(index);
    let previous_index = index.checked_sub(1);
    let previous_shape = previous_index.map(|i| ligature.shape_at(i)).unwrap_or_default();
    let previous = note_at(ligature, previous_index);
    let next = note_at(ligature, Some(index + 1));

    let oblique_end = previous_shape.intersects(LigatureShape::OBLIQUE);
    let oblique = shape.intersects(LigatureShape::OBLIQUE) || oblique_end;
    let stacked_end = shape.intersects(LigatureShape::STACKED);

    let stem_width = staff.stem_width();
    let stroke_width = (STROKE_WIDTH_FACTOR * f64::from(stem_width)) as i32;
    let fill = fill_notehead(staff.is_mensural_black(), note.colored);
    let head = ctx.head(element, x)?;

    let mut points = if !oblique {
        ObliquePoints::from(calc_brevis_points(head, shape, staff))
    } else if shape.intersects(LigatureShape::OBLIQUE) {
        let next = next.ok_or_else(|| EngraveError::MissingObliqueNeighbor(element.id.clone()))?;
        calc_oblique_points(head, ctx.head(next, next.x)?, shape, staff, true)
    } else {
        let previous = previous.ok_or_else(|| EngraveError::MissingObliqueNeighbor(element.id.clone()))?;
        calc_oblique_points(ctx.head(previous, previous.x)?, head, previous_shape, staff, false)
    };

    let ObliquePoints {
        top_left,
        bottom_left,
        top_right,
        bottom_right,
        ..
    } = points;

    let mut items = if fill {
        vec![RenderItem::Oblique {
            x1: top_left.x,
            y1: top_left.y,
            x2: top_right.x,
            y2: top_right.y,
            height: bottom_left.y - top_left.y,
        }]
    } else {
        vec![
            RenderItem::Oblique {
                x1: top_left.x,
                y1: top_left.y,
                x2: top_right.x,
                y2: top_right.y,
                height: -stroke_width,
            },
            RenderItem::Oblique {
                x1: bottom_left.x,
                y1: bottom_left.y,
                x2: bottom_right.x,
                y2: bottom_right.y,
                height: stroke_width,
            },
        ]
    };

    // No left connector inside an oblique
    if !oblique_end {
        let (mut side_top, mut side_bottom) = (points.sides[0], points.sides[1]);
        if let Some(previous) = previous {
            let previous_sides = calc_brevis_points(ctx.head(previous, previous.x)?, previous_shape, staff).sides;
            if stacked_end {
                points.sides[3] = previous_sides[3];
            } else {
                side_top = side_top.max(previous_sides[2]);
                side_bottom = side_bottom.min(previous_sides[3]);
            }
        }
        items.push(RenderItem::RoundedRectangle {
            x1: top_left.x,
            y1: side_top,
            x2: top_left.x + stem_width,
            y2: side_bottom,
            radius: stem_width / 3,
        });
    }

    if next.is_none() {
        items.push(RenderItem::RoundedRectangle {
            x1: bottom_right.x - stem_width,
            y1: points.sides[2],
            x2: bottom_right.x,
            y2: points.sides[3],
            radius: stem_width / 3,
        });
    }

    Ok(MensuralRendering::single(Some(NOTEHEAD), items))
}

/// The augmentation dot after a ligature note drawn at `x`, `None` when the
/// note has no dot.
pub fn resolve_dot_in_ligature(
    ligature: &Ligature,
    index: usize,
    x: i32,
    strategy: Strategy,
    ctx: &MensuralContext,
) -> Result<Option<RenderPart>> {
    let Some(element) = ligature.notes.get(index) else {
        return Ok(None);
    };
    let note = element.as_note()?;
    if note.dots == 0 {
        return Ok(None);
    }

    // With glyphs the x of a note closing an oblique is already past the
    // oblique glyph, so the dot needs no notehead offset.
    let oblique = match strategy {
        Strategy::PreferGlyph if index > 0 => closes_oblique_glyph(ligature, index, ctx)?,
        _ => ligature.shape_at(index).intersects(LigatureShape::OBLIQUE),
    };
    let staff = ctx.staff;
    let unit = staff.unit;
    let mut x = x;
    let mut y = element.y;
    if !oblique {
        x += 2 * ctx.note_radius(note);
    }
    x += unit / 4;
    if staff.is_on_staff_line(y) {
        y -= unit * 2 / 3;
    }

    let item = match strategy {
        Strategy::PreferGlyph => RenderItem::Glyph {
            code: smufl::AUGMENTATION_DOT,
            x,
            y,
        },
        Strategy::ConstructGeometry => RenderItem::Circle {
            x,
            y,
            radius: (unit * 2 / 5).max(2),
        },
    };
    Ok(Some(RenderPart {
        group: Some(DOT),
        items: vec![item],
    }))
}

// ═══════════════════════════════════════════════════════════════════════
// Notehead geometry
// ═══════════════════════════════════════════════════════════════════════

/// Corners of a brevis-shaped notehead. `sides` are the y extents of the
/// left serif or stem (`[0]` top, `[1]` bottom) and of the right one
/// (`[2]`, `[3]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrevisPoints {
    pub top_left: Point,
    pub bottom_right: Point,
    pub sides: [i32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObliquePoints {
    pub top_left: Point,
    pub bottom_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub sides: [i32; 4],
}

impl From<BrevisPoints> for ObliquePoints {
    fn from(points: BrevisPoints) -> Self {
        let BrevisPoints {
            top_left,
            bottom_right,
            sides,
        } = points;
        Self {
            top_left,
            bottom_left: Point::new(top_left.x, bottom_right.y),
            top_right: Point::new(bottom_right.x, top_left.y),
            bottom_right,
            sides,
        }
    }
}

pub fn calc_brevis_points(head: NoteHead, shape: LigatureShape, staff: &StaffContext) -> BrevisPoints {
    let unit = staff.unit;
    let black = staff.is_mensural_black();
    let y = head.y;

    let height_factor = if black {
        BLACK_BREVIS_HEIGHT_FACTOR
    } else {
        WHITE_BREVIS_HEIGHT_FACTOR
    };
    let half_height = f64::from(unit) * height_factor;
    let top_left = Point::new(head.x, (f64::from(y) + half_height) as i32);
    let bottom_right = Point::new(head.x + 2 * head.radius, (f64::from(y) - half_height) as i32);

    let mut sides = [top_left.y, bottom_right.y, 0, 0];
    if !black {
        // serifs
        sides[0] += unit / 3;
        sides[1] -= unit / 3;
    } else if shape.intersects(LigatureShape::OBLIQUE) {
        // keep the sides hidden behind black obliques
        sides[0] -= unit / 2;
        sides[1] += unit / 2;
    }
    sides[2] = sides[0];
    sides[3] = sides[1];

    let stem = unit * if black { LIGATURE_STEM_BLACK } else { LIGATURE_STEM_WHITE };
    if shape.intersects(LigatureShape::STEM_LEFT_UP) {
        sides[0] = y + stem;
    }
    if shape.intersects(LigatureShape::STEM_LEFT_DOWN) {
        sides[1] = y - stem;
    }
    if shape.intersects(LigatureShape::STEM_RIGHT_UP) {
        sides[2] = y + stem;
    }
    if shape.intersects(LigatureShape::STEM_RIGHT_DOWN) {
        sides[3] = y - stem;
    }

    BrevisPoints {
        top_left,
        bottom_right,
        sides,
    }
}

fn slope(from: Point, to: Point) -> f64 {
    if to.x == from.x {
        0.0
    } else {
        f64::from(to.y - from.y) / f64::from(to.x - from.x)
    }
}

/// One half of an oblique joining `first` to `second`, slanted and pushed
/// apart vertically so that the stroke reads well.
pub fn calc_oblique_points(
    first: NoteHead,
    second: NoteHead,
    shape: LigatureShape,
    staff: &StaffContext,
    first_half: bool,
) -> ObliquePoints {
    let stem_width = staff.stem_width();
    let black = staff.is_mensural_black();

    let left = calc_brevis_points(first, shape, staff);
    let right = calc_brevis_points(second, LigatureShape::OBLIQUE, staff);

    let mut top_left = left.top_left;
    let mut bottom_left = Point::new(top_left.x, left.bottom_right.y);
    let mut bottom_right = right.bottom_right;
    let mut top_right = Point::new(bottom_right.x, right.top_left.y);
    let sides = [left.sides[0], left.sides[1], right.sides[2], right.sides[3]];

    let factor = if black {
        OBLIQUE_ADJUSTMENT_BLACK
    } else {
        OBLIQUE_ADJUSTMENT_WHITE
    };
    let adjustment = (f64::from((slope(bottom_left, bottom_right) * f64::from(stem_width)) as i32) * factor) as i32;
    top_left.y -= adjustment;
    bottom_left.y -= adjustment;
    top_right.y += adjustment;
    bottom_right.y += adjustment;

    let slope = slope(bottom_left, bottom_right);
    let mut length = (bottom_right.x - bottom_left.x) / 2;

    if first_half {
        length += OBLIQUE_OVERLAP;
        bottom_right.x = bottom_left.x + length;
        top_right.x = bottom_right.x;
        bottom_right.y = bottom_left.y + (f64::from(length) * slope) as i32;
        top_right.y = top_left.y + (f64::from(length) * slope) as i32;
    } else {
        bottom_left.x += length;
        top_left.x = bottom_left.x;
        bottom_left.y += (f64::from(length) * slope) as i32;
        top_left.y += (f64::from(length) * slope) as i32;
    }

    ObliquePoints {
        top_left,
        bottom_left,
        top_right,
        bottom_right,
        sides,
    }
}
