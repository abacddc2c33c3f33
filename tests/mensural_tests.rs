//! Mensural resolution tests: glyph and constructed renderings, ligatures
//! and the font set as an explicit input.

use std::sync::Arc;

use engravelib::renderer::mensural::{
    resolve_ligature, resolve_note, MensuralContext, MensuralRendering, RenderItem, Strategy,
};
use engravelib::{
    render_layer_to_svg, smufl, Duration, Element, ElementData, EngraveError, EngraveOptions, Glyph, GlyphProvider,
    Ligature, LigatureShape, NotationType, Note, Plica, Resources, StaffContext, StemDir,
};
use pretty_assertions::assert_eq;

const SYMBOL: &str = r#"<symbol viewBox="0 0 1000 1000"><path d="M0 0 L100 0"/></symbol>"#;

fn symbol(code: u32) -> String {
    SYMBOL.replacen("<symbol", &format!("<symbol id=\"{}\"", smufl::code_str(code)), 1)
}

/// A font with the brevis, the combining stems and optionally the descending
/// third oblique.
fn font(with_oblique: bool) -> Resources {
    let mut resources = Resources::new("Leipzig");
    let mut glyphs = vec![
        Glyph::new(smufl::MENSURAL_BLACK_BREVIS, 1000, 0, -125, 400, 250).with_advance(420),
        Glyph::new(smufl::MENSURAL_COMB_STEM_UP, 1000, 0, 0, 40, 900),
        Glyph::new(smufl::MENSURAL_COMB_STEM_DOWN, 1000, 0, -900, 40, 900),
    ];
    if with_oblique {
        // From the top of the first brevis down to the bottom of the second
        glyphs.push(Glyph::new(smufl::MENSURAL_OBLIQUE_DESC_3RD_BLACK, 1000, 0, -350, 820, 450).with_advance(800));
    }
    for glyph in glyphs {
        let code = glyph.code();
        resources.add_glyph(glyph);
        resources
            .set_glyph_definition(code, symbol(code))
            .expect("valid symbol markup");
    }
    resources
}

fn black_staff() -> StaffContext {
    StaffContext::new(2000, NotationType::MensuralBlack)
}

fn note(id: &str, x: i32, loc: i32, dur: Duration) -> Element {
    let staff = black_staff();
    Element::new(id, x, staff.y_for_loc(loc), ElementData::Note(Note::new(dur, loc)))
}

fn ligature(id: &str, notes: Vec<Element>, shapes: Vec<LigatureShape>) -> Element {
    Element::new(id, notes[0].x, notes[0].y, ElementData::Ligature(Ligature { notes, shapes }))
}

/// `(left, right, bottom, top)` of everything a rendering draws.
fn extent(rendering: &MensuralRendering, glyphs: &Resources, font_size: i32) -> (i32, i32, i32, i32) {
    let mut extent = (i32::MAX, i32::MIN, i32::MAX, i32::MIN);
    let mut cover = |x1: i32, y1: i32, x2: i32, y2: i32| {
        extent.0 = extent.0.min(x1.min(x2));
        extent.1 = extent.1.max(x1.max(x2));
        extent.2 = extent.2.min(y1.min(y2));
        extent.3 = extent.3.max(y1.max(y2));
    };
    for item in rendering.items() {
        match *item {
            RenderItem::Glyph { code, x, y } => {
                let glyph = glyphs.glyph(code).expect("drawn glyphs are in the font");
                let (gx, gy, width, height) = glyph.bounding_box();
                let scale = |v: i32| v * font_size / glyph.units_per_em();
                cover(x + scale(gx), y + scale(gy), x + scale(gx + width), y + scale(gy + height));
            }
            RenderItem::Rectangle { x1, y1, x2, y2 } | RenderItem::RoundedRectangle { x1, y1, x2, y2, .. } => {
                cover(x1, y1, x2, y2)
            }
            RenderItem::Oblique { x1, y1, x2, y2, height } => {
                cover(x1, y1, x2, y2);
                cover(x1, y1 + height, x2, y2 + height);
            }
            RenderItem::Circle { x, y, radius } => cover(x - radius, y - radius, x + radius, y + radius),
        }
    }
    extent
}

fn assert_close(glyph: (i32, i32, i32, i32), constructed: (i32, i32, i32, i32), tolerance: i32) {
    let pairs = [
        (glyph.0, constructed.0),
        (glyph.1, constructed.1),
        (glyph.2, constructed.2),
        (glyph.3, constructed.3),
    ];
    for (a, b) in pairs {
        assert!((a - b).abs() <= tolerance, "glyph {glyph:?} vs constructed {constructed:?}");
    }
}

fn descending_oblique() -> Element {
    ligature(
        "lig1",
        vec![note("n1", 500, 6, Duration::Brevis), note("n2", 800, 4, Duration::Brevis)],
        vec![LigatureShape::OBLIQUE, LigatureShape::DEFAULT],
    )
}

// ── Single notes ─────────────────────────────────────────────────────

#[test]
fn black_brevis_is_one_glyph_when_preferred() {
    let resources = font(false);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);
    let element = note("n1", 500, 4, Duration::Brevis);

    let rendering = resolve_note(&element, None, &ctx).expect("a note");
    assert_eq!(rendering.glyphs(), vec![smufl::MENSURAL_BLACK_BREVIS]);
    assert_eq!(rendering.items().count(), 1);
    assert_eq!(
        rendering.part("notehead").map(|p| p.items.clone()),
        Some(vec![RenderItem::Glyph {
            code: smufl::MENSURAL_BLACK_BREVIS,
            x: 500,
            y: element.y,
        }])
    );
}

#[test]
fn black_brevis_is_three_rectangles_when_constructed() {
    let resources = font(false);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::ConstructGeometry, &resources);
    let element = note("n1", 500, 4, Duration::Brevis);

    let rendering = resolve_note(&element, None, &ctx).expect("a note");
    assert!(rendering.glyphs().is_empty());
    let rectangles: Vec<_> = rendering
        .items()
        .filter(|item| matches!(item, RenderItem::Rectangle { .. }))
        .collect();
    assert_eq!(rectangles.len(), 3);
    assert_eq!(rendering.items().count(), 3);
    // Both strategies anchor the shape at the note's x
    assert!(matches!(rectangles[1], RenderItem::Rectangle { x1: 500, .. }));
}

#[test]
fn missing_brevis_glyph_is_constructed_instead() {
    let resources = Resources::new("Leipzig");
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);
    let rendering = resolve_note(&note("n1", 500, 4, Duration::Brevis), None, &ctx).expect("a note");
    assert!(rendering.glyphs().is_empty());
    assert_eq!(rendering.items().count(), 3);
}

#[test]
fn typed_access_on_the_wrong_kind_fails() {
    let resources = font(false);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);
    let element = Element::new("d1", 0, 0, ElementData::Dot);
    let err = resolve_note(&element, None, &ctx).unwrap_err();
    assert!(matches!(err, EngraveError::TypeMismatch { .. }), "{err}");
}

// ── Ligatures ────────────────────────────────────────────────────────

#[test]
fn descending_third_oblique_uses_the_oblique_glyph() {
    let resources = font(true);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);

    let notes = resolve_ligature(&descending_oblique(), &ctx).expect("a ligature");
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].body.glyphs(), vec![smufl::MENSURAL_OBLIQUE_DESC_3RD_BLACK]);
    // The closing note is drawn by the oblique glyph
    assert!(notes[1].body.is_empty());
    assert!(notes[1].body.glyphs().is_empty());
}

#[test]
fn advance_of_each_ligature_note_places_the_next() {
    let resources = font(true);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);

    let notes = resolve_ligature(&descending_oblique(), &ctx).expect("a ligature");
    // 800 font units at 720 points
    assert_eq!(notes[0].body.advance, 576);
    assert_eq!(notes[0].x, 500);
    assert_eq!(notes[1].x, notes[0].x + notes[0].body.advance);
}

#[test]
fn oblique_glyph_missing_from_the_font_draws_both_breves() {
    let resources = font(false);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);

    let notes = resolve_ligature(&descending_oblique(), &ctx).expect("a ligature");
    assert_eq!(notes[0].body.glyphs(), vec![smufl::MENSURAL_BLACK_BREVIS]);
    assert_eq!(notes[1].x, 500 + 302);
    // The closing pitch keeps its own notehead
    assert_eq!(
        notes[1].body.part("notehead").map(|p| p.items.clone()),
        Some(vec![RenderItem::Glyph {
            code: smufl::MENSURAL_BLACK_BREVIS,
            x: 802,
            y: staff.y_for_loc(4),
        }])
    );
}

#[test]
fn oblique_wider_than_any_glyph_draws_both_breves() {
    let resources = font(true);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::PreferGlyph, &resources);
    // Up a sixth: no oblique glyph covers it
    let element = ligature(
        "lig1",
        vec![note("n1", 500, 2, Duration::Brevis), note("n2", 800, 7, Duration::Brevis)],
        vec![LigatureShape::OBLIQUE, LigatureShape::DEFAULT],
    );

    let notes = resolve_ligature(&element, &ctx).expect("a ligature");
    assert_eq!(notes[0].body.glyphs(), vec![smufl::MENSURAL_BLACK_BREVIS]);
    assert_eq!(notes[1].body.glyphs(), vec![smufl::MENSURAL_BLACK_BREVIS]);
    let ys: Vec<i32> = notes
        .iter()
        .flat_map(|n| n.body.items())
        .filter_map(|item| match item {
            RenderItem::Glyph { y, .. } => Some(*y),
            _ => None,
        })
        .collect();
    assert_eq!(ys, vec![staff.y_for_loc(2), staff.y_for_loc(7)]);
}

#[test]
fn constructed_ligature_keeps_laid_out_positions() {
    let resources = font(true);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::ConstructGeometry, &resources);

    let notes = resolve_ligature(&descending_oblique(), &ctx).expect("a ligature");
    assert_eq!(notes[0].x, 500);
    assert_eq!(notes[1].x, 800);
    for note in &notes {
        assert!(note.body.glyphs().is_empty());
        assert_eq!(note.body.advance, 0);
    }
    assert!(notes[0]
        .body
        .items()
        .any(|item| matches!(item, RenderItem::Oblique { .. })));
}

#[test]
fn oblique_without_a_following_note_is_an_error() {
    let resources = font(true);
    let staff = black_staff();
    let ctx = MensuralContext::new(&staff, Strategy::ConstructGeometry, &resources);
    let element = ligature(
        "lig1",
        vec![note("n1", 500, 6, Duration::Brevis)],
        vec![LigatureShape::OBLIQUE],
    );

    let err = resolve_ligature(&element, &ctx).unwrap_err();
    assert!(matches!(&err, EngraveError::MissingObliqueNeighbor(id) if id == "n1"), "{err}");
}

// ── Glyphs against geometry ──────────────────────────────────────────

#[test]
fn both_strategies_cover_the_same_brevis() {
    let resources = font(false);
    let staff = black_staff();
    let element = note("n1", 500, 4, Duration::Brevis);
    let size = staff.music_font_size(false);

    let glyph = resolve_note(&element, None, &MensuralContext::new(&staff, Strategy::PreferGlyph, &resources))
        .expect("a note");
    let constructed = resolve_note(
        &element,
        None,
        &MensuralContext::new(&staff, Strategy::ConstructGeometry, &resources),
    )
    .expect("a note");
    assert!(!glyph.glyphs().is_empty());
    assert!(constructed.glyphs().is_empty());

    let (glyph, constructed) = (extent(&glyph, &resources, size), extent(&constructed, &resources, size));
    assert_eq!((glyph.0, glyph.1), (constructed.0, constructed.1));
    assert_close(glyph, constructed, staff.unit / 4);
}

#[test]
fn both_strategies_cover_the_same_oblique() {
    let resources = font(true);
    let staff = black_staff();
    let size = staff.music_font_size(false);
    let whole = |strategy| {
        let ctx = MensuralContext::new(&staff, strategy, &resources);
        let mut rendering = MensuralRendering::default();
        for note in resolve_ligature(&descending_oblique(), &ctx).expect("a ligature") {
            rendering.parts.extend(note.body.parts);
        }
        rendering
    };

    let glyph = whole(Strategy::PreferGlyph);
    let constructed = whole(Strategy::ConstructGeometry);
    assert_eq!(glyph.glyphs(), vec![smufl::MENSURAL_OBLIQUE_DESC_3RD_BLACK]);
    assert_close(
        extent(&glyph, &resources, size),
        extent(&constructed, &resources, size),
        staff.unit / 4,
    );
}

// ── Through the device ───────────────────────────────────────────────

#[test]
fn glyph_definitions_are_embedded_once() {
    let resources = Arc::new(font(false));
    let staff = black_staff();
    let options = EngraveOptions {
        use_glyph_mensural: true,
        ..EngraveOptions::default()
    };
    let elements = vec![
        note("n1", 500, 4, Duration::Brevis),
        note("n2", 900, 6, Duration::Brevis),
    ];

    let svg = render_layer_to_svg(&elements, &staff, resources, &options, 2100, 2970).expect("rendered");
    assert!(svg.starts_with("<?xml"));
    assert_eq!(svg.matches("<use").count(), 2);
    assert_eq!(svg.matches("<symbol").count(), 1);
    assert!(svg.contains(r##"xlink:href="#E952-0""##));
    assert!(svg.contains(r#"id="E952-0""#));
    assert!(svg.contains(r#"class="notehead""#));
}

#[test]
fn ligature_groups_hold_one_group_per_note() {
    let resources = Arc::new(font(true));
    let staff = black_staff();
    let options = EngraveOptions {
        use_glyph_mensural: true,
        ..EngraveOptions::default()
    };

    let svg = render_layer_to_svg(&[descending_oblique()], &staff, resources, &options, 2100, 2970)
        .expect("rendered");
    assert!(svg.contains(r#"id="lig1""#));
    assert!(svg.contains(r#"class="ligature""#));
    assert_eq!(svg.matches(r#"class="note""#).count(), 2);
    assert_eq!(svg.matches("<use").count(), 1);
    assert!(svg.contains(r##"xlink:href="#E984-0""##));
}

#[test]
fn constructed_notes_need_no_definitions() {
    let resources = Arc::new(font(false));
    let staff = black_staff();
    let svg = render_layer_to_svg(
        &[note("n1", 500, 4, Duration::Brevis)],
        &staff,
        resources,
        &EngraveOptions::default(),
        2100,
        2970,
    )
    .expect("rendered");
    assert!(!svg.contains("<defs"));
    assert_eq!(svg.matches("<rect").count(), 3);
}

#[test]
fn ligature_without_its_oblique_glyph_draws_every_note() {
    let resources = Arc::new(font(false));
    let staff = black_staff();
    let options = EngraveOptions {
        use_glyph_mensural: true,
        ..EngraveOptions::default()
    };

    let svg = render_layer_to_svg(&[descending_oblique()], &staff, resources, &options, 2100, 2970)
        .expect("rendered");
    assert_eq!(svg.matches("<use").count(), 2);
    assert!(svg.contains(r##"xlink:href="#E952-0""##));
}

#[test]
fn hidden_notehead_leaves_an_empty_group() {
    let resources = Arc::new(font(false));
    let staff = black_staff();
    let with_plica = |id: &str, head_visible: bool| {
        let mut element = note(id, 500, 4, Duration::Longa);
        if let ElementData::Note(note) = &mut element.data {
            note.head_visible = head_visible;
            note.plica = Some(Plica {
                id: format!("{id}-plica"),
                dir: StemDir::Down,
            });
        }
        element
    };
    let render = |element: Element| {
        render_layer_to_svg(&[element], &staff, Arc::clone(&resources), &EngraveOptions::default(), 2100, 2970)
            .expect("rendered")
    };

    let shown = render(with_plica("n1", true));
    assert!(shown.contains(r#"class="plica""#));
    assert!(shown.contains("<rect"));

    let hidden = render(with_plica("n2", false));
    assert!(hidden.contains(r#"id="n2""#));
    assert!(!hidden.contains(r#"class="plica""#));
    assert!(!hidden.contains(r#"class="notehead""#));
    assert!(!hidden.contains("<rect"));
    assert!(!hidden.contains("<use"));
}
