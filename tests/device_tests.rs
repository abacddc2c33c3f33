//! SVG device tests: group nesting, identifiers and the commit step.

use std::sync::Arc;

use engravelib::device::{FontInfo, SvgDeviceContext};
use engravelib::{smufl, DeviceContext, Element, ElementData, Glyph, Resources, SvgOptions};
use pretty_assertions::assert_eq;

fn resources() -> Arc<Resources> {
    let mut resources = Resources::new("Leipzig");
    resources.add_glyph(Glyph::new(smufl::MENSURAL_BLACK_BREVIS, 1000, 0, -125, 400, 250).with_advance(420));
    resources
        .set_glyph_definition(
            smufl::MENSURAL_BLACK_BREVIS,
            r#"<symbol id="E952" viewBox="0 0 1000 1000"><path d="M0 0"/></symbol>"#,
        )
        .expect("valid symbol markup");
    Arc::new(resources)
}

fn device(options: SvgOptions) -> SvgDeviceContext {
    SvgDeviceContext::new(2100, 2970, options, resources())
}

fn dot(id: &str) -> Element {
    Element::new(id, 0, 0, ElementData::Dot)
}

#[test]
fn groups_nest_and_unwind() {
    let mut dc = device(SvgOptions::default());
    assert_eq!(dc.stack_depth(), 1);
    assert_eq!(dc.current_node(), dc.svg_node());

    dc.start_page();
    // definition-scale and page-margin
    assert_eq!(dc.stack_depth(), 3);
    let page = dc.current_node();

    let outer = dot("d1");
    let inner = dot("d2");
    dc.start_graphic(&outer, "", "d1", true, false);
    dc.start_graphic(&inner, "", "d2", true, false);
    dc.start_custom_graphic("notehead", "", "");
    assert_eq!(dc.stack_depth(), 6);

    dc.end_custom_graphic();
    dc.end_graphic(&inner, None);
    dc.end_graphic(&outer, None);
    assert_eq!(dc.current_node(), page);

    dc.end_page();
    assert_eq!(dc.stack_depth(), 1);
    assert_eq!(dc.current_node(), dc.svg_node());
}

#[test]
fn commit_happens_once() {
    let mut dc = device(SvgOptions::default());
    dc.start_page();
    dc.start_graphic(&dot("d1"), "", "d1", true, false);
    dc.set_font(FontInfo::music("Leipzig", 720));
    dc.draw_music_text(&[smufl::MENSURAL_BLACK_BREVIS], 100, 200);
    dc.reset_font();
    dc.end_graphic(&dot("d1"), None);
    dc.end_page();

    assert!(!dc.is_committed());
    let first = dc.get_svg(false);
    assert!(dc.is_committed());
    let second = dc.get_svg(false);
    assert_eq!(first, second);
    assert_eq!(first.matches("<defs").count(), 1);
    assert_eq!(first.matches("<desc").count(), 1);
}

#[test]
fn page_size_and_definition_scale() {
    let mut dc = device(SvgOptions::default());
    dc.start_page();
    dc.end_page();
    let svg = dc.get_svg(false);

    assert!(svg.starts_with(r#"<svg width="2100px" height="2970px""#), "{svg}");
    assert!(svg.contains(r#"class="definition-scale""#));
    assert!(svg.contains(r#"viewBox="0 0 21000 29700""#));
    assert!(svg.contains(r#"class="page-margin""#));
    assert!(!svg.contains("<defs"));
}

#[test]
fn view_box_and_millimetres() {
    let mut dc = device(SvgOptions {
        view_box: true,
        ..SvgOptions::default()
    });
    dc.start_page();
    dc.end_page();
    assert!(dc.get_svg(false).starts_with(r#"<svg viewBox="0 0 2100 2970""#));

    let mut dc = device(SvgOptions {
        mm_output: true,
        ..SvgOptions::default()
    });
    dc.start_page();
    dc.end_page();
    assert!(dc.get_svg(false).starts_with(r#"<svg width="210mm" height="297mm""#));
}

#[test]
fn html5_output_carries_data_attributes() {
    let mut dc = device(SvgOptions {
        html5: true,
        ..SvgOptions::default()
    });
    dc.start_page();
    dc.start_graphic(&dot("d1"), "", "d1", true, false);
    dc.end_graphic(&dot("d1"), None);
    dc.start_custom_graphic("stem", "", "");
    dc.end_custom_graphic();
    dc.end_page();
    let svg = dc.get_svg(false);

    assert!(svg.contains(r#"data-id="d1""#));
    assert!(svg.contains(r#"data-class="dot""#));
    assert!(!svg.contains(r#" id="d1""#));
    // No id given: class only
    assert!(svg.contains(r#"<g class="stem"/>"#));
}

#[test]
fn plain_ids_and_spanning_classes() {
    let mut dc = device(SvgOptions::default());
    dc.start_page();
    dc.start_graphic(&dot("d1"), "", "d1", true, false);
    dc.end_graphic(&dot("d1"), None);
    dc.start_graphic(&dot("s1"), "", "s1", false, false);
    dc.end_graphic(&dot("s1"), None);
    dc.end_page();
    let svg = dc.get_svg(false);

    assert!(svg.contains(r#"<g id="d1" class="dot"/>"#));
    assert!(svg.contains(r#"<g class="dot spanning id-s1"/>"#));
}

#[test]
fn raw_format_has_no_line_breaks() {
    let mut dc = device(SvgOptions {
        format_raw: true,
        ..SvgOptions::default()
    });
    dc.start_page();
    dc.start_graphic(&dot("d1"), "", "d1", true, false);
    dc.end_graphic(&dot("d1"), None);
    dc.end_page();
    assert!(!dc.get_svg(true).contains('\n'));
}

#[test]
fn output_parses_back_with_the_expected_tree() {
    let mut dc = device(SvgOptions::default());
    dc.start_page();
    dc.start_graphic(&dot("d1"), "", "d1", true, false);
    dc.set_font(FontInfo::music("Leipzig", 720));
    dc.draw_music_text(&[smufl::MENSURAL_BLACK_BREVIS, smufl::MENSURAL_BLACK_BREVIS], 100, 200);
    dc.reset_font();
    dc.end_graphic(&dot("d1"), None);
    dc.end_page();
    let svg = dc.get_svg(true);

    let doc = roxmltree::Document::parse(&svg).expect("well-formed SVG");
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "svg");
    let children: Vec<&str> = root
        .children()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name())
        .collect();
    assert_eq!(children, vec!["desc", "defs", "svg"]);

    let symbols: Vec<_> = doc.descendants().filter(|n| n.has_tag_name("symbol")).collect();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].attribute("id"), Some("E952-0"));

    let group = doc
        .descendants()
        .find(|n| n.attribute("id") == Some("d1"))
        .expect("the element group");
    let xs: Vec<_> = group
        .children()
        .filter(|n| n.has_tag_name("use"))
        .filter_map(|n| n.attribute("x"))
        .collect();
    assert_eq!(xs, vec!["100", "402"]);
}
