//! engravelib — music engraving core.
//!
//! Takes notation that a layout engine has already positioned and turns it
//! into SVG: an output device that builds the scene graph, a slur engine that
//! shapes curves around the notes they span, and the mensural resolver that
//! decides between font glyphs and constructed geometry.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use engravelib::{render_layer_to_svg, EngraveOptions, Resources, StaffContext, NotationType};
//!
//! let resources = Arc::new(Resources::load_dir("data", "Leipzig").unwrap());
//! let staff = StaffContext::new(1800, NotationType::MensuralWhite);
//! let svg = render_layer_to_svg(&[], &staff, resources, &EngraveOptions::default(), 2100, 2970).unwrap();
//! println!("{} bytes", svg.len());
//! ```

pub mod device;
pub mod error;
pub mod geometry;
pub mod model;
pub mod options;
pub mod renderer;
pub mod resources;
pub mod smufl;

use std::sync::Arc;

pub use device::{DeviceContext, SvgDeviceContext};
pub use error::{EngraveError, Result};
pub use model::*;
pub use options::{EngraveOptions, SlurOptions, SvgOptions};
pub use renderer::View;
pub use resources::{Glyph, GlyphProvider, Resources};

/// Draw the elements of one layer on a single page and return the SVG.
///
/// `page_width` and `page_height` are in output units; layout coordinates
/// are `DEFINITION_FACTOR` times finer.
pub fn render_layer_to_svg(
    elements: &[Element],
    staff: &StaffContext,
    resources: Arc<Resources>,
    options: &EngraveOptions,
    page_width: i32,
    page_height: i32,
) -> Result<String> {
    let mut dc = SvgDeviceContext::new(page_width, page_height, options.svg.clone(), Arc::clone(&resources));
    let view = View::new(&resources, options, page_height * DEFINITION_FACTOR);

    dc.start_page();
    for element in elements {
        view.draw_layer_element(&mut dc, element, staff, None)?;
    }
    dc.end_page();
    Ok(dc.get_svg(true))
}
