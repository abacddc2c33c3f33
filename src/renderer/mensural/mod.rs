//! Mensural notation drawing.
//!
//! `resolve` decides glyphs or geometry; the `View` methods here wrap the
//! result in the element groups and emit it.

pub mod resolve;

pub use resolve::{
    calc_brevis_points, calc_oblique_points, mensural_stem, mensural_stem_dir, resolve_dot_in_ligature,
    resolve_ligature, resolve_ligature_note, resolve_mensur, resolve_note, resolve_plica, resolve_proport,
    resolve_rest, BrevisPoints, LigatureDrawingContext, LigatureNote, MensuralContext, MensuralRendering,
    NoteHead, ObliquePoints, RenderItem, RenderPart, Strategy,
};

use crate::device::DeviceContext;
use crate::error::Result;
use crate::model::{Element, StaffContext, StemDir};

use super::View;

impl View<'_> {
    fn mensural_context<'s>(&'s self, staff: &'s StaffContext) -> MensuralContext<'s> {
        MensuralContext::new(staff, self.mensural_strategy(), self.resources())
    }

    /// A note outside a ligature, with its plica.
    pub fn draw_mensural_note(
        &self,
        dc: &mut dyn DeviceContext,
        element: &Element,
        staff: &StaffContext,
        layer_stem_dir: Option<StemDir>,
    ) -> Result<()> {
        let ctx = self.mensural_context(staff);
        let rendering = resolve_note(element, layer_stem_dir, &ctx)?;
        let plica = resolve_plica(element, element.x, false, &ctx)?;

        dc.start_graphic(element, "", &element.id, true, false);
        self.emit(dc, &rendering, staff);
        if let Some(plica_rendering) = plica {
            self.draw_plica(dc, element, &plica_rendering, staff)?;
        }
        dc.end_graphic(element, self.mapping());
        Ok(())
    }

    fn draw_plica(
        &self,
        dc: &mut dyn DeviceContext,
        element: &Element,
        rendering: &MensuralRendering,
        staff: &StaffContext,
    ) -> Result<()> {
        let note = element.as_note()?;
        if let Some(plica) = &note.plica {
            dc.start_graphic(plica, "", &plica.id, true, false);
            self.emit(dc, rendering, staff);
            dc.end_graphic(plica, None);
        }
        Ok(())
    }

    pub fn draw_mensural_rest(&self, dc: &mut dyn DeviceContext, element: &Element, staff: &StaffContext) -> Result<()> {
        let rendering = resolve_rest(element, &self.mensural_context(staff))?;
        dc.start_graphic(element, "", &element.id, true, false);
        self.emit(dc, &rendering, staff);
        dc.end_graphic(element, self.mapping());
        Ok(())
    }

    /// A ligature group holding one group per note.
    pub fn draw_ligature(&self, dc: &mut dyn DeviceContext, element: &Element, staff: &StaffContext) -> Result<()> {
        let ligature = element.as_ligature()?;
        let notes = resolve_ligature(element, &self.mensural_context(staff))?;

        dc.start_graphic(element, "", &element.id, true, false);
        for (note_element, note) in ligature.notes.iter().zip(&notes) {
            dc.start_graphic(note_element, "", &note_element.id, true, false);
            self.emit(dc, &note.body, staff);
            if let Some(plica_rendering) = &note.plica {
                self.draw_plica(dc, note_element, plica_rendering, staff)?;
            }
            dc.end_graphic(note_element, self.mapping());
        }
        dc.end_graphic(element, self.mapping());
        Ok(())
    }

    /// Mensuration signs without a sign are not drawn at all.
    pub fn draw_mensur(&self, dc: &mut dyn DeviceContext, element: &Element, staff: &StaffContext) -> Result<()> {
        if element.as_mensur()?.sign.is_none() {
            return Ok(());
        }
        let rendering = resolve_mensur(element, &self.mensural_context(staff))?;
        dc.start_graphic(element, "", &element.id, true, false);
        self.emit(dc, &rendering, staff);
        dc.end_graphic(element, self.mapping());
        Ok(())
    }

    pub fn draw_proport(&self, dc: &mut dyn DeviceContext, element: &Element, staff: &StaffContext) -> Result<()> {
        let rendering = resolve_proport(element, &self.mensural_context(staff))?;
        dc.start_graphic(element, "", &element.id, true, false);
        self.emit(dc, &rendering, staff);
        dc.end_graphic(element, self.mapping());
        Ok(())
    }

    /// Emit each part, in its structural group when it has one.
    pub fn emit(&self, dc: &mut dyn DeviceContext, rendering: &MensuralRendering, staff: &StaffContext) {
        for part in &rendering.parts {
            if let Some(name) = part.group {
                dc.start_custom_graphic(name, "", "");
            }
            for item in &part.items {
                self.draw_render_item(dc, item, staff);
            }
            if part.group.is_some() {
                dc.end_custom_graphic();
            }
        }
    }

    fn draw_render_item(&self, dc: &mut dyn DeviceContext, item: &RenderItem, staff: &StaffContext) {
        match *item {
            RenderItem::Glyph { code, x, y } => {
                self.draw_smufl_code(dc, x, y, code, staff, false);
            }
            RenderItem::Rectangle { x1, y1, x2, y2 } => self.draw_filled_rectangle(dc, x1, y1, x2, y2),
            RenderItem::RoundedRectangle { x1, y1, x2, y2, radius } => {
                self.draw_filled_rounded_rectangle(dc, x1, y1, x2, y2, radius)
            }
            RenderItem::Oblique { x1, y1, x2, y2, height } => self.draw_oblique_polygon(dc, x1, y1, x2, y2, height),
            RenderItem::Circle { x, y, radius } => self.draw_filled_circle(dc, x, y, radius),
        }
    }
}
