//! Blank template synthesis
//!
//! Draws a one-page form with a caption and a writing rule for every slot
//! in the layout, so a record stamped onto it lands on the rules exactly as
//! it would on the printed sheet.

use crate::{FieldLabel, FieldSlot, Layout, MAX_PRODUCTS};
use pdf_core::{Color, PageSize, PdfDocument, StandardFont};

const PAGE: usize = 1;
const TITLE: &str = "INSTALLATION WORKSHEET";
const TITLE_POSITION: (f64, f64) = (40.0, 45.0);
const TITLE_SIZE: f32 = 14.0;
const LABEL_SIZE: f32 = 8.0;
const RULE_WIDTH: f64 = 0.5;

/// Distance of a rule below the baseline it underlines
const RULE_DROP: f64 = 3.0;

/// Produce a blank worksheet matching `layout`
pub fn synthesize_blank(layout: &Layout) -> pdf_core::Result<Vec<u8>> {
    let size = layout.page.map(|p| p.size()).unwrap_or_else(PageSize::a4);
    let mut doc = PdfDocument::new_blank(size);

    doc.set_text_color(Color::gray());
    doc.set_font(StandardFont::HelveticaBold, TITLE_SIZE);
    doc.insert_text(TITLE, PAGE, TITLE_POSITION.0, TITLE_POSITION.1)?;

    doc.set_font(StandardFont::Helvetica, LABEL_SIZE);
    let mut slots: Vec<&FieldSlot> = layout.scalar_fields().into_iter().map(|(_, s)| s).collect();
    slots.extend(layout.install_date.iter());
    for slot in slots {
        if let Some(label) = &slot.label {
            caption(&mut doc, label, slot.y)?;
        }
        rule(&mut doc, slot.x, slot.y, slot.width)?;
    }

    for fixed in &layout.fixed_text {
        if let Some(label) = &fixed.label {
            caption(&mut doc, label, fixed.y)?;
        }
    }

    let products = &layout.products;
    if let Some(label) = &products.label {
        caption(&mut doc, label, products.y - products.spacing)?;
    }
    for index in 0..MAX_PRODUCTS {
        rule(&mut doc, products.x, products.y_for(index), products.width)?;
    }

    log::debug!("Synthesized blank template ({}x{}pt)", size.width, size.height);
    doc.to_bytes()
}

fn caption(doc: &mut PdfDocument, label: &FieldLabel, y: f64) -> pdf_core::Result<()> {
    doc.insert_text(&label.text, PAGE, label.x, y)
}

fn rule(doc: &mut PdfDocument, x: f64, y: f64, width: f64) -> pdf_core::Result<()> {
    let y = y + RULE_DROP;
    doc.draw_line(PAGE, (x, y), (x + width, y), RULE_WIDTH, Color::gray())
}
