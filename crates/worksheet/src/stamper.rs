//! Document stamping

use crate::{FieldSlot, JobRecord, Layout, StampError, TemplateBuffer};
use chrono::NaiveDate;
use pdf_core::{Color, PdfDocument, StandardFont};

/// Format used for the install date
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const PAGE: usize = 1;
const FONT: StandardFont = StandardFont::Helvetica;

/// Values that come from the environment rather than the pasted text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampOptions {
    /// Printed at every install-date slot; nothing is printed when absent
    pub install_date: Option<NaiveDate>,
}

impl StampOptions {
    pub fn with_install_date(date: NaiveDate) -> Self {
        Self {
            install_date: Some(date),
        }
    }
}

/// Writes a job record onto a template using a layout
pub struct Stamper<'a> {
    layout: &'a Layout,
    options: StampOptions,
}

impl<'a> Stamper<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self {
            layout,
            options: StampOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StampOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_install_date(mut self, date: NaiveDate) -> Self {
        self.options.install_date = Some(date);
        self
    }

    /// Load `template`, stamp `record` and serialize the result
    pub fn stamp(&self, template: &TemplateBuffer, record: &JobRecord) -> Result<Vec<u8>, StampError> {
        let mut doc = PdfDocument::open_from_bytes(template.bytes())
            .map_err(|e| StampError::InvalidTemplate(e.to_string()))?;

        self.check_geometry(&doc)?;
        self.render(&mut doc, record)?;

        doc.to_bytes().map_err(|e| StampError::Serialize(e.to_string()))
    }

    /// Draw every field of `record` onto the first page of `doc`
    pub fn render(&self, doc: &mut PdfDocument, record: &JobRecord) -> Result<(), StampError> {
        doc.set_text_color(Color::black());

        let layout = self.layout;
        let scalars = [
            (&layout.reference_number, record.reference().unwrap_or_default()),
            (&layout.customer_name, record.customer_name.as_str()),
            (&layout.order_number, record.order_number.as_str()),
            (&layout.address, record.address.as_str()),
            (&layout.phone, record.phone.as_str()),
            (&layout.email, record.email.as_str()),
        ];
        for (slot, value) in scalars {
            draw(doc, slot, value)?;
        }

        if let Some(date) = self.options.install_date {
            let text = date.format(DATE_FORMAT).to_string();
            for slot in &layout.install_date {
                draw(doc, slot, &text)?;
            }
        }

        for fixed in &layout.fixed_text {
            doc.set_font(FONT, fixed.size);
            doc.insert_text(&fixed.text, PAGE, fixed.x, fixed.y)
                .map_err(render_error)?;
        }

        let products = &layout.products;
        doc.set_font(FONT, products.size);
        for (index, product) in record.products.iter().enumerate() {
            doc.insert_text(product, PAGE, products.x, products.y_for(index))
                .map_err(render_error)?;
        }

        log::debug!(
            "Stamped {} with {} product(s)",
            record.order_number,
            record.products.len()
        );
        Ok(())
    }

    fn check_geometry(&self, doc: &PdfDocument) -> Result<(), StampError> {
        if doc.page_count() == 0 {
            return Err(StampError::InvalidTemplate("document has no pages".to_string()));
        }

        let Some(expected) = self.layout.page else {
            return Ok(());
        };
        let found = doc
            .page_size(PAGE)
            .map_err(|e| StampError::InvalidTemplate(e.to_string()))?;

        if !found.matches(&expected.size(), expected.tolerance) {
            return Err(StampError::LayoutMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                found_width: found.width,
                found_height: found.height,
            });
        }
        Ok(())
    }
}

fn draw(doc: &mut PdfDocument, slot: &FieldSlot, value: &str) -> Result<(), StampError> {
    if value.is_empty() {
        return Ok(());
    }
    doc.set_font(FONT, slot.size);
    doc.insert_text(value, PAGE, slot.x, slot.y)
        .map_err(render_error)
}

fn render_error(e: pdf_core::PdfError) -> StampError {
    StampError::InvalidTemplate(e.to_string())
}

/// Stamp `record` onto `template` using `layout`
///
/// The template bytes are not modified. Stamping the same record into the
/// same template with the same options always produces identical bytes.
pub fn stamp(
    template: &TemplateBuffer,
    record: &JobRecord,
    layout: &Layout,
    options: &StampOptions,
) -> Result<Vec<u8>, StampError> {
    Stamper::new(layout)
        .with_options(options.clone())
        .stamp(template, record)
}
