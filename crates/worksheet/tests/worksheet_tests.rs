//! End-to-end tests for extraction, stamping and the session flow

use futures::executor::block_on;
use lopdf::dictionary;
use pdf_core::{PdfDocument, TextRun};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::BTreeMap;
use worksheet::{
    extract, generate, load_template, stamp, synthesize_blank, ExtractionError, Fetch,
    GenerateRequest, Layout, Session, StampError, StampOptions, TemplateBuffer, TemplateOrigin,
    TemplateStatus, WorksheetError,
};

const SAMPLE: &str = "Acme Ltd\n1 Main St\n0123456\na@b.com\nWidget A\nWidget B\nSORD100\nWK55";

#[derive(Default)]
struct FakeFetch {
    responses: BTreeMap<String, Vec<u8>>,
    calls: RefCell<Vec<String>>,
}

impl Fetch for FakeFetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        self.calls.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| format!("{url}: 404"))
    }
}

/// A4 page with its own font named F1 and some drawing
fn create_form_pdf() -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let contents_id = doc.add_object(lopdf::Stream::new(
        dictionary! {},
        b"BT /F1 14 Tf 40 790 Td (JOB SHEET) Tj ET\n0.5 0 0 0.5 0 0 cm".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.28.into(), 841.89.into()],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "Contents" => contents_id,
    });
    finish(doc, pages_id, page_id)
}

/// Loads fine but cannot be drawn on: Resources points at a number
fn create_broken_resources_pdf() -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let bogus_id = doc.add_object(lopdf::Object::Integer(7));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.28.into(), 841.89.into()],
        "Resources" => bogus_id,
    });
    finish(doc, pages_id, page_id)
}

fn finish(mut doc: lopdf::Document, pages_id: lopdf::ObjectId, page_id: lopdf::ObjectId) -> Vec<u8> {
    doc.objects.insert(
        pages_id,
        lopdf::Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn uploaded(bytes: Vec<u8>) -> TemplateBuffer {
    TemplateBuffer::from_upload("form.pdf", bytes, "application/pdf").unwrap()
}

fn runs(bytes: &[u8]) -> Vec<TextRun> {
    PdfDocument::open_from_bytes(bytes)
        .unwrap()
        .text_runs(1)
        .unwrap()
}

fn request(input: &str) -> GenerateRequest {
    GenerateRequest {
        input: input.to_string(),
        ..GenerateRequest::default()
    }
}

#[test]
fn test_stamped_fields_read_back() {
    let layout = Layout::embedded().unwrap();
    let record = extract(SAMPLE).unwrap();
    let bytes = stamp(
        &uploaded(create_form_pdf()),
        &record,
        &layout,
        &StampOptions::default(),
    )
    .unwrap();

    let runs = runs(&bytes);
    assert_eq!(runs[0].text, "JOB SHEET");
    assert_eq!(runs[0].font_name, "F1");

    let stamped: Vec<(&str, &str)> = runs[1..]
        .iter()
        .map(|r| (r.text.as_str(), r.font_name.as_str()))
        .collect();
    assert!(stamped.iter().all(|(_, font)| *font == "F2"));

    let texts: Vec<&str> = stamped.iter().map(|(text, _)| *text).collect();
    for expected in ["Acme Ltd", "1 Main St", "0123456", "a@b.com", "SORD100", "WK55"] {
        assert!(texts.contains(&expected), "missing {expected}");
    }

    let products: Vec<(String, f64)> = runs
        .iter()
        .filter(|r| r.text.starts_with("Widget"))
        .map(|r| (r.text.clone(), r.y.round()))
        .collect();
    assert_eq!(
        products,
        vec![("Widget A".to_string(), 280.0), ("Widget B".to_string(), 300.0)]
    );
}

#[test]
fn test_stamping_is_idempotent() {
    let layout = Layout::embedded().unwrap();
    let record = extract(SAMPLE).unwrap();
    let template = uploaded(create_form_pdf());
    let options = StampOptions::with_install_date(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

    let first = stamp(&template, &record, &layout, &options).unwrap();
    let second = stamp(&template, &record, &layout, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_twelve_products_are_capped() {
    let mut input = String::from("Acme Ltd\n1 Main St\n0123456\na@b.com\n");
    for i in 1..=12 {
        input.push_str(&format!("Product {i}\n"));
    }
    input.push_str("SORD100\n");

    let layout = Layout::embedded().unwrap();
    let record = extract(&input).unwrap();
    assert_eq!(record.products.len(), 10);

    let template = TemplateBuffer::synthesized(&layout).unwrap();
    let bytes = stamp(&template, &record, &layout, &StampOptions::default()).unwrap();
    let runs = runs(&bytes);
    assert!(runs.iter().any(|r| r.text == "Product 10"));
    assert!(!runs.iter().any(|r| r.text == "Product 11"));
}

#[test]
fn test_synthesized_template_satisfies_layout() {
    let layout = Layout::embedded().unwrap();
    let bytes = synthesize_blank(&layout).unwrap();
    let template = TemplateBuffer::from_pdf_bytes(bytes, TemplateOrigin::Synthesized).unwrap();

    let record = extract(SAMPLE).unwrap();
    assert!(stamp(&template, &record, &layout, &StampOptions::default()).is_ok());
}

#[test]
fn test_mismatched_geometry_is_rejected() {
    let mut layout = Layout::embedded().unwrap();
    if let Some(page) = layout.page.as_mut() {
        page.width = 612.0;
        page.height = 792.0;
    }

    let record = extract(SAMPLE).unwrap();
    let err = stamp(
        &uploaded(create_form_pdf()),
        &record,
        &layout,
        &StampOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StampError::LayoutMismatch { .. }));
}

#[test]
fn test_extraction_scenarios() {
    assert!(matches!(
        extract("a\nb\nc\nd\ne"),
        Err(ExtractionError::TooFewLines { found: 5 })
    ));

    let record = extract("Acme\n1 St\n01\na@b.c\nWidget\nSORD9").unwrap();
    assert_eq!(record.reference_number, None);
    assert_eq!(record.products, vec!["Widget".to_string()]);
}

#[test]
fn test_remote_candidates_tried_in_order() {
    let layout = Layout::embedded().unwrap();
    let good = synthesize_blank(&layout).unwrap();

    let mut fetcher = FakeFetch::default();
    fetcher
        .responses
        .insert("/NEW-JOB-SHEET-2024.pdf".to_string(), b"<html>".to_vec());
    fetcher
        .responses
        .insert("/NEW%20JOB%20SHEET%20-%202024.pdf".to_string(), good);

    let cell = RefCell::new(Session::with_defaults().unwrap());
    let origin = block_on(load_template(&cell, &fetcher)).unwrap();

    assert_eq!(
        origin,
        TemplateOrigin::Remote {
            url: "/NEW%20JOB%20SHEET%20-%202024.pdf".to_string()
        }
    );
    assert_eq!(
        *fetcher.calls.borrow(),
        vec![
            "/NEW-JOB-SHEET-2024.pdf".to_string(),
            "/templates/NEW-JOB-SHEET-2024.pdf".to_string(),
            "/NEW%20JOB%20SHEET%20-%202024.pdf".to_string(),
        ]
    );
}

#[test]
fn test_stamp_failure_reloads_and_retries_once() {
    let layout = Layout::embedded().unwrap();
    let mut fetcher = FakeFetch::default();
    fetcher.responses.insert(
        "/NEW-JOB-SHEET-2024.pdf".to_string(),
        synthesize_blank(&layout).unwrap(),
    );

    let cell = RefCell::new(Session::with_defaults().unwrap());
    cell.borrow_mut()
        .upload_template("broken.pdf", create_broken_resources_pdf(), "application/pdf")
        .unwrap();

    let pdf = block_on(generate(&cell, &fetcher, request(SAMPLE))).unwrap();
    assert_eq!(pdf.filename, "Acme Ltd SORD100 Installation Worksheet.pdf");
    assert_eq!(fetcher.calls.borrow().len(), 1);

    let session = cell.borrow();
    assert_eq!(
        session.state().template,
        TemplateStatus::Ready {
            origin: TemplateOrigin::Remote {
                url: "/NEW-JOB-SHEET-2024.pdf".to_string()
            }
        }
    );
    assert!(session.state().success);
}

#[test]
fn test_layout_mismatch_is_not_retried() {
    let mut layout = Layout::embedded().unwrap();
    if let Some(page) = layout.page.as_mut() {
        page.width = 612.0;
        page.height = 792.0;
    }
    let remote = worksheet::RemoteSource::embedded().unwrap();
    let cell = RefCell::new(Session::new(layout, remote));
    cell.borrow_mut()
        .upload_template("form.pdf", create_form_pdf(), "application/pdf")
        .unwrap();

    let fetcher = FakeFetch::default();
    let err = block_on(generate(&cell, &fetcher, request(SAMPLE))).unwrap_err();

    assert!(matches!(
        err,
        WorksheetError::Stamp(StampError::LayoutMismatch { .. })
    ));
    assert!(fetcher.calls.borrow().is_empty());
    assert_eq!(cell.borrow().state().error, Some(err.to_string()));
}
