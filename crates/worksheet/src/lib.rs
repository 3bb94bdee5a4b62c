//! Worksheet - installation worksheet extraction and stamping
//!
//! This crate provides:
//! - Field extraction from pasted job text
//! - The field-to-coordinate layout (embedded JSON, versioned)
//! - Stamping a job record onto a PDF template
//! - Template acquisition (upload, remote candidates, synthesized blank)
//! - Presentation state and the generate/retry session flow
//!
//! # Example
//!
//! ```ignore
//! use worksheet::{extract, stamp, Layout, StampOptions, TemplateBuffer, TemplateOrigin};
//!
//! let record = extract(pasted_text)?;
//! let layout = Layout::embedded()?;
//! let template = TemplateBuffer::from_pdf_bytes(pdf_bytes, TemplateOrigin::Synthesized)?;
//! let filled = stamp(&template, &record, &layout, &StampOptions::default())?;
//! ```

mod blank;
mod layout;
mod provider;
mod record;
mod session;
mod shell;
mod stamper;

pub use blank::synthesize_blank;
pub use layout::{
    FieldLabel, FieldSlot, FixedText, Layout, PageGeometry, ProductSlots, DEFAULT_LAYOUT,
    LAYOUT_VERSION,
};
pub use provider::{
    acquire_remote, Fetch, FetchAttempt, RemoteSource, TemplateBuffer, TemplateOrigin,
    TemplateProvider, DEFAULT_REMOTE,
};
pub use record::{extract, extract_with, JobRecord, ProductBoundary, MAX_PRODUCTS, MIN_LINES};
pub use session::{generate, load_template, GenerateRequest, GeneratedPdf, Session};
pub use shell::{output_filename, Action, ShellState, TemplateStatus};
pub use stamper::{stamp, StampOptions, Stamper, DATE_FORMAT};

use thiserror::Error;

/// Errors produced while turning pasted text into a job record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("too few lines: expected at least 6 (name, address, phone, email, a product and the SORD number), found {found}")]
    TooFewLines { found: usize },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("no product lines between the email and the SORD number")]
    NoProducts,

    #[error("WK number must start with 'WK', got {0:?}")]
    InvalidReference(String),
}

/// Errors produced while stamping a record onto a template
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StampError {
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("template page is {found_width}x{found_height}pt but the layout expects {expected_width}x{expected_height}pt")]
    LayoutMismatch {
        expected_width: f64,
        expected_height: f64,
        found_width: f64,
        found_height: f64,
    },

    #[error("failed to write document: {0}")]
    Serialize(String),
}

/// Every template candidate failed to fetch or load
#[derive(Debug, Error)]
#[error("no template source yielded a valid document ({} tried)", .attempts.len())]
pub struct TemplateUnavailable {
    pub attempts: Vec<FetchAttempt>,
}

/// Errors for user-supplied template files
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadRejected {
    #[error("Please upload a PDF file (got {0:?})")]
    WrongType(String),

    #[error("Failed to read the PDF file: {0}")]
    Unreadable(String),
}

/// Errors loading a layout configuration
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to parse layout: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid layout: {0}")]
    Invalid(String),
}

/// Errors surfaced by a worksheet session
#[derive(Debug, Error)]
pub enum WorksheetError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Stamp(#[from] StampError),

    #[error(transparent)]
    TemplateUnavailable(#[from] TemplateUnavailable),

    #[error(transparent)]
    Upload(#[from] UploadRejected),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Please load a PDF template first")]
    NoTemplate,

    #[error("A worksheet is already being generated")]
    Busy,

    #[error("A template is already being loaded")]
    TemplateLoading,
}

/// Result type for worksheet operations
pub type Result<T> = std::result::Result<T, WorksheetError>;
