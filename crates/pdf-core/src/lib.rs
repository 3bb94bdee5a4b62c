//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Creating blank single-page documents
//! - Inserting text at top-left origin coordinates with standard Helvetica
//! - Drawing rules and boxes
//! - Reading stamped text runs back from a page
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{PdfDocument, StandardFont};
//!
//! let mut doc = PdfDocument::open_from_bytes(&template_bytes)?;
//! doc.set_font(StandardFont::Helvetica, 10.0);
//! doc.insert_text("Hello, World!", 1, 150.0, 125.0)?;
//! let bytes = doc.to_bytes()?;
//! ```

mod document;
mod font;
mod text;

pub use document::{Color, PdfDocument, A4_HEIGHT, A4_WIDTH};
pub use font::{decode_win_ansi, encode_win_ansi, StandardFont};
pub use text::{
    generate_line_operators, generate_text_operators, parse_text_runs, TextRenderContext, TextRun,
};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// A4 portrait
    pub fn a4() -> Self {
        Self {
            width: A4_WIDTH,
            height: A4_HEIGHT,
        }
    }

    /// True when both dimensions are within `tolerance` points of `other`
    pub fn matches(&self, other: &PageSize, tolerance: f64) -> bool {
        (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}
