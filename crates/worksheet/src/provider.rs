//! Template acquisition
//!
//! A template is accepted only after it loads as a PDF with at least one
//! page. Sources are tried in order: a user upload replaces whatever is
//! cached, remote candidates are tried one after the other, and a blank
//! template is synthesized from the layout when nothing else works.

use crate::{synthesize_blank, Layout, StampError, TemplateUnavailable, UploadRejected};
use pdf_core::{PageSize, PdfDocument, PdfError};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Embedded default list of remote template locations
pub const DEFAULT_REMOTE: &str = include_str!("../data/remote.json");

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Where the current template came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TemplateOrigin {
    Uploaded { name: String },
    Remote { url: String },
    Synthesized,
}

/// Validated template bytes
#[derive(Debug, Clone)]
pub struct TemplateBuffer {
    bytes: Vec<u8>,
    origin: TemplateOrigin,
    page_count: usize,
    page_size: PageSize,
}

impl TemplateBuffer {
    /// Accept bytes after checking they load as a document with pages
    pub fn from_pdf_bytes(bytes: Vec<u8>, origin: TemplateOrigin) -> Result<Self, PdfError> {
        let doc = PdfDocument::open_from_bytes(&bytes)?;
        let page_count = doc.page_count();
        if page_count == 0 {
            return Err(PdfError::ParseError("document has no pages".to_string()));
        }
        let page_size = doc.page_size(1)?;

        Ok(Self {
            bytes,
            origin,
            page_count,
            page_size,
        })
    }

    /// Accept a file chosen by the user
    ///
    /// The declared content type must be `application/pdf`.
    pub fn from_upload(
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Self, UploadRejected> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if mime != PDF_CONTENT_TYPE {
            return Err(UploadRejected::WrongType(content_type.to_string()));
        }
        if bytes.is_empty() {
            return Err(UploadRejected::Unreadable("the file is empty".to_string()));
        }

        let origin = TemplateOrigin::Uploaded {
            name: name.to_string(),
        };
        Self::from_pdf_bytes(bytes, origin).map_err(|e| UploadRejected::Unreadable(e.to_string()))
    }

    /// Build a blank template that follows `layout`
    pub fn synthesized(layout: &Layout) -> Result<Self, StampError> {
        let bytes = synthesize_blank(layout)
            .map_err(|e| StampError::InvalidTemplate(format!("blank template: {e}")))?;
        Self::from_pdf_bytes(bytes, TemplateOrigin::Synthesized)
            .map_err(|e| StampError::InvalidTemplate(format!("blank template: {e}")))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn origin(&self) -> &TemplateOrigin {
        &self.origin
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Size of the first page
    pub fn page_size(&self) -> PageSize {
        self.page_size
    }
}

/// Fixed remote location and the ordered paths to try under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSource {
    /// Prefix joined to every path; empty for same-origin requests
    #[serde(default)]
    pub base_url: String,
    pub paths: Vec<String>,
}

impl RemoteSource {
    /// The locations shipped with the crate
    pub fn embedded() -> Result<Self, serde_json::Error> {
        serde_json::from_str(DEFAULT_REMOTE)
    }

    /// Full URLs in the order they should be tried
    pub fn candidates(&self) -> Vec<String> {
        let base = self.base_url.trim_end_matches('/');
        self.paths
            .iter()
            .map(|path| {
                if base.is_empty() {
                    path.clone()
                } else {
                    format!("{base}/{}", path.trim_start_matches('/'))
                }
            })
            .collect()
    }
}

/// Something that can download bytes from a URL
///
/// Implemented over the browser's fetch in the wasm crate.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, String>>;
}

/// A candidate that did not produce a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub url: String,
    pub reason: String,
}

/// Try every remote candidate in order until one loads
pub async fn acquire_remote<F: Fetch>(
    source: &RemoteSource,
    fetcher: &F,
) -> Result<TemplateBuffer, TemplateUnavailable> {
    let mut attempts = Vec::new();

    for url in source.candidates() {
        log::debug!("Fetching template from {url}");
        let reason = match fetcher.fetch(&url).await {
            Ok(bytes) => {
                let origin = TemplateOrigin::Remote { url: url.clone() };
                match TemplateBuffer::from_pdf_bytes(bytes, origin) {
                    Ok(buffer) => {
                        log::info!("Loaded template from {url}");
                        return Ok(buffer);
                    }
                    Err(e) => e.to_string(),
                }
            }
            Err(e) => e,
        };
        log::debug!("Template candidate {url} rejected: {reason}");
        attempts.push(FetchAttempt { url, reason });
    }

    Err(TemplateUnavailable { attempts })
}

/// Holds the template for the current session
#[derive(Debug, Clone)]
pub struct TemplateProvider {
    remote: RemoteSource,
    current: Option<TemplateBuffer>,
}

impl TemplateProvider {
    pub fn new(remote: RemoteSource) -> Self {
        Self {
            remote,
            current: None,
        }
    }

    pub fn remote(&self) -> &RemoteSource {
        &self.remote
    }

    pub fn current(&self) -> Option<&TemplateBuffer> {
        self.current.as_ref()
    }

    /// Cache a template for reuse, replacing any previous one
    pub fn install(&mut self, buffer: TemplateBuffer) -> &TemplateBuffer {
        self.current.insert(buffer)
    }

    /// Forget the cached template
    pub fn clear(&mut self) {
        self.current = None;
    }
}
