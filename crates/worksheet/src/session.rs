//! Session orchestration
//!
//! A [`Session`] owns the layout, the template cache and the presentation
//! state. The async flows take the session behind a `RefCell` and release
//! every borrow before awaiting, so the browser can keep calling into the
//! session while a fetch is in flight.

use crate::{
    acquire_remote, extract_with, output_filename, stamp, Action, ExtractionError, Fetch,
    JobRecord, Layout, ProductBoundary, RemoteSource, Result, ShellState, StampError,
    StampOptions, TemplateBuffer, TemplateOrigin, TemplateProvider, TemplateStatus,
    WorksheetError,
};
use chrono::NaiveDate;
use std::cell::RefCell;

/// Input for one generate attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    pub input: String,
    pub install_date: Option<NaiveDate>,

    /// Show inline instead of downloading
    pub preview: bool,
}

/// A stamped worksheet ready to hand to the browser
#[derive(Debug, Clone)]
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub preview: bool,
    pub record: JobRecord,
}

/// State for one page session
pub struct Session {
    layout: Layout,
    provider: TemplateProvider,
    state: ShellState,
    boundary: ProductBoundary,
}

impl Session {
    pub fn new(layout: Layout, remote: RemoteSource) -> Self {
        Self {
            layout,
            provider: TemplateProvider::new(remote),
            state: ShellState::default(),
            boundary: ProductBoundary::default(),
        }
    }

    /// Session using the embedded layout and remote locations
    pub fn with_defaults() -> Result<Self> {
        let layout = Layout::embedded()?;
        let remote = RemoteSource::embedded().map_err(crate::LayoutError::from)?;
        Ok(Self::new(layout, remote))
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn template(&self) -> Option<&TemplateBuffer> {
        self.provider.current()
    }

    pub fn set_boundary(&mut self, boundary: ProductBoundary) {
        self.boundary = boundary;
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.state.apply(Action::InputChanged(text.into()));
    }

    pub fn close_preview(&mut self) {
        self.state.apply(Action::PreviewClosed);
    }

    /// Build a request from the current input
    pub fn request(&self, install_date: Option<NaiveDate>, preview: bool) -> GenerateRequest {
        GenerateRequest {
            input: self.state.input.clone(),
            install_date,
            preview,
        }
    }

    /// Replace the template with a user-supplied file
    pub fn upload_template(&mut self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        match TemplateBuffer::from_upload(name, bytes, content_type) {
            Ok(buffer) => {
                log::info!("Using uploaded template {name}");
                self.install(buffer);
                Ok(())
            }
            Err(e) => {
                self.state.apply(Action::UploadRejected(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Replace the template with a synthesized blank one
    pub fn use_blank_template(&mut self) -> Result<()> {
        let buffer = TemplateBuffer::synthesized(&self.layout)?;
        self.install(buffer);
        Ok(())
    }

    /// Parse text with the session's product boundary
    pub fn extract(&self, text: &str) -> std::result::Result<JobRecord, ExtractionError> {
        extract_with(text, self.boundary)
    }

    /// Extract and stamp without touching the presentation state
    pub fn render(&self, request: &GenerateRequest) -> Result<GeneratedPdf> {
        let record = self.extract(&request.input)?;
        let bytes = self.render_record(&record, request.install_date)?;
        Ok(GeneratedPdf {
            filename: output_filename(&record),
            bytes,
            preview: request.preview,
            record,
        })
    }

    /// Stamp an already extracted record onto the current template
    pub fn render_record(&self, record: &JobRecord, install_date: Option<NaiveDate>) -> Result<Vec<u8>> {
        let template = self.provider.current().ok_or(WorksheetError::NoTemplate)?;
        let options = StampOptions { install_date };
        Ok(stamp(template, record, &self.layout, &options)?)
    }

    fn install(&mut self, buffer: TemplateBuffer) {
        let origin = buffer.origin().clone();
        self.provider.install(buffer);
        self.state.apply(Action::TemplateReady(origin));
    }
}

/// Fetch the remote template, falling back to a synthesized blank one
pub async fn load_template<F: Fetch>(cell: &RefCell<Session>, fetcher: &F) -> Result<TemplateOrigin> {
    let remote = {
        let mut session = cell.borrow_mut();
        if session.state.template == TemplateStatus::Loading {
            return Err(WorksheetError::TemplateLoading);
        }
        session.state.apply(Action::TemplateLoading);
        session.provider.remote().clone()
    };

    let fetched = acquire_remote(&remote, fetcher).await;

    let mut session = cell.borrow_mut();
    let buffer = match fetched {
        Ok(buffer) => buffer,
        Err(unavailable) => {
            log::warn!("{unavailable}; using a blank template");
            match TemplateBuffer::synthesized(&session.layout) {
                Ok(buffer) => buffer,
                Err(e) => {
                    session.state.apply(Action::TemplateFailed(e.to_string()));
                    return Err(e.into());
                }
            }
        }
    };

    let origin = buffer.origin().clone();
    session.install(buffer);
    Ok(origin)
}

/// Run one generate attempt and record the outcome in the shell state
///
/// A stamp failure reloads the template and retries once. A layout mismatch
/// is not retried since reloading cannot change the page geometry of an
/// uploaded template.
pub async fn generate<F: Fetch>(
    cell: &RefCell<Session>,
    fetcher: &F,
    request: GenerateRequest,
) -> Result<GeneratedPdf> {
    {
        let mut session = cell.borrow_mut();
        if session.state.loading {
            return Err(WorksheetError::Busy);
        }
        session.state.apply(Action::GenerateStarted);
    }

    let outcome = run_generate(cell, fetcher, &request).await;

    let mut session = cell.borrow_mut();
    match &outcome {
        Ok(pdf) => {
            log::info!("Generated {}", pdf.filename);
            session.state.apply(Action::GenerateSucceeded {
                preview: request.preview,
            });
        }
        Err(e) => {
            log::error!("Failed to generate worksheet: {e}");
            session.state.apply(Action::GenerateFailed(e.to_string()));
        }
    }
    outcome
}

async fn run_generate<F: Fetch>(
    cell: &RefCell<Session>,
    fetcher: &F,
    request: &GenerateRequest,
) -> Result<GeneratedPdf> {
    let record = cell.borrow().extract(&request.input)?;

    if cell.borrow().template().is_none() {
        load_template(cell, fetcher).await?;
    }

    let first = cell.borrow().render_record(&record, request.install_date);
    let bytes = match first {
        Ok(bytes) => bytes,
        Err(WorksheetError::Stamp(e)) if !matches!(e, StampError::LayoutMismatch { .. }) => {
            log::warn!("Stamping failed ({e}); reloading the template and retrying");
            cell.borrow_mut().provider.clear();
            load_template(cell, fetcher).await?;
            cell.borrow().render_record(&record, request.install_date)?
        }
        Err(e) => return Err(e),
    };

    Ok(GeneratedPdf {
        filename: output_filename(&record),
        bytes,
        preview: request.preview,
        record,
    })
}
