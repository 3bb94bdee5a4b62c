//! WASM bindings for worksheet-filler
//!
//! This crate provides JavaScript-friendly API for:
//! - Extracting a job record from pasted text
//! - Loading a template (upload, remote fetch or blank)
//! - Generating the filled worksheet for download or preview
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { WorksheetApp } from 'worksheet-wasm';
//!
//! await init();
//!
//! const app = new WorksheetApp();
//! await app.loadTemplate();
//!
//! app.setInput(textarea.value);
//! const result = await app.generate(false);
//! app.download(result.bytes, result.filename);
//! ```

use chrono::NaiveDate;
use gloo_net::http::Request;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;
use worksheet::{Fetch, GeneratedPdf, Layout, ProductBoundary, RemoteSource, Session};

const PDF_MIME: &str = "application/pdf";

/// How long a download link stays valid after it is clicked
const REVOKE_DELAY_MS: i32 = 60_000;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout)]
    fn set_timeout(handler: &JsValue, timeout: i32) -> JsValue;
}

/// Forwards `log` records to the browser console
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Change how much is logged to the console
///
/// @param level - "error", "warn", "info", "debug" or "trace"
#[wasm_bindgen(js_name = setLogLevel)]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter: LevelFilter = level
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Unknown log level: {level}")))?;
    log::set_max_level(filter);
    Ok(())
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Browser fetch
struct GlooFetch;

impl Fetch for GlooFetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = Request::get(url).send().await.map_err(|e| e.to_string())?;
        if !response.ok() {
            return Err(format!("HTTP {} {}", response.status(), response.status_text()));
        }
        response.binary().await.map_err(|e| e.to_string())
    }
}

/// Today's date in the browser's time zone
fn today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(
        now.get_full_year() as i32,
        now.get_month() + 1,
        now.get_date(),
    )
}

/// A stamped worksheet
#[wasm_bindgen]
pub struct GeneratedWorksheet {
    bytes: Vec<u8>,
    filename: String,
    preview: bool,
}

#[wasm_bindgen]
impl GeneratedWorksheet {
    /// PDF bytes (Uint8Array)
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn filename(&self) -> String {
        self.filename.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn preview(&self) -> bool {
        self.preview
    }
}

impl From<GeneratedPdf> for GeneratedWorksheet {
    fn from(pdf: GeneratedPdf) -> Self {
        Self {
            bytes: pdf.bytes,
            filename: pdf.filename,
            preview: pdf.preview,
        }
    }
}

/// Installation worksheet session
#[wasm_bindgen]
pub struct WorksheetApp {
    session: Rc<RefCell<Session>>,
}

#[wasm_bindgen]
impl WorksheetApp {
    /// Create a session with the built-in layout and template locations
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WorksheetApp, JsValue> {
        let session = Session::with_defaults().map_err(to_js)?;
        Ok(WorksheetApp {
            session: Rc::new(RefCell::new(session)),
        })
    }

    /// Create a session with a custom layout
    ///
    /// @param json - Layout JSON string
    #[wasm_bindgen(js_name = withLayout)]
    pub fn with_layout(json: &str) -> Result<WorksheetApp, JsValue> {
        let layout = Layout::from_json(json).map_err(to_js)?;
        let remote = RemoteSource::embedded().map_err(to_js)?;
        Ok(WorksheetApp {
            session: Rc::new(RefCell::new(Session::new(layout, remote))),
        })
    }

    /// Current presentation state as a plain object
    pub fn state(&self) -> Result<JsValue, JsValue> {
        let session = self.session.borrow();
        serde_wasm_bindgen::to_value(session.state()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = canGenerate)]
    pub fn can_generate(&self) -> bool {
        self.session.borrow().state().can_generate()
    }

    /// @param text - Contents of the paste box
    #[wasm_bindgen(js_name = setInput)]
    pub fn set_input(&self, text: &str) {
        self.session.borrow_mut().set_input(text);
    }

    /// Choose how the end of the product list is found
    ///
    /// @param boundary - "last-line" or "keyword-scan"
    #[wasm_bindgen(js_name = setProductBoundary)]
    pub fn set_product_boundary(&self, boundary: &str) -> Result<(), JsValue> {
        let boundary: ProductBoundary =
            serde_wasm_bindgen::from_value(JsValue::from_str(boundary)).map_err(to_js)?;
        self.session.borrow_mut().set_boundary(boundary);
        Ok(())
    }

    /// Parse text without generating anything
    ///
    /// Uses the boundary chosen with `setProductBoundary`.
    ///
    /// @param text - Pasted job text
    /// @returns Job record object
    pub fn extract(&self, text: &str) -> Result<JsValue, JsValue> {
        let record = self.session.borrow().extract(text).map_err(to_js)?;
        serde_wasm_bindgen::to_value(&record).map_err(to_js)
    }

    /// Use a file chosen by the user as the template
    ///
    /// @param name - File name
    /// @param data - File bytes (Uint8Array)
    /// @param contentType - The file's MIME type
    #[wasm_bindgen(js_name = uploadTemplate)]
    pub fn upload_template(&self, name: &str, data: &[u8], content_type: &str) -> Result<(), JsValue> {
        self.session
            .borrow_mut()
            .upload_template(name, data.to_vec(), content_type)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = useBlankTemplate)]
    pub fn use_blank_template(&self) -> Result<(), JsValue> {
        self.session.borrow_mut().use_blank_template().map_err(to_js)
    }

    /// Fetch the shared template, falling back to a blank one
    ///
    /// @returns Promise resolving to the template origin
    #[wasm_bindgen(js_name = loadTemplate)]
    pub fn load_template(&self) -> js_sys::Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let origin = worksheet::load_template(&session, &GlooFetch)
                .await
                .map_err(to_js)?;
            serde_wasm_bindgen::to_value(&origin).map_err(to_js)
        })
    }

    /// Stamp the current input onto the template
    ///
    /// @param preview - Show inline instead of downloading
    /// @returns Promise resolving to a GeneratedWorksheet
    pub fn generate(&self, preview: bool) -> js_sys::Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let request = session.borrow().request(today(), preview);
            let pdf = worksheet::generate(&session, &GlooFetch, request)
                .await
                .map_err(to_js)?;
            Ok(GeneratedWorksheet::from(pdf).into())
        })
    }

    #[wasm_bindgen(js_name = closePreview)]
    pub fn close_preview(&self) {
        self.session.borrow_mut().close_preview();
    }

    /// Save bytes through the browser's download mechanism
    ///
    /// @param data - PDF bytes (Uint8Array)
    /// @param filename - Suggested file name
    pub fn download(&self, data: &[u8], filename: &str) -> Result<(), JsValue> {
        let url = object_url(data)?;
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("No document available"))?;

        let anchor: web_sys::HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
        anchor.set_href(&url);
        anchor.set_download(filename);
        anchor.click();

        revoke_later(url);
        Ok(())
    }

    /// Object URL for showing bytes in an iframe; revoke it when done
    ///
    /// @param data - PDF bytes (Uint8Array)
    #[wasm_bindgen(js_name = previewUrl)]
    pub fn preview_url(&self, data: &[u8]) -> Result<String, JsValue> {
        object_url(data)
    }
}

/// Release an object URL once the browser has had time to start the download
fn revoke_later(url: String) {
    let revoke = Closure::once_into_js(move || {
        if let Err(e) = web_sys::Url::revoke_object_url(&url) {
            log::warn!("Failed to revoke {url}: {e:?}");
        }
    });
    set_timeout(&revoke, REVOKE_DELAY_MS);
}

fn object_url(data: &[u8]) -> Result<String, JsValue> {
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(data));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(PDF_MIME);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
    web_sys::Url::create_object_url_with_blob(&blob)
}
