//! PDF Document wrapper

use crate::text::{
    generate_line_operators, generate_text_operators, operand_f64, parse_text_runs,
    TextRenderContext, TextRun,
};
use crate::{encode_win_ansi, PageSize, PdfError, Result, StandardFont};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet};

/// A4 width in points
pub const A4_WIDTH: f64 = 595.28;
/// A4 height in points
pub const A4_HEIGHT: f64 = 841.89;

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Black color
    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// Mid gray
    pub fn gray() -> Self {
        Self::rgb(0.5, 0.5, 0.5)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// PDF Document wrapper providing high-level operations
///
/// All coordinates taken by this type are in points with the origin at the
/// top-left corner of the page. They are converted to PDF's bottom-left
/// origin with `page_height - y` before anything is written.
///
/// Drawing is buffered and written to the underlying document by
/// [`PdfDocument::to_bytes`]. Every map is ordered so that the same
/// sequence of calls always produces the same bytes.
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Current font
    current_font: StandardFont,
    /// Current font size
    current_font_size: f32,
    /// Current text color
    current_text_color: Color,
    /// Font dictionaries added to the document (font -> PDF object ID)
    embedded_fonts: BTreeMap<StandardFont, ObjectId>,
    /// Page font resources (page number -> font -> resource name)
    page_font_resources: BTreeMap<usize, BTreeMap<StandardFont, String>>,
    /// Buffered content operators per page (page number -> operators)
    page_content_buffer: BTreeMap<usize, Vec<u8>>,
}

impl PdfDocument {
    fn from_document(inner: Document) -> Self {
        Self {
            inner,
            current_font: StandardFont::default(),
            current_font_size: 12.0,
            current_text_color: Color::default(),
            embedded_fonts: BTreeMap::new(),
            page_font_resources: BTreeMap::new(),
            page_content_buffer: BTreeMap::new(),
        }
    }

    /// Open a PDF document from bytes
    ///
    /// # Arguments
    /// * `data` - PDF file bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Create a document with a single empty page
    ///
    /// # Example
    /// ```ignore
    /// let mut doc = PdfDocument::new_blank(PageSize::a4());
    /// doc.insert_text("Customer Name", 1, 50.0, 125.0)?;
    /// let bytes = doc.to_bytes()?;
    /// ```
    pub fn new_blank(size: PageSize) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let contents_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(size.width as _),
                Object::Real(size.height as _),
            ],
            "Resources" => dictionary! {},
            "Contents" => contents_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Self::from_document(doc)
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Set current font and size for subsequent text insertions
    pub fn set_font(&mut self, font: StandardFont, size: f32) {
        self.current_font = font;
        self.current_font_size = size;
    }

    /// Set text color for subsequent text insertions
    pub fn set_text_color(&mut self, color: Color) {
        self.current_text_color = color;
    }

    /// Insert text at a specific position
    ///
    /// # Arguments
    /// * `text` - Text to insert
    /// * `page` - Page number (1-indexed)
    /// * `x` - X coordinate in points
    /// * `y` - Y coordinate in points (from top)
    pub fn insert_text(&mut self, text: &str, page: usize, x: f64, y: f64) -> Result<()> {
        self.check_page(page)?;

        // Skip empty text - nothing to render
        if text.is_empty() {
            return Ok(());
        }

        let (encoded, replaced) = encode_win_ansi(text);
        if replaced > 0 {
            log::warn!(
                "{replaced} character(s) in {text:?} are outside WinAnsiEncoding and were replaced"
            );
        }

        let pdf_y = self.page_size(page)?.height - y;
        let font_resource_name = self.get_or_create_font_ref(self.current_font, page)?;
        let ctx = TextRenderContext {
            font_name: font_resource_name,
            font_size: self.current_font_size,
            color: self.current_text_color,
        };

        let ops = generate_text_operators(&encoded, x, pdf_y, &ctx);
        self.buffer_content(page, &ops);
        Ok(())
    }

    /// Draw a straight line between two points (top-left origin)
    pub fn draw_line(
        &mut self,
        page: usize,
        from: (f64, f64),
        to: (f64, f64),
        line_width: f64,
        color: Color,
    ) -> Result<()> {
        self.check_page(page)?;
        let height = self.page_size(page)?.height;
        let ops = generate_line_operators(
            from.0,
            height - from.1,
            to.0,
            height - to.1,
            line_width,
            color,
        );
        self.buffer_content(page, &ops);
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.embed_fonts();
        self.finalize_page_font_resources()?;
        self.flush_content_buffers()?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Read back the text shown on a page
    ///
    /// Only content already written to the document is visible; call
    /// [`PdfDocument::to_bytes`] and reopen to include buffered drawing.
    /// Returned `y` values use the same top-left origin as `insert_text`.
    pub fn text_runs(&self, page: usize) -> Result<Vec<TextRun>> {
        let page_id = self.page_id(page)?;
        let height = self.page_size(page)?.height;
        let content = self.inner.get_page_content(page_id)?;

        let mut runs = parse_text_runs(&content)?;
        for run in &mut runs {
            run.y = height - run.y;
        }
        Ok(runs)
    }

    /// Get page size in points
    ///
    /// Extracts the size from the MediaBox or CropBox, following the
    /// parent Pages chain for inherited values.
    pub fn page_size(&self, page: usize) -> Result<PageSize> {
        let page_id = self.page_id(page)?;
        let media_box = self.get_inherited_media_box(page_id)?;
        extract_size_from_media_box(&media_box)
    }

    fn check_page(&self, page: usize) -> Result<()> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PdfError::InvalidPage(page, page_count));
        }
        Ok(())
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        pages
            .get(&(page as u32))
            .copied()
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Get MediaBox, following parent inheritance chain if needed
    fn get_inherited_media_box(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let mut current_id = page_id;

        // Follow parent chain up to 10 levels (safety limit)
        for _ in 0..10 {
            let dict = self
                .inner
                .get_dictionary(current_id)
                .map_err(|_| PdfError::ParseError("Object is not a dictionary".to_string()))?;

            if let Ok(media_box) = dict.get(b"MediaBox").or_else(|_| dict.get(b"CropBox")) {
                let media_box_array = match media_box {
                    Object::Array(arr) => arr.clone(),
                    Object::Reference(ref_id) => self
                        .inner
                        .get_object(*ref_id)?
                        .as_array()
                        .map_err(|_| {
                            PdfError::ParseError("MediaBox reference is not an array".to_string())
                        })?
                        .clone(),
                    _ => return Err(PdfError::ParseError("MediaBox is not an array".to_string())),
                };
                return Ok(media_box_array);
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        // Fallback: assume A4 page size
        Ok(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(A4_WIDTH as _),
            Object::Real(A4_HEIGHT as _),
        ])
    }

    /// Resolve the Resources dictionary a page uses, including inherited ones
    fn get_inherited_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut current_id = page_id;

        for _ in 0..10 {
            let dict = self
                .inner
                .get_dictionary(current_id)
                .map_err(|_| PdfError::ParseError("Object is not a dictionary".to_string()))?;

            match dict.get(b"Resources") {
                Ok(Object::Dictionary(resources)) => return Ok(resources.clone()),
                Ok(Object::Reference(ref_id)) => {
                    return self
                        .inner
                        .get_dictionary(*ref_id)
                        .cloned()
                        .map_err(|_| {
                            PdfError::ParseError("Resources is not a dictionary".to_string())
                        });
                }
                _ => {}
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        Ok(Dictionary::new())
    }

    /// Resolve the Font dictionary inside a Resources dictionary
    fn resolve_font_dict(&self, resources: &Dictionary) -> Dictionary {
        match resources.get(b"Font") {
            Ok(Object::Dictionary(fonts)) => fonts.clone(),
            Ok(Object::Reference(ref_id)) => self
                .inner
                .get_dictionary(*ref_id)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new()),
            _ => Dictionary::new(),
        }
    }

    /// Get or create a font resource name for a specific page
    ///
    /// Names already used by the template's own fonts on that page are skipped.
    fn get_or_create_font_ref(&mut self, font: StandardFont, page: usize) -> Result<String> {
        if let Some(name) = self
            .page_font_resources
            .get(&page)
            .and_then(|fonts| fonts.get(&font))
        {
            return Ok(name.clone());
        }

        let page_id = self.page_id(page)?;
        let resources = self.get_inherited_resources(page_id)?;
        let existing = self.resolve_font_dict(&resources);

        let taken: BTreeSet<String> = self
            .page_font_resources
            .get(&page)
            .map(|fonts| fonts.values().cloned().collect())
            .unwrap_or_default();

        let resource_name = (1..)
            .map(|n| format!("F{n}"))
            .find(|name| !existing.has(name.as_bytes()) && !taken.contains(name))
            .unwrap_or_else(|| "F0".to_string());

        self.page_font_resources
            .entry(page)
            .or_default()
            .insert(font, resource_name.clone());

        Ok(resource_name)
    }

    /// Add one font dictionary per used font
    fn embed_fonts(&mut self) {
        let used: BTreeSet<StandardFont> = self
            .page_font_resources
            .values()
            .flat_map(|fonts| fonts.keys().copied())
            .collect();

        for font in used {
            if !self.embedded_fonts.contains_key(&font) {
                let id = self.inner.add_object(font.to_dictionary());
                self.embedded_fonts.insert(font, id);
            }
        }
    }

    /// Write font references into each page's own Resources dictionary
    fn finalize_page_font_resources(&mut self) -> Result<()> {
        let pages: Vec<(usize, Vec<(StandardFont, String)>)> = self
            .page_font_resources
            .iter()
            .map(|(&page, fonts)| {
                (
                    page,
                    fonts.iter().map(|(f, name)| (*f, name.clone())).collect(),
                )
            })
            .collect();

        for (page, fonts) in pages {
            let page_id = self.page_id(page)?;
            let mut resources = self.get_inherited_resources(page_id)?;
            let mut font_dict = self.resolve_font_dict(&resources);

            for (font, resource_name) in fonts {
                let font_ref = self.embedded_fonts.get(&font).ok_or_else(|| {
                    PdfError::SaveError(format!("Font {} was not embedded", font.base_font()))
                })?;
                font_dict.set(resource_name.as_bytes(), Object::Reference(*font_ref));
            }

            resources.set("Font", Object::Dictionary(font_dict));

            let mut page_dict = self
                .inner
                .get_dictionary(page_id)
                .map_err(|_| PdfError::SaveError("Page object is not a dictionary".to_string()))?
                .clone();
            page_dict.set("Resources", Object::Dictionary(resources));
            self.inner.objects.insert(page_id, page_dict.into());
        }

        Ok(())
    }

    /// Buffer content operators for a page (written at save time)
    fn buffer_content(&mut self, page: usize, content: &[u8]) {
        self.page_content_buffer
            .entry(page)
            .or_default()
            .extend_from_slice(content);
    }

    /// Flush all buffered content to page streams
    fn flush_content_buffers(&mut self) -> Result<()> {
        let buffers = std::mem::take(&mut self.page_content_buffer);

        for (page, content) in buffers {
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }

        Ok(())
    }

    /// Append content to a page's content streams
    ///
    /// The existing streams are left untouched and wrapped in `q`/`Q` so any
    /// transformation the template leaves behind cannot move the new content.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut page_dict = self
            .inner
            .get_dictionary(page_id)
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))?
            .clone();

        let existing: Vec<Object> = match page_dict.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Stream(stream)) => {
                vec![Object::Reference(self.inner.add_object(stream.clone()))]
            }
            _ => Vec::new(),
        };

        let mut contents = Vec::with_capacity(existing.len() + 2);
        if !existing.is_empty() {
            let save_id = self
                .inner
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
        }

        let mut appended = Vec::with_capacity(content.len() + 3);
        if !contents.is_empty() {
            appended.extend_from_slice(b"\nQ\n");
        }
        appended.extend_from_slice(content);
        let stream_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), appended));
        contents.push(Object::Reference(stream_id));

        page_dict.set("Contents", Object::Array(contents));
        self.inner.objects.insert(page_id, page_dict.into());

        Ok(())
    }
}

/// Extract width and height from a MediaBox array
fn extract_size_from_media_box(media_box: &[Object]) -> Result<PageSize> {
    if media_box.len() < 4 {
        return Err(PdfError::ParseError("Invalid MediaBox format".to_string()));
    }

    let coords: Vec<f64> = media_box[..4]
        .iter()
        .map(|v| {
            operand_f64(v).ok_or_else(|| PdfError::ParseError("Invalid MediaBox value".to_string()))
        })
        .collect::<Result<_>>()?;

    Ok(PageSize {
        width: (coords[2] - coords[0]).abs(),
        height: (coords[3] - coords[1]).abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_blank_has_one_page() {
        let doc = PdfDocument::new_blank(PageSize::a4());
        assert_eq!(doc.page_count(), 1);
        let size = doc.page_size(1).unwrap();
        assert!(size.matches(&PageSize::a4(), 0.01));
    }

    #[test]
    fn test_invalid_page() {
        let mut doc = PdfDocument::new_blank(PageSize::a4());
        let err = doc.insert_text("x", 2, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, PdfError::InvalidPage(2, 1)));
        assert!(matches!(
            doc.insert_text("x", 0, 0.0, 0.0),
            Err(PdfError::InvalidPage(0, 1))
        ));
    }

    #[test]
    fn test_extract_size_from_offset_media_box() {
        let media_box = vec![
            Object::Integer(10),
            Object::Integer(20),
            Object::Integer(622),
            Object::Integer(812),
        ];
        let size = extract_size_from_media_box(&media_box).unwrap();
        assert_eq!(size.width, 612.0);
        assert_eq!(size.height, 792.0);
    }

    #[test]
    fn test_extract_size_rejects_short_array() {
        let media_box = vec![Object::Integer(0), Object::Integer(0)];
        assert!(extract_size_from_media_box(&media_box).is_err());
    }
}
