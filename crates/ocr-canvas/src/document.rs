//! PDF Document wrapper

use crate::canvas::Canvas;
use crate::config::CanvasOptions;
use crate::font::GlyphlessFont;
use crate::{CanvasError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument};

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

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    pub fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }

    pub fn red() -> Self {
        Self::rgb(1.0, 0.0, 0.0)
    }

    pub fn green() -> Self {
        Self::rgb(0.0, 1.0, 0.0)
    }

    pub fn blue() -> Self {
        Self::rgb(0.0, 0.0, 1.0)
    }

    pub(crate) fn operands(&self) -> Vec<Object> {
        vec![
            (self.r as f64).into(),
            (self.g as f64).into(),
            (self.b as f64).into(),
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Output PDF document that finished pages are committed into
///
/// Owns the object table, the page tree and the single glyphless font
/// shared by every page. Nothing is written to disk until [`save`].
///
/// [`save`]: OcrDocument::save
pub struct OcrDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Page tree root
    pages_id: ObjectId,
    /// Committed pages, in order
    page_ids: Vec<ObjectId>,
    /// Type0 font, registered on first use
    glyphless_font: Option<ObjectId>,
    options: CanvasOptions,
}

impl OcrDocument {
    /// Create an empty document with default options
    pub fn new() -> Self {
        Self::build(CanvasOptions::default())
    }

    /// Create an empty document
    ///
    /// Sets up the catalog, an empty page tree and the `/Info` dictionary.
    ///
    /// # Errors
    /// [`CanvasError::Config`] if `options` fail [`CanvasOptions::validate`]
    pub fn with_options(options: CanvasOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: CanvasOptions) -> Self {
        let mut inner = Document::with_version(options.pdf_version.as_str());
        let pages_id = inner.new_object_id();
        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );

        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);

        let creation_date = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        let info_id = inner.add_object(dictionary! {
            "Producer" => Object::string_literal(options.producer.as_str()),
            "CreationDate" => Object::string_literal(creation_date),
        });
        inner.trailer.set("Info", info_id);

        Self {
            inner,
            pages_id,
            page_ids: Vec::new(),
            glyphless_font: None,
            options,
        }
    }

    pub fn options(&self) -> &CanvasOptions {
        &self.options
    }

    /// New page sharing this document's options
    pub fn new_canvas(&self, page_size: (f64, f64)) -> Canvas {
        Canvas::with_valid_options(page_size, self.options.clone())
    }

    /// Get the number of committed pages
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page object IDs in commit order
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Allocate an indirect object
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.inner.add_object(object)
    }

    /// Allocate a stream object, Flate-compressing it if enabled
    pub fn add_stream(&mut self, dict: Dictionary, content: Vec<u8>) -> Result<ObjectId> {
        let stream = self.make_stream(dict, content)?;
        Ok(self.inner.add_object(stream))
    }

    pub(crate) fn make_stream(&self, dict: Dictionary, content: Vec<u8>) -> Result<Stream> {
        if self.options.compress_streams {
            compressed_stream(dict, &content)
        } else {
            Ok(Stream::new(dict, content))
        }
    }

    /// Reference to the glyphless Type0 font
    ///
    /// The font object graph is built on the first call and shared by every
    /// later page of this document.
    pub fn glyphless_font(&mut self) -> Result<ObjectId> {
        if let Some(font_id) = self.glyphless_font {
            return Ok(font_id);
        }

        let font = match &self.options.font_program {
            Some(path) => GlyphlessFont::from_path(path)?,
            None => GlyphlessFont::builtin()?,
        };
        let font_id = font.embed(self)?;
        debug!(?font_id, "registered glyphless font");

        self.glyphless_font = Some(font_id);
        Ok(font_id)
    }

    /// Whether the glyphless font has been registered
    pub fn has_glyphless_font(&self) -> bool {
        self.glyphless_font.is_some()
    }

    /// Append a page to the page tree
    ///
    /// # Arguments
    /// * `media_box` - Page size `(width, height)` in points
    /// * `contents` - Encoded content stream
    /// * `resources` - Page resource dictionary
    pub fn add_page(
        &mut self,
        media_box: (f64, f64),
        contents: Vec<u8>,
        resources: Dictionary,
    ) -> Result<ObjectId> {
        let contents_id = self.add_stream(Dictionary::new(), contents)?;
        let (width, height) = media_box;

        let page_id = self.inner.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()],
            "Resources" => resources,
            "Contents" => contents_id,
        });
        self.page_ids.push(page_id);
        self.update_page_tree()?;

        debug!(?page_id, page = self.page_ids.len(), "committed page");
        Ok(page_id)
    }

    fn update_page_tree(&mut self) -> Result<()> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let pages = self
            .inner
            .get_object_mut(self.pages_id)?
            .as_dict_mut()
            .map_err(|_| CanvasError::SaveError("Pages object is not a dictionary".to_string()))?;
        pages.set("Count", kids.len() as i64);
        pages.set("Kids", kids);
        Ok(())
    }

    /// Save the document to a file
    ///
    /// # Arguments
    /// * `path` - Output file path
    #[instrument(skip(self, path), fields(pages = self.page_ids.len()))]
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.inner
            .save(path)
            .map_err(|e| CanvasError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| CanvasError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }
}

impl Default for OcrDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Deflate `content` and mark the stream `/FlateDecode`
pub(crate) fn compressed_stream(mut dict: Dictionary, content: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    let data = encoder.finish()?;

    dict.set("Filter", "FlateDecode");
    // Compression is already applied; stop lopdf from trying again
    Ok(Stream::new(dict, data).with_compression(false))
}
