//! OCR Canvas - invisible, searchable text layers for PDF pages
//!
//! This crate provides functionality for:
//! - Building page content streams operator by operator
//! - Registering a "glyphless" Type0/CIDFontType2 font whose text is
//!   extractable but never painted
//! - Drawing scanned images, rectangles and lines under affine transforms
//! - Placing invisible OCR text runs, including right-to-left runs
//! - Assembling pages into a PDF document and saving it
//!
//! # Example
//!
//! ```ignore
//! use ocr_canvas::{Canvas, Matrix, TextDirection, TextRenderMode, TextRun};
//!
//! let mut canvas = Canvas::new((612.0, 792.0));
//! canvas.painter().draw_image("scan.png", 0.0, 0.0, 612.0, 792.0)?;
//!
//! let mut run = TextRun::new(72.0, 700.0, TextDirection::LeftToRight);
//! run.set_font(canvas.font_name(), 12.0)
//!     .set_render_mode(TextRenderMode::Invisible)
//!     .set_text_transform(Matrix::translate(72.0, 700.0))
//!     .show("Hello");
//! canvas.painter().draw_text(run);
//!
//! canvas.save("output.pdf")?;
//! ```

mod canvas;
mod config;
mod content;
mod document;
mod font;
mod font_program;
mod image;
mod page;
mod text;

pub use canvas::{Canvas, Painter, StateGuard};
pub use config::CanvasOptions;
pub use content::{encode_text, operators, ContentStreamBuilder, Matrix};
pub use document::{Color, OcrDocument};
pub use font::{cid_to_gid_map, to_unicode_cmap, FontObjects, GlyphlessFont, GLYPHLESS_FONT_NAME};
pub use font_program::glyphless_font_program;
pub use image::{ColorMode, ImageSource, LoadedImage, RasterImage};
pub use page::PageReport;
pub use text::{estimate_width, TextDirection, TextRenderMode, TextRun};

use thiserror::Error;

/// Assumed glyph height-to-width ratio of the glyphless font
///
/// Used for the font bounding box, the default glyph width and
/// [`estimate_width`].
pub const CHAR_ASPECT: u16 = 2;

/// Errors that can occur while building an OCR layer
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Unsupported image mode: {0}")]
    UnsupportedImageMode(ColorMode),

    #[error("Content references unregistered {kind} resource: /{name}")]
    UnregisteredResource { kind: &'static str, name: String },

    #[error("Glyphless font program unavailable: {0}")]
    FontProgram(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for canvas operations
pub type Result<T> = std::result::Result<T, CanvasError>;
