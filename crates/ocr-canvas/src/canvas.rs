//! Drawing surface for one page

use crate::config::CanvasOptions;
use crate::content::{ContentStreamBuilder, Matrix};
use crate::document::Color;
use crate::image::{ImageSource, LoadedImage};
use crate::text::{estimate_width, TextRun};
use crate::Result;
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Stateful drawing operations over a page's content stream
///
/// Tracks graphics-state nesting as a plain depth counter and collects the
/// images placed on the page until it is finished.
#[derive(Debug, Default)]
pub struct Painter {
    pub(crate) content: ContentStreamBuilder,
    pub(crate) images: Vec<LoadedImage>,
    stack_depth: i32,
    next_image: usize,
}

impl Painter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stroke_color(&mut self, color: Color) -> &mut Self {
        self.content.set_stroke_color(color);
        self
    }

    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        self.content.set_fill_color(color);
        self
    }

    pub fn line_width(&mut self, width: f64) -> &mut Self {
        self.content.set_line_width(width);
        self
    }

    /// Stroke a straight line from `(x1, y1)` to `(x2, y2)`
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> &mut Self {
        self.content.line(x1, y1, x2, y2).stroke_and_close();
        self
    }

    /// Draw a rectangle, filled or stroked
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: bool) -> &mut Self {
        self.content.append_rectangle(x, y, width, height);
        if fill {
            self.content.fill();
        } else {
            self.content.stroke_and_close();
        }
        self
    }

    /// Set a dash pattern; `dashes(&[], 0.0)` restores solid lines
    pub fn dashes(&mut self, array: &[f64], phase: f64) -> &mut Self {
        self.content.set_dashes(array, phase);
        self
    }

    /// Even dashes: `length` on, `length` off
    pub fn dash(&mut self, length: f64) -> &mut Self {
        self.dashes(&[length, length], 0.0)
    }

    /// Save the graphics state
    pub fn push(&mut self) -> &mut Self {
        self.content.push();
        self.stack_depth += 1;
        self
    }

    /// Restore the graphics state
    pub fn pop(&mut self) -> &mut Self {
        self.content.pop();
        self.stack_depth -= 1;
        self
    }

    pub fn cm(&mut self, matrix: Matrix) -> &mut Self {
        self.content.cm(matrix);
        self
    }

    /// Push the graphics state; the returned guard pops it when dropped
    pub fn save_state(&mut self) -> StateGuard<'_> {
        self.push();
        StateGuard { painter: self }
    }

    /// Run `f` between a push and a pop
    ///
    /// The pop is emitted whether or not `f` fails.
    pub fn with_saved_state<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Painter) -> Result<T>,
    {
        let mut state = self.save_state();
        f(&mut state)
    }

    /// Place an image so it fills the rectangle `(x, y, width, height)`
    ///
    /// The image is decoded and checked before anything is emitted, so a
    /// failure leaves the content stream as it was.
    ///
    /// # Returns
    /// The XObject resource name assigned to the image
    pub fn draw_image(
        &mut self,
        source: impl Into<ImageSource>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<String> {
        let image = source.into().resolve()?;

        let name = format!("Im{}", self.next_image);
        self.next_image += 1;
        debug!(
            name = %name,
            mode = %image.mode(),
            width = image.width(),
            height = image.height(),
            "placing image"
        );
        self.images.push(LoadedImage {
            name: name.clone(),
            image,
        });

        let mut state = self.save_state();
        state.cm(Matrix::unit_square_to(x, y, width, height));
        state.content.draw_xobject(&name);

        Ok(name)
    }

    /// Merge a finished text run and close its text object
    pub fn draw_text(&mut self, run: TextRun) -> &mut Self {
        self.content.extend(run.into_operations()).end_text();
        self
    }

    /// Current graphics-state nesting depth
    pub fn depth(&self) -> i32 {
        self.stack_depth
    }

    /// Images placed so far, in placement order
    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }

    pub fn content(&self) -> &ContentStreamBuilder {
        &self.content
    }
}

/// Graphics state saved by [`Painter::save_state`]
///
/// Dereferences to the painter; dropping it emits the matching `Q`.
pub struct StateGuard<'a> {
    painter: &'a mut Painter,
}

impl Deref for StateGuard<'_> {
    type Target = Painter;

    fn deref(&self) -> &Painter {
        self.painter
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Painter {
        self.painter
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.painter.pop();
    }
}

/// One page under construction
///
/// Creating a canvas pushes the graphics state once; finishing the page
/// pops it again.
#[derive(Debug)]
pub struct Canvas {
    pub(crate) page_size: (f64, f64),
    pub(crate) painter: Painter,
    pub(crate) options: CanvasOptions,
}

impl Canvas {
    /// New page of `page_size` points `(width, height)`
    pub fn new(page_size: (f64, f64)) -> Self {
        Self::with_valid_options(page_size, CanvasOptions::default())
    }

    /// New page selecting the font under `options.font_resource_name`
    ///
    /// [`finish`](Canvas::finish) registers the font under the name the
    /// target document was configured with, so `options` should match that
    /// document's; [`OcrDocument::new_canvas`](crate::OcrDocument::new_canvas)
    /// does this for you.
    ///
    /// # Errors
    /// [`CanvasError::Config`](crate::CanvasError::Config) if `options` fail
    /// [`CanvasOptions::validate`]
    pub fn with_options(page_size: (f64, f64), options: CanvasOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::with_valid_options(page_size, options))
    }

    pub(crate) fn with_valid_options(page_size: (f64, f64), options: CanvasOptions) -> Self {
        let mut painter = Painter::new();
        painter.push();
        Self {
            page_size,
            painter,
            options,
        }
    }

    /// Drawing operations for this page
    pub fn painter(&mut self) -> &mut Painter {
        &mut self.painter
    }

    /// Resource name text runs should select with `Tf`
    pub fn font_name(&self) -> &str {
        &self.options.font_resource_name
    }

    /// Estimated width of `text` set in the glyphless font
    pub fn string_width(&self, text: &str, font_size: f64) -> f64 {
        estimate_width(text, font_size)
    }

    pub fn page_size(&self) -> (f64, f64) {
        self.page_size
    }

    pub fn options(&self) -> &CanvasOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::operators;
    use crate::image::{ColorMode, RasterImage};
    use crate::text::{TextDirection, TextRenderMode};
    use crate::CanvasError;
    use pretty_assertions::assert_eq;

    fn gray_image() -> RasterImage {
        RasterImage::gray(2, 2, vec![0, 64, 128, 255]).unwrap()
    }

    #[test]
    fn test_canvas_starts_with_push() {
        let canvas = Canvas::new((200.0, 100.0));
        assert_eq!(canvas.painter.depth(), 1);
        assert_eq!(operators(canvas.painter.content().operations()), vec!["q"]);
        assert_eq!(canvas.font_name(), "f-0-0");
    }

    #[test]
    fn test_with_options_rejects_invalid_font_name() {
        let options = CanvasOptions {
            font_resource_name: "bad name".to_string(),
            ..CanvasOptions::default()
        };
        assert!(matches!(
            Canvas::with_options((200.0, 100.0), options),
            Err(CanvasError::Config(_))
        ));

        let options = CanvasOptions {
            font_resource_name: "F1".to_string(),
            ..CanvasOptions::default()
        };
        let canvas = Canvas::with_options((200.0, 100.0), options).unwrap();
        assert_eq!(canvas.font_name(), "F1");
    }

    #[test]
    fn test_matched_push_pop() {
        let mut painter = Painter::new();
        for _ in 0..3 {
            painter.push();
        }
        for _ in 0..3 {
            painter.pop();
        }
        assert_eq!(painter.depth(), 0);
    }

    #[test]
    fn test_state_guard_pops_on_drop() {
        let mut painter = Painter::new();
        {
            let mut state = painter.save_state();
            state.line_width(2.0);
            assert_eq!(state.depth(), 1);
        }
        assert_eq!(painter.depth(), 0);
        assert_eq!(operators(painter.content().operations()), vec!["q", "w", "Q"]);
    }

    #[test]
    fn test_with_saved_state_pops_on_error() {
        let mut painter = Painter::new();
        let result: Result<()> = painter.with_saved_state(|p| {
            p.cm(Matrix::scale(2.0, 2.0));
            Err(CanvasError::Config("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(painter.depth(), 0);
        assert_eq!(operators(painter.content().operations()), vec!["q", "cm", "Q"]);
    }

    #[test]
    fn test_rect_fill_and_stroke() {
        let mut painter = Painter::new();
        painter
            .rect(10.0, 10.0, 50.0, 20.0, true)
            .rect(0.0, 0.0, 5.0, 5.0, false);
        assert_eq!(
            operators(painter.content().operations()),
            vec!["re", "f", "re", "s"]
        );
    }

    #[test]
    fn test_line_and_style() {
        let mut painter = Painter::new();
        painter
            .stroke_color(Color::red())
            .fill_color(Color::blue())
            .line_width(0.5)
            .dash(3.0)
            .line(0.0, 0.0, 10.0, 10.0)
            .dashes(&[], 0.0);

        let ops = painter.content().operations();
        assert_eq!(
            operators(ops),
            vec!["RG", "rg", "w", "d", "m", "l", "s", "d"]
        );
        assert_eq!(ops[3].operands[0].as_array().unwrap().len(), 2);
        assert!(ops[7].operands[0].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_draw_image_sequence() {
        let mut painter = Painter::new();
        let name = painter
            .draw_image(gray_image(), 10.0, 20.0, 100.0, 50.0)
            .unwrap();

        assert_eq!(name, "Im0");
        assert_eq!(painter.depth(), 0);

        let ops = painter.content().operations();
        assert_eq!(operators(ops), vec!["q", "cm", "Do", "Q"]);

        let cm: Vec<f64> = ops[1]
            .operands
            .iter()
            .map(|v| v.as_float().unwrap() as f64)
            .collect();
        assert_eq!(cm, vec![100.0, 0.0, 0.0, 50.0, 10.0, 20.0]);
        assert_eq!(ops[2].operands[0].as_name().unwrap(), b"Im0");
    }

    #[test]
    fn test_draw_image_distinct_names() {
        let mut painter = Painter::new();
        let first = painter.draw_image(gray_image(), 0.0, 0.0, 1.0, 1.0).unwrap();
        let second = painter.draw_image(gray_image(), 0.0, 0.0, 1.0, 1.0).unwrap();

        assert_ne!(first, second);
        assert_eq!(painter.images().len(), 2);
    }

    #[test]
    fn test_draw_image_palette_stored_as_rgb() {
        let mut painter = Painter::new();
        let image = RasterImage::indexed(1, 1, vec![0], vec![[9, 8, 7]]).unwrap();
        painter.draw_image(image, 0.0, 0.0, 1.0, 1.0).unwrap();

        let stored = &painter.images()[0].image;
        assert_eq!(stored.mode(), ColorMode::Rgb);
        assert_eq!(stored.data(), &[9, 8, 7]);
    }

    #[test]
    fn test_draw_image_unsupported_leaves_stream_untouched() {
        let mut canvas = Canvas::new((100.0, 100.0));
        canvas.painter().rect(0.0, 0.0, 10.0, 10.0, true);
        let before = canvas.painter.content().len();

        let cmyk = RasterImage::new(1, 1, ColorMode::Cmyk, vec![0; 4]).unwrap();
        let result = canvas.painter().draw_image(cmyk, 0.0, 0.0, 1.0, 1.0);

        assert!(matches!(
            result,
            Err(CanvasError::UnsupportedImageMode(ColorMode::Cmyk))
        ));
        assert_eq!(canvas.painter.content().len(), before);
        assert!(canvas.painter.images().is_empty());
        assert_eq!(canvas.painter.depth(), 1);
    }

    #[test]
    fn test_draw_text_closes_text_object() {
        let mut canvas = Canvas::new((200.0, 100.0));
        let mut run = TextRun::new(5.0, 5.0, TextDirection::LeftToRight);
        run.set_font(canvas.font_name(), 12.0)
            .set_render_mode(TextRenderMode::Invisible)
            .show("Hello");
        canvas.painter().draw_text(run);

        assert_eq!(
            operators(canvas.painter.content().operations()),
            vec!["q", "BT", "Tf", "Tr", "TJ", "ET"]
        );
    }

    #[test]
    fn test_string_width() {
        let canvas = Canvas::new((200.0, 100.0));
        assert_eq!(canvas.string_width("Hello", 12.0), 30.0);
    }
}
