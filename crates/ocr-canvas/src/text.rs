//! Text run construction

use crate::content::{ContentStreamBuilder, Matrix};
use crate::CHAR_ASPECT;
use lopdf::content::Operation;
use unicode_normalization::UnicodeNormalization;

/// Marked-content tag hinting that the run's characters are in visual order
const REVERSED_CHARS: &str = "ReversedChars";

/// PDF text rendering mode (`Tr` operand)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i64)]
pub enum TextRenderMode {
    #[default]
    Fill = 0,
    Stroke = 1,
    FillStroke = 2,
    /// Neither fill nor stroke; text stays selectable and extractable
    Invisible = 3,
    FillClip = 4,
    StrokeClip = 5,
    FillStrokeClip = 6,
    Clip = 7,
}

/// Writing direction of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// One text object (`BT` ... ) being built
///
/// The run opens its text object on construction. It does not close it:
/// [`Painter::draw_text`](crate::Painter::draw_text) merges the buffered
/// operations into the page and emits the matching `ET`.
#[derive(Debug, Clone)]
pub struct TextRun {
    content: ContentStreamBuilder,
    start_of_line: (f64, f64),
    direction: TextDirection,
}

impl TextRun {
    /// Begin a text object anchored at `(x, y)`
    pub fn new(x: f64, y: f64, direction: TextDirection) -> Self {
        let mut content = ContentStreamBuilder::new();
        content.begin_text();
        Self {
            content,
            start_of_line: (x, y),
            direction,
        }
    }

    /// Select font resource and size
    pub fn set_font(&mut self, font: &str, size: f64) -> &mut Self {
        self.content.set_text_font(font, size);
        self
    }

    pub fn set_render_mode(&mut self, mode: TextRenderMode) -> &mut Self {
        self.content.set_text_rendering(mode);
        self
    }

    /// Set the text matrix; its translation becomes the new start of line
    pub fn set_text_transform(&mut self, matrix: Matrix) -> &mut Self {
        self.content.set_text_matrix(matrix);
        self.start_of_line = matrix.translation();
        self
    }

    /// Horizontal scaling in percent (100 = unscaled)
    pub fn set_horiz_scale(&mut self, scale: f64) -> &mut Self {
        self.content.set_text_horizontal_scaling(scale);
        self
    }

    pub fn move_cursor(&mut self, dx: f64, dy: f64) -> &mut Self {
        self.content.move_cursor(dx, dy);
        self
    }

    /// Show text
    ///
    /// Right-to-left runs wrap the `TJ` in a `/ReversedChars` marked-content
    /// sequence so extractors recover logical order.
    pub fn show(&mut self, text: &str) -> &mut Self {
        match self.direction {
            TextDirection::LeftToRight => {
                self.content.show_text(text);
            }
            TextDirection::RightToLeft => {
                self.content
                    .begin_marked_content(REVERSED_CHARS)
                    .show_text(text)
                    .end_marked_content();
            }
        }
        self
    }

    /// Anchor point of the current line
    pub fn start_of_line(&self) -> (f64, f64) {
        self.start_of_line
    }

    pub fn direction(&self) -> TextDirection {
        self.direction
    }

    pub fn operations(&self) -> &[Operation] {
        self.content.operations()
    }

    /// Consume the run, yielding its buffered operations
    pub fn into_operations(self) -> Vec<Operation> {
        self.content.build()
    }
}

/// Coarse width of `text` in the glyphless font
///
/// Counts characters after NFKC normalization, so ligatures split and
/// combining marks fold into their base, and gives each one
/// `font_size / CHAR_ASPECT` points.
pub fn estimate_width(text: &str, font_size: f64) -> f64 {
    let chars = text.nfkc().count();
    chars as f64 * (font_size / f64::from(CHAR_ASPECT))
}
