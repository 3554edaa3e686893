//! Content stream construction
//!
//! [`ContentStreamBuilder`] is an append-only list of PDF content operations.
//! Each method pushes one operator (or a short fixed sequence for the path
//! helpers) and returns the builder so calls can be chained:
//!
//! ```ignore
//! let mut cs = ContentStreamBuilder::new();
//! cs.push().cm(Matrix::scale(100.0, 50.0)).draw_xobject("Im0").pop();
//! let bytes = cs.encode()?;
//! ```
//!
//! Operand shapes are not checked here. Balance of `q`/`Q`, `BT`/`ET` and
//! marked-content pairs is the caller's job.

use crate::document::Color;
use crate::text::TextRenderMode;
use crate::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, StringFormat};

/// Affine transformation matrix `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    /// The identity transform
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation by `degrees`
    pub fn rotate_degrees(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Matrix that maps the unit square onto the rectangle `(x, y, width, height)`
    pub fn unit_square_to(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(width, 0.0, 0.0, height, x, y)
    }

    /// Compose two transforms: `self` is applied first, then `other`
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform a point
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Translation component `(e, f)`
    pub fn translation(&self) -> (f64, f64) {
        (self.e, self.f)
    }

    /// The six matrix entries in operand order
    pub fn shorthand(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    fn operands(&self) -> Vec<Object> {
        self.shorthand().iter().map(|&v| v.into()).collect()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Encode text as big-endian UTF-16 code units for the Identity-H font
pub fn encode_text(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

/// Append-only builder for a page content stream
#[derive(Debug, Clone, Default)]
pub struct ContentStreamBuilder {
    operations: Vec<Operation>,
}

impl ContentStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) -> &mut Self {
        self.operations.push(Operation::new(operator, operands));
        self
    }

    /// Save the graphics state (`q`)
    pub fn push(&mut self) -> &mut Self {
        self.op("q", vec![])
    }

    /// Restore the graphics state (`Q`)
    pub fn pop(&mut self) -> &mut Self {
        self.op("Q", vec![])
    }

    /// Concatenate a matrix onto the CTM (`cm`)
    pub fn cm(&mut self, matrix: Matrix) -> &mut Self {
        self.op("cm", matrix.operands())
    }

    /// Begin a text object (`BT`)
    pub fn begin_text(&mut self) -> &mut Self {
        self.op("BT", vec![])
    }

    /// End a text object (`ET`)
    pub fn end_text(&mut self) -> &mut Self {
        self.op("ET", vec![])
    }

    /// Begin a marked-content sequence (`BMC`)
    pub fn begin_marked_content(&mut self, tag: &str) -> &mut Self {
        self.op("BMC", vec![Object::Name(tag.as_bytes().to_vec())])
    }

    /// Begin a marked-content sequence with an `/MCID` property list (`BDC`)
    pub fn begin_marked_content_proplist(&mut self, tag: &str, mcid: i64) -> &mut Self {
        self.op(
            "BDC",
            vec![
                Object::Name(tag.as_bytes().to_vec()),
                Object::Dictionary(dictionary! { "MCID" => mcid }),
            ],
        )
    }

    /// End a marked-content sequence (`EMC`)
    pub fn end_marked_content(&mut self) -> &mut Self {
        self.op("EMC", vec![])
    }

    /// Select font resource and size (`Tf`)
    pub fn set_text_font(&mut self, font: &str, size: f64) -> &mut Self {
        self.op("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()])
    }

    /// Set the text matrix (`Tm`)
    pub fn set_text_matrix(&mut self, matrix: Matrix) -> &mut Self {
        self.op("Tm", matrix.operands())
    }

    /// Set the text rendering mode (`Tr`)
    pub fn set_text_rendering(&mut self, mode: TextRenderMode) -> &mut Self {
        self.op("Tr", vec![Object::Integer(mode as i64)])
    }

    /// Set horizontal scaling in percent (`Tz`)
    pub fn set_text_horizontal_scaling(&mut self, scale: f64) -> &mut Self {
        self.op("Tz", vec![scale.into()])
    }

    /// Show text (`TJ`) with the string encoded as UTF-16BE
    pub fn show_text(&mut self, text: &str) -> &mut Self {
        let encoded = Object::String(encode_text(text), StringFormat::Hexadecimal);
        self.op("TJ", vec![Object::Array(vec![encoded])])
    }

    /// Move to the start of the next line, offset by `(dx, dy)` (`Td`)
    pub fn move_cursor(&mut self, dx: f64, dy: f64) -> &mut Self {
        self.op("Td", vec![dx.into(), dy.into()])
    }

    /// Close and stroke the current path (`s`)
    pub fn stroke_and_close(&mut self) -> &mut Self {
        self.op("s", vec![])
    }

    /// Fill the current path, nonzero winding (`f`)
    pub fn fill(&mut self) -> &mut Self {
        self.op("f", vec![])
    }

    /// Append a rectangle to the current path (`re`)
    pub fn append_rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) -> &mut Self {
        self.op("re", vec![x.into(), y.into(), w.into(), h.into()])
    }

    /// Append a straight segment as `m` + `l`
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> &mut Self {
        self.op("m", vec![x1.into(), y1.into()])
            .op("l", vec![x2.into(), y2.into()])
    }

    /// Set RGB stroke color (`RG`)
    pub fn set_stroke_color(&mut self, color: Color) -> &mut Self {
        self.op("RG", color.operands())
    }

    /// Set RGB fill color (`rg`)
    pub fn set_fill_color(&mut self, color: Color) -> &mut Self {
        self.op("rg", color.operands())
    }

    /// Set line width (`w`)
    pub fn set_line_width(&mut self, width: f64) -> &mut Self {
        self.op("w", vec![width.into()])
    }

    /// Set dash pattern (`d`); an empty array means a solid line
    pub fn set_dashes(&mut self, array: &[f64], phase: f64) -> &mut Self {
        let array = array.iter().map(|&v| v.into()).collect();
        self.op("d", vec![Object::Array(array), phase.into()])
    }

    /// Paint an external object by resource name (`Do`)
    pub fn draw_xobject(&mut self, name: &str) -> &mut Self {
        self.op("Do", vec![Object::Name(name.as_bytes().to_vec())])
    }

    /// Append already-built operations, e.g. a finished text run
    pub fn extend(&mut self, operations: impl IntoIterator<Item = Operation>) -> &mut Self {
        self.operations.extend(operations);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Freeze the builder into its operation list
    pub fn build(self) -> Vec<Operation> {
        self.operations
    }

    /// Serialize to content stream bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let content = Content {
            operations: self.operations.clone(),
        };
        Ok(content.encode()?)
    }
}

/// Operator names of a slice of operations, for inspection and tests
pub fn operators(operations: &[Operation]) -> Vec<&str> {
    operations.iter().map(|op| op.operator.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chained_operators() {
        let mut cs = ContentStreamBuilder::new();
        cs.push()
            .cm(Matrix::translate(10.0, 20.0))
            .draw_xobject("Im0")
            .pop();

        assert_eq!(operators(cs.operations()), vec!["q", "cm", "Do", "Q"]);
        assert_eq!(cs.operations()[2].operands[0].as_name().unwrap(), b"Im0");
    }

    #[test]
    fn test_line_is_move_then_lineto() {
        let mut cs = ContentStreamBuilder::new();
        cs.line(0.0, 0.0, 10.0, 10.0);
        assert_eq!(operators(cs.operations()), vec!["m", "l"]);
    }

    #[test]
    fn test_show_text_utf16be() {
        let mut cs = ContentStreamBuilder::new();
        cs.show_text("AB");

        let op = &cs.operations()[0];
        assert_eq!(op.operator, "TJ");
        let array = op.operands[0].as_array().unwrap();
        assert_eq!(array.len(), 1);
        match &array[0] {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, &vec![0x00, 0x41, 0x00, 0x42]);
            }
            other => panic!("expected hex string, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_text_non_bmp() {
        // U+1F600 is a surrogate pair
        assert_eq!(encode_text("\u{1F600}"), vec![0xD8, 0x3D, 0xDE, 0x00]);
        assert_eq!(encode_text("ก"), vec![0x0E, 0x01]);
        assert!(encode_text("").is_empty());
    }

    #[test]
    fn test_marked_content_proplist() {
        let mut cs = ContentStreamBuilder::new();
        cs.begin_marked_content_proplist("Span", 7)
            .end_marked_content();

        let op = &cs.operations()[0];
        assert_eq!(op.operator, "BDC");
        let props = op.operands[1].as_dict().unwrap();
        assert_eq!(props.get(b"MCID").unwrap().as_i64().unwrap(), 7);
    }

    #[test]
    fn test_render_mode_operand() {
        let mut cs = ContentStreamBuilder::new();
        cs.set_text_rendering(TextRenderMode::Invisible);
        assert_eq!(cs.operations()[0].operands[0].as_i64().unwrap(), 3);
    }

    #[test]
    fn test_dashes_solid() {
        let mut cs = ContentStreamBuilder::new();
        cs.set_dashes(&[], 0.0);
        let op = &cs.operations()[0];
        assert_eq!(op.operator, "d");
        assert!(op.operands[0].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_encode_contains_operators() {
        let mut cs = ContentStreamBuilder::new();
        cs.push().begin_text().set_text_font("f-0-0", 12.0).end_text().pop();

        let bytes = cs.encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("BT"));
        assert!(text.contains("/f-0-0"));
        assert!(text.contains("Tf"));
        assert!(text.contains("ET"));
    }

    #[test]
    fn test_matrix_concat() {
        let m = Matrix::scale(2.0, 3.0).concat(&Matrix::translate(5.0, 7.0));
        assert_eq!(m.shorthand(), [2.0, 0.0, 0.0, 3.0, 5.0, 7.0]);
        assert_eq!(m.apply(1.0, 1.0), (7.0, 10.0));

        let m = Matrix::translate(5.0, 7.0).concat(&Matrix::scale(2.0, 3.0));
        assert_eq!(m.translation(), (10.0, 21.0));
    }

    #[test]
    fn test_matrix_rotation() {
        let m = Matrix::rotate_degrees(90.0);
        let (x, y) = m.apply(1.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_square_to() {
        let m = Matrix::unit_square_to(10.0, 20.0, 100.0, 50.0);
        assert_eq!(m.apply(0.0, 0.0), (10.0, 20.0));
        assert_eq!(m.apply(1.0, 1.0), (110.0, 70.0));
    }
}
