//! Glyphless composite font for invisible text

use crate::document::OcrDocument;
use crate::font_program::glyphless_font_program;
use crate::{CanvasError, Result, CHAR_ASPECT};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::borrow::Cow;
use std::path::Path;

/// `/BaseFont` and `/FontName` of the glyphless font
pub const GLYPHLESS_FONT_NAME: &str = "GlyphLessFont";

/// Number of codes in the 16-bit Identity-H code space
const CODE_SPACE: usize = 0x10000;

/// Fixed pitch + symbolic
const DESCRIPTOR_FLAGS: i64 = 5;

/// PDF objects generated for font embedding
///
/// References between the objects are placeholders until
/// [`GlyphlessFont::embed`] allocates them.
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFontType2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Embedded TrueType program
    pub font_file_stream: Stream,
    /// Identity CIDToGIDMap stream
    pub cid_to_gid_stream: Stream,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

/// The glyphless font and its embedded program
#[derive(Debug, Clone)]
pub struct GlyphlessFont {
    program: Cow<'static, [u8]>,
}

impl GlyphlessFont {
    /// Font backed by the built-in program
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            program: Cow::Borrowed(glyphless_font_program()?),
        })
    }

    /// Font backed by a caller-supplied TrueType program
    pub fn from_bytes(program: Vec<u8>) -> Result<Self> {
        ttf_parser::Face::parse(&program, 0)
            .map_err(|e| CanvasError::FontProgram(format!("Invalid TrueType program: {e}")))?;
        Ok(Self {
            program: Cow::Owned(program),
        })
    }

    /// Font backed by a TrueType file on disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let program = std::fs::read(path).map_err(|e| {
            CanvasError::FontProgram(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_bytes(program)
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Generate all PDF objects needed to embed this font
    pub fn to_pdf_objects(&self) -> FontObjects {
        let font_name = Object::Name(GLYPHLESS_FONT_NAME.as_bytes().to_vec());

        let tounicode_stream = Stream::new(Dictionary::new(), to_unicode_cmap().into_bytes());
        let cid_to_gid_stream = Stream::new(Dictionary::new(), cid_to_gid_map());
        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![("Length1", (self.program.len() as i64).into())]),
            self.program.to_vec(),
        );

        let advance = i64::from(1000 / CHAR_ASPECT);
        let font_bbox: Vec<Object> = vec![0.into(), 0.into(), advance.into(), 1000.into()];

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", "FontDescriptor".into()),
            ("FontName", font_name.clone()),
            ("Flags", DESCRIPTOR_FLAGS.into()),
            ("FontBBox", font_bbox.into()),
            ("ItalicAngle", 0.into()),
            ("Ascent", 1000.into()),
            ("Descent", (-1).into()),
            ("CapHeight", 1000.into()),
            ("StemV", 80.into()),
            ("FontFile2", Object::Reference((0, 0))), // Placeholder, will be set when embedding
        ]);

        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::string_literal("Adobe")),
            ("Ordering", Object::string_literal("Identity")),
            ("Supplement", 0.into()),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "CIDFontType2".into()),
            ("BaseFont", font_name.clone()),
            ("CIDSystemInfo", cid_system_info.into()),
            ("FontDescriptor", Object::Reference((0, 0))), // Placeholder, will be set when embedding
            ("CIDToGIDMap", Object::Reference((0, 0))),    // Placeholder, will be set when embedding
            ("DW", advance.into()),
        ]);

        let type0_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type0".into()),
            ("BaseFont", font_name),
            ("Encoding", "Identity-H".into()),
            ("DescendantFonts", vec![Object::Reference((0, 0))].into()), // Placeholder, will be set when embedding
            ("ToUnicode", Object::Reference((0, 0))), // Placeholder, will be set when embedding
        ]);

        FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            cid_to_gid_stream,
            tounicode_stream,
        }
    }

    /// Add the font object graph to `doc`, returning the Type0 font reference
    pub fn embed(&self, doc: &mut OcrDocument) -> Result<ObjectId> {
        let font_objects = self.to_pdf_objects();

        let font_file_id = add_stream(doc, font_objects.font_file_stream)?;
        let mut font_descriptor = font_objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(font_file_id));
        let font_descriptor_id = doc.add_object(font_descriptor);

        let cid_to_gid_id = add_stream(doc, font_objects.cid_to_gid_stream)?;
        let mut cid_font = font_objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(font_descriptor_id));
        cid_font.set("CIDToGIDMap", Object::Reference(cid_to_gid_id));
        let cid_font_id = doc.add_object(cid_font);

        let tounicode_id = add_stream(doc, font_objects.tounicode_stream)?;
        let mut type0_font = font_objects.type0_font;
        type0_font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(cid_font_id)]),
        );
        type0_font.set("ToUnicode", Object::Reference(tounicode_id));

        Ok(doc.add_object(type0_font))
    }
}

fn add_stream(doc: &mut OcrDocument, stream: Stream) -> Result<ObjectId> {
    doc.add_stream(stream.dict, stream.content)
}

/// Identity CIDToGIDMap: glyph id == code for every 16-bit code, big-endian
pub fn cid_to_gid_map() -> Vec<u8> {
    (0..CODE_SPACE)
        .flat_map(|code| (code as u16).to_be_bytes())
        .collect()
}

/// ToUnicode CMap mapping every 16-bit code to the same code point
pub fn to_unicode_cmap() -> String {
    let mut cmap = String::new();

    cmap.push_str("/CIDInit /ProcSet findresource begin\n");
    cmap.push_str("12 dict begin\n");
    cmap.push_str("begincmap\n");
    cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
    cmap.push_str("/CMapType 2 def\n");

    cmap.push_str("1 begincodespacerange\n");
    cmap.push_str("<0000> <FFFF>\n");
    cmap.push_str("endcodespacerange\n");

    cmap.push_str("1 beginbfrange\n");
    cmap.push_str("<0000> <FFFF> <0000>\n");
    cmap.push_str("endbfrange\n");

    cmap.push_str("endcmap\n");
    cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
    cmap.push_str("end\n");
    cmap.push_str("end\n");

    cmap
}
