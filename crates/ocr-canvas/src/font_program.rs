//! Built-in glyphless TrueType program
//!
//! PDF consumers reject a CIDFontType2 without an embedded `FontFile2`, but
//! the OCR layer is never painted, so the glyph shapes do not matter. This
//! module writes the smallest complete TrueType file that strict parsers
//! accept: two empty glyphs (`.notdef` and a blank mapped from U+0020),
//! 1000 units per em and a fixed advance of `1000 / CHAR_ASPECT`.
//!
//! The bytes are generated once per process on first use and shared.

use crate::{CanvasError, Result, CHAR_ASPECT};
use byteorder::{BigEndian, WriteBytesExt};
use once_cell::sync::OnceCell;
use std::io::Write;

const UNITS_PER_EM: u16 = 1000;
const ADVANCE: u16 = UNITS_PER_EM / CHAR_ASPECT;
const NUM_GLYPHS: u16 = 2;
const FAMILY_NAME: &str = "GlyphLessFont";

/// `head.checkSumAdjustment` is computed so the whole file sums to this value
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
/// Offset of `checkSumAdjustment` inside the `head` table
const HEAD_CHECKSUM_OFFSET: usize = 8;

static PROGRAM: OnceCell<Vec<u8>> = OnceCell::new();

/// The process-wide glyphless font program
pub fn glyphless_font_program() -> Result<&'static [u8]> {
    PROGRAM
        .get_or_try_init(build_font_program)
        .map(Vec::as_slice)
}

/// Sum of big-endian u32 words, zero-padding the tail
pub(crate) fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Assemble a TrueType file from all required tables
pub(crate) fn build_font_program() -> Result<Vec<u8>> {
    // Table directory must be sorted by tag
    let tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"OS/2", os2_table()?),
        (*b"cmap", cmap_table()?),
        (*b"glyf", Vec::new()),
        (*b"head", head_table()?),
        (*b"hhea", hhea_table()?),
        (*b"hmtx", hmtx_table()?),
        (*b"loca", loca_table()?),
        (*b"maxp", maxp_table()?),
        (*b"name", name_table()?),
        (*b"post", post_table()?),
    ];

    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables * 16 - search_range;

    let mut font = Vec::new();
    font.write_u32::<BigEndian>(0x0001_0000)?;
    font.write_u16::<BigEndian>(num_tables)?;
    font.write_u16::<BigEndian>(search_range)?;
    font.write_u16::<BigEndian>(entry_selector)?;
    font.write_u16::<BigEndian>(range_shift)?;

    let mut offset = 12 + 16 * tables.len();
    let mut head_offset = None;
    for (tag, data) in &tables {
        if tag == b"head" {
            head_offset = Some(offset);
        }
        font.write_all(tag)?;
        font.write_u32::<BigEndian>(table_checksum(data))?;
        font.write_u32::<BigEndian>(offset as u32)?;
        font.write_u32::<BigEndian>(data.len() as u32)?;
        offset += padded_len(data.len());
    }

    for (_, data) in &tables {
        font.write_all(data)?;
        font.resize(font.len() + padded_len(data.len()) - data.len(), 0);
    }

    let head_offset = head_offset
        .ok_or_else(|| CanvasError::FontProgram("head table missing".to_string()))?;
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(table_checksum(&font));
    let at = head_offset + HEAD_CHECKSUM_OFFSET;
    font[at..at + 4].copy_from_slice(&adjustment.to_be_bytes());

    Ok(font)
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn head_table() -> Result<Vec<u8>> {
    let mut t = Vec::with_capacity(54);
    t.write_u16::<BigEndian>(1)?; // majorVersion
    t.write_u16::<BigEndian>(0)?; // minorVersion
    t.write_u32::<BigEndian>(0x0001_0000)?; // fontRevision
    t.write_u32::<BigEndian>(0)?; // checkSumAdjustment, patched later
    t.write_u32::<BigEndian>(0x5F0F_3CF5)?; // magicNumber
    t.write_u16::<BigEndian>(0x000B)?; // flags
    t.write_u16::<BigEndian>(UNITS_PER_EM)?;
    t.write_i64::<BigEndian>(0)?; // created
    t.write_i64::<BigEndian>(0)?; // modified
    t.write_i16::<BigEndian>(0)?; // xMin
    t.write_i16::<BigEndian>(0)?; // yMin
    t.write_i16::<BigEndian>(ADVANCE as i16)?; // xMax
    t.write_i16::<BigEndian>(UNITS_PER_EM as i16)?; // yMax
    t.write_u16::<BigEndian>(0)?; // macStyle
    t.write_u16::<BigEndian>(8)?; // lowestRecPPEM
    t.write_i16::<BigEndian>(2)?; // fontDirectionHint
    t.write_i16::<BigEndian>(0)?; // indexToLocFormat: short
    t.write_i16::<BigEndian>(0)?; // glyphDataFormat
    Ok(t)
}

fn hhea_table() -> Result<Vec<u8>> {
    let mut t = Vec::with_capacity(36);
    t.write_u16::<BigEndian>(1)?;
    t.write_u16::<BigEndian>(0)?;
    t.write_i16::<BigEndian>(UNITS_PER_EM as i16)?; // ascender
    t.write_i16::<BigEndian>(0)?; // descender
    t.write_i16::<BigEndian>(0)?; // lineGap
    t.write_u16::<BigEndian>(ADVANCE)?; // advanceWidthMax
    t.write_i16::<BigEndian>(0)?; // minLeftSideBearing
    t.write_i16::<BigEndian>(0)?; // minRightSideBearing
    t.write_i16::<BigEndian>(0)?; // xMaxExtent
    t.write_i16::<BigEndian>(1)?; // caretSlopeRise
    t.write_i16::<BigEndian>(0)?; // caretSlopeRun
    t.write_i16::<BigEndian>(0)?; // caretOffset
    for _ in 0..4 {
        t.write_i16::<BigEndian>(0)?; // reserved
    }
    t.write_i16::<BigEndian>(0)?; // metricDataFormat
    t.write_u16::<BigEndian>(NUM_GLYPHS)?; // numberOfHMetrics
    Ok(t)
}

fn maxp_table() -> Result<Vec<u8>> {
    let mut t = Vec::with_capacity(32);
    t.write_u32::<BigEndian>(0x0001_0000)?;
    t.write_u16::<BigEndian>(NUM_GLYPHS)?;
    // maxPoints .. maxComponentDepth; only maxZones is nonzero
    for field in [0u16, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0] {
        t.write_u16::<BigEndian>(field)?;
    }
    Ok(t)
}

fn hmtx_table() -> Result<Vec<u8>> {
    let mut t = Vec::new();
    for _ in 0..NUM_GLYPHS {
        t.write_u16::<BigEndian>(ADVANCE)?;
        t.write_i16::<BigEndian>(0)?;
    }
    Ok(t)
}

fn loca_table() -> Result<Vec<u8>> {
    // Every glyph is empty, so all offsets are zero
    let mut t = Vec::new();
    for _ in 0..=NUM_GLYPHS {
        t.write_u16::<BigEndian>(0)?;
    }
    Ok(t)
}

fn cmap_table() -> Result<Vec<u8>> {
    // Format 4 with two segments: U+0020 -> glyph 1, then the 0xFFFF terminator
    let end_codes = [0x0020u16, 0xFFFF];
    let start_codes = [0x0020u16, 0xFFFF];
    let id_deltas = [1u16.wrapping_sub(0x0020), 1];
    let seg_count = end_codes.len() as u16;
    let subtable_len = 16 + 8 * seg_count;

    let mut t = Vec::new();
    t.write_u16::<BigEndian>(0)?; // version
    t.write_u16::<BigEndian>(1)?; // numTables
    t.write_u16::<BigEndian>(3)?; // platformID: Windows
    t.write_u16::<BigEndian>(1)?; // encodingID: Unicode BMP
    t.write_u32::<BigEndian>(12)?; // subtable offset

    t.write_u16::<BigEndian>(4)?; // format
    t.write_u16::<BigEndian>(subtable_len)?;
    t.write_u16::<BigEndian>(0)?; // language
    t.write_u16::<BigEndian>(seg_count * 2)?;
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    t.write_u16::<BigEndian>(search_range)?;
    t.write_u16::<BigEndian>(entry_selector)?;
    t.write_u16::<BigEndian>(seg_count * 2 - search_range)?;
    for code in end_codes {
        t.write_u16::<BigEndian>(code)?;
    }
    t.write_u16::<BigEndian>(0)?; // reservedPad
    for code in start_codes {
        t.write_u16::<BigEndian>(code)?;
    }
    for delta in id_deltas {
        t.write_u16::<BigEndian>(delta)?;
    }
    for _ in 0..seg_count {
        t.write_u16::<BigEndian>(0)?; // idRangeOffset
    }
    Ok(t)
}

fn name_table() -> Result<Vec<u8>> {
    let records: [(u16, &str); 4] = [
        (1, FAMILY_NAME),
        (2, "Regular"),
        (4, FAMILY_NAME),
        (6, FAMILY_NAME),
    ];

    let mut strings = Vec::new();
    let mut t = Vec::new();
    t.write_u16::<BigEndian>(0)?; // format
    t.write_u16::<BigEndian>(records.len() as u16)?;
    t.write_u16::<BigEndian>(6 + 12 * records.len() as u16)?; // storage offset
    for (name_id, value) in records {
        let encoded: Vec<u8> = value.encode_utf16().flat_map(u16::to_be_bytes).collect();
        t.write_u16::<BigEndian>(3)?; // platformID
        t.write_u16::<BigEndian>(1)?; // encodingID
        t.write_u16::<BigEndian>(0x0409)?; // languageID: en-US
        t.write_u16::<BigEndian>(name_id)?;
        t.write_u16::<BigEndian>(encoded.len() as u16)?;
        t.write_u16::<BigEndian>(strings.len() as u16)?;
        strings.extend_from_slice(&encoded);
    }
    t.extend_from_slice(&strings);
    Ok(t)
}

fn post_table() -> Result<Vec<u8>> {
    let mut t = Vec::with_capacity(32);
    t.write_u32::<BigEndian>(0x0003_0000)?; // version 3: no glyph names
    t.write_u32::<BigEndian>(0)?; // italicAngle
    t.write_i16::<BigEndian>(-100)?; // underlinePosition
    t.write_i16::<BigEndian>(50)?; // underlineThickness
    t.write_u32::<BigEndian>(1)?; // isFixedPitch
    for _ in 0..4 {
        t.write_u32::<BigEndian>(0)?; // min/max memory usage
    }
    Ok(t)
}

fn os2_table() -> Result<Vec<u8>> {
    let mut t = Vec::with_capacity(96);
    t.write_u16::<BigEndian>(3)?; // version
    t.write_i16::<BigEndian>(ADVANCE as i16)?; // xAvgCharWidth
    t.write_u16::<BigEndian>(400)?; // usWeightClass
    t.write_u16::<BigEndian>(5)?; // usWidthClass
    t.write_u16::<BigEndian>(0)?; // fsType: installable
    // sub/superscript sizes and offsets
    for value in [650i16, 600, 0, 75, 650, 600, 0, 350] {
        t.write_i16::<BigEndian>(value)?;
    }
    t.write_i16::<BigEndian>(50)?; // yStrikeoutSize
    t.write_i16::<BigEndian>(300)?; // yStrikeoutPosition
    t.write_i16::<BigEndian>(0)?; // sFamilyClass
    t.write_all(&[0u8; 10])?; // panose
    for _ in 0..4 {
        t.write_u32::<BigEndian>(0)?; // ulUnicodeRange1-4
    }
    t.write_all(b"NONE")?; // achVendID
    t.write_u16::<BigEndian>(0x0040)?; // fsSelection: REGULAR
    t.write_u16::<BigEndian>(0x0020)?; // usFirstCharIndex
    t.write_u16::<BigEndian>(0x0020)?; // usLastCharIndex
    t.write_i16::<BigEndian>(UNITS_PER_EM as i16)?; // sTypoAscender
    t.write_i16::<BigEndian>(0)?; // sTypoDescender
    t.write_i16::<BigEndian>(0)?; // sTypoLineGap
    t.write_u16::<BigEndian>(UNITS_PER_EM)?; // usWinAscent
    t.write_u16::<BigEndian>(0)?; // usWinDescent
    t.write_u32::<BigEndian>(1)?; // ulCodePageRange1: Latin 1
    t.write_u32::<BigEndian>(0)?; // ulCodePageRange2
    t.write_i16::<BigEndian>(500)?; // sxHeight
    t.write_i16::<BigEndian>(UNITS_PER_EM as i16)?; // sCapHeight
    t.write_u16::<BigEndian>(0)?; // usDefaultChar
    t.write_u16::<BigEndian>(0x0020)?; // usBreakChar
    t.write_u16::<BigEndian>(0)?; // usMaxContext
    Ok(t)
}
