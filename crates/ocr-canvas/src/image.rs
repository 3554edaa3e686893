//! Raster images for page XObjects

use crate::document::compressed_stream;
use crate::{CanvasError, Result};
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageDecoder, ImageReader};
use lopdf::{dictionary, Stream};
use std::fmt;
use std::io::{BufRead, Cursor, Seek};
use std::path::{Path, PathBuf};

impl From<image::ImageError> for CanvasError {
    fn from(err: image::ImageError) -> Self {
        CanvasError::ImageError(err.to_string())
    }
}

/// Pixel layout of a decoded image
///
/// Only [`Bilevel`], [`Gray`] and [`Rgb`] can be embedded; [`Palette`] is
/// expanded to RGB on placement and the rest are rejected.
///
/// [`Bilevel`]: ColorMode::Bilevel
/// [`Gray`]: ColorMode::Gray
/// [`Rgb`]: ColorMode::Rgb
/// [`Palette`]: ColorMode::Palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 1 bit per pixel, rows padded to a byte boundary
    Bilevel,
    Gray,
    Rgb,
    /// 8-bit indices into an RGB palette
    Palette,
    GrayAlpha,
    Rgba,
    Cmyk,
}

impl ColorMode {
    /// Whether the mode maps directly onto a PDF image color space
    pub fn is_embeddable(self) -> bool {
        matches!(self, ColorMode::Bilevel | ColorMode::Gray | ColorMode::Rgb)
    }

    fn channels(self) -> usize {
        match self {
            ColorMode::Bilevel | ColorMode::Gray | ColorMode::Palette => 1,
            ColorMode::GrayAlpha => 2,
            ColorMode::Rgb => 3,
            ColorMode::Rgba | ColorMode::Cmyk => 4,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorMode::Bilevel => "1",
            ColorMode::Gray => "L",
            ColorMode::Rgb => "RGB",
            ColorMode::Palette => "P",
            ColorMode::GrayAlpha => "LA",
            ColorMode::Rgba => "RGBA",
            ColorMode::Cmyk => "CMYK",
        };
        f.write_str(name)
    }
}

/// Decoded pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    mode: ColorMode,
    data: Vec<u8>,
    palette: Option<Vec<[u8; 3]>>,
}

impl RasterImage {
    /// Wrap raw pixel data
    ///
    /// # Arguments
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `mode` - Pixel layout of `data`
    /// * `data` - Row-major samples, 8 bits each (bit-packed for bilevel)
    pub fn new(width: u32, height: u32, mode: ColorMode, data: Vec<u8>) -> Result<Self> {
        if mode == ColorMode::Palette {
            return Err(CanvasError::ImageError(
                "Palette images need a palette; use RasterImage::indexed".to_string(),
            ));
        }
        Self::checked(width, height, mode, data, None)
    }

    /// Bit-packed 1-bit image
    pub fn bilevel(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, ColorMode::Bilevel, data)
    }

    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, ColorMode::Gray, data)
    }

    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, ColorMode::Rgb, data)
    }

    /// Palette image: one index byte per pixel
    pub fn indexed(
        width: u32,
        height: u32,
        indices: Vec<u8>,
        palette: Vec<[u8; 3]>,
    ) -> Result<Self> {
        Self::checked(width, height, ColorMode::Palette, indices, Some(palette))
    }

    fn checked(
        width: u32,
        height: u32,
        mode: ColorMode,
        data: Vec<u8>,
        palette: Option<Vec<[u8; 3]>>,
    ) -> Result<Self> {
        let expected = expected_len(width, height, mode);
        if data.len() != expected {
            return Err(CanvasError::ImageError(format!(
                "{width}x{height} {mode} image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            mode,
            data,
            palette,
        })
    }

    /// Take over a decoded image
    ///
    /// 16-bit and floating point buffers are narrowed to 8 bits per sample.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (mode, data) = match image {
            DynamicImage::ImageLuma8(buf) => (ColorMode::Gray, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (ColorMode::GrayAlpha, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (ColorMode::Rgb, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (ColorMode::Rgba, buf.into_raw()),
            other @ DynamicImage::ImageLuma16(_) => (ColorMode::Gray, other.to_luma8().into_raw()),
            other @ DynamicImage::ImageLumaA16(_) => {
                (ColorMode::GrayAlpha, other.to_luma_alpha8().into_raw())
            }
            other if other.color().has_alpha() => (ColorMode::Rgba, other.to_rgba8().into_raw()),
            other => (ColorMode::Rgb, other.to_rgb8().into_raw()),
        };
        Self {
            width,
            height,
            mode,
            data,
            palette: None,
        }
    }

    /// Pack a thresholded gray buffer into 1 bit per pixel
    ///
    /// Samples of 128 and above become set bits; rows are padded to a byte.
    pub fn pack_bilevel(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let row_bytes = (width as usize).div_ceil(8);
        let mut data = vec![0u8; row_bytes * height as usize];
        for (x, y, pixel) in gray.enumerate_pixels() {
            if pixel[0] >= 128 {
                let (x, y) = (x as usize, y as usize);
                data[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
            }
        }
        Self {
            width,
            height,
            mode: ColorMode::Bilevel,
            data,
            palette: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Expand a palette image to RGB; other modes are returned unchanged
    pub fn to_rgb(&self) -> Result<Self> {
        let Some(palette) = self.palette.as_ref().filter(|_| self.mode == ColorMode::Palette)
        else {
            return Ok(self.clone());
        };

        let mut data = Vec::with_capacity(self.data.len() * 3);
        for &index in &self.data {
            let entry = palette.get(usize::from(index)).ok_or_else(|| {
                CanvasError::ImageError(format!(
                    "Palette index {index} out of range ({} entries)",
                    palette.len()
                ))
            })?;
            data.extend_from_slice(entry);
        }

        Ok(Self {
            width: self.width,
            height: self.height,
            mode: ColorMode::Rgb,
            data,
            palette: None,
        })
    }

    /// PDF color space name for this image
    pub fn color_space(&self) -> &'static str {
        match self.mode {
            ColorMode::Bilevel | ColorMode::Gray => "DeviceGray",
            _ => "DeviceRGB",
        }
    }

    pub fn bits_per_component(&self) -> i64 {
        match self.mode {
            ColorMode::Bilevel => 1,
            _ => 8,
        }
    }
}

fn expected_len(width: u32, height: u32, mode: ColorMode) -> usize {
    let (width, height) = (width as usize, height as usize);
    match mode {
        ColorMode::Bilevel => width.div_ceil(8) * height,
        _ => width * height * mode.channels(),
    }
}

/// Anything `draw_image` can place
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file to decode
    Path(PathBuf),
    /// Encoded file contents (PNG, JPEG, TIFF)
    Encoded(Vec<u8>),
    Decoded(RasterImage),
}

impl ImageSource {
    /// Decode the source into an embeddable buffer
    ///
    /// Palette images are expanded to RGB. Any mode other than bilevel,
    /// gray or RGB fails with [`CanvasError::UnsupportedImageMode`].
    pub fn resolve(self) -> Result<RasterImage> {
        let raster = match self {
            ImageSource::Path(path) => decode(ImageReader::open(&path)?)?,
            ImageSource::Encoded(bytes) => decode(ImageReader::new(Cursor::new(bytes)))?,
            ImageSource::Decoded(raster) => raster,
        };

        let raster = if raster.mode == ColorMode::Palette {
            raster.to_rgb()?
        } else {
            raster
        };

        if !raster.mode.is_embeddable() {
            return Err(CanvasError::UnsupportedImageMode(raster.mode));
        }
        Ok(raster)
    }
}

/// Decode an encoded image, keeping 1-bit files at 1 bit per pixel
fn decode<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<RasterImage> {
    let decoder = reader.with_guessed_format()?.into_decoder()?;
    let original = decoder.original_color_type();
    let image = DynamicImage::from_decoder(decoder)?;
    if original == ExtendedColorType::L1 {
        return Ok(RasterImage::pack_bilevel(&image.to_luma8()));
    }
    Ok(RasterImage::from_dynamic(image))
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<String> for ImageSource {
    fn from(path: String) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Encoded(bytes)
    }
}

impl From<RasterImage> for ImageSource {
    fn from(raster: RasterImage) -> Self {
        ImageSource::Decoded(raster)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Decoded(RasterImage::from_dynamic(image))
    }
}

/// Image placed on a page, waiting to be embedded under `name`
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub name: String,
    pub image: RasterImage,
}

impl LoadedImage {
    /// Convert to an image XObject stream
    pub fn to_xobject_stream(&self, compress: bool) -> Result<Stream> {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.image.width as i64,
            "Height" => self.image.height as i64,
            "ColorSpace" => self.image.color_space(),
            "BitsPerComponent" => self.image.bits_per_component(),
        };

        if compress {
            compressed_stream(dict, &self.image.data)
        } else {
            Ok(Stream::new(dict, self.image.data.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb, RgbImage};
    use flate2::read::ZlibDecoder;
    use flate2::write::ZlibEncoder;
    use flate2::{Compression, Crc};
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read, Write};

    #[test]
    fn test_color_mode_display() {
        assert_eq!(ColorMode::Bilevel.to_string(), "1");
        assert_eq!(ColorMode::Palette.to_string(), "P");
        assert_eq!(ColorMode::GrayAlpha.to_string(), "LA");
    }

    #[test]
    fn test_bilevel_rows_are_byte_padded() {
        // 10 pixels wide -> 2 bytes per row
        assert!(RasterImage::bilevel(10, 3, vec![0; 6]).is_ok());
        assert!(RasterImage::bilevel(10, 3, vec![0; 4]).is_err());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = RasterImage::rgb(2, 2, vec![0; 11]).unwrap_err();
        assert!(err.to_string().contains("needs 12 bytes"));
    }

    #[test]
    fn test_palette_requires_indexed_constructor() {
        assert!(RasterImage::new(1, 1, ColorMode::Palette, vec![0]).is_err());
    }

    #[test]
    fn test_palette_to_rgb() {
        let palette = vec![[255, 0, 0], [0, 0, 255]];
        let image = RasterImage::indexed(2, 1, vec![1, 0], palette).unwrap();

        let rgb = image.to_rgb().unwrap();
        assert_eq!(rgb.mode(), ColorMode::Rgb);
        assert_eq!(rgb.data(), &[0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_palette_index_out_of_range() {
        let image = RasterImage::indexed(1, 1, vec![5], vec![[0, 0, 0]]).unwrap();
        assert!(image.to_rgb().is_err());
    }

    #[test]
    fn test_resolve_palette_becomes_rgb() {
        let image = RasterImage::indexed(1, 1, vec![0], vec![[1, 2, 3]]).unwrap();
        let resolved = ImageSource::from(image).resolve().unwrap();
        assert_eq!(resolved.mode(), ColorMode::Rgb);
        assert_eq!(resolved.color_space(), "DeviceRGB");
    }

    #[test]
    fn test_resolve_rejects_cmyk() {
        let image = RasterImage::new(1, 1, ColorMode::Cmyk, vec![0; 4]).unwrap();
        match ImageSource::from(image).resolve() {
            Err(CanvasError::UnsupportedImageMode(mode)) => assert_eq!(mode, ColorMode::Cmyk),
            other => panic!("expected UnsupportedImageMode, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_rejects_alpha() {
        let image = DynamicImage::new_rgba8(2, 2);
        assert!(matches!(
            ImageSource::from(image).resolve(),
            Err(CanvasError::UnsupportedImageMode(ColorMode::Rgba))
        ));
    }

    #[test]
    fn test_from_dynamic_narrows_16_bit() {
        let image = DynamicImage::new_luma16(3, 2);
        let raster = RasterImage::from_dynamic(image);
        assert_eq!(raster.mode(), ColorMode::Gray);
        assert_eq!(raster.data().len(), 6);
    }

    #[test]
    fn test_resolve_encoded_png() {
        let mut png = Vec::new();
        let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let raster = ImageSource::from(png).resolve().unwrap();
        assert_eq!((raster.width(), raster.height()), (4, 3));
        assert_eq!(raster.mode(), ColorMode::Rgb);
        assert_eq!(&raster.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_resolve_garbage_bytes() {
        let result = ImageSource::from(vec![0u8; 16]).resolve();
        assert!(matches!(result, Err(CanvasError::ImageError(_))));
    }

    #[test]
    fn test_xobject_stream_gray() {
        let loaded = LoadedImage {
            name: "Im0".to_string(),
            image: RasterImage::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(8, 4))),
        };
        let stream = loaded.to_xobject_stream(false).unwrap();

        assert_eq!(stream.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Image");
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceGray"
        );
        assert_eq!(stream.dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 8);
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 8);
        assert_eq!(stream.content.len(), 32);
    }

    #[test]
    fn test_xobject_stream_bilevel() {
        let loaded = LoadedImage {
            name: "Im1".to_string(),
            image: RasterImage::bilevel(8, 2, vec![0xFF, 0x00]).unwrap(),
        };
        let stream = loaded.to_xobject_stream(true).unwrap();

        assert_eq!(stream.dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 1);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"FlateDecode"
        );

        let mut inflated = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, vec![0xFF, 0x00]);
    }

    /// Grayscale PNG at bit depth 1 from packed, byte-padded rows
    fn one_bit_png(width: u32, rows: &[&[u8]]) -> Vec<u8> {
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            let mut crc = Crc::new();
            crc.update(kind);
            crc.update(data);
            out.extend_from_slice(&crc.sum().to_be_bytes());
        }

        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&(rows.len() as u32).to_be_bytes());
        ihdr.extend_from_slice(&[1, 0, 0, 0, 0]);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for row in rows {
            encoder.write_all(&[0]).unwrap();
            encoder.write_all(row).unwrap();
        }
        let idat = encoder.finish().unwrap();

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"IDAT", &idat);
        chunk(&mut png, b"IEND", &[]);
        png
    }

    #[test]
    fn test_resolve_one_bit_png_stays_bilevel() {
        let png = one_bit_png(10, &[&[0b1010_0000, 0b1100_0000], &[0x00, 0x40]]);
        let raster = ImageSource::from(png).resolve().unwrap();

        assert_eq!(raster.mode(), ColorMode::Bilevel);
        assert_eq!((raster.width(), raster.height()), (10, 2));
        assert_eq!(raster.bits_per_component(), 1);
        assert_eq!(raster.color_space(), "DeviceGray");
        assert_eq!(raster.data(), &[0b1010_0000, 0b1100_0000, 0x00, 0x40]);
    }

    #[test]
    fn test_pack_bilevel_thresholds_and_pads() {
        let gray = GrayImage::from_raw(9, 1, vec![255, 0, 200, 127, 128, 0, 0, 0, 255]).unwrap();
        let raster = RasterImage::pack_bilevel(&gray);

        assert_eq!(raster.mode(), ColorMode::Bilevel);
        assert_eq!(raster.data(), &[0b1010_1000, 0b1000_0000]);
    }
}
