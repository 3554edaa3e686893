//! Canvas configuration

use crate::{CanvasError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options shared by every page of an [`OcrDocument`](crate::OcrDocument)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasOptions {
    /// Resource name the glyphless font is registered under (without `/`)
    pub font_resource_name: String,
    /// Flate-compress content, image and font streams
    pub compress_streams: bool,
    /// PDF header version
    pub pdf_version: String,
    /// `/Producer` entry of the document info dictionary
    pub producer: String,
    /// Replacement glyphless TrueType program; the built-in one when `None`
    pub font_program: Option<PathBuf>,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            font_resource_name: "f-0-0".to_string(),
            compress_streams: true,
            pdf_version: "1.5".to_string(),
            producer: concat!("ocr-canvas ", env!("CARGO_PKG_VERSION")).to_string(),
            font_program: None,
        }
    }
}

impl CanvasOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: CanvasOptions =
            serde_json::from_str(json).map_err(|e| CanvasError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the font resource name can be written as a PDF name
    pub fn validate(&self) -> Result<()> {
        let name = &self.font_resource_name;
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_graphic() && !b"/()<>[]{}%".contains(&b));
        if !valid {
            return Err(CanvasError::Config(format!(
                "Invalid font resource name: {name:?}"
            )));
        }
        Ok(())
    }
}
