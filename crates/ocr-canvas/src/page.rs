//! Page finalization

use crate::canvas::Canvas;
use crate::document::OcrDocument;
use crate::image::LoadedImage;
use crate::{CanvasError, Result};
use lopdf::content::Operation;
use lopdf::{Dictionary, Object, ObjectId};
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of committing a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    /// Page object in the output document
    pub page_id: ObjectId,
    /// Graphics-state depth left over after the closing pop
    pub stack_depth: i32,
    /// Image XObjects embedded on the page
    pub image_count: usize,
}

impl PageReport {
    /// Whether every push on the page had a matching pop
    pub fn is_balanced(&self) -> bool {
        self.stack_depth == 0
    }
}

impl Canvas {
    /// Close the page and commit it to `doc`
    ///
    /// Pops the state pushed when the canvas was created, then adds the page
    /// with its content stream, media box, the glyphless font and every
    /// placed image. An unbalanced graphics-state stack is logged and
    /// reported but the page is still written.
    ///
    /// Resources are registered under `doc`'s options: the font takes the
    /// document's resource name and streams follow its compression setting.
    ///
    /// # Errors
    /// [`CanvasError::UnregisteredResource`] if the content selects a font
    /// other than the document's glyphless one or draws an XObject that was
    /// never placed.
    pub fn finish(mut self, doc: &mut OcrDocument) -> Result<PageReport> {
        self.painter.pop();
        let stack_depth = self.painter.depth();
        if stack_depth != 0 {
            warn!(
                depth = stack_depth,
                "graphics state stack is not empty when page saved; rendering may be incorrect"
            );
        }

        let font_name = doc.options().font_resource_name.clone();
        let images = std::mem::take(&mut self.painter.images);
        check_resources(self.painter.content.operations(), &font_name, &images)?;

        let contents = self.painter.content.encode()?;

        let font_id = doc.glyphless_font()?;
        let mut fonts = Dictionary::new();
        fonts.set(font_name.as_str(), font_id);

        let compress = doc.options().compress_streams;
        let mut xobjects = Dictionary::new();
        for loaded in &images {
            let stream = loaded.to_xobject_stream(compress)?;
            xobjects.set(loaded.name.as_str(), doc.add_object(stream));
        }

        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        resources.set("XObject", xobjects);

        let page_id = doc.add_page(self.page_size, contents, resources)?;
        debug!(?page_id, images = images.len(), "finished page");

        Ok(PageReport {
            page_id,
            stack_depth,
            image_count: images.len(),
        })
    }

    /// Write this page as a single-page document at `path`
    pub fn save<P: AsRef<Path>>(self, path: P) -> Result<PageReport> {
        let mut doc = OcrDocument::with_options(self.options.clone())?;
        let report = self.finish(&mut doc)?;
        doc.save(path)?;
        Ok(report)
    }
}

/// Every `Tf` must select `font_name` and every `Do` a placed image
fn check_resources(
    operations: &[Operation],
    font_name: &str,
    images: &[LoadedImage],
) -> Result<()> {
    for op in operations {
        let kind = match op.operator.as_str() {
            "Tf" => "Font",
            "Do" => "XObject",
            _ => continue,
        };

        let name = match op.operands.first() {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
            _ => String::new(),
        };
        let known = match op.operator.as_str() {
            "Tf" => name == font_name,
            _ => images.iter().any(|image| image.name == name),
        };
        if !known {
            return Err(CanvasError::UnregisteredResource { kind, name });
        }
    }
    Ok(())
}
