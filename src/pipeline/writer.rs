//! PDF assembly: place surface tiles onto document pages.
//!
//! Every page of a report embeds the *same* tall surface image, shifted
//! vertically by its tile's offset so the page window shows the right
//! slice. printpdf's coordinate origin is the bottom-left corner with y
//! growing upwards, while tile offsets are top-anchored; the conversion
//! happens in [`PdfWriter::append_page`] and nowhere else.
//!
//! The PNG round-trip (encode with our `image`, re-decode with printpdf's
//! bundled `image_crate`) keeps the two image crate versions decoupled.

use crate::error::ReportError;
use crate::layout::{scaled_height, PageFormat, PageTile};
use crate::pipeline::encode::surface_to_png;
use crate::pipeline::render::RenderSurface;
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
};
use std::io::{BufWriter, Cursor};
use tracing::debug;

/// Sink for paginated surface tiles.
///
/// All tiles of one document must reference the same surface; the writer
/// may encode it once and reuse the bytes for every page.
pub trait DocumentWriter {
    fn append_page(&mut self, tile: &PageTile, surface: &RenderSurface)
        -> Result<(), ReportError>;

    fn page_count(&self) -> usize;

    /// Serialise the document. The writer is spent afterwards; further
    /// appends fail.
    fn finish(&mut self) -> Result<Vec<u8>, ReportError>;
}

/// printpdf-backed writer producing the report PDF in memory.
pub struct PdfWriter {
    doc: Option<PdfDocumentReference>,
    font: Option<IndirectFontRef>,
    format: PageFormat,
    page_footer: bool,
    png: Option<Vec<u8>>,
    pages: usize,
}

impl PdfWriter {
    /// Open an empty document.
    ///
    /// Helvetica is one of the fourteen built-in fonts; if registering it
    /// fails the document is still usable, only footers are skipped.
    pub fn new(title: &str, format: PageFormat, page_footer: bool) -> Self {
        let doc = PdfDocument::empty(title);
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).ok();
        Self {
            doc: Some(doc),
            font,
            format,
            page_footer,
            png: None,
            pages: 0,
        }
    }
}

impl DocumentWriter for PdfWriter {
    fn append_page(
        &mut self,
        tile: &PageTile,
        surface: &RenderSurface,
    ) -> Result<(), ReportError> {
        let Some(doc) = self.doc.as_ref() else {
            return Err(ReportError::Internal(
                "append_page called on a finished writer".to_string(),
            ));
        };

        if self.png.is_none() {
            self.png = Some(surface_to_png(surface)?);
        }
        let Some(png) = self.png.as_deref() else {
            return Err(ReportError::Internal(
                "surface encoding cache is empty".to_string(),
            ));
        };

        let (page_idx, layer_idx) = doc.add_page(
            Mm(self.format.width_mm as f32),
            Mm(self.format.height_mm as f32),
            format!("Page {}", tile.page_index + 1),
        );
        let layer = doc.get_page(page_idx).get_layer(layer_idx);

        let decoder = PngDecoder::new(Cursor::new(png)).map_err(|e| {
            ReportError::DocumentWriteFailed {
                detail: format!("PNG decode for embedding failed: {e}"),
            }
        })?;
        let image = Image::try_from(decoder).map_err(|e| ReportError::DocumentWriteFailed {
            detail: format!("surface embedding failed: {e}"),
        })?;

        // Pin the image's rendered width to the page width via DPI, then
        // convert the top-anchored tile offset into printpdf's bottom-up
        // frame: the image bottom sits at page_height - (offset + height).
        let surface_w = surface.width_px() as f64;
        let surface_h = surface.height_px() as f64;
        let dpi = surface_w * 25.4 / self.format.width_mm;
        let scaled_h = scaled_height(surface_h, surface_w, self.format.width_mm);
        let translate_y = self.format.height_mm - (tile.source_y_offset + scaled_h);

        image.add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(translate_y as f32)),
                dpi: Some(dpi as f32),
                ..Default::default()
            },
        );

        if self.page_footer {
            if let Some(font) = &self.font {
                layer.use_text(
                    format!("Page {}", tile.page_index + 1),
                    8.0,
                    Mm((self.format.width_mm / 2.0 - 6.0) as f32),
                    Mm(6.0),
                    font,
                );
            }
        }

        self.pages += 1;
        debug!(
            page = tile.page_index + 1,
            offset_mm = tile.source_y_offset,
            translate_y_mm = translate_y,
            "page appended"
        );
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn finish(&mut self) -> Result<Vec<u8>, ReportError> {
        let Some(doc) = self.doc.take() else {
            return Err(ReportError::Internal(
                "finish called on a finished writer".to_string(),
            ));
        };
        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ReportError::DocumentWriteFailed {
                detail: e.to_string(),
            })?;
        buf.into_inner()
            .map_err(|e| ReportError::Internal(format!("PDF buffer flush failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::paginate;

    fn two_page_setup() -> (RenderSurface, Vec<PageTile>) {
        // 124 px wide on a 210 mm page scales 300 px of height to ~508 mm,
        // which is two A4 pages.
        let surface = RenderSurface::solid(124, 300, [200, 210, 220]);
        let tiles = paginate(300.0, 124.0, 210.0, 297.0).unwrap();
        assert_eq!(tiles.len(), 2);
        (surface, tiles)
    }

    #[test]
    fn append_and_finish_produce_a_pdf() {
        let (surface, tiles) = two_page_setup();
        let mut writer = PdfWriter::new("co2 report test", PageFormat::A4, true);
        for tile in &tiles {
            writer.append_page(tile, &surface).unwrap();
        }
        assert_eq!(writer.page_count(), 2);

        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
        assert!(bytes.len() > 1_000);
    }

    #[test]
    fn append_after_finish_is_rejected() {
        let (surface, tiles) = two_page_setup();
        let mut writer = PdfWriter::new("t", PageFormat::A4, false);
        writer.append_page(&tiles[0], &surface).unwrap();
        writer.finish().unwrap();

        assert!(writer.append_page(&tiles[1], &surface).is_err());
        assert!(writer.finish().is_err());
    }

    #[test]
    fn footerless_document_still_renders() {
        let (surface, tiles) = two_page_setup();
        let mut writer = PdfWriter::new("t", PageFormat::LETTER, false);
        for tile in &tiles {
            writer.append_page(tile, &surface).unwrap();
        }
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }
}
