//! Surface encoding: [`RenderSurface`] → PNG bytes or a base64 data URI.
//!
//! The PDF writer embeds the surface through printpdf's bundled PNG codec,
//! and the CLI can inline it into JSON output as a `data:` URI.
//!
//! ## Why PNG?
//! The surface is flat panels and thin lines; PNG's filters compress that
//! losslessly to a small fraction of the raw buffer, and lossless matters
//! because the same bytes are re-decoded for every document page.

use crate::error::ReportError;
use crate::pipeline::render::RenderSurface;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode the surface as PNG bytes.
pub fn surface_to_png(surface: &RenderSurface) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(surface.pixels().clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ReportError::Internal(format!("PNG encoding failed: {e}")))?;

    debug!("Encoded surface → {} bytes PNG", buf.len());
    Ok(buf)
}

/// Encode the surface as a `data:image/png;base64,…` URI.
pub fn surface_to_data_uri(surface: &RenderSurface) -> Result<String, ReportError> {
    let png = surface_to_png(surface)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::session::{DashboardView, Slot};

    async fn small_surface() -> RenderSurface {
        let view = DashboardView {
            country: None,
            target_year: 2025,
            records: Vec::new(),
            history: Slot::Empty,
            forecast: Slot::Empty,
            performance: Slot::Empty,
        };
        let cfg = ReportConfig::builder().render_scale(1).build().unwrap();
        crate::pipeline::render::capture_surface(&view, &cfg)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn png_bytes_carry_the_magic_number() {
        let png = surface_to_png(&small_surface().await).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(png.len() > 100);
    }

    #[tokio::test]
    async fn data_uri_wraps_the_same_png() {
        let surface = small_surface().await;
        let png = surface_to_png(&surface).unwrap();
        let uri = surface_to_data_uri(&surface).unwrap();
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), png);
    }
}
