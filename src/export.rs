//! Export entry points: dashboard view → paginated PDF report.
//!
//! The eager pipeline is capture → paginate → write. Capture is the only
//! await point; document assembly is synchronous and happens after it, so
//! the returned futures stay `Send` and two exports can run side by side,
//! each on its own snapshot.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::layout::{paginate, scaled_height, PageTile};
use crate::output::{ExportStats, ExportedReport};
use crate::pipeline::render::{self, RenderSurface};
use crate::pipeline::source::EmissionsSource;
use crate::pipeline::writer::{DocumentWriter, PdfWriter};
use crate::session::{DashboardSession, DashboardView};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Export one dashboard view as a PDF report, in memory.
///
/// This is the primary entry point for the library. Degraded slots do not
/// fail the export; they render as hatched placeholders. The export fails
/// only for geometry, rendering, or document assembly errors.
pub async fn export_report(
    view: &DashboardView,
    config: &ReportConfig,
) -> Result<ExportedReport, ReportError> {
    let total_start = Instant::now();
    info!("Starting export: {}", view.title());

    if let Some(ref cb) = config.progress_callback {
        cb.on_capture_start();
    }

    // ── Step 1: Capture the dashboard surface ────────────────────────────
    let render_start = Instant::now();
    let surface = render::capture_surface(view, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_capture_complete(surface.width_px(), surface.height_px());
    }

    // ── Step 2: Slice the surface into page tiles ────────────────────────
    let tiles = paginate(
        surface.height_px() as f64,
        surface.width_px() as f64,
        config.page.width_mm,
        config.page.height_mm,
    )?;
    debug!("Surface splits into {} pages", tiles.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_pages_computed(tiles.len());
    }

    // ── Step 3: Assemble the document ────────────────────────────────────
    let write_start = Instant::now();
    let mut writer = PdfWriter::new(&view.title(), config.page, config.page_footer);
    let bytes = write_document(&mut writer, &tiles, &surface, config)?;
    let write_duration_ms = write_start.elapsed().as_millis() as u64;

    let stats = ExportStats {
        pages: tiles.len(),
        surface_width_px: surface.width_px(),
        surface_height_px: surface.height_px(),
        scaled_height_mm: scaled_height(
            surface.height_px() as f64,
            surface.width_px() as f64,
            config.page.width_mm,
        ),
        render_duration_ms,
        write_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {} pages, {} bytes, {}ms total",
        stats.pages,
        bytes.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(stats.pages, bytes.len());
    }

    Ok(ExportedReport { bytes, stats })
}

/// Drive a writer over every tile, then serialise.
///
/// Split out of [`export_report`] so tests can substitute their own
/// [`DocumentWriter`] and observe the tile sequence.
fn write_document(
    writer: &mut dyn DocumentWriter,
    tiles: &[PageTile],
    surface: &RenderSurface,
    config: &ReportConfig,
) -> Result<Vec<u8>, ReportError> {
    for tile in tiles {
        writer.append_page(tile, surface)?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_appended(tile.page_index + 1, tiles.len());
        }
    }
    writer.finish()
}

/// Export a view and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed export never leaves
/// a partial PDF behind.
pub async fn export_to_file(
    view: &DashboardView,
    output_path: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<ExportStats, ReportError> {
    let report = export_report(view, config).await?;
    let path = output_path.as_ref();

    // A bare filename has an empty parent; only create real directories.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ReportError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &report.bytes)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Report written: {}", path.display());
    Ok(report.stats)
}

/// Export reports for several countries into `out_dir`, a few at a time.
///
/// Each country gets its own session (history fetch, prediction, model
/// performance) and its own file named by
/// [`ReportConfig::report_file_name`]. Per-country failures are returned
/// alongside the successes; the call as a whole errors only when *no*
/// country produced a report.
pub async fn export_batch(
    source: Arc<dyn EmissionsSource>,
    countries: &[String],
    target_year: i32,
    out_dir: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<Vec<(String, Result<ExportStats, ReportError>)>, ReportError> {
    let out_dir = out_dir.as_ref();
    info!(
        "Batch export: {} countries, concurrency {}",
        countries.len(),
        config.concurrency
    );

    let results: Vec<(String, Result<ExportStats, ReportError>)> =
        stream::iter(countries.iter().cloned().map(|country| {
            let source = Arc::clone(&source);
            async move {
                let result = export_one(source, &country, target_year, out_dir, config).await;
                if let Err(ref e) = result {
                    warn!("Export failed for {country}: {e}");
                }
                (country, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    if succeeded == 0 && !results.is_empty() {
        return Err(ReportError::DataUnavailable {
            context: format!("batch export (0/{} countries succeeded)", results.len()),
        });
    }

    info!(
        "Batch export complete: {}/{} reports written",
        succeeded,
        results.len()
    );
    Ok(results)
}

/// One batch item: build a session, load its slots, export to a file.
///
/// A country whose history cannot be fetched is skipped with
/// [`ReportError::DataUnavailable`]: without a series there is nothing to
/// report. A failed prediction or performance fetch only degrades panels.
async fn export_one(
    source: Arc<dyn EmissionsSource>,
    country: &str,
    target_year: i32,
    out_dir: &Path,
    config: &ReportConfig,
) -> Result<ExportStats, ReportError> {
    let mut session = DashboardSession::new(source, config.start_year, target_year);
    session.select_country(country).await;
    session.request_prediction().await;
    session.refresh_performance().await;

    if session.history().is_unavailable() {
        return Err(ReportError::DataUnavailable {
            context: format!("history for {country}"),
        });
    }

    let path = out_dir.join(config.report_file_name(country, target_year));
    export_to_file(&session.view(), &path, config).await
}
