//! Dashboard rasterisation: compose the report surface as an RGB image.
//!
//! ## Why CPU rasterisation?
//!
//! The surface has to come out identical on a headless CI box and on a
//! laptop: no system fonts, no GPU, no display server. Every section is
//! drawn with plain arithmetic into an [`image::RgbImage`], so two
//! captures of the same view are byte-for-byte equal. Numbers and labels
//! travel in the CLI's JSON output instead of being painted into pixels.
//!
//! ## Why spawn_blocking?
//!
//! Rasterising a multi-megapixel surface is CPU-bound.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so
//! the Tokio worker threads keep serving network fetches while a capture
//! runs.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::session::{DashboardView, Slot};
use image::{Rgb, RgbImage};
use std::fmt;
use tracing::debug;

/// Hard ceiling on the rendered surface height, in pixels.
///
/// A surface taller than this would paginate into hundreds of pages and
/// eat memory for no legible gain; the capture fails instead.
pub const MAX_SURFACE_HEIGHT_PX: u64 = 16_384;

// ─────────────────────────────────────────────────────────────────────────────
// Layout constants (base units; multiplied by `render_scale`)
// ─────────────────────────────────────────────────────────────────────────────

const BASE_WIDTH: u32 = 620;
const MARGIN: u32 = 24;
const GAP: u32 = 16;
const HEADER_H: u32 = 120;
const CHART_H: u32 = 560;
const MODEL_H: u32 = 120;
const PERF_H: u32 = 160;
const TABLE_HEAD_H: u32 = 36;
const TABLE_ROW_H: u32 = 32;
const FOOTER_H: u32 = 40;

// Palette.
const BG: Rgb<u8> = Rgb([244, 246, 248]);
const PANEL: Rgb<u8> = Rgb([255, 255, 255]);
const PANEL_ALT: Rgb<u8> = Rgb([247, 249, 250]);
const BORDER: Rgb<u8> = Rgb([216, 222, 228]);
const HEAD_FILL: Rgb<u8> = Rgb([238, 241, 244]);
const INK: Rgb<u8> = Rgb([31, 41, 51]);
const AXIS: Rgb<u8> = Rgb([82, 96, 109]);
const GRID: Rgb<u8> = Rgb([224, 224, 224]);
const ACTUAL: Rgb<u8> = Rgb([46, 125, 50]);
const FORECAST: Rgb<u8> = Rgb([198, 40, 40]);
const HATCH: Rgb<u8> = Rgb([154, 165, 177]);

/// The rendered dashboard surface, ready for encoding and pagination.
pub struct RenderSurface {
    image: RgbImage,
}

impl RenderSurface {
    pub fn width_px(&self) -> u32 {
        self.image.width()
    }

    pub fn height_px(&self) -> u32 {
        self.image.height()
    }

    /// Raw pixel access, used by the PNG encoder.
    pub fn pixels(&self) -> &RgbImage {
        &self.image
    }
}

impl fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSurface")
            .field("width_px", &self.width_px())
            .field("height_px", &self.height_px())
            .finish()
    }
}

#[cfg(test)]
impl RenderSurface {
    /// Uniform surface for writer and export tests.
    pub(crate) fn solid(width_px: u32, height_px: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width_px, height_px, Rgb(rgb)),
        }
    }
}

/// Rasterise a dashboard view into a single tall surface.
///
/// This runs inside `spawn_blocking` since composition is CPU-bound.
pub async fn capture_surface(
    view: &DashboardView,
    config: &ReportConfig,
) -> Result<RenderSurface, ReportError> {
    let view = view.clone();
    let scale = config.render_scale;
    let table_rows = config.table_rows;

    tokio::task::spawn_blocking(move || capture_blocking(&view, scale, table_rows))
        .await
        .map_err(|e| ReportError::Internal(format!("Capture task panicked: {e}")))?
}

// ─────────────────────────────────────────────────────────────────────────────
// Section planning
// ─────────────────────────────────────────────────────────────────────────────

enum Section {
    Header,
    Chart,
    Model,
    Performance,
    Table { rows: usize },
    Footer,
}

impl Section {
    fn height(&self) -> u64 {
        match self {
            Section::Header => HEADER_H as u64,
            Section::Chart => CHART_H as u64,
            Section::Model => MODEL_H as u64,
            Section::Performance => PERF_H as u64,
            Section::Table { rows } => TABLE_HEAD_H as u64 + *rows as u64 * TABLE_ROW_H as u64,
            Section::Footer => FOOTER_H as u64,
        }
    }
}

/// Decide which sections appear. Empty slots collapse their section;
/// unavailable slots keep it (drawn hatched) so degradation is visible.
fn plan_sections(view: &DashboardView, table_rows: usize) -> Vec<Section> {
    let mut sections = vec![Section::Header, Section::Chart];
    if !view.forecast.is_empty() {
        sections.push(Section::Model);
    }
    if !view.performance.is_empty() {
        sections.push(Section::Performance);
    }
    match &view.history {
        Slot::Ready(h) if !h.is_empty() && table_rows > 0 => sections.push(Section::Table {
            rows: table_rows.min(h.len()),
        }),
        // Hatched placeholder body.
        Slot::Unavailable(_) => sections.push(Section::Table { rows: 3 }),
        _ => {}
    }
    sections.push(Section::Footer);
    sections
}

fn capture_blocking(
    view: &DashboardView,
    scale: u32,
    table_rows: usize,
) -> Result<RenderSurface, ReportError> {
    let sections = plan_sections(view, table_rows);

    let mut base_height: u64 = 2 * MARGIN as u64;
    base_height += sections.iter().map(Section::height).sum::<u64>();
    base_height += (sections.len() as u64 - 1) * GAP as u64;

    let height_px = base_height * scale as u64;
    if height_px > MAX_SURFACE_HEIGHT_PX {
        return Err(ReportError::RenderFailed {
            detail: format!(
                "surface would be {height_px} px tall (limit {MAX_SURFACE_HEIGHT_PX}); \
                 reduce the table rows or the render scale"
            ),
        });
    }

    let width_px = BASE_WIDTH * scale;
    let mut img = RgbImage::from_pixel(width_px, height_px as u32, BG);

    let content = Rect {
        x: MARGIN * scale,
        w: (BASE_WIDTH - 2 * MARGIN) * scale,
        y: 0,
        h: 0,
    };
    let mut y = MARGIN * scale;
    for section in &sections {
        let rect = Rect {
            x: content.x,
            y,
            w: content.w,
            h: section.height() as u32 * scale,
        };
        match section {
            Section::Header => draw_header(&mut img, rect, scale),
            Section::Chart => draw_chart(&mut img, rect, view, scale),
            Section::Model => draw_model_panel(&mut img, rect, view, scale),
            Section::Performance => draw_performance_panel(&mut img, rect, view, scale),
            Section::Table { rows } => draw_table(&mut img, rect, view, *rows, scale),
            Section::Footer => draw_footer(&mut img, rect, scale),
        }
        y += rect.h + GAP * scale;
    }

    debug!(
        width_px,
        height_px,
        sections = sections.len(),
        "surface captured"
    );
    Ok(RenderSurface { image: img })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

fn draw_header(img: &mut RgbImage, rect: Rect, scale: u32) {
    panel(img, rect, scale);
    let pad = 20 * scale;
    // Title and subtitle placeholder bars.
    fill_rect(
        img,
        rect.x + pad,
        rect.y + pad,
        rect.w * 45 / 100,
        18 * scale,
        INK,
    );
    fill_rect(
        img,
        rect.x + pad,
        rect.y + pad + 30 * scale,
        rect.w / 4,
        10 * scale,
        AXIS,
    );
    // Legend swatches on the right edge.
    let sw = 14 * scale;
    let legend_x = rect.x + rect.w - pad - sw;
    fill_rect(img, legend_x, rect.y + pad, sw, sw, ACTUAL);
    fill_rect(img, legend_x, rect.y + pad + 22 * scale, sw, sw, FORECAST);
}

fn draw_chart(img: &mut RgbImage, rect: Rect, view: &DashboardView, scale: u32) {
    panel(img, rect, scale);
    let plot = Rect {
        x: rect.x + 70 * scale,
        y: rect.y + 24 * scale,
        w: rect.w - (70 + 24) * scale,
        h: rect.h - (24 + 46) * scale,
    };

    // Axes are drawn even for an empty or degraded chart.
    fill_rect(img, plot.x, plot.y, scale, plot.h, AXIS);
    fill_rect(img, plot.x, plot.y + plot.h - scale, plot.w, scale, AXIS);

    if view.history.is_unavailable() {
        hatch_rect(
            img,
            Rect {
                x: plot.x + scale,
                y: plot.y,
                w: plot.w - scale,
                h: plot.h - scale,
            },
            12 * scale,
            scale,
            HATCH,
        );
        return;
    }

    let records = &view.records;
    if records.is_empty() {
        return;
    }

    // Domains. A single-year series gets a one-year pad on each side so it
    // does not collapse to a zero-width domain.
    let (mut x_min, mut x_max) = (i32::MAX, i32::MIN);
    let mut y_max = 0.0f64;
    for r in records {
        x_min = x_min.min(r.year);
        x_max = x_max.max(r.year);
        if let Some(v) = r.value() {
            y_max = y_max.max(v);
        }
    }
    if x_min == x_max {
        x_min -= 1;
        x_max += 1;
    }
    if y_max <= 0.0 {
        y_max = 1.0;
    }
    y_max *= 1.05;

    let to_px = |year: f64, value: f64| -> (f64, f64) {
        let fx = (year - x_min as f64) / (x_max - x_min) as f64;
        let fy = value / y_max;
        (
            plot.x as f64 + fx * (plot.w - scale) as f64,
            (plot.y + plot.h - scale) as f64 - fy * (plot.h - scale) as f64,
        )
    };

    // Horizontal gridlines with axis notches, at nice value steps.
    let y_step = nice_step(y_max / 5.0);
    let mut tick = y_step;
    while tick < y_max {
        let (_, py) = to_px(x_min as f64, tick);
        fill_rect(img, plot.x + scale, py as u32, plot.w - scale, scale, GRID);
        fill_rect(img, plot.x - 5 * scale, py as u32, 5 * scale, scale, AXIS);
        tick += y_step;
    }

    // Vertical gridlines at nice year steps.
    let x_step = nice_step((x_max - x_min) as f64 / 6.0).max(1.0);
    let mut year = (x_min as f64 / x_step).ceil() * x_step;
    while year <= x_max as f64 {
        let (px, _) = to_px(year, 0.0);
        if px as u32 > plot.x {
            fill_rect(img, px as u32, plot.y, scale, plot.h - scale, GRID);
            fill_rect(
                img,
                px as u32,
                plot.y + plot.h,
                scale,
                5 * scale,
                AXIS,
            );
        }
        year += x_step;
    }

    // Observed polyline with square markers, in record order.
    let actual: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.actual.map(|v| to_px(r.year as f64, v)))
        .collect();
    for pair in actual.windows(2) {
        draw_line(img, pair[0], pair[1], 2 * scale, ACTUAL);
    }
    for &(px, py) in &actual {
        let half = 2 * scale;
        fill_rect(
            img,
            (px as u32).saturating_sub(half),
            (py as u32).saturating_sub(half),
            2 * half,
            2 * half,
            ACTUAL,
        );
    }

    // Trailing forecast: dashed connector from the last observation, then a
    // ring marker so the predicted point reads differently from the line.
    if let Some(last) = records.last().filter(|r| r.is_forecast()) {
        let target = to_px(last.year as f64, last.predicted.unwrap_or(0.0));
        if let Some(&from) = actual.last() {
            draw_dashed_line(img, from, target, 2 * scale, 6.0 * scale as f64, FORECAST);
        }
        fill_circle(img, target, 6.0 * scale as f64, FORECAST);
        fill_circle(img, target, 3.5 * scale as f64, PANEL);
        fill_circle(img, target, 1.5 * scale as f64, FORECAST);
    }
}

fn draw_model_panel(img: &mut RgbImage, rect: Rect, view: &DashboardView, scale: u32) {
    panel(img, rect, scale);
    let pad = 20 * scale;
    fill_rect(img, rect.x + pad, rect.y + pad, 6 * scale, rect.h - 2 * pad, FORECAST);

    match &view.forecast {
        Slot::Ready(f) => {
            // Predicted value as a bar against the historical peak.
            let hist_max = view
                .history
                .ready()
                .map(|h| h.iter().fold(0.0f64, |m, o| m.max(o.value)))
                .unwrap_or(0.0)
                .max(f.value);
            let frac = (f.value / (hist_max * 1.1)).clamp(0.0, 1.0);
            let track_x = rect.x + pad + 18 * scale;
            let track_w = rect.w - 2 * pad - 18 * scale;
            let bar_y = rect.y + rect.h / 2 - 7 * scale;
            fill_rect(img, track_x, bar_y, track_w, 14 * scale, GRID);
            fill_rect(
                img,
                track_x,
                bar_y,
                (track_w as f64 * frac) as u32,
                14 * scale,
                FORECAST,
            );
        }
        Slot::Unavailable(_) => hatch_body(img, rect, scale),
        Slot::Empty => {}
    }
}

fn draw_performance_panel(img: &mut RgbImage, rect: Rect, view: &DashboardView, scale: u32) {
    panel(img, rect, scale);
    match &view.performance {
        Slot::Ready(perf) => {
            // Monotone squash keeps any metric magnitude inside its track.
            let squash = |v: f64| v / (v + 1.0);
            let metrics = [
                squash(perf.rmse),
                perf.r2.clamp(0.0, 1.0),
                squash(perf.training_rows as f64 / 1_000.0),
            ];
            let pad = 20 * scale;
            let track_x = rect.x + pad + 60 * scale;
            let track_w = rect.w - 2 * pad - 60 * scale;
            for (i, frac) in metrics.iter().enumerate() {
                let y = rect.y + pad + i as u32 * 36 * scale;
                // Metric label placeholder, then the bar.
                fill_rect(img, rect.x + pad, y + 2 * scale, 44 * scale, 8 * scale, AXIS);
                fill_rect(img, track_x, y, track_w, 12 * scale, GRID);
                fill_rect(img, track_x, y, (track_w as f64 * frac) as u32, 12 * scale, INK);
            }
        }
        Slot::Unavailable(_) => hatch_body(img, rect, scale),
        Slot::Empty => {}
    }
}

fn draw_table(img: &mut RgbImage, rect: Rect, view: &DashboardView, rows: usize, scale: u32) {
    panel(img, rect, scale);
    let b = scale;
    fill_rect(
        img,
        rect.x + b,
        rect.y + b,
        rect.w - 2 * b,
        TABLE_HEAD_H * scale - b,
        HEAD_FILL,
    );
    fill_rect(
        img,
        rect.x + b,
        rect.y + TABLE_HEAD_H * scale,
        rect.w - 2 * b,
        scale,
        AXIS,
    );

    let body = Rect {
        x: rect.x + b,
        y: rect.y + TABLE_HEAD_H * scale + scale,
        w: rect.w - 2 * b,
        h: rect.h - TABLE_HEAD_H * scale - scale - b,
    };
    if view.history.is_unavailable() {
        hatch_rect(img, body, 12 * scale, scale, HATCH);
        return;
    }

    let tail = view.table_tail(rows);
    let max_value = tail
        .iter()
        .fold(0.0f64, |m, o| m.max(o.value))
        .max(f64::EPSILON);
    for (i, obs) in tail.iter().enumerate() {
        let row_y = body.y + i as u32 * TABLE_ROW_H * scale;
        if i % 2 == 1 {
            fill_rect(img, body.x, row_y, body.w, TABLE_ROW_H * scale, PANEL_ALT);
        }
        // Year cell placeholder, then a bar proportional to the value.
        fill_rect(img, body.x + 12 * scale, row_y + 11 * scale, 48 * scale, 10 * scale, INK);
        let bar_w = ((body.w - 110 * scale - 16 * scale) as f64 * (obs.value / max_value)) as u32;
        fill_rect(img, body.x + 110 * scale, row_y + 10 * scale, bar_w, 12 * scale, ACTUAL);
        fill_rect(img, body.x, row_y + TABLE_ROW_H * scale - scale, body.w, scale, GRID);
    }
}

fn draw_footer(img: &mut RgbImage, rect: Rect, scale: u32) {
    panel(img, rect, scale);
    let pad = 14 * scale;
    fill_rect(img, rect.x + pad, rect.y + rect.h / 2 - 4 * scale, rect.w / 3, 8 * scale, AXIS);
}

// ─────────────────────────────────────────────────────────────────────────────
// Drawing primitives
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// White card with a one-unit border, the backdrop of every section.
fn panel(img: &mut RgbImage, rect: Rect, scale: u32) {
    fill_rect(img, rect.x, rect.y, rect.w, rect.h, BORDER);
    fill_rect(
        img,
        rect.x + scale,
        rect.y + scale,
        rect.w.saturating_sub(2 * scale),
        rect.h.saturating_sub(2 * scale),
        PANEL,
    );
}

fn hatch_body(img: &mut RgbImage, rect: Rect, scale: u32) {
    let pad = 34 * scale;
    hatch_rect(
        img,
        Rect {
            x: rect.x + pad,
            y: rect.y + 14 * scale,
            w: rect.w.saturating_sub(pad + 20 * scale),
            h: rect.h.saturating_sub(28 * scale),
        },
        12 * scale,
        scale,
        HATCH,
    );
}

/// Clipped axis-aligned fill.
fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x1 = (x + w).min(img.width());
    let y1 = (y + h).min(img.height());
    for py in y.min(img.height())..y1 {
        for px in x.min(img.width())..x1 {
            img.put_pixel(px, py, color);
        }
    }
}

/// Diagonal hatching: one-direction stripes on the given pitch.
fn hatch_rect(img: &mut RgbImage, rect: Rect, pitch: u32, thickness: u32, color: Rgb<u8>) {
    if pitch == 0 {
        return;
    }
    let x1 = (rect.x + rect.w).min(img.width());
    let y1 = (rect.y + rect.h).min(img.height());
    for py in rect.y.min(img.height())..y1 {
        for px in rect.x.min(img.width())..x1 {
            if (px + py) % pitch < thickness {
                img.put_pixel(px, py, color);
            }
        }
    }
}

/// Parametric line: step along the segment, stamping thickness-sized blocks.
fn draw_line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), thickness: u32, color: Rgb<u8>) {
    stroke_segment(img, from, to, thickness, color, |_| true);
}

/// Dashed variant: on/off blocks of `dash` pixels along the arc length.
fn draw_dashed_line(
    img: &mut RgbImage,
    from: (f64, f64),
    to: (f64, f64),
    thickness: u32,
    dash: f64,
    color: Rgb<u8>,
) {
    stroke_segment(img, from, to, thickness, color, |d| (d / dash) as u64 % 2 == 0);
}

fn stroke_segment(
    img: &mut RgbImage,
    from: (f64, f64),
    to: (f64, f64),
    thickness: u32,
    color: Rgb<u8>,
    pattern: impl Fn(f64) -> bool,
) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil() as u64 + 1;
    let half = thickness as f64 / 2.0;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let d = t * dx.hypot(dy);
        if !pattern(d) {
            continue;
        }
        let cx = from.0 + t * dx - half;
        let cy = from.1 + t * dy - half;
        if cx < 0.0 || cy < 0.0 {
            continue;
        }
        fill_rect(img, cx as u32, cy as u32, thickness, thickness, color);
    }
}

fn fill_circle(img: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
    let x0 = (center.0 - radius).floor().max(0.0) as u32;
    let y0 = (center.1 - radius).floor().max(0.0) as u32;
    let x1 = ((center.0 + radius).ceil() as u32 + 1).min(img.width());
    let y1 = ((center.1 + radius).ceil() as u32 + 1).min(img.height());
    for py in y0..y1 {
        for px in x0..x1 {
            let (dx, dy) = (px as f64 + 0.5 - center.0, py as f64 + 0.5 - center.1);
            if dx * dx + dy * dy <= radius * radius {
                img.put_pixel(px, py, color);
            }
        }
    }
}

/// Round up to a 1/2/5 × 10^k step, the usual chart tick progression.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let mag = 10f64.powf(raw.log10().floor());
    let norm = raw / mag;
    let factor = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    factor * mag
}
