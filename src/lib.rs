//! # co2report
//!
//! CO₂ emissions forecast reports: fetch a country's emissions history and
//! a model forecast from the emissions service, rasterise the dashboard
//! surface, and export it as a paginated PDF.
//!
//! ## Why this crate?
//!
//! Browser print dialogs and chart toolkits each bring their own
//! nondeterminism: system fonts, GPU paths, viewport-dependent layout. The
//! same dashboard prints differently on two machines. This crate draws the
//! report surface with plain CPU arithmetic and slices it into pages
//! itself, so the same data produces the same document on a laptop and on
//! a headless CI runner.
//!
//! ## Pipeline Overview
//!
//! ```text
//! emissions service (REST)
//!  │
//!  ├─ 1. Source    fetch history / prediction / model performance
//!  ├─ 2. Session   selection state, forecast invalidation, slot degrade
//!  ├─ 3. Series    merge history + forecast into chart-ready records
//!  ├─ 4. Render    rasterise the dashboard surface (CPU, spawn_blocking)
//!  ├─ 5. Layout    slice the tall surface into page tiles
//!  └─ 6. Writer    embed the tiles into a PDF via printpdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use co2report::{export_to_file, DashboardSession, HttpEmissionsSource, ReportConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReportConfig::default();
//!     let source = Arc::new(HttpEmissionsSource::from_config(&config)?);
//!
//!     let mut session = DashboardSession::new(source, config.start_year, 2030);
//!     session.select_country("Thailand").await;
//!     session.request_prediction().await;
//!     session.refresh_performance().await;
//!
//!     let stats = export_to_file(&session.view(), "thailand_2030.pdf", &config).await?;
//!     eprintln!("{} pages in {}ms", stats.pages, stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! Fetch failures never crash an export: the affected panel renders as a
//! hatched placeholder and the slot keeps the error for display.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `co2report` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! co2report = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod series;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder};
pub use error::{FetchError, ReportError};
pub use export::{export_batch, export_report, export_to_file};
pub use layout::{paginate, scaled_height, PageFormat, PageTile, MAX_PAGE_COUNT};
pub use output::{ExportStats, ExportedReport, ReportSnapshot};
pub use pipeline::render::{capture_surface, RenderSurface, MAX_SURFACE_HEIGHT_PX};
pub use pipeline::source::{EmissionsSource, HttpEmissionsSource, ModelPerformance, ServiceHealth};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use series::{reconcile, DisplayRecord, ForecastPoint, ObservationPoint};
pub use session::{DashboardSession, DashboardView, Slot};
