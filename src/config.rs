//! Configuration types for report generation.
//!
//! All export behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across concurrent exports and to log exactly
//! what a run was asked to do.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::error::ReportError;
use crate::layout::PageFormat;
use crate::progress::{ExportProgressCallback, ProgressCallback};

/// Configuration for fetching, rendering and exporting a report.
///
/// Built via [`ReportConfig::builder()`] or using
/// [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use co2report::{PageFormat, ReportConfig};
///
/// let config = ReportConfig::builder()
///     .api_base_url("http://10.0.0.5:8000")
///     .start_year(1990)
///     .page(PageFormat::LETTER)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Base URL of the emissions service. Default: `http://127.0.0.1:8000`.
    ///
    /// The service exposes `/countries`, `/history/{country}`, `/predict`
    /// and `/model/performance`. A trailing slash is stripped so endpoint
    /// paths can be joined naively.
    pub api_base_url: String,

    /// Per-request timeout in seconds. Default: 30.
    ///
    /// Requests are single-attempt: a slot that misses its deadline shows
    /// as unavailable instead of being retried, so this is the only latency
    /// bound a fetch has.
    pub request_timeout_secs: u64,

    /// First year of the history window passed to the service. Default: 2000.
    ///
    /// The underlying dataset reaches back to the 18th century; charts get
    /// unreadable long before that. 2000 keeps roughly 25 points on screen.
    pub start_year: i32,

    /// Output page geometry. Default: [`PageFormat::A4`] portrait.
    pub page: PageFormat,

    /// Supersampling factor for the captured surface. Range: 1–4. Default: 2.
    ///
    /// The raster is drawn at `scale ×` the base resolution and embedded at
    /// page width, so 2 keeps chart lines crisp in the PDF without the
    /// memory cost of a 4× capture.
    pub render_scale: u32,

    /// Rows shown in the recent-history table (tail of the series). Default: 10.
    pub table_rows: usize,

    /// Stamp a small "Page N" footer on every document page. Default: true.
    pub page_footer: bool,

    /// Concurrent exports in batch mode. Default: 4.
    ///
    /// Each export is one history fetch, one prediction and one CPU render;
    /// four in flight keeps a typical service busy without stampeding it.
    pub concurrency: usize,

    /// Optional progress callback invoked as an export moves through its
    /// stages. Default: none (no-op).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            start_year: 2000,
            page: PageFormat::A4,
            render_scale: 2,
            table_rows: 10,
            page_footer: true,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("start_year", &self.start_year)
            .field("page", &self.page)
            .field("render_scale", &self.render_scale)
            .field("table_rows", &self.table_rows)
            .field("page_footer", &self.page_footer)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default output file name for a country/year report:
    /// `CO2_Report_{country}_{year}.pdf`, with non-alphanumeric runs in the
    /// country name collapsed to `_` so the result is safe on every
    /// filesystem.
    pub fn report_file_name(&self, country: &str, year: i32) -> String {
        let slug = NON_ALNUM.replace_all(country, "_");
        let slug = slug.trim_matches('_');
        let slug = if slug.is_empty() { "report" } else { slug };
        format!("CO2_Report_{slug}_{year}.pdf")
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn start_year(mut self, year: i32) -> Self {
        self.config.start_year = year;
        self
    }

    pub fn page(mut self, page: PageFormat) -> Self {
        self.config.page = page;
        self
    }

    pub fn render_scale(mut self, scale: u32) -> Self {
        self.config.render_scale = scale.clamp(1, 4);
        self
    }

    pub fn table_rows(mut self, rows: usize) -> Self {
        self.config.table_rows = rows;
        self
    }

    pub fn page_footer(mut self, v: bool) -> Self {
        self.config.page_footer = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ExportProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.api_base_url.is_empty() {
            return Err(ReportError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        if !(1750..=2200).contains(&c.start_year) {
            return Err(ReportError::InvalidConfig(format!(
                "start year must be 1750–2200, got {}",
                c.start_year
            )));
        }
        let p = c.page;
        if !(p.width_mm > 0.0 && p.width_mm.is_finite() && p.height_mm > 0.0 && p.height_mm.is_finite())
        {
            return Err(ReportError::InvalidConfig(format!(
                "page dimensions must be positive, got {}x{} mm",
                p.width_mm, p.height_mm
            )));
        }
        if c.concurrency == 0 {
            return Err(ReportError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
