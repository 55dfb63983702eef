//! Error types for the co2report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReportError`] — **Fatal**: the operation that raised it cannot
//!   proceed (bad page geometry, PDF assembly failure, unwritable output
//!   path). Returned as `Err(ReportError)` from the top-level `export*`
//!   functions. A fatal export error never corrupts other state: nothing is
//!   written and prior on-screen data is untouched.
//!
//! * [`FetchError`] — **Non-fatal**: a single data slot could not be filled
//!   (service down, bad response body). Stored inside
//!   [`crate::session::Slot::Unavailable`] so the dashboard keeps showing an
//!   explicit "unavailable" marker for that slot while everything else,
//!   including export, keeps working.
//!
//! The separation lets callers decide their own tolerance: refuse to export
//! without a forecast, or ship the report with whatever data arrived.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the co2report library.
///
/// Per-slot fetch failures use [`FetchError`] and are stored in
/// [`crate::session::Slot`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Geometry errors ───────────────────────────────────────────────────
    /// Pagination was asked to tile with a non-positive or non-finite
    /// dimension. Raised before any tile is emitted.
    #[error("Invalid {name}: {value} (all page and surface dimensions must be positive, finite numbers)")]
    InvalidDimension { name: &'static str, value: f64 },

    /// The requested geometry derives an absurd page count.
    #[error("Tiling would produce {pages} pages (limit {limit})\nCheck the surface and page dimensions; a near-zero page height is usually the culprit.")]
    ExcessivePageCount { pages: usize, limit: usize },

    // ── Data errors ───────────────────────────────────────────────────────
    /// An operation that needs data found none at all (for example a batch
    /// export in which every country failed).
    #[error("No emissions data available for {context}\nCheck that the emissions service is running and has data for this selection.")]
    DataUnavailable { context: String },

    // ── Render / document errors ──────────────────────────────────────────
    /// The surface renderer could not produce a raster.
    #[error("Dashboard rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// PDF assembly failed (image embedding or document serialisation).
    #[error("PDF assembly failed: {detail}")]
    DocumentWriteFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write report file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (including worker-thread join failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single data slot.
///
/// Stored in [`crate::session::Slot::Unavailable`] when a fetch fails.
/// The session keeps running; only the affected slot degrades.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FetchError {
    /// The emissions service answered with a non-success status code.
    #[error("Emissions service returned HTTP {status} for '{url}'")]
    Status { status: u16, url: String },

    /// The request never completed (connection refused, DNS, TLS).
    #[error("Failed to reach emissions service at '{url}': {reason}")]
    Transport { url: String, reason: String },

    /// The response arrived but its body was not the expected shape.
    #[error("Could not decode emissions service response: {reason}")]
    Decode { reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
}
