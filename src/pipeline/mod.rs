//! Pipeline stages for report generation.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different document backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ session ──▶ render ──▶ paginate ──▶ writer
//! (HTTP)     (slots)    (raster)    (tiles)      (PDF)
//! ```
//!
//! 1. [`source`] — fetch countries, history, predictions and model metrics
//!    from the emissions service; the only stage with network I/O
//! 2. [`render`] — compose the dashboard view into one tall RGB raster;
//!    runs in `spawn_blocking` because rasterisation is CPU-bound
//! 3. [`crate::layout`] — pure tiling arithmetic over the raster dimensions
//! 4. [`encode`]  — PNG-encode surfaces for embedding (PDF pages, JSON
//!    snapshots)
//! 5. [`writer`] — append one page per tile and serialise the PDF
//!
//! The session and tiling layers live at the crate root; they are pure
//! state/arithmetic with no I/O and no blocking work.

pub mod encode;
pub mod render;
pub mod source;
pub mod writer;
