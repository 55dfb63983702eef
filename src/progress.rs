//! Progress-callback trait for export pipeline events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive
//! real-time events as an export captures, tiles and writes pages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a WebSocket, or a log
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so it works when several
//! exports run concurrently via `tokio::spawn`.
//!
//! # Example
//!
//! ```rust
//! use co2report::{ExportProgressCallback, ReportConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: Arc<AtomicUsize>,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_page_appended(&self, page_num: usize, total_pages: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     pages: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the export pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync` (independent exports may run
/// concurrently). All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once when the dashboard capture begins.
    fn on_capture_start(&self) {}

    /// Called when the surface raster is ready.
    ///
    /// # Arguments
    /// * `width_px` / `height_px` — captured surface dimensions
    fn on_capture_complete(&self, width_px: u32, height_px: u32) {
        let _ = (width_px, height_px);
    }

    /// Called once the page tiling is known, before any page is written.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages the document will have
    fn on_pages_computed(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page is appended to the document.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page_appended(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once when the document bytes are complete.
    ///
    /// # Arguments
    /// * `total_pages` — pages written
    /// * `byte_len`    — size of the finished document
    fn on_export_complete(&self, total_pages: usize, byte_len: usize) {
        let _ = (total_pages, byte_len);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        captures: Arc<AtomicUsize>,
        appended: Arc<AtomicUsize>,
        total_seen: Arc<AtomicUsize>,
        final_bytes: Arc<AtomicUsize>,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_capture_start(&self) {
            self.captures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_pages_computed(&self, total_pages: usize) {
            self.total_seen.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_appended(&self, _page_num: usize, _total_pages: usize) {
            self.appended.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_complete(&self, _total_pages: usize, byte_len: usize) {
            self.final_bytes.store(byte_len, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_capture_start();
        cb.on_capture_complete(1240, 2600);
        cb.on_pages_computed(3);
        cb.on_page_appended(1, 3);
        cb.on_export_complete(3, 250_000);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            captures: Arc::new(AtomicUsize::new(0)),
            appended: Arc::new(AtomicUsize::new(0)),
            total_seen: Arc::new(AtomicUsize::new(0)),
            final_bytes: Arc::new(AtomicUsize::new(0)),
        };

        tracker.on_capture_start();
        tracker.on_pages_computed(2);
        tracker.on_page_appended(1, 2);
        tracker.on_page_appended(2, 2);
        tracker.on_export_complete(2, 1024);

        assert_eq!(tracker.captures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.total_seen.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.appended.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.final_bytes.load(Ordering::SeqCst), 1024);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ExportProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_capture_start();
        cb.on_pages_computed(5);
        cb.on_page_appended(1, 5);
    }
}
