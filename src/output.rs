//! Export result types: document bytes, stats, and the JSON-facing snapshot.

use crate::pipeline::source::ModelPerformance;
use crate::series::DisplayRecord;
use crate::session::DashboardView;
use serde::Serialize;

/// Timing and geometry figures for one export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    /// Document pages written.
    pub pages: usize,
    /// Captured surface width in pixels.
    pub surface_width_px: u32,
    /// Captured surface height in pixels.
    pub surface_height_px: u32,
    /// Surface height after scaling to the page width, in millimetres.
    pub scaled_height_mm: f64,
    /// Time spent rasterising the surface.
    pub render_duration_ms: u64,
    /// Time spent assembling and serialising the document.
    pub write_duration_ms: u64,
    /// Wall-clock time for the whole export.
    pub total_duration_ms: u64,
}

/// A finished report: the PDF bytes plus how they were produced.
#[derive(Debug, Clone)]
pub struct ExportedReport {
    pub bytes: Vec<u8>,
    pub stats: ExportStats,
}

/// Machine-readable dashboard state, emitted by the CLI's `--json` mode.
///
/// Degraded slots surface as error strings so scripts can tell "no forecast
/// requested" from "forecast fetch failed".
#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshot {
    pub country: Option<String>,
    pub target_year: i32,
    /// Emissions unit of every value in `records`.
    pub unit: String,
    pub records: Vec<DisplayRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<ModelPerformance>,
    /// Optional `data:image/png;base64,…` inline of the captured surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_png: Option<String>,
}

impl ReportSnapshot {
    pub fn from_view(view: &DashboardView) -> Self {
        Self {
            country: view.country.clone(),
            target_year: view.target_year,
            unit: "MtCO2".to_string(),
            records: view.records.clone(),
            history_error: view.history.error().map(|e| e.to_string()),
            forecast_error: view.forecast.error().map(|e| e.to_string()),
            performance: view.performance.ready().copied(),
            surface_png: None,
        }
    }

    pub fn with_surface(mut self, data_uri: String) -> Self {
        self.surface_png = Some(data_uri);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::session::Slot;

    #[test]
    fn snapshot_surfaces_slot_errors() {
        let view = DashboardView {
            country: Some("Thailand".to_string()),
            target_year: 2030,
            records: Vec::new(),
            history: Slot::Ready(Vec::new()),
            forecast: Slot::Unavailable(FetchError::Timeout {
                url: "http://x/predict".to_string(),
                secs: 30,
            }),
            performance: Slot::Empty,
        };
        let snap = ReportSnapshot::from_view(&view);
        assert!(snap.history_error.is_none());
        assert!(snap.forecast_error.as_deref().unwrap().contains("timed out"));
        assert!(snap.performance.is_none());

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["unit"], "MtCO2");
        // Skipped optionals stay out of the JSON entirely.
        assert!(json.get("history_error").is_none());
        assert!(json.get("surface_png").is_none());
    }
}
