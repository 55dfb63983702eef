//! Dashboard session: selection state and the fetch/degrade protocol.
//!
//! A session owns what the user currently looks at: the selected country,
//! the target year, and three data slots (history, forecast, model
//! performance). Every mutation is an explicit method call; nothing is
//! refreshed implicitly, so the ordering rules below hold by construction
//! rather than by scheduler luck.
//!
//! ## Why clear-then-fetch?
//!
//! A forecast belongs to the country it was requested for.
//! [`DashboardSession::select_country`] clears the forecast slot *before*
//! the new history request is issued. Whatever the fetch timing, a stale
//! forecast can never be displayed against another country's history: the
//! slot is already empty by the time any response lands.
//!
//! ## Why slots instead of `Option`?
//!
//! "Never fetched" and "fetch failed" need different pixels: the first is
//! blank, the second shows an explicit unavailable marker. [`Slot`] keeps
//! the failure (with its [`FetchError`]) so the UI and CLI can say why.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::pipeline::source::{EmissionsSource, ModelPerformance};
use crate::series::{reconcile, DisplayRecord, ForecastPoint, ObservationPoint};

/// One dashboard data slot: blank, filled, or explicitly degraded.
///
/// A failed fetch never leaves stale data behind; it replaces the slot
/// content with the error that caused the degradation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Slot<T> {
    /// Nothing fetched yet (or invalidated by a selection change).
    Empty,
    /// Data arrived.
    Ready(T),
    /// The fetch failed; the slot shows an unavailable marker.
    Unavailable(FetchError),
}

impl<T> Slot<T> {
    /// The slot's data, if any.
    pub fn ready(&self) -> Option<&T> {
        match self {
            Slot::Ready(v) => Some(v),
            _ => None,
        }
    }

    /// The degradation cause, if the slot is unavailable.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Slot::Unavailable(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Slot::Unavailable(_))
    }

    /// Absorb a fetch result: `Ok` fills the slot, `Err` degrades it with
    /// a warning log. This is the single place fetch failures turn into
    /// display state.
    fn absorb(result: Result<T, FetchError>, what: &str) -> Self {
        match result {
            Ok(v) => Slot::Ready(v),
            Err(e) => {
                warn!("{what} unavailable: {e}");
                Slot::Unavailable(e)
            }
        }
    }
}

/// Immutable snapshot of a session, consumed by the renderer and the
/// export pipeline. Cheap to clone; concurrent exports each take their own.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub country: Option<String>,
    pub target_year: i32,
    /// Reconciled chart series (history pass-through + trailing forecast).
    pub records: Vec<DisplayRecord>,
    pub history: Slot<Vec<ObservationPoint>>,
    pub forecast: Slot<ForecastPoint>,
    pub performance: Slot<ModelPerformance>,
}

impl DashboardView {
    /// Last `rows` observed points, oldest first, for the history table.
    pub fn table_tail(&self, rows: usize) -> &[ObservationPoint] {
        match self.history.ready() {
            Some(h) => &h[h.len().saturating_sub(rows)..],
            None => &[],
        }
    }

    /// Report title line.
    pub fn title(&self) -> String {
        match &self.country {
            Some(c) => format!("CO2 Emissions Report - {c}"),
            None => "CO2 Emissions Report".to_string(),
        }
    }
}

/// Selection state plus the data slots it drives.
pub struct DashboardSession {
    source: Arc<dyn EmissionsSource>,
    start_year: i32,
    country: Option<String>,
    target_year: i32,
    history: Slot<Vec<ObservationPoint>>,
    forecast: Slot<ForecastPoint>,
    performance: Slot<ModelPerformance>,
}

impl DashboardSession {
    /// A fresh session with no country selected and all slots empty.
    ///
    /// `start_year` bounds every history fetch; `target_year` is where
    /// forecasts get filed until changed.
    pub fn new(source: Arc<dyn EmissionsSource>, start_year: i32, target_year: i32) -> Self {
        Self {
            source,
            start_year,
            country: None,
            target_year,
            history: Slot::Empty,
            forecast: Slot::Empty,
            performance: Slot::Empty,
        }
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn target_year(&self) -> i32 {
        self.target_year
    }

    pub fn history(&self) -> &Slot<Vec<ObservationPoint>> {
        &self.history
    }

    pub fn forecast(&self) -> &Slot<ForecastPoint> {
        &self.forecast
    }

    pub fn performance(&self) -> &Slot<ModelPerformance> {
        &self.performance
    }

    /// Change the target year. The forecast slot is kept: the same
    /// predicted value is simply re-filed under the new year by the next
    /// [`display_series`](Self::display_series) call.
    pub fn set_target_year(&mut self, year: i32) {
        self.target_year = year;
    }

    /// Select a country and load its history.
    ///
    /// The forecast is invalidated synchronously, before the history
    /// request is issued. The history slot is likewise blanked for the
    /// duration of the fetch so the old country's series is never shown
    /// under the new selection.
    pub async fn select_country(&mut self, country: &str) {
        self.forecast = Slot::Empty;
        self.history = Slot::Empty;
        self.country = Some(country.to_string());
        debug!(country, start_year = self.start_year, "country selected");

        let result = self.source.fetch_history(country, self.start_year).await;
        self.history = Slot::absorb(result, "history");
    }

    /// Ask the model for a forecast at the current target year.
    ///
    /// Without a selected country this is a no-op (the slot stays empty).
    pub async fn request_prediction(&mut self) {
        let Some(country) = self.country.clone() else {
            debug!("prediction requested with no country selected; ignoring");
            return;
        };
        let result = self
            .source
            .fetch_prediction(&country, self.target_year)
            .await;
        self.forecast = Slot::absorb(result, "prediction");
    }

    /// Refresh the model performance panel.
    pub async fn refresh_performance(&mut self) {
        let result = self.source.fetch_model_performance().await;
        self.performance = Slot::absorb(result, "model performance");
    }

    /// The reconciled chart series for the current slots: history rows in
    /// fetched order plus, when a forecast is live, one trailing record at
    /// the current target year.
    pub fn display_series(&self) -> Vec<DisplayRecord> {
        let history = self.history.ready().map(Vec::as_slice).unwrap_or(&[]);
        reconcile(history, self.forecast.ready(), self.target_year)
    }

    /// Snapshot the session for rendering/export. Later session mutations
    /// do not affect the snapshot.
    pub fn view(&self) -> DashboardView {
        DashboardView {
            country: self.country.clone(),
            target_year: self.target_year,
            records: self.display_series(),
            history: self.history.clone(),
            forecast: self.forecast.clone(),
            performance: self.performance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory source; countries listed in `history` succeed, everything
    /// else fails with a 404-shaped error.
    struct StubSource {
        history: HashMap<String, Vec<ObservationPoint>>,
        predicted: HashMap<String, f64>,
        performance: Option<ModelPerformance>,
    }

    impl StubSource {
        fn with_two_countries() -> Self {
            let mut history = HashMap::new();
            history.insert(
                "Thailand".to_string(),
                vec![
                    ObservationPoint {
                        year: 2020,
                        value: 250.0,
                    },
                    ObservationPoint {
                        year: 2021,
                        value: 255.0,
                    },
                ],
            );
            history.insert(
                "Chile".to_string(),
                vec![ObservationPoint {
                    year: 2020,
                    value: 85.0,
                }],
            );
            let mut predicted = HashMap::new();
            predicted.insert("Thailand".to_string(), 290.0);
            predicted.insert("Chile".to_string(), 95.0);
            Self {
                history,
                predicted,
                performance: Some(ModelPerformance {
                    rmse: 200.0,
                    r2: 0.9,
                    training_rows: 1000,
                }),
            }
        }
    }

    #[async_trait]
    impl EmissionsSource for StubSource {
        async fn list_countries(&self) -> Result<Vec<String>, FetchError> {
            let mut names: Vec<String> = self.history.keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn fetch_history(
            &self,
            country: &str,
            _start_year: i32,
        ) -> Result<Vec<ObservationPoint>, FetchError> {
            self.history
                .get(country)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    status: 404,
                    url: format!("stub:/history/{country}"),
                })
        }

        async fn fetch_prediction(
            &self,
            country: &str,
            year: i32,
        ) -> Result<ForecastPoint, FetchError> {
            self.predicted
                .get(country)
                .map(|&value| ForecastPoint { year, value })
                .ok_or_else(|| FetchError::Status {
                    status: 404,
                    url: format!("stub:/predict/{country}"),
                })
        }

        async fn fetch_model_performance(&self) -> Result<ModelPerformance, FetchError> {
            self.performance.ok_or_else(|| FetchError::Transport {
                url: "stub:/model/performance".to_string(),
                reason: "no model".to_string(),
            })
        }
    }

    fn session() -> DashboardSession {
        DashboardSession::new(Arc::new(StubSource::with_two_countries()), 2000, 2030)
    }

    #[tokio::test]
    async fn select_country_fills_history() {
        let mut s = session();
        s.select_country("Thailand").await;
        assert!(s.history().is_ready());
        assert_eq!(s.history().ready().unwrap().len(), 2);
        assert_eq!(s.country(), Some("Thailand"));
    }

    #[tokio::test]
    async fn unknown_country_degrades_history_slot() {
        let mut s = session();
        s.select_country("Narnia").await;
        assert!(s.history().is_unavailable());
        assert!(s.display_series().is_empty());
    }

    #[tokio::test]
    async fn select_country_clears_previous_forecast() {
        let mut s = session();
        s.select_country("Thailand").await;
        s.request_prediction().await;
        assert!(s.forecast().is_ready());

        s.select_country("Chile").await;
        assert!(s.forecast().is_empty());
        assert!(s.display_series().iter().all(|r| r.predicted.is_none()));
    }

    #[tokio::test]
    async fn forecast_cleared_even_when_new_history_fails() {
        let mut s = session();
        s.select_country("Thailand").await;
        s.request_prediction().await;

        s.select_country("Narnia").await;
        assert!(s.forecast().is_empty());
        assert!(s.history().is_unavailable());
        assert!(s.display_series().is_empty());
    }

    #[tokio::test]
    async fn failed_prediction_marks_slot_unavailable() {
        let mut s = session();
        // History succeeds for Thailand; force the prediction to fail by
        // selecting a country the stub can predict nothing for.
        s.select_country("Thailand").await;
        s.request_prediction().await;
        assert!(s.forecast().is_ready());

        let mut s = DashboardSession::new(
            Arc::new(StubSource {
                history: HashMap::from([(
                    "Norway".to_string(),
                    vec![ObservationPoint {
                        year: 2020,
                        value: 41.0,
                    }],
                )]),
                predicted: HashMap::new(),
                performance: None,
            }),
            2000,
            2030,
        );
        s.select_country("Norway").await;
        s.request_prediction().await;
        assert!(s.forecast().is_unavailable());
        // History is untouched by the failed prediction.
        assert!(s.history().is_ready());
        assert_eq!(s.display_series().len(), 1);
    }

    #[tokio::test]
    async fn prediction_without_country_is_a_noop() {
        let mut s = session();
        s.request_prediction().await;
        assert!(s.forecast().is_empty());
    }

    #[tokio::test]
    async fn forecast_refiles_under_new_target_year() {
        let mut s = session();
        s.select_country("Thailand").await;
        s.request_prediction().await;

        s.set_target_year(2026);
        let series = s.display_series();
        let last = series.last().unwrap();
        assert_eq!(last.year, 2026);
        assert_eq!(last.predicted, Some(290.0));
        // The slot still remembers what the model was asked.
        assert_eq!(s.forecast().ready().unwrap().year, 2030);
    }

    #[tokio::test]
    async fn view_is_a_stable_snapshot() {
        let mut s = session();
        s.select_country("Thailand").await;
        s.refresh_performance().await;
        let view = s.view();

        s.select_country("Chile").await;

        assert_eq!(view.country.as_deref(), Some("Thailand"));
        assert_eq!(view.records.len(), 2);
        assert!(view.performance.is_ready());
        assert_eq!(view.title(), "CO2 Emissions Report - Thailand");
    }

    #[tokio::test]
    async fn table_tail_takes_last_rows() {
        let mut s = session();
        s.select_country("Thailand").await;
        let view = s.view();
        let tail = view.table_tail(1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].year, 2021);
        assert_eq!(view.table_tail(10).len(), 2);
    }
}
