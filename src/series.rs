//! Series reconciliation: merging observed history with a point forecast.
//!
//! The dashboard plots two independently-fetched series on one timeline:
//! the observed yearly emissions of the selected country, and at most one
//! model-predicted value for a target year. The two arrive from different
//! endpoints, at different times, in different shapes. [`reconcile`] merges
//! them into one ordered sequence of [`DisplayRecord`]s that a chart (or the
//! JSON snapshot) can consume directly.
//!
//! ## Why a pass-through merge?
//!
//! The history endpoint already returns rows ordered by year, and the chart
//! draws points in the order given. Re-sorting or deduplicating here would
//! silently mask upstream ordering bugs and make the merge harder to reason
//! about. So `reconcile` is a stable pass-through: history rows keep their
//! received order, and the forecast (when present) becomes exactly one
//! trailing record. A field that was absent in its source stays `None`,
//! never a fabricated zero, which would plot as a real data point.

use serde::{Deserialize, Serialize};

/// One observed yearly emissions value, in MtCO₂.
///
/// Produced by the data source and immutable once received. Ordering is the
/// source's responsibility; this crate preserves whatever order it is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub year: i32,
    /// Observed emissions in MtCO₂.
    pub value: f64,
}

/// The model's point forecast, in MtCO₂.
///
/// At most one live instance per dashboard session: overwritten when a new
/// prediction resolves, cleared whenever the selected country changes.
/// `year` records what the model was asked for; the record a forecast ends
/// up filed under is the caller's *current* target year (see [`reconcile`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    /// Predicted emissions in MtCO₂.
    pub value: f64,
}

/// One reconciled chart row: a year with an optional observed and an
/// optional predicted value.
///
/// Exactly one of the two fields is populated per record: observed history
/// never carries `predicted`, and the forecast record never carries
/// `actual`. A record with both fields `None` is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub year: i32,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
}

impl DisplayRecord {
    /// Whichever value this record carries.
    pub fn value(&self) -> Option<f64> {
        self.actual.or(self.predicted)
    }

    /// True for the trailing forecast record.
    pub fn is_forecast(&self) -> bool {
        self.predicted.is_some()
    }
}

/// Merge an observed history and an optional forecast into one chart-ready
/// sequence.
///
/// History rows are passed through in the order received, each as
/// `{ year, actual: Some(value), predicted: None }`. If a forecast is
/// present, exactly one trailing `{ forecast_year, actual: None,
/// predicted: Some(value) }` record is appended, unconditionally, even
/// when `forecast_year` equals an observed year. In that collision the
/// output deliberately carries two records for the year (the chart then
/// shows the observed point and the forecast marker side by side rather
/// than pretending the model reproduced the measurement).
///
/// `forecast_year` is the caller's current target-year selection, which may
/// differ from `forecast.year` if the user edited the year after the
/// prediction resolved; the same predicted value is then re-filed under the
/// new year.
///
/// Pure and deterministic: identical inputs yield identical output and the
/// function never fails; missing inputs simply produce fewer records.
pub fn reconcile(
    history: &[ObservationPoint],
    forecast: Option<&ForecastPoint>,
    forecast_year: i32,
) -> Vec<DisplayRecord> {
    let mut records = Vec::with_capacity(history.len() + usize::from(forecast.is_some()));
    for obs in history {
        records.push(DisplayRecord {
            year: obs.year,
            actual: Some(obs.value),
            predicted: None,
        });
    }
    if let Some(f) = forecast {
        records.push(DisplayRecord {
            year: forecast_year,
            actual: None,
            predicted: Some(f.value),
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(year: i32, value: f64) -> ObservationPoint {
        ObservationPoint { year, value }
    }

    #[test]
    fn history_passes_through_in_received_order() {
        // Deliberately unsorted: the merge must not re-order.
        let history = [obs(2021, 12.0), obs(2019, 9.0), obs(2020, 10.0)];
        let out = reconcile(&history, None, 2025);
        assert_eq!(out.len(), 3);
        let years: Vec<i32> = out.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2021, 2019, 2020]);
        assert!(out.iter().all(|r| r.predicted.is_none()));
    }

    #[test]
    fn forecast_appends_single_trailing_record() {
        let history = [obs(2020, 10.0), obs(2021, 12.0)];
        let forecast = ForecastPoint {
            year: 2025,
            value: 15.0,
        };
        let out = reconcile(&history, Some(&forecast), 2025);
        assert_eq!(
            out,
            vec![
                DisplayRecord {
                    year: 2020,
                    actual: Some(10.0),
                    predicted: None
                },
                DisplayRecord {
                    year: 2021,
                    actual: Some(12.0),
                    predicted: None
                },
                DisplayRecord {
                    year: 2025,
                    actual: None,
                    predicted: Some(15.0)
                },
            ]
        );
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        let out = reconcile(&[], None, 2025);
        assert!(out.is_empty());
    }

    #[test]
    fn forecast_only_yields_single_record() {
        let forecast = ForecastPoint {
            year: 2030,
            value: 42.5,
        };
        let out = reconcile(&[], Some(&forecast), 2030);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].year, 2030);
        assert_eq!(out[0].actual, None);
        assert_eq!(out[0].predicted, Some(42.5));
    }

    #[test]
    fn forecast_year_colliding_with_history_keeps_two_records() {
        // A forecast for a year that already has an observation stays a
        // separate trailing record; the rows are not merged.
        let history = [obs(2020, 10.0), obs(2021, 12.0)];
        let forecast = ForecastPoint {
            year: 2021,
            value: 11.5,
        };
        let out = reconcile(&history, Some(&forecast), 2021);
        assert_eq!(out.len(), 3);
        let at_2021: Vec<&DisplayRecord> = out.iter().filter(|r| r.year == 2021).collect();
        assert_eq!(at_2021.len(), 2);
        assert_eq!(at_2021[0].actual, Some(12.0));
        assert_eq!(at_2021[0].predicted, None);
        assert_eq!(at_2021[1].actual, None);
        assert_eq!(at_2021[1].predicted, Some(11.5));
        // The forecast record is last, regardless of year ordering.
        assert!(out[2].is_forecast());
    }

    #[test]
    fn forecast_filed_under_caller_year_not_request_year() {
        // The user predicted for 2030, then edited the target year to 2026:
        // the same value is re-filed under 2026.
        let forecast = ForecastPoint {
            year: 2030,
            value: 20.0,
        };
        let out = reconcile(&[obs(2020, 10.0)], Some(&forecast), 2026);
        assert_eq!(out[1].year, 2026);
        assert_eq!(out[1].predicted, Some(20.0));
    }

    #[test]
    fn output_length_tracks_inputs() {
        let history: Vec<ObservationPoint> = (2000..2024).map(|y| obs(y, y as f64)).collect();
        let forecast = ForecastPoint {
            year: 2025,
            value: 1.0,
        };
        assert_eq!(reconcile(&history, None, 2025).len(), history.len());
        assert_eq!(
            reconcile(&history, Some(&forecast), 2025).len(),
            history.len() + 1
        );
    }

    #[test]
    fn no_record_has_both_fields_none() {
        let history = [obs(2020, 0.0), obs(2021, -3.2)];
        let forecast = ForecastPoint {
            year: 2025,
            value: 0.0,
        };
        for r in reconcile(&history, Some(&forecast), 2025) {
            assert!(r.actual.is_some() || r.predicted.is_some());
        }
    }

    #[test]
    fn reconcile_is_deterministic() {
        let history = [obs(2018, 8.0), obs(2019, 9.0)];
        let forecast = ForecastPoint {
            year: 2024,
            value: 13.0,
        };
        let a = reconcile(&history, Some(&forecast), 2024);
        let b = reconcile(&history, Some(&forecast), 2024);
        assert_eq!(a, b);
    }
}
