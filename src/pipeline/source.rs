//! Emissions service client: countries, history, predictions, model metrics.
//!
//! ## Why a trait seam?
//!
//! The session and export layers only ever need four operations, so they
//! talk to [`EmissionsSource`] rather than to reqwest. Tests substitute an
//! in-memory stub; the CLI plugs in [`HttpEmissionsSource`]. The seam also
//! keeps wire DTOs private to this module: the rest of the crate sees
//! [`crate::series::ObservationPoint`] and friends, never raw JSON shapes.
//!
//! ## Why no retries?
//!
//! A failed fetch degrades exactly one dashboard slot to "unavailable" and
//! the user re-triggers it by re-selecting. Retrying inside the client
//! would only delay that feedback, so every request is single-attempt with
//! one timeout bound.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ReportConfig;
use crate::error::{FetchError, ReportError};
use crate::series::{ForecastPoint, ObservationPoint};

/// Regression quality metrics reported by the emissions service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    /// Root mean squared error on the held-out split, in MtCO₂.
    pub rmse: f64,
    /// Coefficient of determination on the held-out split.
    pub r2: f64,
    /// Rows the model was trained on.
    #[serde(rename = "rows")]
    pub training_rows: u64,
}

/// Liveness snapshot of the emissions service.
///
/// The service reports loaded artefacts, not a summary verdict; callers
/// derive their own ok/degraded reading from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub model_loaded: bool,
    pub history_rows: u64,
    pub metrics_loaded: bool,
}

/// The four data operations the dashboard core consumes.
///
/// Every method may fail; callers treat failure as "no data for that slot"
/// (see [`crate::session::Slot`]) rather than aborting.
#[async_trait]
pub trait EmissionsSource: Send + Sync {
    /// Country identifiers the service has data for.
    async fn list_countries(&self) -> Result<Vec<String>, FetchError>;

    /// Observed yearly emissions for `country` from `start_year` onwards,
    /// in the order the service returns them.
    async fn fetch_history(
        &self,
        country: &str,
        start_year: i32,
    ) -> Result<Vec<ObservationPoint>, FetchError>;

    /// The model's point forecast for `country` at `year`.
    async fn fetch_prediction(&self, country: &str, year: i32)
        -> Result<ForecastPoint, FetchError>;

    /// Quality metrics of the currently loaded model.
    async fn fetch_model_performance(&self) -> Result<ModelPerformance, FetchError>;
}

// ── Wire DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CountriesResponse {
    countries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    records: Vec<HistoryRecord>,
}

/// One `/history` row. The service also echoes the country name per row;
/// unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    year: i32,
    co2: f64,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    country: &'a str,
    year: i32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    year: i32,
    predicted_co2: f64,
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`EmissionsSource`] backed by the emissions service's REST API.
#[derive(Debug, Clone)]
pub struct HttpEmissionsSource {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpEmissionsSource {
    /// Build a client for the service at `base_url` with a per-request
    /// timeout. A trailing slash on the base URL is stripped.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ReportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReportError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            timeout_secs,
        })
    }

    /// Build a client from the URL and timeout in a [`ReportConfig`].
    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        Self::new(&config.api_base_url, config.request_timeout_secs)
    }

    /// Service liveness probe (`GET /health`). Not part of
    /// [`EmissionsSource`]: the dashboard core never needs it, only the
    /// CLI connectivity check does.
    pub async fn health(&self) -> Result<ServiceHealth, FetchError> {
        let url = self.endpoint(&["health"], &[])?;
        self.get_json(&url).await
    }

    /// Join path segments and query pairs onto the base URL with proper
    /// percent-encoding (country names contain spaces and punctuation).
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String, FetchError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| FetchError::Transport {
            url: self.base_url.clone(),
            reason: format!("invalid base URL: {e}"),
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| FetchError::Transport {
                url: self.base_url.clone(),
                reason: "base URL cannot carry a path".to_string(),
            })?;
            // A bare authority parses with one empty segment; drop it so the
            // first push does not produce "//".
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url.to_string())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(url, self.timeout_secs, e))?;
        decode_response(url, self.timeout_secs, response).await
    }
}

#[async_trait]
impl EmissionsSource for HttpEmissionsSource {
    async fn list_countries(&self) -> Result<Vec<String>, FetchError> {
        let url = self.endpoint(&["countries"], &[])?;
        debug!(%url, "listing countries");
        let body: CountriesResponse = self.get_json(&url).await?;
        Ok(body.countries)
    }

    async fn fetch_history(
        &self,
        country: &str,
        start_year: i32,
    ) -> Result<Vec<ObservationPoint>, FetchError> {
        let url = self.endpoint(
            &["history", country],
            &[("start_year", start_year.to_string())],
        )?;
        debug!(%url, "fetching history");
        let body: HistoryResponse = self.get_json(&url).await?;
        debug!(country, rows = body.records.len(), "history fetched");
        Ok(body
            .records
            .into_iter()
            .map(|r| ObservationPoint {
                year: r.year,
                value: r.co2,
            })
            .collect())
    }

    async fn fetch_prediction(
        &self,
        country: &str,
        year: i32,
    ) -> Result<ForecastPoint, FetchError> {
        let url = self.endpoint(&["predict"], &[])?;
        debug!(%url, country, year, "requesting prediction");
        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { country, year })
            .send()
            .await
            .map_err(|e| classify_transport(&url, self.timeout_secs, e))?;
        let body: PredictResponse = decode_response(&url, self.timeout_secs, response).await?;
        Ok(ForecastPoint {
            year: body.year,
            value: body.predicted_co2,
        })
    }

    async fn fetch_model_performance(&self) -> Result<ModelPerformance, FetchError> {
        let url = self.endpoint(&["model", "performance"], &[])?;
        debug!(%url, "fetching model performance");
        self.get_json(&url).await
    }
}

fn classify_transport(url: &str, timeout_secs: u64, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

async fn decode_response<T: DeserializeOwned>(
    url: &str,
    timeout_secs: u64,
    response: reqwest::Response,
) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FetchError::Decode {
                reason: e.to_string(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_response_decodes() {
        let body = r#"{"countries": ["China", "United States", "India"]}"#;
        let parsed: CountriesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.countries.len(), 3);
        assert_eq!(parsed.countries[1], "United States");
    }

    #[test]
    fn history_response_decodes_and_ignores_extra_fields() {
        let body = r#"{
            "country": "Thailand",
            "unit": "MtCO2",
            "records": [
                {"country": "Thailand", "year": 2000, "co2": 162},
                {"country": "Thailand", "year": 2001, "co2": 171}
            ]
        }"#;
        let parsed: HistoryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].year, 2000);
        assert_eq!(parsed.records[1].co2, 171.0);
    }

    #[test]
    fn predict_response_decodes() {
        let body = r#"{"country": "Thailand", "year": 2030, "predicted_co2": 289, "unit": "MtCO2"}"#;
        let parsed: PredictResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.year, 2030);
        assert_eq!(parsed.predicted_co2, 289.0);
    }

    #[test]
    fn performance_maps_rows_field() {
        let body = r#"{"rmse": 212.4, "r2": 0.93, "rows": 48215}"#;
        let parsed: ModelPerformance = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.training_rows, 48_215);
        assert!((parsed.r2 - 0.93).abs() < 1e-12);
    }

    #[test]
    fn health_response_decodes() {
        let body = r#"{"model_loaded": true, "history_rows": 50598, "metrics_loaded": true}"#;
        let parsed: ServiceHealth = serde_json::from_str(body).unwrap();
        assert!(parsed.model_loaded);
        assert!(parsed.metrics_loaded);
        assert_eq!(parsed.history_rows, 50_598);
    }

    #[test]
    fn predict_request_serialises() {
        let body = serde_json::to_string(&PredictRequest {
            country: "Thailand",
            year: 2030,
        })
        .unwrap();
        assert_eq!(body, r#"{"country":"Thailand","year":2030}"#);
    }

    #[test]
    fn endpoint_percent_encodes_country_names() {
        let source = HttpEmissionsSource::new("http://localhost:8000", 30).unwrap();
        let url = source
            .endpoint(
                &["history", "United States"],
                &[("start_year", "2000".to_string())],
            )
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:8000/history/United%20States?start_year=2000"
        );
    }

    #[test]
    fn endpoint_survives_trailing_slash_and_base_path() {
        let source = HttpEmissionsSource::new("http://localhost:8000/api/", 30).unwrap();
        let url = source.endpoint(&["countries"], &[]).unwrap();
        assert_eq!(url, "http://localhost:8000/api/countries");
    }

    #[test]
    fn history_record_mapping_keeps_order_and_values() {
        let records = vec![
            HistoryRecord {
                year: 2003,
                co2: 10.5,
            },
            HistoryRecord {
                year: 2001,
                co2: 9.0,
            },
        ];
        let points: Vec<ObservationPoint> = records
            .into_iter()
            .map(|r| ObservationPoint {
                year: r.year,
                value: r.co2,
            })
            .collect();
        assert_eq!(points[0].year, 2003);
        assert_eq!(points[1].value, 9.0);
    }
}
