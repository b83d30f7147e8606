//! ECB Data Portal rate source.
//!
//! Fetches the daily reference rate series `D.{quote}.{base}.SP00.A` of the
//! `EXR` dataflow as CSV and turns it into [`DailyRate`] points.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use folio_types::{DailyRate, RateSource, RefreshError, normalize_price};

/// Default base URL of the ECB Data Portal API.
pub const DEFAULT_ECB_BASE_URL: &str = "https://data-api.ecb.europa.eu";

/// HTTP client for the ECB exchange rate series.
pub struct EcbRateSource {
    client: reqwest::Client,
    base_url: String,
}

/// The two CSV columns we care about; the feed carries many more.
#[derive(Debug, Deserialize)]
struct EcbRow {
    #[serde(rename = "TIME_PERIOD")]
    time_period: String,
    #[serde(rename = "OBS_VALUE")]
    obs_value: String,
}

impl EcbRateSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL of the daily series quoting `quote` per one unit of `base`.
    pub fn series_url(&self, base: &str, quote: &str) -> String {
        format!(
            "{}/service/data/EXR/D.{}.{}.SP00.A?format=csvdata",
            self.base_url, quote, base
        )
    }
}

/// Parses an ECB `csvdata` body. Rows without an observation (bank
/// holidays) are skipped.
pub fn parse_csv(body: &str) -> Result<Vec<DailyRate>, RefreshError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut rates = Vec::new();

    for row in reader.deserialize::<EcbRow>() {
        let row = row.map_err(|e| RefreshError::Parse(e.to_string()))?;
        let value = row.obs_value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("nan") {
            continue;
        }

        let date = NaiveDate::parse_from_str(row.time_period.trim(), "%Y-%m-%d").map_err(|e| {
            RefreshError::Parse(format!("Bad TIME_PERIOD {:?}: {}", row.time_period, e))
        })?;
        let value = value
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(value))
            .map_err(|e| RefreshError::Parse(format!("Bad OBS_VALUE {:?}: {}", value, e)))?;

        rates.push(DailyRate {
            date,
            value: normalize_price(value),
        });
    }

    Ok(rates)
}

#[async_trait]
impl RateSource for EcbRateSource {
    #[instrument(skip(self))]
    async fn fetch_daily_series(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<Vec<DailyRate>, RefreshError> {
        let url = self.series_url(base, quote);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/csv")
            .send()
            .await
            .map_err(|e| RefreshError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Fetch(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::Fetch(e.to_string()))?;

        let rates = parse_csv(&body)?;
        debug!(points = rates.len(), "Fetched ECB series");
        Ok(rates)
    }
}
