//! External exchange rate source port.
//!
//! Implementations fetch a daily time series for a currency pair from an
//! outside provider (HTTP feed, fixture file, mock).

use crate::domain::DailyRate;
use crate::error::RefreshError;

/// Port trait for external daily rate feeds.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync + 'static {
    /// Fetches the full available daily history of `base -> quote`.
    ///
    /// Network failures map to [`RefreshError::Fetch`], malformed payloads to
    /// [`RefreshError::Parse`].
    async fn fetch_daily_series(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<Vec<DailyRate>, RefreshError>;
}
