//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use folio_hex::inbound::RateLimitConfig;
use folio_hex::{DEFAULT_REFERENCE_CURRENCY, RefreshSchedule};
use folio_repo::DEFAULT_ECB_BASE_URL;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Base currency the rate source publishes series for
    pub reference_currency: String,
    pub ecb_base_url: String,
    pub fetch_timeout: Duration,
    pub refresh: RefreshSchedule,
    /// Fail startup when the first routing table cannot be built
    pub require_initial_table: bool,
    /// Per-client requests per minute by route class
    pub rate_limits: RateLimitConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = parse_or(&lookup, "PORT", 3000)?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let reference_currency = lookup("FX_REFERENCE_CURRENCY")
            .unwrap_or_else(|| DEFAULT_REFERENCE_CURRENCY.to_string())
            .trim()
            .to_ascii_uppercase();

        let ecb_base_url =
            lookup("FX_ECB_BASE_URL").unwrap_or_else(|| DEFAULT_ECB_BASE_URL.to_string());

        let fetch_timeout = Duration::from_secs(parse_or(&lookup, "FX_FETCH_TIMEOUT_SECS", 30)?);

        let defaults = RefreshSchedule::default();
        let refresh = RefreshSchedule {
            initial_delay: Duration::from_secs(parse_or(
                &lookup,
                "FX_REFRESH_INITIAL_DELAY_SECS",
                defaults.initial_delay.as_secs(),
            )?),
            interval: Duration::from_secs(parse_or(
                &lookup,
                "FX_REFRESH_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
        };
        if refresh.interval.is_zero() {
            anyhow::bail!("FX_REFRESH_INTERVAL_SECS must be greater than zero");
        }

        let require_initial_table = parse_or(&lookup, "FX_REQUIRE_INITIAL_TABLE", false)?;

        let limits = RateLimitConfig::default();
        let rate_limits = RateLimitConfig {
            general_per_minute: parse_or(
                &lookup,
                "RATE_LIMIT_PER_MINUTE",
                limits.general_per_minute,
            )?,
            convert_per_minute: parse_or(
                &lookup,
                "RATE_LIMIT_CONVERT_PER_MINUTE",
                limits.convert_per_minute,
            )?,
            refresh_per_minute: parse_or(
                &lookup,
                "RATE_LIMIT_REFRESH_PER_MINUTE",
                limits.refresh_per_minute,
            )?,
        };

        Ok(Self {
            port,
            database_url,
            reference_currency,
            ecb_base_url,
            fetch_timeout,
            refresh,
            require_initial_table,
            rate_limits,
        })
    }
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
