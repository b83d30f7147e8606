//! Shared database types with feature-gated rows for SQLite and PostgreSQL.
//!
//! SQLite stores dates and decimals as TEXT; PostgreSQL uses DATE and
//! NUMERIC(20,8). Both adapters can be compiled side by side.

use sqlx::FromRow;

use folio_types::{Currency, ExchangeRate, ExchangeRateId, ExchangeRatePrice, RepoError};

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Currency row from database.
#[derive(FromRow)]
pub struct DbCurrency {
    pub code: String,
}

impl DbCurrency {
    pub fn into_domain(self) -> Currency {
        Currency::from_code(self.code)
    }
}

/// Exchange rate row from database.
#[derive(FromRow)]
pub struct DbExchangeRate {
    pub id: i64,
    pub base_currency_code: String,
    pub quote_currency_code: String,
}

impl DbExchangeRate {
    pub fn into_domain(self) -> ExchangeRate {
        ExchangeRate {
            id: ExchangeRateId::new(self.id),
            base_currency_code: self.base_currency_code,
            quote_currency_code: self.quote_currency_code,
        }
    }
}

/// Price row from PostgreSQL.
#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct DbPrice {
    pub exchange_rate_id: i64,
    pub date: chrono::NaiveDate,
    pub value: rust_decimal::Decimal,
}

#[cfg(feature = "postgres")]
impl DbPrice {
    pub fn into_domain(self) -> ExchangeRatePrice {
        ExchangeRatePrice {
            exchange_rate_id: ExchangeRateId::new(self.exchange_rate_id),
            date: self.date,
            value: folio_types::normalize_price(self.value),
        }
    }
}

/// Price row from SQLite, date and value kept as TEXT.
#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct DbPriceText {
    pub exchange_rate_id: i64,
    pub date: String,
    pub value: String,
}

#[cfg(feature = "sqlite")]
impl DbPriceText {
    /// Convert database row to domain price.
    pub fn into_domain(self) -> Result<ExchangeRatePrice, RepoError> {
        let date = self
            .date
            .parse::<chrono::NaiveDate>()
            .map_err(|e| RepoError::Database(format!("Bad price date {:?}: {}", self.date, e)))?;
        let value = self
            .value
            .parse::<rust_decimal::Decimal>()
            .map_err(|e| RepoError::Database(format!("Bad price value {:?}: {}", self.value, e)))?;

        Ok(ExchangeRatePrice {
            exchange_rate_id: ExchangeRateId::new(self.exchange_rate_id),
            date,
            value,
        })
    }
}

/// Date-only row for `MAX(date)` queries.
#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct DbLatestDate {
    pub latest: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a sqlx error, turning constraint violations into domain-level errors.
pub fn map_db_error(err: sqlx::Error, what: &str) -> RepoError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            RepoError::Conflict(format!("{} already exists", what))
        }
        Some(db) if db.is_foreign_key_violation() => RepoError::NotFound,
        _ => RepoError::Database(err.to_string()),
    }
}
