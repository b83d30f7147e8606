//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

use folio_types::{
    Currency, CurrencyRepository, DomainError, ExchangeRate, ExchangeRateId, ExchangeRatePrice,
    RepoError, normalize_price,
};

use crate::types::{DbCurrency, DbExchangeRate, DbLatestDate, DbPriceText, map_db_error};

/// Rows per INSERT statement; three binds each keeps us under SQLite's
/// default host parameter limit.
const INSERT_CHUNK: usize = 300;

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_currency_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn currency_exists(&self, code: &str) -> Result<bool, RepoError> {
        let row: Option<DbCurrency> = sqlx::query_as(r#"SELECT code FROM currencies WHERE code = ?"#)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(row.is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CurrencyRepository for SqliteRepo {
    async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError> {
        let rows: Vec<DbCurrency> =
            sqlx::query_as(r#"SELECT code FROM currencies ORDER BY code"#)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(DbCurrency::into_domain).collect())
    }

    async fn create_currency(&self, code: &str) -> Result<Currency, RepoError> {
        let currency = Currency::new(code)?;

        sqlx::query(r#"INSERT INTO currencies (code) VALUES (?)"#)
            .bind(&currency.code)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, &format!("Currency {}", currency.code)))?;

        Ok(currency)
    }

    async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, RepoError> {
        let rows: Vec<DbExchangeRate> = sqlx::query_as(
            r#"SELECT id, base_currency_code, quote_currency_code FROM exchange_rates ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(DbExchangeRate::into_domain).collect())
    }

    async fn get_exchange_rate(
        &self,
        id: ExchangeRateId,
    ) -> Result<Option<ExchangeRate>, RepoError> {
        let row: Option<DbExchangeRate> = sqlx::query_as(
            r#"SELECT id, base_currency_code, quote_currency_code FROM exchange_rates WHERE id = ?"#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(row.map(DbExchangeRate::into_domain))
    }

    async fn create_exchange_rate(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ExchangeRate, RepoError> {
        let base = Currency::new(base)?;
        let quote = Currency::new(quote)?;
        if base == quote {
            return Err(DomainError::ValidationError(format!(
                "Exchange rate needs two distinct currencies, got {} twice",
                base
            ))
            .into());
        }
        for currency in [&base, &quote] {
            if !self.currency_exists(&currency.code).await? {
                return Err(DomainError::ValidationError(format!(
                    "Unknown currency: {}",
                    currency
                ))
                .into());
            }
        }

        let result = sqlx::query(
            r#"INSERT INTO exchange_rates (base_currency_code, quote_currency_code) VALUES (?, ?)"#,
        )
        .bind(&base.code)
        .bind(&quote.code)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Exchange rate {}/{}", base, quote)))?;

        Ok(ExchangeRate {
            id: ExchangeRateId::new(result.last_insert_rowid()),
            base_currency_code: base.code,
            quote_currency_code: quote.code,
        })
    }

    async fn latest_price_date(&self, id: ExchangeRateId) -> Result<Option<NaiveDate>, RepoError> {
        let row: DbLatestDate = sqlx::query_as(
            r#"SELECT MAX(date) AS latest FROM exchange_rate_prices WHERE exchange_rate_id = ?"#,
        )
        .bind(id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.latest
            .map(|s| {
                s.parse::<NaiveDate>()
                    .map_err(|e| RepoError::Database(format!("Bad price date {:?}: {}", s, e)))
            })
            .transpose()
    }

    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError> {
        let row: Option<DbPriceText> = sqlx::query_as(
            r#"SELECT exchange_rate_id, date, value FROM exchange_rate_prices
               WHERE exchange_rate_id = ? AND date <= ?
               ORDER BY date DESC LIMIT 1"#,
        )
        .bind(id.value())
        .bind(on.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPriceText::into_domain).transpose()
    }

    async fn list_prices(
        &self,
        id: ExchangeRateId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRatePrice>, RepoError> {
        let from = from.map(|d| d.to_string());
        let to = to.map(|d| d.to_string());

        let rows: Vec<DbPriceText> = sqlx::query_as(
            r#"SELECT exchange_rate_id, date, value FROM exchange_rate_prices
               WHERE exchange_rate_id = ?
                 AND (? IS NULL OR date >= ?)
                 AND (? IS NULL OR date <= ?)
               ORDER BY date ASC"#,
        )
        .bind(id.value())
        .bind(&from)
        .bind(&from)
        .bind(&to)
        .bind(&to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbPriceText::into_domain).collect()
    }

    async fn insert_prices(&self, prices: &[ExchangeRatePrice]) -> Result<u64, RepoError> {
        if prices.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut inserted = 0;
        for chunk in prices.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO exchange_rate_prices (exchange_rate_id, date, value) ",
            );
            builder.push_values(chunk, |mut row, price| {
                row.push_bind(price.exchange_rate_id.value())
                    .push_bind(price.date.to_string())
                    .push_bind(normalize_price(price.value).to_string());
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_error(e, "Price"))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(inserted)
    }
}
