//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use folio_types::{
    Currency, CurrencyRepository, DomainError, ExchangeRate, ExchangeRateId, ExchangeRatePrice,
    RepoError, normalize_price,
};

use crate::types::{DbCurrency, DbExchangeRate, DbPrice, map_db_error};

const INSERT_CHUNK: usize = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_currency_tables_pg.sql"),
        "0001",
    )
    .await
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

/// One row of the batched at-or-before lookup; price columns are NULL when
/// the lookup had no match.
#[derive(FromRow)]
struct DbPriceLookup {
    ord: i64,
    exchange_rate_id: Option<i64>,
    date: Option<NaiveDate>,
    value: Option<Decimal>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CurrencyRepository for PostgresRepo {
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

        sqlx::query(r#"INSERT INTO currencies (code) VALUES ($1)"#)
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
            r#"SELECT id, base_currency_code, quote_currency_code FROM exchange_rates WHERE id = $1"#,
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

        let known: Vec<DbCurrency> =
            sqlx::query_as(r#"SELECT code FROM currencies WHERE code = ANY($1)"#)
                .bind(vec![base.code.clone(), quote.code.clone()])
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        for currency in [&base, &quote] {
            if !known.iter().any(|row| row.code == currency.code) {
                return Err(DomainError::ValidationError(format!(
                    "Unknown currency: {}",
                    currency
                ))
                .into());
            }
        }

        let row: DbExchangeRate = sqlx::query_as(
            r#"INSERT INTO exchange_rates (base_currency_code, quote_currency_code)
               VALUES ($1, $2)
               RETURNING id, base_currency_code, quote_currency_code"#,
        )
        .bind(&base.code)
        .bind(&quote.code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Exchange rate {}/{}", base, quote)))?;

        Ok(row.into_domain())
    }

    async fn latest_price_date(&self, id: ExchangeRateId) -> Result<Option<NaiveDate>, RepoError> {
        sqlx::query_scalar(
            r#"SELECT MAX(date) FROM exchange_rate_prices WHERE exchange_rate_id = $1"#,
        )
        .bind(id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))
    }

    async fn price_at_or_before(
        &self,
        id: ExchangeRateId,
        on: NaiveDate,
    ) -> Result<Option<ExchangeRatePrice>, RepoError> {
        let row: Option<DbPrice> = sqlx::query_as(
            r#"SELECT exchange_rate_id, date, value FROM exchange_rate_prices
               WHERE exchange_rate_id = $1 AND date <= $2
               ORDER BY date DESC LIMIT 1"#,
        )
        .bind(id.value())
        .bind(on)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(row.map(DbPrice::into_domain))
    }

    async fn prices_at_or_before(
        &self,
        lookups: &[(ExchangeRateId, NaiveDate)],
    ) -> Result<Vec<Option<ExchangeRatePrice>>, RepoError> {
        if lookups.is_empty() {
            return Ok(Vec::new());
        }

        let (ids, dates): (Vec<i64>, Vec<NaiveDate>) =
            lookups.iter().map(|(id, on)| (id.value(), *on)).unzip();

        let rows: Vec<DbPriceLookup> = sqlx::query_as(
            r#"SELECT l.ord, p.exchange_rate_id, p.date, p.value
               FROM UNNEST($1::BIGINT[], $2::DATE[]) WITH ORDINALITY AS l(rate_id, on_date, ord)
               LEFT JOIN LATERAL (
                   SELECT exchange_rate_id, date, value FROM exchange_rate_prices
                   WHERE exchange_rate_id = l.rate_id AND date <= l.on_date
                   ORDER BY date DESC LIMIT 1
               ) p ON TRUE
               ORDER BY l.ord"#,
        )
        .bind(ids)
        .bind(dates)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut out = vec![None; lookups.len()];
        for row in rows {
            let slot = usize::try_from(row.ord - 1)
                .ok()
                .and_then(|i| out.get_mut(i))
                .ok_or_else(|| RepoError::Database(format!("Unexpected ordinal {}", row.ord)))?;
            if let (Some(id), Some(date), Some(value)) = (row.exchange_rate_id, row.date, row.value)
            {
                *slot = Some(
                    DbPrice {
                        exchange_rate_id: id,
                        date,
                        value,
                    }
                    .into_domain(),
                );
            }
        }
        Ok(out)
    }

    async fn list_prices(
        &self,
        id: ExchangeRateId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ExchangeRatePrice>, RepoError> {
        let rows: Vec<DbPrice> = sqlx::query_as(
            r#"SELECT exchange_rate_id, date, value FROM exchange_rate_prices
               WHERE exchange_rate_id = $1
                 AND ($2::DATE IS NULL OR date >= $2)
                 AND ($3::DATE IS NULL OR date <= $3)
               ORDER BY date ASC"#,
        )
        .bind(id.value())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(DbPrice::into_domain).collect())
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
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO exchange_rate_prices (exchange_rate_id, date, value) ");
            builder.push_values(chunk, |mut row, price| {
                row.push_bind(price.exchange_rate_id.value())
                    .push_bind(price.date)
                    .push_bind(normalize_price(price.value));
            });
            builder.push(" ON CONFLICT (exchange_rate_id, date) DO NOTHING");

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
