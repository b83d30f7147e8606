//! Client example demonstrating catalog setup, refresh and conversion against
//! a running server.
//!
//! Run with: cargo run -p folio-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use folio_client::FolioClient;
use folio_hex::{ConversionService, inbound::HttpServer};
use folio_repo::build_repo;
use folio_types::{ConvertRequest, DailyRate, RateSource, RefreshError};
use rust_decimal_macros::dec;
use tempfile::tempdir;
use tokio::net::TcpListener;

/// Offline stand-in for the ECB feed with a few days of EUR/USD and EUR/AED.
struct CannedSource;

#[async_trait]
impl RateSource for CannedSource {
    async fn fetch_daily_series(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<Vec<DailyRate>, RefreshError> {
        let day = |d| NaiveDate::from_ymd_opt(1999, 1, d).unwrap_or_default();
        let points = match (base, quote) {
            ("EUR", "USD") => vec![(day(4), dec!(1.1789)), (day(5), dec!(1.1790))],
            ("EUR", "AED") => vec![(day(4), dec!(4.3295))],
            _ => Vec::new(),
        };
        Ok(points
            .into_iter()
            .map(|(date, value)| DailyRate { date, value })
            .collect())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("folio.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    // Build repository (handles connection and migration)
    let repo = build_repo(&db_url).await?;

    // Start server in background
    let service = Arc::new(ConversionService::new(repo, CannedSource));
    let server = HttpServer::new(service);
    let router = server.router();

    let server_addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&server_addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router.into_make_service()).await {
            eprintln!("server error: {e}");
        }
    });

    let client = FolioClient::new(format!("http://127.0.0.1:{port}"));

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: catalog, refresh, conversion
    // ─────────────────────────────────────────────────────────────────────────

    let health = client.health().await?;
    println!("✅ Server health: {} (routing ready: {})", health.status, health.routing_ready);

    for code in ["EUR", "USD", "AED", "GBP"] {
        let currency = client.create_currency(code).await?;
        println!("✅ Created currency {}", currency.code);
    }

    for (base, quote) in [("EUR", "USD"), ("EUR", "AED"), ("USD", "GBP")] {
        let rate = client.create_exchange_rate(base, quote).await?;
        println!("✅ Created exchange rate {}/{} (id={})", base, quote, rate.id);
    }

    let summary = client.refresh().await?;
    println!(
        "✅ Refreshed {} rates, {} new prices ({} without a source)",
        summary.rates_checked, summary.prices_inserted, summary.rates_without_source
    );

    let route = client.route("USD", "AED").await?;
    println!("✅ Route USD -> AED: {}", route.route.join(" -> "));

    let on = NaiveDate::from_ymd_opt(1999, 1, 6);
    let converted = client.convert(dec!(100), "USD", "AED", on).await?;
    println!("✅ 100 USD = {} AED on {}", converted.amount.round_dp(4), converted.date);

    // GBP has no prices, so this one fails on its own
    let batch = client
        .convert_batch(vec![
            ConvertRequest {
                amount: dec!(50),
                source: "EUR".into(),
                target: "USD".into(),
                date: on,
            },
            ConvertRequest {
                amount: dec!(50),
                source: "EUR".into(),
                target: "GBP".into(),
                date: on,
            },
        ])
        .await?;

    println!("\n📋 Batch results:");
    for item in batch.results {
        match (item.result, item.error) {
            (Some(r), _) => println!("   - {} {} -> {} {}", dec!(50), r.source, r.amount, r.target),
            (None, Some(e)) => println!("   - error: {e}"),
            (None, None) => println!("   - empty result"),
        }
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
