//! Folio CLI
//!
//! Command-line interface for the currency API.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use folio_client::FolioClient;
use folio_types::{ConvertRequest, ExchangeRateId};

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Currency API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the currency API
    #[arg(long, env = "FOLIO_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Currency operations
    Currency {
        #[command(subcommand)]
        action: CurrencyCommands,
    },
    /// Exchange rate operations
    Rate {
        #[command(subcommand)]
        action: RateCommands,
    },
    /// Show the conversion route between two currencies
    Route {
        from: String,
        to: String,
    },
    /// Convert an amount
    Convert {
        amount: Decimal,
        source: String,
        target: String,
        /// Price date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Convert every amount in a JSON file holding a list of conversions
    Batch {
        /// Path to the JSON file
        file: std::path::PathBuf,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum CurrencyCommands {
    /// Register a currency
    Create {
        /// ISO 4217 code
        code: String,
    },
    /// List all currencies
    List,
}

#[derive(Subcommand)]
enum RateCommands {
    /// Register a directed exchange rate
    Create {
        #[arg(long)]
        base: String,
        #[arg(long)]
        quote: String,
    },
    /// List all exchange rates
    List,
    /// Price history of one exchange rate
    Prices {
        /// Exchange rate ID
        id: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Fetch new prices from the rate source now
    Refresh,
}

fn parse_rate_id(s: &str) -> Result<ExchangeRateId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid exchange rate ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = FolioClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            if health.routing_ready {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is up but the routing table is not ready");
                std::process::exit(1);
            }
        }

        Commands::Currency { action } => match action {
            CurrencyCommands::Create { code } => {
                let currency = client.create_currency(&code).await?;
                println!("{}", serde_json::to_string_pretty(&currency)?);
            }
            CurrencyCommands::List => {
                let currencies = client.list_currencies().await?;
                println!("{}", serde_json::to_string_pretty(&currencies)?);
            }
        },

        Commands::Rate { action } => match action {
            RateCommands::Create { base, quote } => {
                let rate = client.create_exchange_rate(&base, &quote).await?;
                println!("{}", serde_json::to_string_pretty(&rate)?);
            }
            RateCommands::List => {
                let rates = client.list_exchange_rates().await?;
                println!("{}", serde_json::to_string_pretty(&rates)?);
            }
            RateCommands::Prices { id, from, to } => {
                let rate_id = parse_rate_id(&id)?;
                let prices = client.list_prices(rate_id, from, to).await?;
                println!("{}", serde_json::to_string_pretty(&prices)?);
            }
            RateCommands::Refresh => {
                let summary = client.refresh().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        },

        Commands::Route { from, to } => {
            let route = client.route(&from, &to).await?;
            println!("{}", route.route.join(" -> "));
        }

        Commands::Convert {
            amount,
            source,
            target,
            date,
        } => {
            let converted = client.convert(amount, &source, &target, date).await?;
            println!("{}", serde_json::to_string_pretty(&converted)?);
        }

        Commands::Batch { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let conversions: Vec<ConvertRequest> = serde_json::from_str(&raw)?;
            let results = client.convert_batch(conversions).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}
