//! # Folio Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and the ECB rate source
//! - Create the conversion service and build the first routing table
//! - Start the rate refresh job and the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{
    metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace as sdktrace,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_hex::{ConversionService, RefreshJob, inbound::HttpServer};
use folio_repo::{EcbRateSource, build_repo};

struct Telemetry {
    tracer: sdktrace::Tracer,
    tracer_provider: sdktrace::SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

fn init_telemetry() -> anyhow::Result<Telemetry> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporters with batch processing (non-blocking)
    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let tracer_provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    // HTTP metrics layer reads the global MeterProvider
    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;

    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();

    global::set_meter_provider(meter_provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok(Telemetry {
        tracer: tracer_provider.tracer("folio-service"),
        tracer_provider,
        meter_provider,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing and metrics
    let otel = init_telemetry()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel.tracer.clone());

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,folio_app=debug,folio_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting currency server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);
    tracing::info!(
        reference_currency = %config.reference_currency,
        ecb_base_url = %config.ecb_base_url,
        "Rate source configured"
    );

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;
    let source = EcbRateSource::new(&config.ecb_base_url, config.fetch_timeout)?;

    let service = Arc::new(
        ConversionService::new(repo, source).with_reference_currency(&config.reference_currency),
    );

    // First routing table; conversions answer NotReady until it is published
    if config.require_initial_table {
        service.rebuild_routing_table().await?;
    } else {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = service.rebuild_routing_table().await {
                tracing::error!(error = %e, "Initial routing table build failed");
            }
        });
    }

    // Background refresh
    let shutdown = CancellationToken::new();
    let refresh = RefreshJob::new(Arc::clone(&service), config.refresh).spawn(shutdown.clone());

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(service, config.rate_limits);
    let addr = format!("0.0.0.0:{}", config.port);

    let served = server.run(&addr).await;

    shutdown.cancel();
    if let Err(e) = refresh.await {
        tracing::warn!(error = %e, "Refresh job ended abnormally");
    }

    // Ensure traces and metrics are flushed before exit
    let _ = otel.tracer_provider.shutdown();
    let _ = otel.meter_provider.shutdown();
    served
}
