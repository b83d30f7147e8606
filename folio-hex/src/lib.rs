//! # Folio Hex
//!
//! Application service layer and HTTP adapter for the currency service.
//!
//! ## Architecture
//!
//! - `service/` - Application service (routing snapshot, conversion, refresh)
//! - `price_loader/` - Request-scoped batched price lookups
//! - `refresh/` - Background refresh job
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: CurrencyRepository` and `S: RateSource`,
//! allowing different adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod price_loader;
pub mod refresh;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use price_loader::{PriceLoader, PriceLookup};
pub use refresh::{CycleOutcome, RefreshJob, RefreshSchedule};
pub use service::{ConversionService, ConversionSnapshot, DEFAULT_REFERENCE_CURRENCY};
