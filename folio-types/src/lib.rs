//! # Folio Types
//!
//! Domain types and port traits for the currency conversion service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Currency, ExchangeRate, ExchangeRatePrice)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, conversion, refresh and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Currency, DailyRate, ExchangeRate, ExchangeRateId, ExchangeRatePrice, PRICE_SCALE,
    normalize_price,
};
pub use dto::*;
pub use error::{AppError, ConversionError, DomainError, RefreshError, RepoError};
pub use ports::{CurrencyRepository, RateSource};
