//! Error types for the currency conversion service.

use chrono::NaiveDate;
use currency_graph::RouteError;

/// Domain-level errors (business rule violations).
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors from routing and converting an amount.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("No conversion route from {from} to {to}")]
    NoRouteFound { from: String, to: String },

    #[error("No price available for {base}/{quote} on or before {date}")]
    NoPriceAvailable {
        base: String,
        quote: String,
        date: NaiveDate,
    },

    #[error("Cannot apply {base}/{quote} price: arithmetic overflow or zero price")]
    Arithmetic { base: String, quote: String },

    #[error("Currency routing table is not ready yet")]
    NotReady,

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<RouteError> for ConversionError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnknownCurrency(code) => ConversionError::UnknownCurrency(code),
            RouteError::NoRouteFound { from, to } => ConversionError::NoRouteFound { from, to },
        }
    }
}

/// Errors from a rate refresh run.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Rate source fetch failed: {0}")]
    Fetch(String),

    #[error("Rate source returned unparseable data: {0}")]
    Parse(String),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::UnknownCurrency(_) => AppError::BadRequest(err.to_string()),
            ConversionError::NoRouteFound { .. } | ConversionError::NoPriceAvailable { .. } => {
                AppError::NotFound(err.to_string())
            }
            ConversionError::Arithmetic { .. } => AppError::BadRequest(err.to_string()),
            ConversionError::NotReady => AppError::ServiceUnavailable(err.to_string()),
            ConversionError::Repo(e) => e.into(),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Fetch(_) | RefreshError::Parse(_) => AppError::BadGateway(err.to_string()),
            RefreshError::Repo(e) => e.into(),
        }
    }
}
