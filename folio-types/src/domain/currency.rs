//! Currency domain model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

/// A currency known to the system, identified by its code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Currency {
    /// ISO-like currency code
    #[schema(example = "EUR")]
    pub code: String,
}

impl Currency {
    /// Creates a currency after validating the code.
    ///
    /// Codes are normalised to upper case and must be 3 ASCII letters.
    pub fn new(code: &str) -> Result<Self, DomainError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::ValidationError(format!(
                "Invalid currency code: {:?}",
                code
            )));
        }
        Ok(Self { code })
    }

    /// Rebuilds a currency from storage without validation.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}
