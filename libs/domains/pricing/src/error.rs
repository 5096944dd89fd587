use thiserror::Error;

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors that can occur while quoting a price
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Method, service or payment method is missing or inactive
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested level range is outside the domain or empty
    #[error("Invalid level range {start}-{end}: levels must satisfy 1 <= start < end <= 99")]
    InvalidRange { start: u32, end: u32 },

    /// No candidate family could cover the requested range
    #[error("No pricing available for levels {start}-{end}")]
    NoCoverage { start: u32, end: u32 },

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PricingError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} {id}"))
    }
}
