pub mod access;
pub mod booking;
pub mod identity;
pub mod models;
pub mod payment;
pub mod repository;
pub mod search;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Wraps a backend failure (database, cache, broker) as an internal error.
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        CoreError::InternalError(err.to_string())
    }
}
