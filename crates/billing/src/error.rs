//! Error types for billing operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Missing event id for idempotency")]
    MissingIdempotencyKey,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
