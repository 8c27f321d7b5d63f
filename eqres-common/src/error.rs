//! Common error types for EQRES

use thiserror::Error;

use crate::booking::BookingError;

/// Common result type for EQRES operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across EQRES crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Booking rule violated
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
