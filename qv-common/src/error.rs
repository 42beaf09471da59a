//! Common error types for QV

use thiserror::Error;

use crate::approval::TransitionError;

/// Common result type for QV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the QV crates
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

    /// Approval or verification step not allowed from the current status
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Request clashes with current state (timing gate closed, duplicate row)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks the role or ownership required for the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
