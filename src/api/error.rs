//! API Error Types
//!
//! Errors raised while binding or serving HTTP.

use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Binding or serving failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
