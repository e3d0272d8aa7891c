//! Hub error types

use thiserror::Error;

/// Errors returned by the connection registry
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Hub is shutting down")]
    ShuttingDown,
}

/// Reasons an outbound frame was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection has been closed; the frame was dropped
    #[error("Connection closed")]
    Closed,

    /// The outbound queue is full; the frame was dropped
    #[error("Outbound queue full")]
    QueueFull,
}
