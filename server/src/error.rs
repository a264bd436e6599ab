//! Error types for the game server

use mio::Token;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias using [`ServerError`]
pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures that abort startup or the run loop.
///
/// Per-connection failures never surface here; they end in teardown of the
/// affected connection.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening endpoint could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The readiness primitive could not be created
    #[error("failed to create readiness multiplexer: {0}")]
    Multiplexer(#[source] io::Error),

    /// A handle could not be added to (or updated in) the watch set
    #[error("failed to register {token:?} for readiness: {source}")]
    Registration {
        token: Token,
        #[source]
        source: io::Error,
    },

    /// Waiting for readiness failed for a reason other than interruption
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),
}
