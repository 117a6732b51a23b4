//! Error types for the core library.

use thiserror::Error;

use crate::config::ConfigError;
use crate::service::SendError;
use crate::session::ConnectionError;

/// Errors returned by the exposed mail operations.
///
/// Every operation either succeeds or fails with exactly one of these.
/// Failures while closing a session are never represented here; they are
/// logged and dropped so they cannot hide the operation's own outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// Connecting, authenticating or talking to the IMAP server failed.
    #[error("IMAP error: {0}")]
    Connection(#[from] ConnectionError),

    /// Submitting a message over SMTP failed.
    #[error("SMTP error: {0}")]
    Send(#[from] SendError),

    /// The server configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
