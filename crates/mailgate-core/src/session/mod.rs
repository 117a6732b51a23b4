//! Short-lived authenticated mail sessions.
//!
//! [`MailSession`] is the small set of protocol actions the service layer
//! needs from an IMAP server. [`Connector`] opens one. The production
//! implementation lives in [`imap`]; tests substitute an in-memory fake.
//!
//! A session is single-use: it is opened with [`open_session`], used for
//! exactly one logical operation and then handed to [`close_session`].

pub mod imap;
pub mod stream;

use std::fmt;

use crate::config::{ServerConfig, ServerEndpoint};

pub use imap::{ImapConnector, ImapSession};

/// Server-assigned unique identifier of a message within a mailbox.
pub type Uid = u32;

/// Errors raised while opening or using an IMAP session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// TCP connection failed.
    #[error("Connection to {host}:{port} failed: {source}")]
    Connect {
        /// Server hostname.
        host: String,
        /// Server port.
        port: u16,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Connecting took longer than the connect timeout.
    #[error("Connection to {0} timed out")]
    Timeout(String),

    /// TLS configuration or handshake failed.
    #[error("TLS failed: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authenticate(String),

    /// A protocol action after login failed.
    #[error("{command} failed: {reason}")]
    Command {
        /// The IMAP command that failed.
        command: &'static str,
        /// Server or transport message.
        reason: String,
    },

    /// The server answered with data that lacks a required field.
    #[error("Malformed server response: {0}")]
    Malformed(String),
}

impl ConnectionError {
    pub(crate) fn command(command: &'static str) -> impl Fn(async_imap::error::Error) -> Self {
        move |err| Self::Command {
            command,
            reason: err.to_string(),
        }
    }
}

/// A failure while tearing a session down.
///
/// Never propagated to callers; only logged.
#[derive(Debug, thiserror::Error)]
#[error("Closing session failed: {0}")]
pub struct CloseError(pub String);

/// One entry of a mailbox LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxListing {
    /// Full hierarchical mailbox name, e.g. `INBOX/Archive`.
    pub path: String,
    /// Hierarchy delimiter reported by the server, if any.
    pub delimiter: Option<String>,
}

impl MailboxListing {
    /// Creates a listing entry.
    #[must_use]
    pub fn new(path: impl Into<String>, delimiter: Option<&str>) -> Self {
        Self {
            path: path.into(),
            delimiter: delimiter.map(str::to_string),
        }
    }
}

/// State of a mailbox right after SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
}

/// A message address as it appears in an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAddress {
    /// Display name, decoded.
    pub name: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain part.
    pub host: Option<String>,
}

impl RawAddress {
    /// Builds an address from `local@domain`.
    #[must_use]
    pub fn from_email(email: &str) -> Self {
        let (mailbox, host) = email
            .split_once('@')
            .map_or((email, None), |(m, h)| (m, Some(h.to_string())));
        Self {
            name: None,
            mailbox: Some(mailbox.to_string()),
            host,
        }
    }

    /// The bare `mailbox@host` address.
    #[must_use]
    pub fn address(&self) -> String {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => format!("{m}@{h}"),
            (Some(m), None) => m.clone(),
            (None, Some(h)) => h.clone(),
            (None, None) => String::new(),
        }
    }
}

/// One entry of a bulk `UID ENVELOPE` fetch, before mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEnvelopeEntry {
    /// Message UID. Required; entries without it are rejected when mapped.
    pub uid: Option<Uid>,
    /// Envelope date, as sent by the server.
    pub date: Option<String>,
    /// Envelope subject, decoded.
    pub subject: Option<String>,
    /// Envelope sender addresses.
    pub from: Vec<RawAddress>,
}

/// A message sequence-number range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    /// First sequence number, 1-based.
    pub first: u32,
    /// Last sequence number, or `None` for the highest one (`*`).
    pub last: Option<u32>,
}

impl SequenceRange {
    /// Every message in the mailbox, `1:*`.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            first: 1,
            last: None,
        }
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last {
            Some(last) => write!(f, "{}:{last}", self.first),
            None => write!(f, "{}:*", self.first),
        }
    }
}

/// An authenticated IMAP session.
///
/// Methods other than [`list_mailboxes`](Self::list_mailboxes) and
/// [`select`](Self::select) act on the currently selected mailbox.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Lists every mailbox visible to the user, in server order.
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxListing>, ConnectionError>;

    /// Selects a mailbox.
    async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus, ConnectionError>;

    /// Fetches UID and envelope for every message in `range`, in one request.
    async fn fetch_envelopes(
        &mut self,
        range: SequenceRange,
    ) -> Result<Vec<RawEnvelopeEntry>, ConnectionError>;

    /// Fetches the full raw message with the given UID, if it exists.
    async fn fetch_raw(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, ConnectionError>;

    /// Permanently removes the message with the given UID.
    async fn delete(&mut self, uid: Uid) -> Result<(), ConnectionError>;

    /// Logs out and drops the connection.
    async fn close(self) -> Result<(), CloseError>
    where
        Self: Sized;
}

/// Opens authenticated sessions.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// The session type produced.
    type Session: MailSession;

    /// Connects to `endpoint` and logs in with its credentials.
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Self::Session, ConnectionError>;
}

/// Opens a session against the configured IMAP server.
///
/// # Errors
///
/// Returns an error if connection or authentication fails. Not retried.
pub async fn open_session<C: Connector>(
    connector: &C,
    config: &ServerConfig,
) -> Result<C::Session, ConnectionError> {
    let endpoint = &config.imap;
    tracing::debug!(host = %endpoint.host, port = endpoint.port, "Opening IMAP session");
    let session = connector.connect(endpoint).await?;
    tracing::debug!(host = %endpoint.host, "IMAP session established");
    Ok(session)
}

/// Closes a session, logging and discarding any failure.
pub async fn close_session<S: MailSession>(session: S) {
    match session.close().await {
        Ok(()) => tracing::debug!("IMAP session closed"),
        Err(e) => tracing::warn!("{}", e),
    }
}
