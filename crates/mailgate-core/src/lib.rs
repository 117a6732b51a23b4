//! # mailgate-core
//!
//! Mail-session layer of the `mailgate` webmail backend.
//!
//! Every operation opens its own authenticated session, issues the few
//! protocol actions it needs, maps the server's answer into plain data
//! types and closes the session again before returning:
//!
//! - **Mailboxes** - LIST, rebuilt into a tree and flattened pre-order
//! - **Messages** - SELECT plus one bulk `UID ENVELOPE` fetch, server order kept
//! - **Bodies** - `UID FETCH BODY.PEEK[]`, reduced to plain text
//! - **Deletion** - UID-addressed store + expunge
//! - **Sending** - one SMTP submission per call
//!
//! ## Example
//!
//! ```ignore
//! use mailgate_core::{MailService, ServerConfig};
//!
//! let config = ServerConfig::load("serverInfo.json")?;
//! let service = MailService::new(config);
//! for mailbox in service.list_mailboxes().await? {
//!     println!("{}", mailbox.path);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod service;
pub mod session;

pub use config::{ConfigError, Credentials, Security, ServerConfig, ServerEndpoint, ValidationError};
pub use error::{Error, Result};
pub use service::{
    MailService, Mailbox, MailboxNode, MessageSummary, OutgoingMessage, SendError, build_tree,
    decode_text_body, flatten,
};
pub use session::{
    CloseError, ConnectionError, Connector, ImapConnector, ImapSession, MailSession,
    MailboxListing, MailboxStatus, RawAddress, RawEnvelopeEntry, SequenceRange, Uid,
};
