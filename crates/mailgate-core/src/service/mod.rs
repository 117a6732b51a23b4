//! Mail operations exposed to the routing layer.
//!
//! Every operation on [`MailService`] opens its own IMAP session, performs
//! exactly one logical action and closes the session again before returning.
//! Sessions are never shared or pooled; two concurrent calls use two
//! independent connections.

mod body;
mod mailbox;
mod messages;
mod mutate;
mod smtp;

use std::sync::Arc;

pub use body::{decode_text_body, get_body};
pub use mailbox::{Mailbox, MailboxNode, build_tree, flatten, list_mailboxes};
pub use messages::{MessageSummary, list_messages};
pub use mutate::delete_message;
pub use smtp::{OutgoingMessage, SendError, send};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::{ConnectionError, Connector, ImapConnector, Uid, close_session, open_session};

/// High-level mail operations against one configured server pair.
///
/// Cloning is cheap; the configuration is shared.
#[derive(Debug, Clone)]
pub struct MailService<C = ImapConnector> {
    config: Arc<ServerConfig>,
    connector: C,
}

impl MailService {
    /// Creates a service that talks to real IMAP servers.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_connector(config, ImapConnector)
    }
}

impl<C: Connector> MailService<C> {
    /// Creates a service with a custom session connector.
    #[must_use]
    pub fn with_connector(config: impl Into<Arc<ServerConfig>>, connector: C) -> Self {
        Self {
            config: config.into(),
            connector,
        }
    }

    /// The server configuration in use.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs `op` on a fresh session and closes the session afterwards.
    ///
    /// The session is closed whether `op` succeeds or fails, and a failed
    /// close never replaces the result of `op`.
    async fn with_session<T, F>(&self, op: F) -> std::result::Result<T, ConnectionError>
    where
        F: AsyncFnOnce(&mut C::Session) -> std::result::Result<T, ConnectionError>,
    {
        let mut session = open_session(&self.connector, &self.config).await?;
        let result = op(&mut session).await;
        close_session(session).await;
        result
    }

    /// Lists all mailboxes, parents before children.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or LIST fails.
    pub async fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        info!("Listing mailboxes");
        let mailboxes = self
            .with_session(async |session| list_mailboxes(session).await)
            .await?;
        debug!(count = mailboxes.len(), "Listed mailboxes");
        Ok(mailboxes)
    }

    /// Lists the messages in `mailbox` in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened, the mailbox cannot
    /// be selected or the envelopes cannot be fetched.
    pub async fn list_messages(&self, mailbox: &str) -> Result<Vec<MessageSummary>> {
        info!(mailbox, "Listing messages");
        let messages = self
            .with_session(async |session| list_messages(session, mailbox).await)
            .await?;
        debug!(mailbox, count = messages.len(), "Listed messages");
        Ok(messages)
    }

    /// Returns the plain-text body of message `uid`, or `None` if the
    /// message does not exist or has no text part.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or a command fails.
    pub async fn get_message_body(&self, mailbox: &str, uid: Uid) -> Result<Option<String>> {
        info!(mailbox, uid, "Fetching message body");
        let body = self
            .with_session(async |session| get_body(session, mailbox, uid).await)
            .await?;
        debug!(mailbox, uid, found = body.is_some(), "Fetched message body");
        Ok(body)
    }

    /// Deletes message `uid` from `mailbox` and expunges it.
    ///
    /// Deleting a UID that does not exist succeeds without effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or a command fails.
    pub async fn delete_message(&self, mailbox: &str, uid: Uid) -> Result<()> {
        info!(mailbox, uid, "Deleting message");
        self.with_session(async |session| delete_message(session, mailbox, uid).await)
            .await?;
        Ok(())
    }

    /// Sends `message` through the configured SMTP server.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is invalid or delivery fails.
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, "Sending message");
        send(&self.config, message).await?;
        Ok(())
    }
}
