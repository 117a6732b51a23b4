//! SMTP service for sending emails.
//!
//! Messages are composed with `mail-builder` and handed to `mail-send` over a
//! fresh connection per call. There is no retry and no queue.

use std::borrow::Cow;

use mail_builder::MessageBuilder;
use mail_send::{SmtpClient, SmtpClientBuilder};
use mail_send::smtp::message::{Address as SmtpAddress, Message as SmtpMessage};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::config::{Security, ServerConfig, ServerEndpoint};
use crate::session::stream::CONNECT_TIMEOUT;

/// Errors that can occur while sending a message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The message cannot be sent as given.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Connecting to the SMTP server failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server did not accept the message.
    #[error("Send failed: {0}")]
    Rejected(String),
}

/// An email message to send.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient addresses, comma-separated.
    pub to: String,
    /// Sender address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            text: text.into(),
        }
    }

    /// The individual recipient addresses.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.split(',').map(str::trim).filter(|r| !r.is_empty())
    }

    /// Checks that the message has a sender and at least one recipient.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::InvalidMessage`] describing the first problem.
    pub fn validate(&self) -> Result<(), SendError> {
        if self.from.trim().is_empty() {
            return Err(SendError::InvalidMessage("sender is empty".into()));
        }
        if self.recipients().next().is_none() {
            return Err(SendError::InvalidMessage("no recipients".into()));
        }
        Ok(())
    }

    /// Renders the message as RFC 5322 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is invalid or cannot be serialized.
    pub fn compose(&self) -> Result<Vec<u8>, SendError> {
        self.validate()?;

        MessageBuilder::new()
            .from(self.from.trim())
            .to(self.recipients().collect::<Vec<_>>())
            .subject(self.subject.as_str())
            .text_body(self.text.as_str())
            .write_to_vec()
            .map_err(|e| SendError::InvalidMessage(e.to_string()))
    }

    fn envelope(&self, body: Vec<u8>) -> SmtpMessage<'_> {
        SmtpMessage {
            mail_from: smtp_address(self.from.trim()),
            rcpt_to: self.recipients().map(smtp_address).collect(),
            body: Cow::Owned(body),
        }
    }
}

fn smtp_address(email: &str) -> SmtpAddress<'_> {
    SmtpAddress {
        email: Cow::Borrowed(email),
        parameters: Default::default(),
    }
}

fn client_builder(endpoint: &ServerEndpoint) -> SmtpClientBuilder<String> {
    let builder = SmtpClientBuilder::new(endpoint.host.clone(), endpoint.port)
        .credentials((endpoint.auth.user.clone(), endpoint.auth.pass.clone()))
        .implicit_tls(endpoint.security() == Security::Tls)
        .timeout(CONNECT_TIMEOUT);

    if endpoint.accept_invalid_certs {
        builder.allow_invalid_certs()
    } else {
        builder
    }
}

fn connect_error(err: mail_send::Error) -> SendError {
    match err {
        err @ mail_send::Error::AuthenticationFailed(_) => {
            SendError::Authentication(err.to_string())
        }
        err => SendError::Connect(err.to_string()),
    }
}

/// Hands one message to a connected client and says goodbye.
///
/// A failed QUIT is logged; the message has been accepted by then.
async fn deliver<T: AsyncRead + AsyncWrite + Unpin>(
    mut client: SmtpClient<T>,
    message: SmtpMessage<'_>,
) -> Result<(), SendError> {
    client
        .send(message)
        .await
        .map_err(|e| SendError::Rejected(e.to_string()))?;
    if let Err(e) = client.quit().await {
        warn!("SMTP QUIT failed: {}", e);
    }
    Ok(())
}

/// Sends a message through the configured SMTP server.
///
/// # Errors
///
/// Returns an error if the message is invalid, or if connecting,
/// authenticating or delivering fails.
pub async fn send(config: &ServerConfig, message: &OutgoingMessage) -> Result<(), SendError> {
    let body = message.compose()?;
    let endpoint = &config.smtp;
    let security = endpoint.security();
    let builder = client_builder(endpoint);

    debug!(
        host = %endpoint.host,
        port = endpoint.port,
        security = security.display_name(),
        "Connecting to SMTP server"
    );

    // Plaintext and TLS clients are distinct types.
    match security {
        Security::None => {
            let client = builder.connect_plain().await.map_err(connect_error)?;
            deliver(client, message.envelope(body)).await?;
        }
        Security::Tls | Security::StartTls => {
            let client = builder.connect().await.map_err(connect_error)?;
            deliver(client, message.envelope(body)).await?;
        }
        Security::Opportunistic => match builder.connect().await {
            Ok(client) => deliver(client, message.envelope(body)).await?,
            Err(mail_send::Error::MissingStartTls) => {
                debug!(host = %endpoint.host, "STARTTLS not offered, sending without TLS");
                let client = builder.connect_plain().await.map_err(connect_error)?;
                deliver(client, message.envelope(body)).await?;
            }
            Err(e) => return Err(connect_error(e)),
        },
    }

    debug!(recipients = message.recipients().count(), "Message sent");
    Ok(())
}
