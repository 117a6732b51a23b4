//! IMAP sessions on top of `async-imap`.

use std::borrow::Cow;

use async_imap::imap_proto::{Address, Envelope};
use async_imap::types::{Fetch, Name};
use futures::TryStreamExt;
use mail_parser::MessageParser;

use tokio::net::TcpStream;
use tracing::debug;

use super::stream::{MailStream, connect_plain, connect_tls, open_tcp, upgrade_tls};
use super::{
    CloseError, ConnectionError, Connector, MailSession, MailboxListing, MailboxStatus,
    RawAddress, RawEnvelopeEntry, SequenceRange, Uid,
};
use crate::config::{Security, ServerEndpoint};

/// Connects to IMAP servers over TCP with implicit TLS, STARTTLS or
/// plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapConnector;

impl Connector for ImapConnector {
    type Session = ImapSession;

    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<ImapSession, ConnectionError> {
        let stream = match endpoint.security() {
            Security::Tls => {
                connect_tls(&endpoint.host, endpoint.port, endpoint.accept_invalid_certs).await?
            }
            Security::None => connect_plain(&endpoint.host, endpoint.port).await?,
            Security::StartTls => starttls(endpoint, true).await?,
            Security::Opportunistic => starttls(endpoint, false).await?,
        };
        debug!(host = %endpoint.host, tls = stream.is_tls(), "IMAP transport ready");

        let client = async_imap::Client::new(stream);
        let session = client
            .login(&endpoint.auth.user, &endpoint.auth.pass)
            .await
            .map_err(|(e, _client)| ConnectionError::Authenticate(e.to_string()))?;

        Ok(ImapSession { session })
    }
}

/// Connects in plaintext and upgrades with STARTTLS.
///
/// When the server answers STARTTLS with NO or BAD the connection either
/// fails (`required`) or carries on unencrypted.
async fn starttls(
    endpoint: &ServerEndpoint,
    required: bool,
) -> Result<MailStream, ConnectionError> {
    let tcp = open_tcp(&endpoint.host, endpoint.port).await?;
    let mut client = async_imap::Client::new(tcp);
    client
        .read_response()
        .await
        .ok_or_else(|| ConnectionError::Malformed("server closed before greeting".into()))?
        .map_err(|e| ConnectionError::Malformed(format!("greeting: {e}")))?;

    match client.run_command_and_check_ok("STARTTLS", None).await {
        Ok(()) => {
            let tcp: TcpStream = client.into_inner();
            upgrade_tls(tcp, &endpoint.host, endpoint.accept_invalid_certs).await
        }
        Err(err @ (async_imap::error::Error::No(_) | async_imap::error::Error::Bad(_)))
            if !required =>
        {
            debug!(host = %endpoint.host, "STARTTLS refused, continuing without TLS: {}", err);
            Ok(MailStream::Plain(client.into_inner()))
        }
        Err(err) => Err(ConnectionError::Tls(format!("STARTTLS: {err}"))),
    }
}

/// An authenticated `async-imap` session.
pub struct ImapSession {
    session: async_imap::Session<MailStream>,
}

impl MailSession for ImapSession {
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxListing>, ConnectionError> {
        let names: Vec<Name> = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(ConnectionError::command("LIST"))?
            .try_collect()
            .await
            .map_err(ConnectionError::command("LIST"))?;

        Ok(names
            .iter()
            .map(|name| MailboxListing::new(name.name(), name.delimiter()))
            .collect())
    }

    async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus, ConnectionError> {
        let mailbox = self
            .session
            .select(mailbox)
            .await
            .map_err(ConnectionError::command("SELECT"))?;

        Ok(MailboxStatus { exists: mailbox.exists })
    }

    async fn fetch_envelopes(
        &mut self,
        range: SequenceRange,
    ) -> Result<Vec<RawEnvelopeEntry>, ConnectionError> {
        let fetches: Vec<Fetch> = self
            .session
            .fetch(range.to_string(), "(UID ENVELOPE)")
            .await
            .map_err(ConnectionError::command("FETCH"))?
            .try_collect()
            .await
            .map_err(ConnectionError::command("FETCH"))?;

        Ok(fetches.iter().map(envelope_entry).collect())
    }

    async fn fetch_raw(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, ConnectionError> {
        let fetches: Vec<Fetch> = self
            .session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .await
            .map_err(ConnectionError::command("UID FETCH"))?
            .try_collect()
            .await
            .map_err(ConnectionError::command("UID FETCH"))?;

        // Unsolicited FETCH responses for other messages may be interleaved.
        let body = fetches
            .iter()
            .filter(|fetch| fetch.uid.is_none_or(|u| u == uid))
            .find_map(|fetch| fetch.body().map(<[u8]>::to_vec));
        if body.is_some() {
            return Ok(body);
        }

        // The fetch stream ends at the tagged reply whatever its status, so
        // an empty result is only "not found" once the server confirms it.
        self.session
            .run_command_and_check_ok(&format!("UID FETCH {uid} (UID)"))
            .await
            .map_err(ConnectionError::command("UID FETCH"))?;
        Ok(None)
    }

    async fn delete(&mut self, uid: Uid) -> Result<(), ConnectionError> {
        self.session
            .run_command_and_check_ok(&format!("UID STORE {uid} +FLAGS.SILENT (\\Deleted)"))
            .await
            .map_err(ConnectionError::command("UID STORE"))?;

        let uidplus = self
            .session
            .capabilities()
            .await
            .map_err(ConnectionError::command("CAPABILITY"))?
            .has_str("UIDPLUS");

        // Without UIDPLUS a plain EXPUNGE also removes anything else
        // flagged \Deleted in this mailbox.
        let (command, line) = if uidplus {
            ("UID EXPUNGE", format!("UID EXPUNGE {uid}"))
        } else {
            ("EXPUNGE", "EXPUNGE".to_string())
        };
        self.session
            .run_command_and_check_ok(&line)
            .await
            .map_err(ConnectionError::command(command))?;

        debug!(uid, uidplus, "Message expunged");
        Ok(())
    }

    async fn close(mut self) -> Result<(), CloseError> {
        self.session
            .logout()
            .await
            .map_err(|e| CloseError(e.to_string()))
    }
}

/// Converts one FETCH response into an unvalidated envelope entry.
fn envelope_entry(fetch: &Fetch) -> RawEnvelopeEntry {
    let envelope = fetch.envelope();
    RawEnvelopeEntry {
        uid: fetch.uid,
        date: envelope
            .and_then(|e| e.date.as_deref())
            .map(|d| String::from_utf8_lossy(d).trim().to_string()),
        subject: envelope
            .and_then(|e| e.subject.as_deref())
            .map(decode_header_text),
        from: envelope.map(envelope_senders).unwrap_or_default(),
    }
}

fn envelope_senders(envelope: &Envelope<'_>) -> Vec<RawAddress> {
    envelope
        .from
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(raw_address)
        .collect()
}

fn raw_address(address: &Address<'_>) -> RawAddress {
    let text = |part: &Option<Cow<'_, [u8]>>| {
        part.as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    };
    RawAddress {
        name: address.name.as_deref().map(decode_header_text),
        mailbox: text(&address.mailbox),
        host: text(&address.host),
    }
}

/// Decodes RFC 2047 encoded words in an envelope string.
///
/// The value is wrapped in a one-header message so the MIME parser does
/// the decoding.
pub(crate) fn decode_header_text(raw: &[u8]) -> String {
    let mut composed = b"Subject: ".to_vec();
    composed.extend_from_slice(raw);
    composed.extend_from_slice(b"\r\n\r\n");

    MessageParser::default()
        .parse(composed.as_slice())
        .and_then(|message| message.subject().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(raw).trim().to_string())
}
