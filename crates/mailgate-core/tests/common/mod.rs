//! In-memory mail server used by the service tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mailgate_core::{
    CloseError, ConnectionError, Connector, Credentials, MailSession, MailboxListing,
    MailboxStatus, RawAddress, RawEnvelopeEntry, SequenceRange, Security, ServerConfig,
    ServerEndpoint, Uid,
};

/// A protocol action observed by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connect,
    List,
    Select(String),
    FetchEnvelopes(SequenceRange),
    FetchRaw(Uid),
    Delete(Uid),
    Close,
}

/// A stored message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub envelope: RawEnvelopeEntry,
    pub raw: Vec<u8>,
}

impl StoredMessage {
    /// A plain-text message from `from` with the given subject and body.
    pub fn text(uid: Uid, from: &str, subject: &str, body: &str) -> Self {
        let raw = format!(
            "From: {from}\r\nSubject: {subject}\r\nContent-Type: text/plain\r\n\r\n{body}\r\n"
        );
        Self {
            envelope: RawEnvelopeEntry {
                uid: Some(uid),
                date: Some("Tue, 1 Jul 2003 10:52:37 +0200".into()),
                subject: Some(subject.into()),
                from: vec![RawAddress::from_email(from)],
            },
            raw: raw.into_bytes(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    listings: Vec<MailboxListing>,
    mailboxes: BTreeMap<String, Vec<StoredMessage>>,
    actions: Vec<Action>,
    fail_connect: bool,
    fail_close: bool,
    fail_fetch: bool,
    short_fetch: bool,
}

/// Shared handle to the fake server's state.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a LIST entry using `/` as the delimiter.
    pub fn with_listing(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .listings
            .push(MailboxListing::new(path, Some("/")));
        self
    }

    /// Adds a selectable mailbox holding `messages` in server order.
    pub fn with_mailbox(self, name: &str, messages: Vec<StoredMessage>) -> Self {
        self.state
            .lock()
            .unwrap()
            .mailboxes
            .insert(name.to_string(), messages);
        self
    }

    pub fn failing_connect(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    /// Envelope fetches return only the first message, as a server does
    /// when it cuts a FETCH short and still completes the command.
    pub fn short_fetch(self) -> Self {
        self.state.lock().unwrap().short_fetch = true;
        self
    }

    /// Every action observed so far.
    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    fn record(&self, action: Action) {
        self.state.lock().unwrap().actions.push(action);
    }
}

/// Connector handing out [`FakeSession`]s.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, _endpoint: &ServerEndpoint) -> Result<FakeSession, ConnectionError> {
        self.server.record(Action::Connect);
        if self.server.state.lock().unwrap().fail_connect {
            return Err(ConnectionError::Authenticate("invalid credentials".into()));
        }
        Ok(FakeSession {
            server: self.server.clone(),
            selected: None,
        })
    }
}

/// Session over the fake server's state.
#[derive(Debug)]
pub struct FakeSession {
    server: FakeServer,
    selected: Option<String>,
}

impl FakeSession {
    fn selected(&self) -> Result<String, ConnectionError> {
        self.selected.clone().ok_or_else(|| ConnectionError::Command {
            command: "FETCH",
            reason: "no mailbox selected".into(),
        })
    }
}

impl MailSession for FakeSession {
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxListing>, ConnectionError> {
        self.server.record(Action::List);
        Ok(self.server.state.lock().unwrap().listings.clone())
    }

    async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus, ConnectionError> {
        self.server.record(Action::Select(mailbox.to_string()));
        let state = self.server.state.lock().unwrap();
        let messages = state
            .mailboxes
            .get(mailbox)
            .ok_or_else(|| ConnectionError::Command {
                command: "SELECT",
                reason: format!("no such mailbox: {mailbox}"),
            })?;
        self.selected = Some(mailbox.to_string());
        Ok(MailboxStatus {
            exists: u32::try_from(messages.len()).unwrap(),
        })
    }

    async fn fetch_envelopes(
        &mut self,
        range: SequenceRange,
    ) -> Result<Vec<RawEnvelopeEntry>, ConnectionError> {
        self.server.record(Action::FetchEnvelopes(range));
        let selected = self.selected()?;
        let state = self.server.state.lock().unwrap();
        if state.fail_fetch {
            return Err(ConnectionError::Command {
                command: "FETCH",
                reason: "connection reset".into(),
            });
        }
        let limit = if state.short_fetch { 1 } else { usize::MAX };
        Ok(state.mailboxes[&selected]
            .iter()
            .take(limit)
            .map(|m| m.envelope.clone())
            .collect())
    }

    async fn fetch_raw(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, ConnectionError> {
        self.server.record(Action::FetchRaw(uid));
        let selected = self.selected()?;
        let state = self.server.state.lock().unwrap();
        Ok(state.mailboxes[&selected]
            .iter()
            .find(|m| m.envelope.uid == Some(uid))
            .map(|m| m.raw.clone()))
    }

    async fn delete(&mut self, uid: Uid) -> Result<(), ConnectionError> {
        self.server.record(Action::Delete(uid));
        let selected = self.selected()?;
        let mut state = self.server.state.lock().unwrap();
        if let Some(messages) = state.mailboxes.get_mut(&selected) {
            messages.retain(|m| m.envelope.uid != Some(uid));
        }
        Ok(())
    }

    async fn close(self) -> Result<(), CloseError> {
        self.server.record(Action::Close);
        if self.server.state.lock().unwrap().fail_close {
            return Err(CloseError("connection reset during LOGOUT".into()));
        }
        Ok(())
    }
}

/// A configuration pointing at hosts that are never contacted.
pub fn test_config() -> ServerConfig {
    let endpoint = ServerEndpoint::new("mail.example.com", 993, Credentials::new("bob", "secret"))
        .with_security(Security::Tls);
    ServerConfig {
        smtp: ServerEndpoint {
            port: 465,
            ..endpoint.clone()
        },
        imap: endpoint,
    }
}
