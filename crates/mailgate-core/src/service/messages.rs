//! Message enumeration for a mailbox.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::session::{ConnectionError, MailSession, RawEnvelopeEntry, SequenceRange};

/// Summary of a message for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Server UID, as a decimal string.
    pub id: String,
    /// Envelope date, RFC 3339 when the server's value could be parsed.
    pub date: String,
    /// Address of the first sender, empty when the envelope has none.
    pub from: String,
    /// Decoded subject.
    pub subject: String,
}

impl TryFrom<RawEnvelopeEntry> for MessageSummary {
    type Error = ConnectionError;

    fn try_from(entry: RawEnvelopeEntry) -> Result<Self, Self::Error> {
        let uid = entry
            .uid
            .ok_or_else(|| ConnectionError::Malformed("FETCH response without UID".into()))?;

        let from = entry.from.first().map(|a| a.address()).unwrap_or_else(|| {
            warn!(uid, "Envelope has no sender");
            String::new()
        });

        Ok(Self {
            id: uid.to_string(),
            date: entry.date.as_deref().map(normalize_date).unwrap_or_default(),
            from,
            subject: entry.subject.unwrap_or_default(),
        })
    }
}

/// Converts an RFC 2822 date to RFC 3339, keeping unparseable input as is.
fn normalize_date(raw: &str) -> String {
    DateTime::parse_from_rfc2822(raw).map_or_else(|_| raw.to_string(), |d| d.to_rfc3339())
}

/// Lists the messages in `mailbox` in server order.
///
/// An empty mailbox returns an empty list without fetching anything.
///
/// # Errors
///
/// Returns an error if SELECT or FETCH fails, if the server returns fewer
/// entries than SELECT reported or if any entry lacks a UID. Nothing is
/// returned for a partial listing.
pub async fn list_messages<S: MailSession>(
    session: &mut S,
    mailbox: &str,
) -> Result<Vec<MessageSummary>, ConnectionError> {
    let status = session.select(mailbox).await?;
    if status.exists == 0 {
        debug!(mailbox, "Mailbox is empty");
        return Ok(Vec::new());
    }

    let entries = session.fetch_envelopes(SequenceRange::all()).await?;
    debug!(
        mailbox,
        exists = status.exists,
        fetched = entries.len(),
        "Envelopes fetched"
    );

    // A refused FETCH still ends the response stream cleanly.
    if entries.len() < status.exists as usize {
        return Err(ConnectionError::Command {
            command: "FETCH",
            reason: format!(
                "server returned {} of {} envelopes",
                entries.len(),
                status.exists
            ),
        });
    }

    entries.into_iter().map(MessageSummary::try_from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::RawAddress;

    fn entry(uid: u32) -> RawEnvelopeEntry {
        RawEnvelopeEntry {
            uid: Some(uid),
            date: Some("Mon, 7 Feb 1994 21:52:25 -0800".into()),
            subject: Some("Hello".into()),
            from: vec![RawAddress::from_email("alice@example.com")],
        }
    }

    #[test]
    fn test_summary_from_entry() {
        let summary = MessageSummary::try_from(entry(42)).unwrap();
        assert_eq!(summary.id, "42");
        assert_eq!(summary.date, "1994-02-07T21:52:25-08:00");
        assert_eq!(summary.from, "alice@example.com");
        assert_eq!(summary.subject, "Hello");
    }

    #[test]
    fn test_summary_uses_first_sender() {
        let mut raw = entry(1);
        raw.from.push(RawAddress::from_email("bob@example.com"));
        assert_eq!(MessageSummary::try_from(raw).unwrap().from, "alice@example.com");
    }

    #[test]
    fn test_summary_without_sender() {
        let raw = RawEnvelopeEntry {
            from: Vec::new(),
            ..entry(7)
        };
        assert_eq!(MessageSummary::try_from(raw).unwrap().from, "");
    }

    #[test]
    fn test_summary_without_uid_is_malformed() {
        let raw = RawEnvelopeEntry {
            uid: None,
            ..entry(1)
        };
        assert!(matches!(
            MessageSummary::try_from(raw),
            Err(ConnectionError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let raw = RawEnvelopeEntry {
            uid: Some(3),
            ..RawEnvelopeEntry::default()
        };
        let summary = MessageSummary::try_from(raw).unwrap();
        assert_eq!(summary.date, "");
        assert_eq!(summary.subject, "");
        assert_eq!(summary.from, "");
    }

    #[test]
    fn test_unparseable_date_kept() {
        assert_eq!(normalize_date("sometime last week"), "sometime last week");
    }

    #[test]
    fn test_summary_json_shape() {
        let json = serde_json::to_value(MessageSummary::try_from(entry(5)).unwrap()).unwrap();
        assert_eq!(json["id"], "5");
        assert_eq!(json["from"], "alice@example.com");
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
