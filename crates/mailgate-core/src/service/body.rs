//! Plain-text body retrieval.

use mail_parser::MessageParser;

use crate::session::{ConnectionError, MailSession, Uid};

/// Reduces a raw RFC 5322 message to its plain text.
///
/// Every text body part is included in document order, joined by a newline.
/// HTML parts without a plain alternative are converted to text by the
/// parser. Returns `None` when the bytes do not parse or carry no text part.
#[must_use]
pub fn decode_text_body(raw: &[u8]) -> Option<String> {
    let message = MessageParser::default().parse(raw)?;

    let parts: Vec<_> = (0..message.text_body.len())
        .filter_map(|i| message.body_text(i))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Fetches message `uid` from `mailbox` and returns its plain-text body.
///
/// A UID that is not in the mailbox yields `Ok(None)`.
///
/// # Errors
///
/// Returns an error if SELECT or FETCH fails.
pub async fn get_body<S: MailSession>(
    session: &mut S,
    mailbox: &str,
    uid: Uid,
) -> Result<Option<String>, ConnectionError> {
    session.select(mailbox).await?;

    let Some(raw) = session.fetch_raw(uid).await? else {
        tracing::debug!(mailbox, uid, "Message not found");
        return Ok(None);
    };

    let body = decode_text_body(&raw);
    if body.is_none() {
        tracing::debug!(mailbox, uid, size = raw.len(), "Message has no text part");
    }
    Ok(body)
}
