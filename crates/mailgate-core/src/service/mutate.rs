//! Message deletion.

use crate::session::{ConnectionError, MailSession, Uid};

/// Deletes message `uid` from `mailbox` and expunges it immediately.
///
/// Deleting a UID that is not in the mailbox succeeds without effect.
///
/// # Errors
///
/// Returns an error if SELECT, STORE or EXPUNGE fails.
pub async fn delete_message<S: MailSession>(
    session: &mut S,
    mailbox: &str,
    uid: Uid,
) -> Result<(), ConnectionError> {
    session.select(mailbox).await?;
    session.delete(uid).await?;
    tracing::debug!(mailbox, uid, "Message deleted");
    Ok(())
}
