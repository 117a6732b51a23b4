//! Mailbox listing and hierarchy flattening.

use serde::{Deserialize, Serialize};

use crate::session::{ConnectionError, MailSession, MailboxListing};

/// A mailbox as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Leaf label, e.g. `Archive`.
    pub name: String,
    /// Full hierarchical identifier, e.g. `INBOX/Archive`.
    pub path: String,
}

/// A node of the mailbox hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxNode {
    /// Leaf label.
    pub name: String,
    /// Full hierarchical identifier.
    pub path: String,
    /// Child mailboxes, in server order.
    pub children: Vec<MailboxNode>,
}

impl MailboxNode {
    /// Creates a node without children.
    #[must_use]
    pub fn leaf(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
        }
    }

    /// Adds a child node.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

/// Flattens a mailbox hierarchy into a list, parents before children.
///
/// Traversal is pre-order depth-first with siblings in their given order.
/// Uses an explicit stack, so arbitrarily deep trees are fine.
#[must_use]
pub fn flatten(roots: &[MailboxNode]) -> Vec<Mailbox> {
    let mut mailboxes = Vec::new();
    let mut stack: Vec<&MailboxNode> = roots.iter().rev().collect();

    while let Some(node) = stack.pop() {
        mailboxes.push(Mailbox {
            name: node.name.clone(),
            path: node.path.clone(),
        });
        stack.extend(node.children.iter().rev());
    }

    mailboxes
}

/// Splits a mailbox path into `(segment, path up to that segment)` pairs.
///
/// Empty segments from leading, trailing or doubled delimiters produce no
/// node, but the prefixes keep the original spelling of the path.
fn segments<'a>(path: &'a str, delimiter: Option<&str>) -> Vec<(&'a str, &'a str)> {
    let Some(delimiter) = delimiter else {
        return if path.is_empty() {
            Vec::new()
        } else {
            vec![(path, path)]
        };
    };

    let mut offset = 0;
    let mut segments = Vec::new();
    for segment in path.split(delimiter) {
        let end = offset + segment.len();
        offset = end + delimiter.len();
        if !segment.is_empty() {
            segments.push((segment, &path[..end]));
        }
    }
    segments
}

/// Rebuilds the mailbox hierarchy from a flat LIST response.
///
/// Each path is split on its hierarchy delimiter. Ancestors the server did
/// not list itself are created on the fly, and siblings keep the order in
/// which they first appeared.
#[must_use]
pub fn build_tree(listings: &[MailboxListing]) -> Vec<MailboxNode> {
    let mut roots: Vec<MailboxNode> = Vec::new();

    for listing in listings {
        let delimiter = listing.delimiter.as_deref().filter(|d| !d.is_empty());

        let mut level = &mut roots;
        for (segment, path) in segments(&listing.path, delimiter) {
            let siblings = level;
            let index = if let Some(index) = siblings.iter().position(|n| n.path == path) {
                index
            } else {
                siblings.push(MailboxNode::leaf(segment, path));
                siblings.len() - 1
            };
            level = &mut siblings[index].children;
        }
    }

    roots
}

/// Lists every mailbox as a flat, pre-ordered sequence.
///
/// # Errors
///
/// Returns an error if the LIST command fails.
pub async fn list_mailboxes<S: MailSession>(
    session: &mut S,
) -> Result<Vec<Mailbox>, ConnectionError> {
    let listings = session.list_mailboxes().await?;
    let mailboxes = flatten(&build_tree(&listings));
    tracing::debug!(
        listed = listings.len(),
        mailboxes = mailboxes.len(),
        "Mailboxes flattened"
    );
    Ok(mailboxes)
}
