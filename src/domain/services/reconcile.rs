//! Optimistic message reconciliation.

use crate::domain::entities::{ConfirmedMessage, Message};

/// What to do with a confirmed message arriving for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Replace the tentative record at `index`, keeping its list position.
    Replace { index: usize },
    /// Append at the tail.
    Append,
    /// Duplicate delivery; drop it.
    Ignore,
}

/// Decide how `incoming` merges into a room's message list.
///
/// A confirmed id that is already present is always a duplicate, even if a
/// tentative record with the same author and content is still pending: that
/// record belongs to a later send and waits for its own confirmation.
/// Otherwise the first tentative record with matching author and content is
/// replaced in place.
pub fn reconcile(messages: &[Message], incoming: &ConfirmedMessage) -> MergeDecision {
    if messages
        .iter()
        .any(|m| m.confirmed_id() == Some(incoming.id))
    {
        return MergeDecision::Ignore;
    }

    messages
        .iter()
        .position(|m| m.awaits(incoming.author_id, &incoming.content))
        .map(|index| MergeDecision::Replace { index })
        .unwrap_or(MergeDecision::Append)
}

/// Apply `incoming` to `messages`. Returns the decision taken.
pub fn merge_confirmed(messages: &mut Vec<Message>, incoming: ConfirmedMessage) -> MergeDecision {
    let decision = reconcile(messages, &incoming);
    match decision {
        MergeDecision::Replace { index } => messages[index] = Message::from(incoming),
        MergeDecision::Append => messages.push(Message::from(incoming)),
        MergeDecision::Ignore => {}
    }
    decision
}
