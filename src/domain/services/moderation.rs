//! Room moderation rules.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::{AccessPolicy, Identity, Room};

static EVICTION_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(kick(ed)?|removed|banned|evicted)\b").expect("valid eviction regex")
});

/// Why a join is refused locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Evicted,
    InviteOnly,
}

/// Outcome of a local join check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// Membership is already confirmed; fetch directly.
    AlreadyMember,
    /// Ask the server to join first.
    Join,
    /// Refused without a network call.
    Refuse(Refusal),
}

/// Domain service for the room moderation protocol.
pub struct ModerationService;

impl ModerationService {
    /// Whether an inline room error carries a kick/removal signature.
    ///
    /// Such errors are handled exactly like an explicit kick event.
    pub fn is_eviction_error(text: &str) -> bool {
        EVICTION_SIGNATURE.is_match(text)
    }

    /// Decide whether `identity` may open `room`.
    ///
    /// The eviction flag wins over everything else, including elevated
    /// privilege: only a server-confirmed re-invite clears it.
    pub fn evaluate_join(room: &Room, evicted: bool, identity: &Identity) -> JoinDecision {
        if evicted {
            return JoinDecision::Refuse(Refusal::Evicted);
        }
        if room.joined {
            return JoinDecision::AlreadyMember;
        }
        if room.access == AccessPolicy::Open || identity.privilege.is_elevated() {
            return JoinDecision::Join;
        }
        JoinDecision::Refuse(Refusal::InviteOnly)
    }
}
