//! Chat room entity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::message::{ConfirmedMessage, Message};

/// Who may join a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    #[default]
    Open,
    Invite,
}

impl AccessPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "invite" | "private" => Self::Invite,
            _ => Self::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Invite => "invite",
        }
    }
}

impl std::fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Room as listed by the rooms endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    #[serde(rename = "accessType")]
    pub access: AccessPolicy,
    pub joined: bool,
    pub member_count: u32,
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterMember {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub muted: bool,
}

/// History, roster and mute state fetched when a room is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub messages: Vec<ConfirmedMessage>,
    pub roster: Vec<RosterMember>,
    /// Whether the local identity is muted in this room.
    pub muted: bool,
}

/// Client-side view of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub access: AccessPolicy,
    pub joined: bool,
    pub member_count: u32,
    pub messages: Vec<Message>,
    pub roster: Vec<RosterMember>,
    pub muted: bool,
}

impl Room {
    pub fn from_summary(summary: RoomSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            access: summary.access,
            joined: summary.joined,
            member_count: summary.member_count,
            messages: Vec::new(),
            roster: Vec::new(),
            muted: false,
        }
    }

    /// Refresh listing fields, keeping loaded history.
    pub fn update_summary(&mut self, summary: RoomSummary) {
        self.name = summary.name;
        self.access = summary.access;
        self.joined = summary.joined;
        self.member_count = summary.member_count;
    }

    /// Drop one member from the cached count, never below zero.
    pub fn decrement_members(&mut self) {
        self.member_count = self.member_count.saturating_sub(1);
    }

    pub fn contains_confirmed(&self, id: i64) -> bool {
        self.messages.iter().any(|m| m.confirmed_id() == Some(id))
    }

    /// Replace history with a fetched state, keeping still-pending
    /// optimistic records at the tail.
    ///
    /// A pending record whose confirmed copy is already part of the fetched
    /// history is settled there: each newly seen confirmed message absorbs at
    /// most one pending record with the same author and content. Messages
    /// that were already loaded never settle anything.
    pub fn apply_state(&mut self, state: RoomState) {
        let known: HashSet<i64> = self.messages.iter().filter_map(Message::confirmed_id).collect();
        let pending: Vec<Message> = self
            .messages
            .drain(..)
            .filter(Message::is_tentative)
            .collect();
        let mut seen = HashSet::new();
        self.messages = state
            .messages
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .map(Message::from)
            .collect();

        let mut absorbed = HashSet::new();
        let history = &self.messages;
        let still_pending: Vec<Message> = pending
            .into_iter()
            .filter(|record| {
                let settled = history.iter().find_map(|m| {
                    m.confirmed_id().filter(|id| {
                        !known.contains(id)
                            && !absorbed.contains(id)
                            && record.awaits(m.author_id, &m.content)
                    })
                });
                match settled {
                    Some(id) => {
                        absorbed.insert(id);
                        false
                    }
                    None => true,
                }
            })
            .collect();
        self.messages.extend(still_pending);
        self.member_count = self.member_count.max(state.roster.len() as u32);
        self.roster = state.roster;
        self.muted = state.muted;
    }
}
