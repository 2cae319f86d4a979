//! Direct messaging models shared across Agora clients and services.

pub mod draft;
pub mod notification;

pub use draft::{ArgumentError, OutgoingMessage};
pub use notification::{Notification, NotificationKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Identifier of an authenticated account, as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Backend-assigned message identifier. Also the stable tie-break between
/// messages that share a `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A direct message. Immutable once the backend has stored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other party of this message relative to `user`.
    pub fn counterpart(&self, user: &UserId) -> &UserId {
        if &self.sender_id == user {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }

    /// Whether `user` is the sender or the recipient.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender_id == user || &self.recipient_id == user
    }

    /// Whether the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.recipient_id == b)
            || (&self.sender_id == b && &self.recipient_id == a)
    }

    /// Total recency order: `created_at` first, then id.
    pub fn recency_cmp(&self, other: &Message) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn is_newer_than(&self, other: &Message) -> bool {
        self.recency_cmp(other) == Ordering::Greater
    }
}

/// Display fields of a user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Client-side summary of the exchange with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub counterpart_id: UserId,
    pub counterpart_profile: Option<Profile>,
    pub last_message: Message,
}

impl Conversation {
    pub fn new(counterpart_id: UserId, last_message: Message, profile: Option<Profile>) -> Self {
        Self {
            counterpart_id,
            counterpart_profile: profile,
            last_message,
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message.created_at
    }
}
