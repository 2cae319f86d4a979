//! Rows written to the `notifications` table as a side effect of sending.

use serde::{Deserialize, Serialize};

use crate::{Message, UserId};

/// Length of the message preview carried by a notification.
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub reference_id: String,
    pub content: String,
}

impl Notification {
    /// Notification telling the recipient of `message` that it arrived.
    pub fn for_message(message: &Message) -> Self {
        let preview: String = message.content.chars().take(PREVIEW_CHARS).collect();
        Self {
            user_id: message.recipient_id.clone(),
            kind: NotificationKind::Message,
            reference_id: message.id.to_string(),
            content: preview,
        }
    }
}
