//! Validated outgoing direct messages.
//!
//! A draft is checked before any backend call is made, so a rejected send
//! never reaches the record store.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Reasons a request is rejected before it reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("recipient must not be empty")]
    EmptyRecipient,
    #[error("cannot send a message to yourself")]
    SelfRecipient,
    #[error("message content must not be empty")]
    EmptyContent,
}

impl ArgumentError {
    /// Recipient problems, as opposed to content problems.
    pub fn is_invalid_recipient(&self) -> bool {
        matches!(self, Self::EmptyRecipient | Self::SelfRecipient)
    }
}

/// A message that passed validation and is ready for the `send_message` routine.
/// Ids and body are stored trimmed, the same way the routine reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
}

impl OutgoingMessage {
    pub fn new(
        sender_id: UserId,
        recipient_id: UserId,
        content: &str,
    ) -> Result<Self, ArgumentError> {
        let sender_id = UserId::new(sender_id.as_str().trim());
        let recipient_id = UserId::new(recipient_id.as_str().trim());
        if sender_id.is_blank() {
            return Err(ArgumentError::EmptyUserId);
        }
        if recipient_id.is_blank() {
            return Err(ArgumentError::EmptyRecipient);
        }
        if recipient_id == sender_id {
            return Err(ArgumentError::SelfRecipient);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(ArgumentError::EmptyContent);
        }

        Ok(Self {
            sender_id,
            recipient_id,
            content: content.to_owned(),
        })
    }
}
