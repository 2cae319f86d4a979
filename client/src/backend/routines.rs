use super::{to_row, BackendError, BackendResult, Row};
use agora_messaging::{Message, MessageId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Routine that atomically stores a direct message and returns the new row.
/// Arguments: `sender_id`, `recipient_id`, `content`.
pub const SEND_MESSAGE: &str = "send_message";

/// Hands out strictly increasing timestamps so messages stored by one
/// backend never share a `created_at`.
#[derive(Debug, Default)]
pub(crate) struct RowClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl RowClock {
    pub(crate) fn next(&self) -> BackendResult<DateTime<Utc>> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| BackendError::Storage("clock lock poisoned".into()))?;
        let now = Utc::now();
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        Ok(stamp)
    }
}

fn required_str<'a>(args: &'a Row, field: &str) -> BackendResult<&'a str> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BackendError::Rejected(format!("{field} is required")))
}

/// Builds the stored row for a `send_message` call.
pub(crate) fn build_message_row(args: &Row, clock: &RowClock) -> BackendResult<Row> {
    let sender_id = required_str(args, "sender_id")?;
    let recipient_id = required_str(args, "recipient_id")?;
    let content = required_str(args, "content")?;
    if sender_id == recipient_id {
        return Err(BackendError::Rejected("sender and recipient must differ".into()));
    }

    let message = Message {
        id: MessageId::new(),
        sender_id: UserId::from(sender_id),
        recipient_id: UserId::from(recipient_id),
        content: content.to_owned(),
        created_at: clock.next()?,
    };
    to_row(&message)
}
