use agora_messaging::{Message, UserId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Full message history between the user and one counterpart, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    user: UserId,
    counterpart: UserId,
    messages: Vec<Message>,
}

impl Thread {
    /// Builds a thread from fetched messages. Foreign messages and repeated
    /// ids are dropped.
    pub fn new(user: UserId, counterpart: UserId, messages: Vec<Message>) -> Self {
        let mut seen = HashSet::new();
        let mut messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.is_between(&user, &counterpart) && seen.insert(m.id))
            .collect();
        messages.sort_by(|a, b| a.recency_cmp(b));
        Self {
            user,
            counterpart,
            messages,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn belongs(&self, message: &Message) -> bool {
        message.is_between(&self.user, &self.counterpart)
    }

    /// Inserts `message` at its recency position. Returns false when it
    /// belongs to another pair or is already present.
    pub fn apply_insert(&mut self, message: &Message) -> bool {
        if !self.belongs(message) || self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let at = self
            .messages
            .partition_point(|m| m.recency_cmp(message) == Ordering::Less);
        self.messages.insert(at, message.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_messaging::MessageId;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn msg(id: u128, from: &str, to: &str, t: i64) -> Message {
        Message {
            id: MessageId(Uuid::from_u128(id)),
            sender_id: from.into(),
            recipient_id: to.into(),
            content: format!("m{id}"),
            created_at: Utc.timestamp_opt(t, 0).unwrap(),
        }
    }

    fn ids(thread: &Thread) -> Vec<u128> {
        thread.messages().iter().map(|m| m.id.0.as_u128()).collect()
    }

    #[test]
    fn sorts_and_filters_fetched_messages() {
        let thread = Thread::new(
            "a".into(),
            "b".into(),
            vec![
                msg(3, "b", "a", 3),
                msg(1, "a", "b", 1),
                msg(9, "a", "c", 2),
                msg(1, "a", "b", 1),
            ],
        );
        assert_eq!(ids(&thread), vec![1, 3]);
    }

    #[test]
    fn empty_thread_is_valid() {
        let thread = Thread::new("a".into(), "b".into(), Vec::new());
        assert!(thread.is_empty());
        assert!(thread.last().is_none());
    }

    #[test]
    fn appends_in_both_directions() {
        let mut thread = Thread::new("a".into(), "b".into(), vec![msg(1, "a", "b", 1)]);
        assert!(thread.apply_insert(&msg(2, "b", "a", 2)));
        assert!(thread.apply_insert(&msg(3, "a", "b", 3)));
        assert_eq!(ids(&thread), vec![1, 2, 3]);
    }

    #[test]
    fn repeated_delivery_is_idempotent() {
        let mut thread = Thread::new("a".into(), "b".into(), Vec::new());
        let m = msg(1, "b", "a", 1);
        assert!(thread.apply_insert(&m));
        assert!(!thread.apply_insert(&m));
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn late_message_lands_in_order() {
        let mut thread = Thread::new(
            "a".into(),
            "b".into(),
            vec![msg(1, "a", "b", 1), msg(3, "a", "b", 3)],
        );
        thread.apply_insert(&msg(2, "b", "a", 2));
        assert_eq!(ids(&thread), vec![1, 2, 3]);
    }

    #[test]
    fn ignores_other_pairs() {
        let mut thread = Thread::new("a".into(), "b".into(), Vec::new());
        assert!(!thread.apply_insert(&msg(1, "a", "c", 1)));
        assert!(!thread.apply_insert(&msg(2, "c", "b", 1)));
        assert!(thread.is_empty());
    }
}
