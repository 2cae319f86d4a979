use agora_messaging::{Conversation, Message, Profile, UserId};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Reduces `messages` to the newest message per counterpart of `user`,
/// newest first.
///
/// Input order is not trusted: a message only replaces the one already kept
/// for its counterpart when it is newer, so a descending feed keeps the first
/// occurrence and any other order still yields the true latest.
pub fn latest_per_counterpart(
    user: &UserId,
    messages: impl IntoIterator<Item = Message>,
) -> Vec<Message> {
    let mut latest: HashMap<UserId, Message> = HashMap::new();
    for message in messages {
        if !message.involves(user) {
            continue;
        }
        match latest.entry(message.counterpart(user).clone()) {
            Entry::Vacant(slot) => {
                slot.insert(message);
            }
            Entry::Occupied(mut slot) => {
                if message.is_newer_than(slot.get()) {
                    slot.insert(message);
                }
            }
        }
    }

    let mut latest: Vec<Message> = latest.into_values().collect();
    latest.sort_by(|a, b| b.recency_cmp(a));
    latest
}

/// What applying one message did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciled {
    /// First message with this counterpart.
    Created,
    /// Newer message; the conversation moved up.
    Updated,
    /// Duplicate or older than the conversation's last message.
    Unchanged,
    /// The message does not involve the user.
    Ignored,
}

/// One conversation per counterpart, newest `last_message` first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationList {
    entries: Vec<Conversation>,
}

impl ConversationList {
    pub fn new(mut entries: Vec<Conversation>) -> Self {
        entries.sort_by(|a, b| b.last_message.recency_cmp(&a.last_message));
        let mut seen = HashSet::new();
        entries.retain(|c| seen.insert(c.counterpart_id.clone()));
        Self { entries }
    }

    pub fn entries(&self) -> &[Conversation] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Conversation> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, counterpart: &UserId) -> Option<&Conversation> {
        self.entries.iter().find(|c| &c.counterpart_id == counterpart)
    }

    pub fn contains(&self, counterpart: &UserId) -> bool {
        self.get(counterpart).is_some()
    }

    /// Folds a newly observed message into the list.
    ///
    /// Idempotent, and commutative across counterparts. A conversation's
    /// `last_message` only ever moves forward in recency, where recency is
    /// `created_at` with the message id breaking ties, so two messages with
    /// the same timestamp still have a fixed winner.
    ///
    /// Position only looks at timestamps: a touched conversation is placed
    /// ahead of every conversation whose last activity is not strictly
    /// newer. Among conversations with equal timestamps the most recently
    /// touched one takes the front slot, whereas [`ConversationList::new`]
    /// orders such ties by message id.
    pub fn apply_insert(
        &mut self,
        user: &UserId,
        message: &Message,
        profile: Option<Profile>,
    ) -> Reconciled {
        if !message.involves(user) {
            return Reconciled::Ignored;
        }
        let counterpart = message.counterpart(user);

        let Some(idx) = self
            .entries
            .iter()
            .position(|c| &c.counterpart_id == counterpart)
        else {
            self.place(Conversation::new(counterpart.clone(), message.clone(), profile));
            return Reconciled::Created;
        };

        let current = &mut self.entries[idx];
        if current.counterpart_profile.is_none() {
            current.counterpart_profile = profile;
        }
        if !message.is_newer_than(&current.last_message) {
            return Reconciled::Unchanged;
        }

        let mut conversation = self.entries.remove(idx);
        conversation.last_message = message.clone();
        self.place(conversation);
        Reconciled::Updated
    }

    /// Merges another list in, keeping the newer state per counterpart.
    pub fn merge(&mut self, user: &UserId, other: ConversationList) {
        for conversation in other.entries {
            let profile = conversation.counterpart_profile;
            self.apply_insert(user, &conversation.last_message, profile);
        }
    }

    fn place(&mut self, conversation: Conversation) {
        let at = self
            .entries
            .iter()
            .position(|c| c.last_activity() <= conversation.last_activity())
            .unwrap_or(self.entries.len());
        self.entries.insert(at, conversation);
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

    fn counterparts(list: &ConversationList) -> Vec<&str> {
        list.entries()
            .iter()
            .map(|c| c.counterpart_id.as_str())
            .collect()
    }

    fn assert_sorted(list: &ConversationList) {
        for pair in list.entries().windows(2) {
            assert!(pair[0].last_activity() >= pair[1].last_activity());
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(latest_per_counterpart(&"a".into(), Vec::new()).is_empty());
    }

    #[test]
    fn one_entry_per_counterpart_newest_first() {
        let a = UserId::from("a");
        let messages = vec![
            msg(3, "a", "c", 3),
            msg(2, "b", "a", 2),
            msg(1, "a", "b", 1),
        ];
        let latest = latest_per_counterpart(&a, messages);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].counterpart(&a).as_str(), "c");
        assert_eq!(latest[0].created_at.timestamp(), 3);
        assert_eq!(latest[1].counterpart(&a).as_str(), "b");
        assert_eq!(latest[1].created_at.timestamp(), 2);
    }

    #[test]
    fn latest_survives_unordered_input() {
        let a = UserId::from("a");
        let messages = vec![
            msg(1, "a", "b", 1),
            msg(5, "b", "a", 5),
            msg(2, "a", "b", 2),
            msg(9, "x", "y", 9),
        ];
        let latest = latest_per_counterpart(&a, messages);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, MessageId(Uuid::from_u128(5)));
    }

    #[test]
    fn new_sorts_and_keeps_newest_per_counterpart() {
        let list = ConversationList::new(vec![
            Conversation::new("b".into(), msg(1, "a", "b", 1), None),
            Conversation::new("c".into(), msg(2, "c", "a", 2), None),
            Conversation::new("b".into(), msg(3, "b", "a", 3), None),
        ]);
        assert_eq!(counterparts(&list), vec!["b", "c"]);
        assert_eq!(list.entries()[0].last_message.created_at.timestamp(), 3);
    }

    #[test]
    fn newer_message_updates_in_place() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(2, "b", "a", 2), None);

        let outcome = list.apply_insert(&a, &msg(5, "a", "b", 5), None);
        assert_eq!(outcome, Reconciled::Updated);
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].last_message.created_at.timestamp(), 5);
    }

    #[test]
    fn new_counterpart_goes_to_front() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(1, "a", "b", 1), None);
        let outcome = list.apply_insert(&a, &msg(2, "c", "a", 2), None);

        assert_eq!(outcome, Reconciled::Created);
        assert_eq!(counterparts(&list), vec!["c", "b"]);
    }

    #[test]
    fn touched_conversation_moves_to_front() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(1, "a", "b", 1), None);
        list.apply_insert(&a, &msg(2, "a", "c", 2), None);
        list.apply_insert(&a, &msg(3, "b", "a", 3), None);

        assert_eq!(counterparts(&list), vec!["b", "c"]);
    }

    #[test]
    fn older_message_never_overwrites() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(5, "a", "b", 5), None);

        let outcome = list.apply_insert(&a, &msg(4, "b", "a", 4), None);
        assert_eq!(outcome, Reconciled::Unchanged);
        assert_eq!(list.entries()[0].last_message.id, MessageId(Uuid::from_u128(5)));
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(1, "a", "b", 1), None);
        list.apply_insert(&a, &msg(2, "a", "c", 2), None);

        let m = msg(3, "a", "b", 3);
        list.apply_insert(&a, &m, None);
        let once = list.clone();
        assert_eq!(list.apply_insert(&a, &m, None), Reconciled::Unchanged);
        assert_eq!(list, once);
    }

    #[test]
    fn late_delivery_keeps_order_sorted() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(10, "a", "c", 10), None);
        list.apply_insert(&a, &msg(5, "a", "b", 5), None);
        // Delayed event for a brand new counterpart.
        list.apply_insert(&a, &msg(7, "d", "a", 7), None);
        // Delayed but newer message for b, still older than c.
        list.apply_insert(&a, &msg(8, "b", "a", 8), None);

        assert_eq!(counterparts(&list), vec!["c", "b", "d"]);
        assert_sorted(&list);
    }

    #[test]
    fn order_of_unrelated_events_does_not_matter() {
        let a = UserId::from("a");
        let events = [msg(1, "a", "b", 1), msg(2, "c", "a", 2), msg(3, "a", "d", 3)];

        let mut forward = ConversationList::default();
        for m in &events {
            forward.apply_insert(&a, m, None);
        }
        let mut backward = ConversationList::default();
        for m in events.iter().rev() {
            backward.apply_insert(&a, m, None);
        }
        assert_eq!(forward, backward);
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        let mut list = ConversationList::default();
        let outcome = list.apply_insert(&"a".into(), &msg(1, "x", "y", 1), None);
        assert_eq!(outcome, Reconciled::Ignored);
        assert!(list.is_empty());
    }

    #[test]
    fn missing_profile_is_filled_later() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(1, "a", "b", 1), None);
        let profile = Profile {
            id: "b".into(),
            full_name: Some("Bea".into()),
            avatar_url: None,
        };
        list.apply_insert(&a, &msg(1, "a", "b", 1), Some(profile.clone()));
        assert_eq!(list.entries()[0].counterpart_profile, Some(profile));
    }

    #[test]
    fn equal_timestamps_pick_a_fixed_last_message() {
        let a = UserId::from("a");
        let low = msg(1, "a", "b", 5);
        let high = msg(2, "b", "a", 5);

        let mut forward = ConversationList::default();
        forward.apply_insert(&a, &low, None);
        assert_eq!(forward.apply_insert(&a, &high, None), Reconciled::Updated);
        let mut backward = ConversationList::default();
        backward.apply_insert(&a, &high, None);
        assert_eq!(backward.apply_insert(&a, &low, None), Reconciled::Unchanged);

        assert_eq!(forward, backward);
        assert_eq!(forward.entries()[0].last_message.id, high.id);
    }

    #[test]
    fn last_touched_wins_front_slot_on_timestamp_tie() {
        let a = UserId::from("a");
        let mut list = ConversationList::default();
        list.apply_insert(&a, &msg(2, "a", "b", 5), None);
        list.apply_insert(&a, &msg(1, "a", "c", 5), None);
        assert_eq!(counterparts(&list), vec!["c", "b"]);
        assert_sorted(&list);

        let reloaded = ConversationList::new(list.clone().into_entries());
        assert_eq!(counterparts(&reloaded), vec!["b", "c"]);
    }

    #[test]
    fn merge_keeps_newest_state() {
        let a = UserId::from("a");
        let mut fetched = ConversationList::default();
        fetched.apply_insert(&a, &msg(2, "a", "b", 2), None);

        let mut local = ConversationList::default();
        local.apply_insert(&a, &msg(6, "b", "a", 6), None);
        local.apply_insert(&a, &msg(4, "c", "a", 4), None);

        fetched.merge(&a, local);
        assert_eq!(counterparts(&fetched), vec!["b", "c"]);
        assert_eq!(fetched.entries()[0].last_message.created_at.timestamp(), 6);
    }
}
