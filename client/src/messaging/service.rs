use super::{
    latest_per_counterpart, ConversationList, MessagingError, MessagingState, Reconciliation,
    Result, SharedState, Thread,
};
use crate::backend::{
    from_row, to_row, AuthProvider, Filter, Order, RecordStore, Row, MESSAGES, NOTIFICATIONS,
    SEND_MESSAGE,
};
use crate::profiles::ProfileCache;
use agora_messaging::{
    ArgumentError, Conversation, Message, Notification, OutgoingMessage, UserId,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Derives and maintains the conversation list and the open thread for the
/// signed-in user.
///
/// Clones share the same state, so the realtime bridge and request handlers
/// can each hold one.
#[derive(Clone)]
pub struct Messenger {
    records: Arc<dyn RecordStore>,
    auth: Arc<dyn AuthProvider>,
    profiles: ProfileCache,
    state: SharedState,
}

fn decode_messages(rows: Vec<Row>) -> Result<Vec<Message>> {
    rows.into_iter()
        .map(|row| from_row(row).map_err(MessagingError::Fetch))
        .collect()
}

impl Messenger {
    pub fn new(records: Arc<dyn RecordStore>, auth: Arc<dyn AuthProvider>) -> Self {
        let profiles = ProfileCache::new(Arc::clone(&records));
        Self {
            records,
            auth,
            profiles,
            state: MessagingState::shared(),
        }
    }

    /// Uses an externally owned state container.
    pub fn with_state(mut self, state: SharedState) -> Self {
        self.state = state;
        self
    }

    pub fn with_profile_cache(mut self, profiles: ProfileCache) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    pub fn current_user(&self) -> Result<UserId> {
        self.auth
            .current_user()
            .ok_or(MessagingError::NotAuthenticated)
    }

    /// Fetches every message involving `user` and derives one conversation
    /// per counterpart, newest first. On failure the previously derived list
    /// is left untouched.
    pub async fn load_conversations(&self, user: &UserId) -> Result<Vec<Conversation>> {
        if user.is_blank() {
            return Err(ArgumentError::EmptyUserId.into());
        }

        let filter =
            Filter::eq("sender_id", user.as_str()).or(Filter::eq("recipient_id", user.as_str()));
        let rows = self
            .records
            .query(MESSAGES, &filter, Some(&Order::desc("created_at")))
            .await
            .map_err(MessagingError::Fetch)?;
        let messages = decode_messages(rows)?;
        let fetched = messages.len();
        let latest = latest_per_counterpart(user, messages);

        let lookups = latest.iter().map(|message| {
            let counterpart = message.counterpart(user).clone();
            async move {
                let profile = self.profiles.lookup(&counterpart).await;
                (counterpart, profile)
            }
        });
        let mut profiles: HashMap<UserId, _> = join_all(lookups).await.into_iter().collect();

        let conversations = latest
            .into_iter()
            .map(|message| {
                let counterpart = message.counterpart(user).clone();
                let profile = profiles.remove(&counterpart).flatten();
                Conversation::new(counterpart, message, profile)
            })
            .collect();

        let mut state = self.state.write().await;
        state.install_conversations(user, ConversationList::new(conversations));
        let snapshot = state.conversations().entries().to_vec();
        info!(%user, fetched, conversations = snapshot.len(), "conversations loaded");
        Ok(snapshot)
    }

    /// Fetches the full history with `counterpart`, oldest first, and makes
    /// it the active thread. An empty history is not an error.
    pub async fn load_thread(&self, user: &UserId, counterpart: &UserId) -> Result<Vec<Message>> {
        if user.is_blank() {
            return Err(ArgumentError::EmptyUserId.into());
        }
        if counterpart.is_blank() {
            return Err(ArgumentError::EmptyRecipient.into());
        }

        let filter = Filter::eq("sender_id", user.as_str())
            .and_eq("recipient_id", counterpart.as_str())
            .or(Filter::eq("sender_id", counterpart.as_str())
                .and_eq("recipient_id", user.as_str()));
        let rows = self
            .records
            .query(MESSAGES, &filter, Some(&Order::asc("created_at")))
            .await
            .map_err(MessagingError::Fetch)?;
        let thread = Thread::new(user.clone(), counterpart.clone(), decode_messages(rows)?);

        let mut state = self.state.write().await;
        state.install_thread(thread);
        let messages = state
            .thread()
            .map(|t| t.messages().to_vec())
            .unwrap_or_default();
        debug!(%user, %counterpart, messages = messages.len(), "thread loaded");
        Ok(messages)
    }

    /// Sends a direct message as the signed-in user.
    ///
    /// Arguments are validated before any backend call. On success the
    /// recipient is notified and the message is reconciled into local state
    /// straight away, without waiting for the change feed echo.
    pub async fn send(&self, recipient: &UserId, content: &str) -> Result<Message> {
        let sender = self.current_user()?;
        let draft = OutgoingMessage::new(sender, recipient.clone(), content)?;

        let args = to_row(&draft).map_err(MessagingError::Persistence)?;
        let row = self
            .records
            .rpc(SEND_MESSAGE, args)
            .await
            .map_err(MessagingError::Persistence)?;
        let message: Message = from_row(row).map_err(MessagingError::Persistence)?;
        info!(message_id = %message.id, recipient = %message.recipient_id, "message sent");

        self.notify_recipient(&message).await;
        self.on_message_inserted(&message, &draft.sender_id).await;
        Ok(message)
    }

    async fn notify_recipient(&self, message: &Message) {
        let row = match to_row(&Notification::for_message(message)) {
            Ok(row) => row,
            Err(err) => {
                warn!(%err, message_id = %message.id, "failed to encode notification");
                return;
            }
        };
        if let Err(err) = self.records.insert(NOTIFICATIONS, row).await {
            warn!(%err, message_id = %message.id, "failed to store notification");
        }
    }

    /// Reconciles a newly known message, from a local send or a push event.
    /// Safe to repeat and to apply in any order across counterparts.
    pub async fn on_message_inserted(&self, message: &Message, user: &UserId) -> Reconciliation {
        let counterpart = message.counterpart(user);
        let known = self.state.read().await.conversations().contains(counterpart);
        let profile = if known || !message.involves(user) {
            None
        } else {
            self.profiles.lookup(counterpart).await
        };

        let outcome = self.state.write().await.reconcile(user, message, profile);
        debug!(
            message_id = %message.id,
            %counterpart,
            conversation = ?outcome.conversation,
            thread_extended = outcome.thread_extended,
            "message reconciled"
        );
        outcome
    }

    /// Extends the active thread when it is the one with `active_counterpart`.
    pub async fn on_message_inserted_for_thread(
        &self,
        message: &Message,
        active_counterpart: &UserId,
    ) -> bool {
        self.state
            .write()
            .await
            .reconcile_thread(message, active_counterpart)
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.read().await.conversations().entries().to_vec()
    }

    pub async fn active_thread(&self) -> Option<Thread> {
        self.state.read().await.thread().cloned()
    }

    pub async fn close_thread(&self) {
        self.state.write().await.close_thread();
    }
}
