use super::{ConversationList, Reconciled, Thread};
use agora_messaging::{Message, Profile, UserId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the derived messaging state. Writers hold the lock for
/// one synchronous reconciliation step at a time.
pub type SharedState = Arc<RwLock<MessagingState>>;

/// Result of reconciling one message against the whole state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub conversation: Reconciled,
    pub thread_extended: bool,
}

/// Client-side derived state: the conversation list and the open thread.
#[derive(Debug, Default)]
pub struct MessagingState {
    owner: Option<UserId>,
    conversations: ConversationList,
    thread: Option<Thread>,
}

impl MessagingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    /// The user the current conversation list was derived for.
    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn conversations(&self) -> &ConversationList {
        &self.conversations
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn active_counterpart(&self) -> Option<&UserId> {
        self.thread.as_ref().map(Thread::counterpart)
    }

    /// Installs a freshly fetched list. Anything reconciled for the same
    /// user while the fetch was in flight is merged back in, so a fetch
    /// never rolls the list back.
    pub fn install_conversations(&mut self, user: &UserId, mut fetched: ConversationList) {
        if self.owner.as_ref() == Some(user) {
            let previous = std::mem::take(&mut self.conversations);
            fetched.merge(user, previous);
        }
        if self.thread.as_ref().is_some_and(|t| t.user() != user) {
            self.thread = None;
        }
        self.owner = Some(user.clone());
        self.conversations = fetched;
    }

    /// Opens `fetched` as the active thread, keeping messages already
    /// applied to an open thread for the same pair.
    pub fn install_thread(&mut self, mut fetched: Thread) {
        if let Some(previous) = self.thread.take() {
            if previous.user() == fetched.user() && previous.counterpart() == fetched.counterpart()
            {
                for message in previous.messages() {
                    fetched.apply_insert(message);
                }
            }
        }
        self.thread = Some(fetched);
    }

    pub fn close_thread(&mut self) -> Option<Thread> {
        self.thread.take()
    }

    /// Applies a newly observed message to the conversation list and, when
    /// it belongs to the open thread, to the thread as well.
    pub fn reconcile(
        &mut self,
        user: &UserId,
        message: &Message,
        profile: Option<Profile>,
    ) -> Reconciliation {
        if self.owner.is_none() {
            self.owner = Some(user.clone());
        }
        let conversation = if self.owner.as_ref() == Some(user) {
            self.conversations.apply_insert(user, message, profile)
        } else {
            Reconciled::Ignored
        };

        let thread_extended = match self.thread.as_mut() {
            Some(thread) if thread.user() == user => thread.apply_insert(message),
            _ => false,
        };

        Reconciliation {
            conversation,
            thread_extended,
        }
    }

    /// Extends the open thread if it is the one with `active_counterpart`.
    pub fn reconcile_thread(&mut self, message: &Message, active_counterpart: &UserId) -> bool {
        match self.thread.as_mut() {
            Some(thread) if thread.counterpart() == active_counterpart => {
                thread.apply_insert(message)
            }
            _ => false,
        }
    }
}
