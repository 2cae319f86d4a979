//! Conversation list and thread derivation over the `messages` table.

mod conversations;
mod service;
mod state;
mod thread;

pub use conversations::{latest_per_counterpart, ConversationList, Reconciled};
pub use service::Messenger;
pub use state::{MessagingState, Reconciliation, SharedState};
pub use thread::Thread;

use crate::backend::BackendError;
use agora_messaging::ArgumentError;

/// Errors surfaced by messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("no valid session")]
    NotAuthenticated,
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),
    #[error("fetch failed: {0}")]
    Fetch(BackendError),
    #[error("persistence failed: {0}")]
    Persistence(BackendError),
    #[error("subscription failed: {0}")]
    Subscription(BackendError),
}

impl MessagingError {
    pub fn is_invalid_recipient(&self) -> bool {
        matches!(self, Self::InvalidArgument(arg) if arg.is_invalid_recipient())
    }
}

pub type Result<T> = std::result::Result<T, MessagingError>;
