//! Bridges change-feed push events into messaging reconciliation.

use crate::backend::{
    from_row, ChangeFeed, ChangeKind, Filter, Subscription, SubscriptionHandle, MESSAGES,
};
use crate::messaging::{MessagingError, Messenger};
use agora_messaging::{Message, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Listens for messages addressed to one user and reconciles each into
/// the messenger's state.
pub struct RealtimeBridge {
    feed: Arc<dyn ChangeFeed>,
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

impl RealtimeBridge {
    pub async fn start(
        messenger: Messenger,
        feed: Arc<dyn ChangeFeed>,
        user: UserId,
    ) -> Result<Self, MessagingError> {
        let filter = Filter::eq("recipient_id", user.as_str());
        let Subscription { handle, mut events } = feed
            .subscribe(MESSAGES, ChangeKind::Insert, filter)
            .await
            .map_err(MessagingError::Subscription)?;
        info!(%user, ?handle, "listening for incoming messages");

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match from_row::<Message>(event.row) {
                    Ok(message) => {
                        messenger.on_message_inserted(&message, &user).await;
                    }
                    Err(err) => warn!(%err, "ignoring malformed message event"),
                }
            }
            debug!(%user, "change feed closed");
        });

        Ok(Self { feed, handle, task })
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Unsubscribes and waits for queued events to drain. Unsubscribe
    /// failures are logged and the listener is stopped regardless.
    pub async fn shutdown(self) {
        let RealtimeBridge { feed, handle, task } = self;
        if let Err(err) = feed.unsubscribe(handle).await {
            warn!(%err, ?handle, "failed to unsubscribe from change feed");
            task.abort();
        }
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                warn!(%err, "realtime listener ended abnormally");
            }
        }
    }
}
