use super::{
    BackendError, BackendResult, ChangeEvent, ChangeFeed, ChangeKind, Filter, Row, Subscription,
    SubscriptionHandle,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct Subscriber {
    table: String,
    kind: ChangeKind,
    filter: Filter,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// In-process change feed. Stores publish row changes here and every
/// subscriber whose table, kind and filter match receives a copy.
#[derive(Clone, Default)]
pub struct ChangeBus {
    state: Arc<Mutex<BusState>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, BusState>> {
        self.state
            .lock()
            .map_err(|_| BackendError::Subscription("lock poisoned".into()))
    }

    pub fn register(
        &self,
        table: &str,
        kind: ChangeKind,
        filter: Filter,
    ) -> BackendResult<Subscription> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut state = self.lock()?;
        state.next_id += 1;
        let handle = SubscriptionHandle(state.next_id);
        state.subscribers.insert(
            handle.0,
            Subscriber {
                table: table.to_owned(),
                kind,
                filter,
                tx,
            },
        );
        debug!(?handle, table, ?kind, "change feed subscription registered");
        Ok(Subscription { handle, events })
    }

    pub fn remove(&self, handle: SubscriptionHandle) -> BackendResult<()> {
        match self.lock()?.subscribers.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(BackendError::UnknownSubscription(handle)),
        }
    }

    /// Delivers the change to matching subscribers and returns how many got it.
    pub fn publish(&self, table: &str, kind: ChangeKind, row: &Row) -> usize {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, table, "dropping change event");
                return 0;
            }
        };

        let mut delivered = 0;
        state.subscribers.retain(|id, sub| {
            if sub.table != table || sub.kind != kind || !sub.filter.matches(row) {
                return true;
            }
            let event = ChangeEvent {
                table: table.to_owned(),
                kind,
                row: row.clone(),
            };
            match sub.tx.send(event) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(subscription = id, "receiver dropped, removing subscription");
                    false
                }
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|state| state.subscribers.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChangeFeed for ChangeBus {
    async fn subscribe(
        &self,
        table: &str,
        kind: ChangeKind,
        filter: Filter,
    ) -> BackendResult<Subscription> {
        self.register(table, kind, filter)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()> {
        self.remove(handle)
    }
}
