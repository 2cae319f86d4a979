//! Seams to the hosted backend: record store, change feed, auth and object storage.

mod feed;
mod filter;
mod memory;
mod routines;

pub use feed::ChangeBus;
pub use filter::{Filter, Order};
pub use memory::{MemoryBackend, StaticAuth};
pub use routines::SEND_MESSAGE;

use agora_messaging::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

pub(crate) use routines::{build_message_row, RowClock};

/// A single table row as exchanged with the backend.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub const MESSAGES: &str = "messages";
pub const PROFILES: &str = "profiles";
pub const NOTIFICATIONS: &str = "notifications";

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unknown routine: {0}")]
    UnknownRoutine(String),
    #[error("malformed row: {0}")]
    MalformedRow(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("subscription error: {0}")]
    Subscription(String),
    #[error("unknown subscription {0:?}")]
    UnknownSubscription(SubscriptionHandle),
}

/// Generic row access by table name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> BackendResult<Vec<Row>>;

    async fn insert(&self, table: &str, row: Row) -> BackendResult<Row>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> BackendResult<Vec<Row>>;

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()>;

    /// Invokes a server-side routine atomically.
    async fn rpc(&self, routine: &str, args: Row) -> BackendResult<Row>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub row: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// An active change-feed subscription. Events arrive on `events` until the
/// handle is unsubscribed.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Row-level push notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        table: &str,
        kind: ChangeKind,
        filter: Filter,
    ) -> BackendResult<Subscription>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.user_id.is_blank() && now < self.expires_at
    }
}

pub trait AuthProvider: Send + Sync {
    fn session(&self) -> Option<Session>;

    /// The authenticated user, if the session is still valid.
    fn current_user(&self) -> Option<UserId> {
        self.session()
            .filter(|session| session.is_valid_at(Utc::now()))
            .map(|session| session.user_id)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `path` and returns a public URL for it.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> BackendResult<String>;
}

pub fn to_row<T: Serialize>(value: &T) -> BackendResult<Row> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(row)) => Ok(row),
        Ok(other) => Err(BackendError::MalformedRow(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(BackendError::MalformedRow(e.to_string())),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> BackendResult<T> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| BackendError::MalformedRow(e.to_string()))
}
