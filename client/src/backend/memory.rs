use super::{
    build_message_row, AuthProvider, BackendError, BackendResult, ChangeBus, ChangeFeed,
    ChangeKind, Filter, ObjectStore, Order, RecordStore, Row, RowClock, Session, Subscription,
    SubscriptionHandle, MESSAGES, SEND_MESSAGE,
};
use agora_messaging::UserId;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const OBJECT_URL_BASE: &str = "memory://objects";

#[derive(Default)]
struct Inner {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    bus: ChangeBus,
    clock: RowClock,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// Record store, change feed and object store held entirely in memory.
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    /// Stores a row directly, bypassing call accounting and the change feed.
    pub async fn seed(&self, table: &str, row: Row) {
        self.inner
            .tables
            .write()
            .await
            .entry(table.to_owned())
            .or_default()
            .push(row);
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.objects.read().await.get(path).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.inner.objects.read().await.len()
    }

    /// Number of record store calls served so far.
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn begin_read(&self) -> BackendResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("simulated read failure".into()));
        }
        Ok(())
    }

    fn begin_write(&self) -> BackendResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("simulated write failure".into()));
        }
        Ok(())
    }

    async fn append(&self, table: &str, row: Row) -> Row {
        let mut tables = self.inner.tables.write().await;
        tables.entry(table.to_owned()).or_default().push(row.clone());
        // Publish under the table lock so feed order matches storage order.
        let delivered = self.inner.bus.publish(table, ChangeKind::Insert, &row);
        debug!(table, delivered, "row inserted");
        row
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> BackendResult<Vec<Row>> {
        self.begin_read()?;
        let tables = self.inner.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = order {
            order.sort(&mut rows);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> BackendResult<Row> {
        self.begin_write()?;
        row.entry("id")
            .or_insert_with(|| Uuid::new_v4().to_string().into());
        Ok(self.append(table, row).await)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> BackendResult<Vec<Row>> {
        self.begin_write()?;
        let mut tables = self.inner.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                self.inner.bus.publish(table, ChangeKind::Update, row);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()> {
        self.begin_write()?;
        if let Some(rows) = self.inner.tables.write().await.get_mut(table) {
            rows.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn rpc(&self, routine: &str, args: Row) -> BackendResult<Row> {
        self.begin_write()?;
        match routine {
            SEND_MESSAGE => {
                let row = build_message_row(&args, &self.inner.clock)?;
                Ok(self.append(MESSAGES, row).await)
            }
            other => Err(BackendError::UnknownRoutine(other.to_owned())),
        }
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        table: &str,
        kind: ChangeKind,
        filter: Filter,
    ) -> BackendResult<Subscription> {
        self.inner.bus.register(table, kind, filter)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> BackendResult<()> {
        self.inner.bus.remove(handle)
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> BackendResult<String> {
        self.begin_write()?;
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(BackendError::Rejected("object path must not be empty".into()));
        }
        self.inner.objects.write().await.insert(path.to_owned(), bytes);
        Ok(format!("{OBJECT_URL_BASE}/{path}"))
    }
}

/// Auth provider holding a session set by the caller.
#[derive(Debug, Default)]
pub struct StaticAuth {
    session: StdRwLock<Option<Session>>,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A session for `user` that stays valid for a year.
    pub fn signed_in(user: impl Into<UserId>) -> Self {
        let auth = Self::default();
        auth.set_session(Some(Session {
            user_id: user.into(),
            expires_at: Utc::now() + Duration::days(365),
        }));
        auth
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn sign_out(&self) {
        self.set_session(None);
    }
}

impl AuthProvider for StaticAuth {
    fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
