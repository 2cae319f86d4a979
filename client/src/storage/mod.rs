//! Durable record store on sled, used by the `agora` binary.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{
    build_message_row, BackendError, BackendResult, ChangeBus, ChangeKind, Filter, Order,
    RecordStore, Row, RowClock, MESSAGES, SEND_MESSAGE,
};

/// One sled tree per table. Keys are sled-generated sequence numbers, so a
/// scan returns rows in insertion order; values are JSON rows.
#[derive(Clone)]
pub struct SledRecordStore {
    db: sled::Db,
    bus: Option<ChangeBus>,
    clock: Arc<RowClock>,
}

fn storage_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::Storage(err.to_string())
}

impl SledRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create storage directory {:?}", path))?;
        let db = sled::open(path)
            .with_context(|| format!("failed to open sled database at {:?}", path))?;
        Ok(Self {
            db,
            bus: None,
            clock: Arc::new(RowClock::default()),
        })
    }

    /// Publishes every insert and update to `bus`.
    pub fn with_change_bus(mut self, bus: ChangeBus) -> Self {
        self.bus = Some(bus);
        self
    }

    fn tree(&self, table: &str) -> BackendResult<sled::Tree> {
        self.db.open_tree(table).map_err(storage_error)
    }

    fn scan(&self, tree: &sled::Tree) -> BackendResult<Vec<(sled::IVec, Row)>> {
        let mut rows = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry.map_err(storage_error)?;
            let row: Row = serde_json::from_slice(&value)
                .map_err(|e| BackendError::MalformedRow(e.to_string()))?;
            rows.push((key, row));
        }
        Ok(rows)
    }

    fn write(&self, tree: &sled::Tree, key: &[u8], row: &Row) -> BackendResult<()> {
        let encoded = serde_json::to_vec(row).map_err(storage_error)?;
        tree.insert(key, encoded).map_err(storage_error)?;
        Ok(())
    }

    fn append(&self, table: &str, row: Row) -> BackendResult<Row> {
        let tree = self.tree(table)?;
        let seq = self.db.generate_id().map_err(storage_error)?;
        self.write(&tree, &seq.to_be_bytes(), &row)?;
        tree.flush().map_err(storage_error)?;
        if let Some(bus) = &self.bus {
            bus.publish(table, ChangeKind::Insert, &row);
        }
        debug!(table, seq, "row stored");
        Ok(row)
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn query(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> BackendResult<Vec<Row>> {
        let tree = self.tree(table)?;
        let mut rows: Vec<Row> = self
            .scan(&tree)?
            .into_iter()
            .map(|(_, row)| row)
            .filter(|row| filter.matches(row))
            .collect();
        if let Some(order) = order {
            order.sort(&mut rows);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> BackendResult<Row> {
        row.entry("id")
            .or_insert_with(|| Uuid::new_v4().to_string().into());
        self.append(table, row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> BackendResult<Vec<Row>> {
        let tree = self.tree(table)?;
        let mut updated = Vec::new();
        for (key, mut row) in self.scan(&tree)? {
            if !filter.matches(&row) {
                continue;
            }
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            self.write(&tree, &key, &row)?;
            if let Some(bus) = &self.bus {
                bus.publish(table, ChangeKind::Update, &row);
            }
            updated.push(row);
        }
        tree.flush().map_err(storage_error)?;
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> BackendResult<()> {
        let tree = self.tree(table)?;
        for (key, row) in self.scan(&tree)? {
            if filter.matches(&row) {
                tree.remove(key).map_err(storage_error)?;
            }
        }
        tree.flush().map_err(storage_error)?;
        Ok(())
    }

    async fn rpc(&self, routine: &str, args: Row) -> BackendResult<Row> {
        match routine {
            SEND_MESSAGE => {
                let row = build_message_row(&args, &self.clock)?;
                self.append(MESSAGES, row)
            }
            other => Err(BackendError::UnknownRoutine(other.to_owned())),
        }
    }
}
