use super::Connection;
use crate::core::{Record, Result};
use crate::query::Filter;
use crate::storage::{InMemoryStorage, SharedStorage};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLockWriteGuard;
use tracing::trace;

/// The default connection: every operation commits on its own.
pub struct DirectConnection {
    id: u64,
    database_id: u64,
    storage: SharedStorage,
    lock_timeout: Duration,
}

impl DirectConnection {
    pub(crate) fn new(id: u64, database_id: u64, storage: SharedStorage, lock_timeout: Duration) -> Self {
        Self {
            id,
            database_id,
            storage,
            lock_timeout,
        }
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, InMemoryStorage>> {
        Ok(tokio::time::timeout(self.lock_timeout, self.storage.write()).await?)
    }
}

#[async_trait]
impl Connection for DirectConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn database_id(&self) -> u64 {
        self.database_id
    }

    fn is_transaction(&self) -> bool {
        false
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record> {
        let mut storage = self.write().await?;
        let row = storage.table_mut(table)?.insert(record)?;
        trace!(connection = self.id, table, id = ?row.id(), "insert");
        Ok(row)
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        let storage = self.storage.read().await;
        storage.table(table)?.select(filter)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Record) -> Result<Vec<Record>> {
        let mut storage = self.write().await?;
        let updated = storage.table_mut(table)?.update(filter, &changes)?;
        trace!(connection = self.id, table, %filter, rows = updated.len(), "update");
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut storage = self.write().await?;
        let removed = storage.table_mut(table)?.delete(filter)?;
        trace!(connection = self.id, table, %filter, rows = removed.len(), "delete");
        Ok(removed.len() as u64)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let storage = self.storage.read().await;
        storage.table(table)?.count(filter)
    }
}
