use super::{Change, IsolationLevel, TransactionId, TransactionManager, TransactionState};
use crate::connection::Connection;
use crate::core::{DbError, Record, Result};
use crate::query::Filter;
use crate::storage::{InMemoryStorage, SharedStorage};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A transaction bound to one database.
///
/// Reads and writes go to a private copy of the storage taken at begin.
/// Writes are also logged as row-level [`Change`]s; commit replays the log
/// onto the live storage under its write lock, so other connections see
/// either none or all of the transaction's writes.
pub struct TransactionConnection {
    id: TransactionId,
    database_id: u64,
    isolation: IsolationLevel,
    read_only: bool,
    live: SharedStorage,
    manager: Arc<TransactionManager>,
    lock_timeout: Duration,
    state: Mutex<Workspace>,
}

struct Workspace {
    status: TransactionState,
    /// Storage as it was at begin, kept for conflict checks
    snapshot: InMemoryStorage,
    /// Snapshot plus this transaction's own writes
    storage: InMemoryStorage,
    changes: Vec<Change>,
    touched: HashSet<String>,
    started: Instant,
}

impl TransactionConnection {
    pub(crate) async fn begin(
        database_id: u64,
        live: SharedStorage,
        manager: Arc<TransactionManager>,
        isolation: IsolationLevel,
        read_only: bool,
        lock_timeout: Duration,
    ) -> Self {
        let snapshot = live.read().await.clone();
        let id = manager.begin();
        debug!(transaction = %id, %isolation, read_only, "begin");

        Self {
            id,
            database_id,
            isolation,
            read_only,
            live,
            manager,
            lock_timeout,
            state: Mutex::new(Workspace {
                status: TransactionState::Active,
                storage: snapshot.clone(),
                snapshot,
                changes: Vec::new(),
                touched: HashSet::new(),
                started: Instant::now(),
            }),
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub async fn state(&self) -> TransactionState {
        self.state.lock().await.status
    }

    pub async fn change_count(&self) -> usize {
        self.state.lock().await.changes.len()
    }

    /// Publishes the transaction's writes.
    ///
    /// On failure the transaction is rolled back and the error returned.
    pub async fn commit(&self) -> Result<()> {
        let mut ws = self.state.lock().await;
        self.ensure_active(&ws)?;

        let outcome = self.publish(&ws).await;
        match outcome {
            Ok(()) => {
                ws.status = TransactionState::Committed;
                self.manager.record_commit();
                debug!(
                    transaction = %self.id,
                    changes = ws.changes.len(),
                    elapsed = ?ws.started.elapsed(),
                    "commit"
                );
                Ok(())
            }
            Err(err) => {
                ws.status = TransactionState::RolledBack;
                ws.changes.clear();
                self.manager.record_rollback();
                warn!(transaction = %self.id, error = %err, "commit failed, rolled back");
                Err(err)
            }
        }
    }

    pub async fn rollback(&self) -> Result<()> {
        let mut ws = self.state.lock().await;
        self.ensure_active(&ws)?;

        ws.status = TransactionState::RolledBack;
        let discarded = ws.changes.len();
        ws.changes.clear();
        self.manager.record_rollback();
        debug!(transaction = %self.id, discarded, "rollback");
        Ok(())
    }

    async fn publish(&self, ws: &Workspace) -> Result<()> {
        if ws.changes.is_empty() && self.isolation != IsolationLevel::Serializable {
            return Ok(());
        }

        let mut live = tokio::time::timeout(self.lock_timeout, self.live.write()).await?;

        if self.isolation == IsolationLevel::Serializable {
            for table in &ws.touched {
                if live.table_version(table) != ws.snapshot.table_version(table) {
                    return Err(DbError::SerializationFailure(format!(
                        "table '{}' was modified by a concurrent transaction",
                        table
                    )));
                }
            }
        }

        let mut next = live.clone();
        for change in &ws.changes {
            change.apply(&mut next)?;
        }
        *live = next;
        Ok(())
    }

    fn ensure_active(&self, ws: &Workspace) -> Result<()> {
        if ws.status.is_active() {
            Ok(())
        } else {
            Err(DbError::TransactionClosed(self.id.as_u64()))
        }
    }

    fn ensure_writable(&self, ws: &Workspace) -> Result<()> {
        self.ensure_active(ws)?;
        if self.read_only {
            return Err(DbError::ReadOnlyTransaction(self.id.as_u64()));
        }
        Ok(())
    }
}

impl Drop for TransactionConnection {
    fn drop(&mut self) {
        let ws = self.state.get_mut();
        if ws.status.is_active() {
            warn!(
                transaction = %self.id,
                discarded = ws.changes.len(),
                "transaction dropped while active, rolling back"
            );
            ws.status = TransactionState::RolledBack;
            self.manager.record_rollback();
        }
    }
}

#[async_trait]
impl Connection for TransactionConnection {
    fn id(&self) -> u64 {
        self.id.as_u64()
    }

    fn database_id(&self) -> u64 {
        self.database_id
    }

    fn is_transaction(&self) -> bool {
        true
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record> {
        let mut ws = self.state.lock().await;
        self.ensure_writable(&ws)?;

        let row = ws.storage.table_mut(table)?.insert(record)?;
        ws.touched.insert(table.to_string());
        ws.changes.push(Change::Insert {
            table: table.to_string(),
            row: row.clone(),
        });
        Ok(row)
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        let mut ws = self.state.lock().await;
        self.ensure_active(&ws)?;

        let rows = ws.storage.table(table)?.select(filter)?;
        ws.touched.insert(table.to_string());
        Ok(rows)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Record) -> Result<Vec<Record>> {
        let mut ws = self.state.lock().await;
        self.ensure_writable(&ws)?;

        let updated = ws.storage.table_mut(table)?.update(filter, &changes)?;
        ws.touched.insert(table.to_string());
        for id in updated.iter().filter_map(Record::id) {
            ws.changes.push(Change::Update {
                table: table.to_string(),
                id,
                changes: changes.clone(),
            });
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut ws = self.state.lock().await;
        self.ensure_writable(&ws)?;

        let removed = ws.storage.table_mut(table)?.delete(filter)?;
        ws.touched.insert(table.to_string());
        for row in &removed {
            if let Some(id) = row.id() {
                ws.changes.push(Change::Delete {
                    table: table.to_string(),
                    id,
                });
            }
        }
        Ok(removed.len() as u64)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut ws = self.state.lock().await;
        self.ensure_active(&ws)?;

        let count = ws.storage.table(table)?.count(filter)?;
        ws.touched.insert(table.to_string());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, TableSchema};
    use tokio::sync::RwLock;

    fn live() -> SharedStorage {
        let mut storage = InMemoryStorage::new();
        storage
            .create_table(
                TableSchema::new("accounts")
                    .column(Column::new("owner", DataType::Text).not_null().unique())
                    .column(Column::new("balance", DataType::Integer).default_value(0i64)),
            )
            .unwrap();
        Arc::new(RwLock::new(storage))
    }

    async fn begin(live: &SharedStorage, isolation: IsolationLevel, read_only: bool) -> TransactionConnection {
        TransactionConnection::begin(
            1,
            Arc::clone(live),
            Arc::new(TransactionManager::new()),
            isolation,
            read_only,
            Duration::from_secs(1),
        )
        .await
    }

    async fn live_count(live: &SharedStorage) -> usize {
        live.read().await.row_count("accounts").unwrap()
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let live = live();
        let tx = begin(&live, IsolationLevel::ReadCommitted, false).await;

        tx.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();
        assert_eq!(tx.count("accounts", &Filter::all()).await.unwrap(), 1);
        assert_eq!(live_count(&live).await, 0);

        tx.commit().await.unwrap();
        assert_eq!(live_count(&live).await, 1);
        assert_eq!(tx.state().await, TransactionState::Committed);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let live = live();
        let tx = begin(&live, IsolationLevel::ReadCommitted, false).await;
        tx.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();

        tx.rollback().await.unwrap();
        assert_eq!(live_count(&live).await, 0);

        let err = tx.select("accounts", &Filter::all()).await.unwrap_err();
        assert_eq!(err, DbError::TransactionClosed(tx.id()));
        assert!(tx.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let live = live();
        let tx = begin(&live, IsolationLevel::ReadCommitted, true).await;

        let err = tx
            .insert("accounts", Record::new().with("owner", "ada"))
            .await
            .unwrap_err();
        assert_eq!(err, DbError::ReadOnlyTransaction(tx.id()));
        assert!(tx.select("accounts", &Filter::all()).await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_serializable_conflict() {
        let live = live();
        let first = begin(&live, IsolationLevel::Serializable, false).await;
        let second = begin(&live, IsolationLevel::Serializable, false).await;

        first.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();
        second.insert("accounts", Record::new().with("owner", "bob")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, DbError::SerializationFailure(_)));
        assert_eq!(second.state().await, TransactionState::RolledBack);
        assert_eq!(live_count(&live).await, 1);
    }

    #[tokio::test]
    async fn test_read_committed_merges_disjoint_writes() {
        let live = live();
        let first = begin(&live, IsolationLevel::ReadCommitted, false).await;
        let second = begin(&live, IsolationLevel::ReadCommitted, false).await;

        first.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();
        second.insert("accounts", Record::new().with("owner", "bob")).await.unwrap();

        first.commit().await.unwrap();
        second.commit().await.unwrap();
        assert_eq!(live_count(&live).await, 2);
    }

    #[tokio::test]
    async fn test_conflicting_unique_value_fails_on_commit() {
        let live = live();
        let first = begin(&live, IsolationLevel::ReadCommitted, false).await;
        let second = begin(&live, IsolationLevel::ReadCommitted, false).await;

        first.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();
        second.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert_eq!(err.violated_unique_column(), Some("owner"));
        assert_eq!(live_count(&live).await, 1);
    }

    #[tokio::test]
    async fn test_commit_keeps_columns_written_concurrently() {
        let live = live();
        {
            let mut storage = live.write().await;
            storage
                .table_mut("accounts")
                .unwrap()
                .insert(Record::new().with("owner", "ada"))
                .unwrap();
        }
        let tx = begin(&live, IsolationLevel::ReadCommitted, false).await;
        tx.update("accounts", &Filter::eq("owner", "ada"), Record::new().with("balance", 5i64))
            .await
            .unwrap();

        // committed by another connection while the transaction is open
        live.write()
            .await
            .table_mut("accounts")
            .unwrap()
            .update(&Filter::eq("owner", "ada"), &Record::new().with("owner", "ada lovelace"))
            .unwrap();

        tx.commit().await.unwrap();
        let rows = live.read().await.table("accounts").unwrap().select(&Filter::all()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("owner"), Some("ada lovelace"));
        assert_eq!(rows[0].get_i64("balance"), Some(5));
    }

    #[tokio::test]
    async fn test_dropping_active_transaction_rolls_back() {
        let live = live();
        let manager = Arc::new(TransactionManager::new());
        {
            let tx = TransactionConnection::begin(
                1,
                Arc::clone(&live),
                Arc::clone(&manager),
                IsolationLevel::ReadCommitted,
                false,
                Duration::from_secs(1),
            )
            .await;
            tx.insert("accounts", Record::new().with("owner", "ada")).await.unwrap();
        }
        assert_eq!(live_count(&live).await, 0);
        assert_eq!(manager.stats().rolled_back, 1);
        assert_eq!(manager.stats().active, 0);
    }
}
