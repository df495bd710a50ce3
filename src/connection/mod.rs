pub mod config;
pub mod direct;

use crate::core::{Record, Result};
use crate::query::Filter;
use async_trait::async_trait;
use std::sync::Arc;

pub use config::DatabaseConfig;
pub use direct::DirectConnection;

/// Anything repository code can run queries against.
///
/// Both the auto-commit default connection and an in-progress transaction
/// implement this trait, so a repository never needs to know which of the
/// two it was handed.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Connection id, or the transaction id for a transaction handle.
    fn id(&self) -> u64;

    /// Id of the database this connection belongs to.
    fn database_id(&self) -> u64;

    fn is_transaction(&self) -> bool;

    /// Inserts one row and returns it with its id and defaults filled in.
    async fn insert(&self, table: &str, record: Record) -> Result<Record>;

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>>;

    /// Applies `changes` to every row matching `filter`, returning the new rows.
    async fn update(&self, table: &str, filter: &Filter, changes: Record) -> Result<Vec<Record>>;

    /// Returns the number of deleted rows.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64>;

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        Ok(self.select(table, filter).await?.len() as u64)
    }
}

/// Shared handle to a connection or transaction.
pub type DbHandle = Arc<dyn Connection>;

/// True when both handles point at the same connection object.
pub fn same_handle(a: &DbHandle, b: &DbHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
