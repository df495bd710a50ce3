use crate::connection::{DatabaseConfig, DbHandle, DirectConnection};
use crate::core::{Column, Result, TableSchema};
use crate::storage::{InMemoryStorage, SharedStorage};
use crate::transaction::{TransactionConnection, TransactionManager, TransactionOptions, TransactionStats};
use lazy_static::lazy_static;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

// Global singleton instance backing the free-function transaction API
lazy_static! {
    static ref GLOBAL_DB: Arc<Database> = Arc::new(Database::new(DatabaseConfig::default()));
}

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

/// An in-memory database: live storage, a shared default connection and a
/// transaction manager.
pub struct Database {
    id: u64,
    config: DatabaseConfig,
    storage: SharedStorage,
    transaction_manager: Arc<TransactionManager>,
    default_connection: DbHandle,
}

impl Database {
    /// Get the global database instance
    ///
    /// Shared by every caller of the free `run_in_transaction` /
    /// `get_connection` functions.
    pub fn global() -> Arc<Database> {
        Arc::clone(&GLOBAL_DB)
    }

    pub fn new(config: DatabaseConfig) -> Self {
        let id = NEXT_DATABASE_ID.fetch_add(1, Ordering::SeqCst);
        let storage: SharedStorage = Arc::new(RwLock::new(InMemoryStorage::new()));
        let default_connection: DbHandle = Arc::new(DirectConnection::new(
            0,
            id,
            Arc::clone(&storage),
            config.lock_timeout,
        ));
        debug!(database = %config.name, id, "database created");

        Self {
            id,
            config,
            storage,
            transaction_manager: Arc::new(TransactionManager::new()),
            default_connection,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The shared auto-commit connection.
    pub fn connection(&self) -> DbHandle {
        Arc::clone(&self.default_connection)
    }

    /// Begins a transaction. Without options the configured isolation is used.
    pub async fn begin(&self, options: Option<TransactionOptions>) -> Result<TransactionConnection> {
        let options = options.unwrap_or_default();
        Ok(TransactionConnection::begin(
            self.id,
            Arc::clone(&self.storage),
            Arc::clone(&self.transaction_manager),
            options.isolation.unwrap_or(self.config.isolation),
            options.read_only,
            self.config.lock_timeout,
        )
        .await)
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        self.storage.write().await.create_table(schema)?;
        info!(database = %self.config.name, table = %name, "table created");
        Ok(())
    }

    /// Returns whether the table was created.
    pub async fn create_table_if_not_exists(&self, schema: TableSchema) -> Result<bool> {
        let mut storage = self.storage.write().await;
        if storage.table_exists(schema.name()) {
            return Ok(false);
        }
        storage.create_table(schema)?;
        Ok(true)
    }

    pub async fn drop_table(&self, name: &str) -> Result<()> {
        self.storage.write().await.drop_table(name)?;
        info!(database = %self.config.name, table = %name, "table dropped");
        Ok(())
    }

    pub async fn add_column(&self, table: &str, column: Column) -> Result<()> {
        let column_name = column.name.clone();
        self.storage.write().await.add_column(table, column)?;
        info!(database = %self.config.name, table, column = %column_name, "column added");
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.storage.read().await.table_exists(name)
    }

    pub async fn list_tables(&self) -> Vec<String> {
        self.storage.read().await.list_tables()
    }

    pub async fn table_stats(&self, name: &str) -> Result<TableStats> {
        let storage = self.storage.read().await;
        let table = storage.table(name)?;

        Ok(TableStats {
            name: name.to_string(),
            column_count: table.schema().column_count(),
            row_count: table.row_count(),
        })
    }

    pub fn stats(&self) -> TransactionStats {
        self.transaction_manager.stats()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}

#[derive(Debug)]
pub struct TableStats {
    pub name: String,
    pub column_count: usize,
    pub row_count: usize,
}

impl std::fmt::Display for TableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Table '{}': {} columns, {} rows",
            self.name, self.column_count, self.row_count
        )
    }
}
