pub mod config;
pub mod connection;
pub mod core;
pub mod facade;
pub mod identity;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod web;

pub use config::AppConfig;
pub use connection::{Connection, DatabaseConfig, DbHandle, same_handle};
pub use core::{Column, DataType, DbError, Record, Result, TableSchema, Value};
pub use facade::{Database, Migration, MigrationStep, Migrator};
pub use query::{ConnectionExt, Filter, TableQuery};
pub use transaction::{
    DomainTransaction, IsolationLevel, TransactionOptions, Transactional, get_connection,
    run_in_transaction, try_with_transaction, with_transaction,
};
pub use web::{AppState, build_router};
