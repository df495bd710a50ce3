use super::{Filter, Operator};
use crate::connection::DbHandle;
use crate::core::{Record, Result, Value};
use std::sync::Arc;

/// Fluent query over one table of a connection.
///
/// ```ignore
/// let user = get_connection()
///     .table("users")
///     .where_eq("email", "john@example.com")
///     .first()
///     .await?;
/// ```
pub struct TableQuery {
    conn: DbHandle,
    table: String,
    filter: Filter,
}

impl TableQuery {
    pub fn new(conn: DbHandle, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            filter: Filter::new(),
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and_eq(column, value);
        self
    }

    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.filter = self.filter.and(column, operator, value);
        self
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.filter(column, Operator::IsNull, Value::Null)
    }

    pub async fn all(self) -> Result<Vec<Record>> {
        self.conn.select(&self.table, &self.filter).await
    }

    pub async fn first(self) -> Result<Option<Record>> {
        Ok(self.all().await?.into_iter().next())
    }

    pub async fn count(self) -> Result<u64> {
        self.conn.count(&self.table, &self.filter).await
    }

    pub async fn insert(self, record: Record) -> Result<Record> {
        self.conn.insert(&self.table, record).await
    }

    /// Returns the updated rows.
    pub async fn update(self, changes: Record) -> Result<Vec<Record>> {
        self.conn.update(&self.table, &self.filter, changes).await
    }

    /// Returns the number of deleted rows.
    pub async fn delete(self) -> Result<u64> {
        self.conn.delete(&self.table, &self.filter).await
    }
}

pub trait ConnectionExt {
    fn table(&self, name: &str) -> TableQuery;
}

impl ConnectionExt for DbHandle {
    fn table(&self, name: &str) -> TableQuery {
        TableQuery::new(Arc::clone(self), name)
    }
}
