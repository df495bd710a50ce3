// ============================================================================
// Transaction Change Log
// ============================================================================
//
// Every write made inside a transaction is recorded as a row-level Change.
// COMMIT replays the log onto the live storage; ROLLBACK drops it.
//
// ============================================================================

use crate::core::{Record, Result};
use crate::storage::InMemoryStorage;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Row inserted with its assigned id
    Insert { table: String, row: Record },

    /// Columns written to an existing row
    Update { table: String, id: i64, changes: Record },

    /// Row deleted by id
    Delete { table: String, id: i64 },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::Insert { table, .. } => table,
            Change::Update { table, .. } => table,
            Change::Delete { table, .. } => table,
        }
    }

    /// Replays this change onto `storage`.
    pub fn apply(&self, storage: &mut InMemoryStorage) -> Result<()> {
        let table = storage.table_mut(self.table_name())?;
        match self {
            Change::Insert { row, .. } => table.insert(row.clone()).map(|_| ()),
            Change::Update { id, changes, .. } => table.patch(*id, changes).map(|_| ()),
            Change::Delete { id, .. } => {
                table.remove(*id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, DbError, TableSchema};
    use crate::query::Filter;

    fn storage() -> InMemoryStorage {
        let mut storage = InMemoryStorage::new();
        storage
            .create_table(TableSchema::new("items").column(Column::new("name", DataType::Text)))
            .unwrap();
        storage
    }

    #[test]
    fn test_replay_insert_update_delete() {
        let mut storage = storage();
        let row = Record::new().with("id", 10i64).with("name", "pen");

        Change::Insert { table: "items".into(), row: row.clone() }
            .apply(&mut storage)
            .unwrap();
        Change::Update {
            table: "items".into(),
            id: 10,
            changes: Record::new().with("name", "pencil"),
        }
        .apply(&mut storage)
        .unwrap();

        let rows = storage.table("items").unwrap().select(&Filter::all()).unwrap();
        assert_eq!(rows[0].get_str("name"), Some("pencil"));

        Change::Delete { table: "items".into(), id: 10 }
            .apply(&mut storage)
            .unwrap();
        assert_eq!(storage.row_count("items").unwrap(), 0);
    }

    #[test]
    fn test_update_of_vanished_row_fails() {
        let mut storage = storage();
        let err = Change::Update {
            table: "items".into(),
            id: 1,
            changes: Record::new().with("name", "ghost"),
        }
        .apply(&mut storage)
        .unwrap_err();
        assert!(matches!(err, DbError::SerializationFailure(_)));
    }
}
