use super::Table;
use crate::core::{Column, DbError, Result, TableSchema};

/// The full set of tables.
///
/// Cloning is O(1): transactions take their snapshot by cloning the live
/// storage and write into the clone.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: im::HashMap<String, Table>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создать таблицу
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }
        self.tables.insert(name, Table::new(schema));
        Ok(())
    }

    /// Удалить таблицу
    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        if self.tables.remove(table_name).is_none() {
            return Err(DbError::TableNotFound(table_name.to_string()));
        }
        Ok(())
    }

    pub fn add_column(&mut self, table_name: &str, column: Column) -> Result<()> {
        self.table_mut(table_name)?.add_column(column)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Проверить существование таблицы
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Список таблиц, отсортированный по имени
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        Ok(self.table(table_name)?.row_count())
    }

    /// Version of a table, `None` once the table has been dropped.
    pub fn table_version(&self, table_name: &str) -> Option<u64> {
        self.tables.get(table_name).map(Table::version)
    }
}
