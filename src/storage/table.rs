use crate::core::{DbError, PRIMARY_KEY, Record, Result, TableSchema, Column, Value};
use crate::query::Filter;
use im::OrdMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A table: schema plus rows keyed by primary key.
///
/// Rows live in a persistent map so cloning a table (and therefore a whole
/// storage snapshot) shares structure instead of copying rows. The id
/// sequence is shared by every clone, so ids handed out inside one
/// transaction never collide with ids from another, and are never reused.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: OrdMap<i64, Record>,
    sequence: Arc<AtomicI64>,
    version: u64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: OrdMap::new(),
            sequence: Arc::new(AtomicI64::new(0)),
            version: 0,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Bumped on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, id: i64) -> Option<&Record> {
        self.rows.get(&id)
    }

    pub fn insert(&mut self, record: Record) -> Result<Record> {
        let mut row = self.prepare_row(record)?;

        let id = match row.get(PRIMARY_KEY) {
            Some(Value::Integer(id)) => {
                self.sequence.fetch_max(*id, Ordering::SeqCst);
                *id
            }
            Some(other) if !other.is_null() => {
                return Err(DbError::TypeMismatch(format!(
                    "Column '{}' expects type INTEGER, got {}",
                    PRIMARY_KEY,
                    other.type_name()
                )));
            }
            _ => self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };
        row.set(PRIMARY_KEY, id);

        if self.rows.contains_key(&id) {
            return Err(unique_violation(PRIMARY_KEY, &Value::Integer(id)));
        }
        check_uniqueness(&self.schema, &self.rows, &row, id)?;

        self.rows.insert(id, row.clone());
        self.version += 1;
        Ok(row)
    }

    pub fn select(&self, filter: &Filter) -> Result<Vec<Record>> {
        self.check_filter(filter)?;
        let mut matched = Vec::new();
        for row in self.rows.values() {
            if filter.matches(row)? {
                matched.push(row.clone());
            }
        }
        Ok(matched)
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        self.check_filter(filter)?;
        let mut count = 0;
        for row in self.rows.values() {
            if filter.matches(row)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Applies `changes` to every matching row; all or nothing.
    pub fn update(&mut self, filter: &Filter, changes: &Record) -> Result<Vec<Record>> {
        self.check_filter(filter)?;
        for (column, value) in changes.iter() {
            if column == PRIMARY_KEY {
                return Err(DbError::ExecutionError(format!(
                    "Column '{}' of table '{}' cannot be updated",
                    PRIMARY_KEY,
                    self.name()
                )));
            }
            self.column(column)?.validate(value)?;
        }

        let mut staged = self.rows.clone();
        let mut updated = Vec::new();
        for (id, row) in self.rows.iter() {
            if !filter.matches(row)? {
                continue;
            }
            let mut new_row = row.clone();
            for (column, value) in changes.iter() {
                new_row.set(column, value.clone());
            }
            staged.insert(*id, new_row.clone());
            updated.push(new_row);
        }

        for row in &updated {
            if let Some(id) = row.id() {
                check_uniqueness(&self.schema, &staged, row, id)?;
            }
        }

        if !updated.is_empty() {
            self.rows = staged;
            self.version += 1;
        }
        Ok(updated)
    }

    pub fn delete(&mut self, filter: &Filter) -> Result<Vec<Record>> {
        self.check_filter(filter)?;
        let mut removed = Vec::new();
        for (id, row) in self.rows.iter() {
            if filter.matches(row)? {
                removed.push((*id, row.clone()));
            }
        }
        for (id, _) in &removed {
            self.rows.remove(id);
        }
        if !removed.is_empty() {
            self.version += 1;
        }
        Ok(removed.into_iter().map(|(_, row)| row).collect())
    }

    /// Merges `changes` into the current image of row `id`.
    ///
    /// Used when replaying a transaction log: columns the transaction did not
    /// write keep whatever the live row holds.
    pub fn patch(&mut self, id: i64, changes: &Record) -> Result<Record> {
        let Some(current) = self.rows.get(&id) else {
            return Err(DbError::SerializationFailure(format!(
                "row {} of table '{}' was deleted by a concurrent transaction",
                id,
                self.name()
            )));
        };

        let mut row = current.clone();
        for (column, value) in changes.iter() {
            if column == PRIMARY_KEY {
                continue;
            }
            self.column(column)?.validate(value)?;
            row.set(column, value.clone());
        }
        check_uniqueness(&self.schema, &self.rows, &row, id)?;
        self.rows.insert(id, row.clone());
        self.version += 1;
        Ok(row)
    }

    /// Removes a row by id. Missing rows are ignored.
    pub fn remove(&mut self, id: i64) {
        if self.rows.remove(&id).is_some() {
            self.version += 1;
        }
    }

    /// Adds a column and backfills its default into existing rows.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if !column.nullable && column.default.is_none() && !self.rows.is_empty() {
            return Err(DbError::ConstraintViolation(format!(
                "Column '{}' cannot be NULL and has no default for existing rows",
                column.name
            )));
        }

        let mut backfilled = self.rows.clone();
        if let Some(default) = &column.default {
            let ids: Vec<i64> = backfilled.keys().copied().collect();
            for id in ids {
                if let Some(row) = backfilled.get_mut(&id) {
                    row.set(column.name.clone(), default.resolve());
                }
            }
        }
        self.schema.add_column(column)?;
        self.rows = backfilled;
        self.version += 1;
        Ok(())
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.schema
            .get_column(name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), self.name().to_string()))
    }

    fn check_filter(&self, filter: &Filter) -> Result<()> {
        for condition in filter.conditions() {
            self.column(&condition.column)?;
        }
        Ok(())
    }

    /// Rejects unknown columns, fills defaults, validates types and nullability.
    fn prepare_row(&self, record: Record) -> Result<Record> {
        for column in record.columns() {
            self.column(column)?;
        }

        let mut row = record;
        for column in self.schema.columns() {
            if column.name == PRIMARY_KEY {
                continue;
            }
            if !row.contains(&column.name) {
                let value = column
                    .default
                    .as_ref()
                    .map_or(Value::Null, |default| default.resolve());
                row.set(column.name.clone(), value);
            }
            if let Some(value) = row.get(&column.name) {
                column.validate(value)?;
            }
        }
        Ok(row)
    }
}

fn unique_violation(column: &str, value: &Value) -> DbError {
    DbError::ConstraintViolation(format!(
        "Unique constraint violation: Column '{}' already contains value {}",
        column, value
    ))
}

fn check_uniqueness(
    schema: &TableSchema,
    rows: &OrdMap<i64, Record>,
    row: &Record,
    ignore_id: i64,
) -> Result<()> {
    for column in schema.columns() {
        if !column.unique || column.name == PRIMARY_KEY {
            continue;
        }
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        for (id, other) in rows.iter() {
            if *id == ignore_id {
                continue;
            }
            if other.get(&column.name) == Some(value) {
                return Err(unique_violation(&column.name, value));
            }
        }
    }
    Ok(())
}
