use super::{DataType, DbError, Result, Value};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Name of the implicit auto-increment primary key carried by every table.
pub const PRIMARY_KEY: &str = "id";

/// Default applied to a column when an insert leaves it out.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Value(Value),
    /// Current time at insert.
    Now,
}

impl ColumnDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Now => Value::Timestamp(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            unique: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(ColumnDefault::Now);
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(DbError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    /// Creates a schema holding only the `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![Column::new(PRIMARY_KEY, DataType::Integer).not_null().unique()],
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.get_column(&column.name).is_some() {
            return Err(DbError::ColumnExists(column.name, self.name.clone()));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// One row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn id(&self) -> Option<i64> {
        self.get(PRIMARY_KEY).and_then(Value::as_i64)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    pub fn get_timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column).and_then(Value::as_timestamp)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_always_has_primary_key() {
        let schema = TableSchema::new("things").column(Column::new("key", DataType::Text));
        assert_eq!(schema.column_count(), 2);
        assert!(schema.get_column(PRIMARY_KEY).unwrap().unique);
    }

    #[test]
    fn test_add_existing_column_fails() {
        let mut schema = TableSchema::new("things").column(Column::new("key", DataType::Text));
        let err = schema
            .add_column(Column::new("key", DataType::Integer))
            .unwrap_err();
        assert_eq!(err, DbError::ColumnExists("key".into(), "things".into()));
    }

    #[test]
    fn test_not_null_column_rejects_null() {
        let column = Column::new("email", DataType::Text).not_null();
        assert!(column.validate(&Value::Null).is_err());
        assert!(column.validate(&Value::Text("a@b.c".into())).is_ok());
        assert!(matches!(
            column.validate(&Value::Integer(1)),
            Err(DbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_record_getters() {
        let record = Record::new()
            .with("id", 7i64)
            .with("email", "a@b.c")
            .with("isActive", true);
        assert_eq!(record.id(), Some(7));
        assert_eq!(record.get_str("email"), Some("a@b.c"));
        assert_eq!(record.get_bool("isActive"), Some(true));
        assert_eq!(record.get_str("missing"), None);
    }
}
