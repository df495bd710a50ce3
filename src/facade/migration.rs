use super::Database;
use crate::core::{Column, DataType, Record, Result, TableSchema};
use crate::query::{ConnectionExt, Filter};
use std::collections::HashSet;
use tracing::info;

/// Table recording the names of applied migrations.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

#[derive(Debug, Clone)]
pub enum MigrationStep {
    CreateTable(TableSchema),
    AddColumn { table: String, column: Column },
}

impl MigrationStep {
    pub fn add_column(table: &str, column: Column) -> Self {
        Self::AddColumn {
            table: table.to_string(),
            column,
        }
    }

    async fn apply(&self, db: &Database) -> Result<()> {
        match self {
            Self::CreateTable(schema) => db.create_table(schema.clone()).await,
            Self::AddColumn { table, column } => db.add_column(table, column.clone()).await,
        }
    }
}

/// A named, additive schema change.
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub steps: Vec<MigrationStep>,
}

impl Migration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: MigrationStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Applies migrations in order, skipping the ones already recorded.
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    /// Migration names in application order.
    pub fn plan(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name.as_str()).collect()
    }

    /// Returns the names of the migrations applied by this run.
    pub async fn run(&self, db: &Database) -> Result<Vec<String>> {
        db.create_table_if_not_exists(
            TableSchema::new(MIGRATIONS_TABLE)
                .column(Column::new("name", DataType::Text).not_null().unique())
                .column(Column::new("applied_at", DataType::Timestamp).not_null().default_now()),
        )
        .await?;

        let conn = db.connection();
        let applied: HashSet<String> = conn
            .select(MIGRATIONS_TABLE, &Filter::all())
            .await?
            .iter()
            .filter_map(|row| row.get_str("name").map(str::to_string))
            .collect();

        let mut ran = Vec::new();
        for migration in &self.migrations {
            if applied.contains(&migration.name) {
                continue;
            }
            for step in &migration.steps {
                step.apply(db).await?;
            }
            conn.table(MIGRATIONS_TABLE)
                .insert(Record::new().with("name", migration.name.as_str()))
                .await?;
            info!(database = %db.name(), migration = %migration.name, "migration applied");
            ran.push(migration.name.clone());
        }
        Ok(ran)
    }
}
