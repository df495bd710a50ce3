pub mod database;
pub mod migration;

pub use database::{Database, TableStats};
pub use migration::{Migration, MigrationStep, Migrator};
