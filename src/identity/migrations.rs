use super::user::USERS_TABLE;
use crate::core::{Column, DataType, TableSchema};
use crate::facade::{Migration, MigrationStep, Migrator};

/// Schema history of the `users` table, oldest first.
pub fn user_migrations() -> Vec<Migration> {
    vec![
        Migration::new("20250925085000_create-users-table").step(MigrationStep::CreateTable(
            TableSchema::new(USERS_TABLE)
                .column(Column::new("firstname", DataType::Text).not_null())
                .column(Column::new("lastname", DataType::Text).not_null())
                .column(Column::new("email", DataType::Text).not_null().unique())
                .column(Column::new("birthday", DataType::Text).not_null())
                .column(Column::new("created_at", DataType::Timestamp).not_null().default_now())
                .column(Column::new("updated_at", DataType::Timestamp).not_null().default_now()),
        )),
        Migration::new("20250925085355_add-isActive-column-to-users-table").step(
            MigrationStep::add_column(
                USERS_TABLE,
                Column::new("isActive", DataType::Boolean).not_null().default_value(false),
            ),
        ),
        Migration::new("20250925110623_add-isChecked-column-to-users-table").step(
            MigrationStep::add_column(
                USERS_TABLE,
                Column::new("isChecked", DataType::Boolean).not_null().default_value(false),
            ),
        ),
        Migration::new("20250930140000_add-userType-and-hashedPassword-to-users")
            .step(MigrationStep::add_column(
                USERS_TABLE,
                Column::new("hashedPassword", DataType::Text),
            ))
            .step(MigrationStep::add_column(
                USERS_TABLE,
                Column::new("userType", DataType::Text).not_null().default_value("user"),
            )),
        Migration::new("20251008085340_add-lastLoggedAt-to-users-table").step(
            MigrationStep::add_column(USERS_TABLE, Column::new("lastLoggedAt", DataType::Timestamp)),
        ),
    ]
}

pub fn migrator() -> Migrator {
    Migrator::new(user_migrations())
}
