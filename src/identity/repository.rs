use super::error::IdentityError;
use super::user::{NewUser, USERS_TABLE, User, normalize_email};
use crate::core::{DbError, Record, Value};
use crate::query::ConnectionExt;
use crate::transaction::DomainTransaction;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns the id of the created user.
    async fn create_new_user(&self, user: NewUser) -> Result<i64, IdentityError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, IdentityError>;

    async fn activate_user_by_id(&self, id: i64) -> Result<User, IdentityError>;

    async fn update_last_logged_at(&self, id: i64) -> Result<(), IdentityError>;
}

/// Users stored in the `users` table.
///
/// Every query goes through [`DomainTransaction::get_connection`], so calls
/// made inside a transactional block join that transaction.
#[derive(Clone)]
pub struct StoreUserRepository {
    domain: DomainTransaction,
}

impl StoreUserRepository {
    pub fn new(domain: DomainTransaction) -> Self {
        Self { domain }
    }

    async fn find_one(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Option<User>, IdentityError> {
        let row = self
            .domain
            .get_connection()
            .table(USERS_TABLE)
            .where_eq(column, value)
            .first()
            .await?;
        Ok(row.as_ref().map(User::from_record).transpose()?)
    }
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn create_new_user(&self, user: NewUser) -> Result<i64, IdentityError> {
        let result = self
            .domain
            .get_connection()
            .table(USERS_TABLE)
            .insert(user.into_record())
            .await;

        match result {
            Ok(row) => {
                let id = row
                    .id()
                    .ok_or_else(|| DbError::ExecutionError("inserted user has no id".into()))?;
                info!(user_id = id, "user created");
                Ok(id)
            }
            Err(err) if err.violated_unique_column() == Some("email") => {
                Err(IdentityError::EmailAlreadyExists)
            }
            Err(err) => {
                error!(error = %err, "failed to create user");
                Err(err.into())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        self.find_one("email", normalize_email(email)).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, IdentityError> {
        self.find_one("id", id).await
    }

    async fn activate_user_by_id(&self, id: i64) -> Result<User, IdentityError> {
        let updated = self
            .domain
            .get_connection()
            .table(USERS_TABLE)
            .where_eq("id", id)
            .update(
                Record::new()
                    .with("isActive", true)
                    .with("updated_at", Utc::now()),
            )
            .await?;

        let row = updated.first().ok_or(IdentityError::UserNotFound(id))?;
        info!(user_id = id, "user activated");
        Ok(User::from_record(row)?)
    }

    async fn update_last_logged_at(&self, id: i64) -> Result<(), IdentityError> {
        let now = Utc::now();
        let updated = self
            .domain
            .get_connection()
            .table(USERS_TABLE)
            .where_eq("id", id)
            .update(Record::new().with("lastLoggedAt", now).with("updated_at", now))
            .await?;

        if updated.is_empty() {
            return Err(IdentityError::UserNotFound(id));
        }
        Ok(())
    }
}
