use super::mail::MailError;
use super::token::TokenError;
use crate::core::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("User with ID {0} not found")]
    UserNotFound(i64),

    #[error("User not found or already active")]
    UserNotFoundOrAlreadyActive,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    InactiveAccount,

    #[error("Token is required")]
    TokenRequired,

    #[error("Invalid or expired token")]
    InvalidActivationToken(#[source] TokenError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Database(DbError),
}

/// A unique violation on `email` is a duplicate registration, whether the
/// insert or the commit that publishes it detected it.
impl From<DbError> for IdentityError {
    fn from(err: DbError) -> Self {
        if err.violated_unique_column() == Some("email") {
            Self::EmailAlreadyExists
        } else {
            Self::Database(err)
        }
    }
}

impl IdentityError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}
