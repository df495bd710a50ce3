use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Column '{0}' already exists in table '{1}'")]
    ColumnExists(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transaction {0} is no longer active")]
    TransactionClosed(u64),

    #[error("Transaction {0} is read-only")]
    ReadOnlyTransaction(u64),

    #[error("Could not serialize access: {0}")]
    SerializationFailure(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl DbError {
    /// Returns the column name when this is a unique constraint violation.
    pub fn violated_unique_column(&self) -> Option<&str> {
        match self {
            Self::ConstraintViolation(message) => message
                .strip_prefix("Unique constraint violation: Column '")
                .and_then(|rest| rest.split('\'').next()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<tokio::time::error::Elapsed> for DbError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::LockError(err.to_string())
    }
}
