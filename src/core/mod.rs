pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{Column, ColumnDefault, PRIMARY_KEY, Record, TableSchema};
pub use value::{DataType, Value};
