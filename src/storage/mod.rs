pub mod memory;
pub mod table;

pub use memory::InMemoryStorage;
pub use table::Table;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Live storage shared by the default connection and committing transactions.
pub type SharedStorage = Arc<RwLock<InMemoryStorage>>;
