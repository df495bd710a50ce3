// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Snapshot transactions over the in-memory storage, plus the ambient
// propagation layer that lets repository code join the transaction of its
// call chain without passing a handle around.
//
// ============================================================================

pub mod ambient;
pub mod change;
pub mod handle;
pub mod manager;
pub mod options;
pub mod state;

pub use ambient::{
    DomainTransaction, Transactional, active_transaction, get_connection, run_in_transaction,
    try_with_transaction, with_transaction,
};
pub use change::Change;
pub use handle::TransactionConnection;
pub use manager::{TransactionManager, TransactionStats};
pub use options::{IsolationLevel, TransactionOptions};
pub use state::{TransactionId, TransactionState};
