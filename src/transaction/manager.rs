// ============================================================================
// Transaction Manager
// ============================================================================

use super::TransactionId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates transaction ids and keeps lifecycle counters for one database.
#[derive(Debug)]
pub struct TransactionManager {
    next_id: AtomicU64,
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            begun: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
        }
    }

    pub fn begin(&self) -> TransactionId {
        self.begun.fetch_add(1, Ordering::SeqCst);
        TransactionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stats(&self) -> TransactionStats {
        let begun = self.begun.load(Ordering::SeqCst);
        let committed = self.committed.load(Ordering::SeqCst);
        let rolled_back = self.rolled_back.load(Ordering::SeqCst);
        TransactionStats {
            begun,
            committed,
            rolled_back,
            active: begun.saturating_sub(committed + rolled_back),
        }
    }
}

/// Transaction statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub active: u64,
}

impl fmt::Display for TransactionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transactions: {} begun, {} committed, {} rolled back, {} active",
            self.begun, self.committed, self.rolled_back, self.active
        )
    }
}
