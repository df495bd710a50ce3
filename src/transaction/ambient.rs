//! Ambient transaction propagation.
//!
//! A transaction opened by [`run_in_transaction`] is installed as a
//! task-local value for the whole call chain of the work future, across
//! every `.await`. Code deeper in that chain calls [`get_connection`] and
//! transparently joins the transaction; outside any transactional block it
//! gets the database's default auto-commit connection.
//!
//! The context is scoped to the future, not the thread: call chains
//! interleaved on one runtime never see each other's transactions, and a
//! `tokio::spawn`ed task starts with no transaction.
//!
//! ```ignore
//! run_in_transaction(|| async {
//!     let conn = get_connection();
//!     conn.table("users").insert(record).await?;
//!     audit_log().await?; // also calls get_connection(), same transaction
//!     Ok::<_, DbError>(())
//! }, None).await?;
//! ```

use super::{TransactionConnection, TransactionOptions};
use crate::connection::DbHandle;
use crate::core::{DbError, Result};
use crate::facade::Database;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Active transactions of one call chain, keyed by database id.
type ActiveTransactions = im::HashMap<u64, Arc<TransactionConnection>>;

tokio::task_local! {
    static ACTIVE_TRANSACTIONS: ActiveTransactions;
}

fn active_transactions() -> ActiveTransactions {
    ACTIVE_TRANSACTIONS.try_with(ActiveTransactions::clone).unwrap_or_default()
}

/// The transaction the current call chain holds on `database_id`, if any.
pub fn active_transaction(database_id: u64) -> Option<Arc<TransactionConnection>> {
    ACTIVE_TRANSACTIONS
        .try_with(|active| active.get(&database_id).cloned())
        .ok()
        .flatten()
}

/// Ambient transaction operations bound to one database.
#[derive(Clone)]
pub struct DomainTransaction {
    db: Arc<Database>,
}

impl DomainTransaction {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Bound to [`Database::global`].
    pub fn global() -> Self {
        Self::new(Database::global())
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    fn current(&self) -> Option<Arc<TransactionConnection>> {
        active_transaction(self.db.id())
    }

    pub fn in_transaction(&self) -> bool {
        self.current().is_some()
    }

    /// The active transaction of this call chain, or the default connection.
    pub fn get_connection(&self) -> DbHandle {
        match self.current() {
            Some(tx) => tx as DbHandle,
            None => self.db.connection(),
        }
    }

    /// Runs `work` inside a transaction.
    ///
    /// Joins the call chain's active transaction when there is one; `options`
    /// is then ignored. Otherwise begins a transaction, commits it when
    /// `work` returns `Ok` and rolls it back when it returns `Err`. The
    /// error from `work` is returned unchanged.
    pub async fn run_in_transaction<F, Fut, T, E>(
        &self,
        work: F,
        options: Option<TransactionOptions>,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<DbError>,
    {
        if let Some(tx) = self.current() {
            if let Some(requested) = options {
                let active = TransactionOptions {
                    isolation: Some(tx.isolation()),
                    read_only: tx.is_read_only(),
                };
                if requested != active && requested != TransactionOptions::default() {
                    debug!(
                        transaction = %tx.transaction_id(),
                        ?requested,
                        ?active,
                        "nested transaction options ignored"
                    );
                }
            }
            return work().await;
        }

        let tx = Arc::new(self.db.begin(options).await?);
        // transactions already open on other databases stay visible
        let active = active_transactions().update(self.db.id(), Arc::clone(&tx));
        let outcome = ACTIVE_TRANSACTIONS
            .scope(active, async move { work().await })
            .await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        transaction = %tx.transaction_id(),
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    pub fn with_transaction<F>(&self, f: F, options: Option<TransactionOptions>) -> Transactional<F> {
        Transactional {
            f,
            options,
            domain: self.clone(),
        }
    }

    /// Like [`with_transaction`](Self::with_transaction) for a function that may be absent.
    pub fn try_with_transaction<F>(
        &self,
        f: Option<F>,
        options: Option<TransactionOptions>,
    ) -> Result<Transactional<F>> {
        let f = f.ok_or_else(|| {
            DbError::InvalidArgument("Expected a function to wrap with transaction".into())
        })?;
        Ok(self.with_transaction(f, options))
    }
}

/// A function whose every call runs inside [`DomainTransaction::run_in_transaction`].
///
/// Several arguments are passed as one tuple.
pub struct Transactional<F> {
    f: F,
    options: Option<TransactionOptions>,
    domain: DomainTransaction,
}

impl<F> Transactional<F> {
    pub async fn call<A, Fut, T, E>(&self, args: A) -> std::result::Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<DbError>,
    {
        self.domain
            .run_in_transaction(|| (self.f)(args), self.options)
            .await
    }
}

/// [`DomainTransaction::run_in_transaction`] on the global database.
pub async fn run_in_transaction<F, Fut, T, E>(
    work: F,
    options: Option<TransactionOptions>,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<DbError>,
{
    DomainTransaction::global()
        .run_in_transaction(work, options)
        .await
}

/// [`DomainTransaction::get_connection`] on the global database.
pub fn get_connection() -> DbHandle {
    DomainTransaction::global().get_connection()
}

pub fn with_transaction<F>(f: F, options: Option<TransactionOptions>) -> Transactional<F> {
    DomainTransaction::global().with_transaction(f, options)
}

pub fn try_with_transaction<F>(
    f: Option<F>,
    options: Option<TransactionOptions>,
) -> Result<Transactional<F>> {
    DomainTransaction::global().try_with_transaction(f, options)
}
