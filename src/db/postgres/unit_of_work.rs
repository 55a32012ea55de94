use diesel::PgConnection;
use diesel::connection::{AnsiTransactionManager, TransactionManager};

use super::{DbConnection, DbPool};
use crate::db::error::StoreError;
use crate::db::store::{RefreshTokenRepository, UnitOfWork, UserRepository};

/// One pooled connection wrapped in one database transaction.
///
/// The transaction opens when the unit is created and commits at
/// `complete()`; everything in between is pending. The explicit
/// begin/commit/rollback methods map to a savepoint inside the outer
/// transaction, which is also what lets a flow recover from a failed
/// statement (Postgres aborts the enclosing transaction otherwise).
pub struct PgUnitOfWork {
    conn: DbConnection,
    savepoint_open: bool,
    completed: bool,
}

impl PgUnitOfWork {
    pub(super) fn new(pool: &DbPool) -> Result<Self, StoreError> {
        let mut conn = pool.get()?;
        AnsiTransactionManager::begin_transaction(&mut *conn)?;
        Ok(Self {
            conn,
            savepoint_open: false,
            completed: false,
        })
    }

    pub(super) fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl UnitOfWork for PgUnitOfWork {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    fn refresh_tokens(&mut self) -> &mut dyn RefreshTokenRepository {
        self
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        if self.savepoint_open {
            return Err(StoreError::TransactionState(
                "transaction already open on this unit".to_string(),
            ));
        }
        // Nested begin → SAVEPOINT under the unit's outer transaction.
        AnsiTransactionManager::begin_transaction(&mut *self.conn)?;
        self.savepoint_open = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if !self.savepoint_open {
            return Err(StoreError::TransactionState(
                "no open transaction to commit".to_string(),
            ));
        }
        self.savepoint_open = false;
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        if !self.savepoint_open {
            return Err(StoreError::TransactionState(
                "no open transaction to roll back".to_string(),
            ));
        }
        self.savepoint_open = false;
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn complete(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.savepoint_open {
            return Err(StoreError::TransactionState(
                "explicit transaction still open; commit or roll back first".to_string(),
            ));
        }
        self.completed = true;
        if let Err(e) = AnsiTransactionManager::commit_transaction(&mut *self.conn) {
            let _ = AnsiTransactionManager::rollback_transaction(&mut *self.conn);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // Abandoned unit (error path or caller cancellation): nothing may
        // land. Roll back the savepoint first if one is still open.
        if self.savepoint_open
            && let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *self.conn)
        {
            tracing::warn!("failed to roll back open savepoint: {e}");
        }
        if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *self.conn) {
            tracing::warn!("failed to roll back abandoned unit of work: {e}");
        }
    }
}
