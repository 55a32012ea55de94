/// Store layer errors. Business rules never live here; the service layer
/// decides what a unique violation or a missing row means for a given flow.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached (pool exhausted, connection refused).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),
    /// Misuse of the unit-of-work transaction controls
    /// (begin while open, commit/rollback without begin).
    #[error("invalid transaction state: {0}")]
    TransactionState(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => StoreError::NotFound("record not found".to_string()),
            Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => StoreError::UniqueViolation(message),
                    DatabaseErrorKind::ForeignKeyViolation => {
                        StoreError::ForeignKeyViolation(message)
                    }
                    DatabaseErrorKind::ClosedConnection => StoreError::Unavailable(message),
                    _ => StoreError::Database(message),
                }
            }
            Error::BrokenTransactionManager => {
                StoreError::TransactionState("broken transaction manager".to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
