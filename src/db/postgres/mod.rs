//! Diesel/Postgres session store.
//!
//! Uniqueness of emails, usernames and token secrets is backed by unique
//! indexes; concurrent rotation of one secret is serialized by the
//! conditional updates in [`tokens`] (an UPDATE that only matches
//! still-active rows), so at most one of two racing refreshes wins.

mod tokens;
mod unit_of_work;
mod users;

use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

use crate::db::error::StoreError;
use crate::db::store::{SessionStore, UnitOfWork};
use unit_of_work::PgUnitOfWork;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

const POOL_MAX_SIZE: u32 = 5;

#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    /// Builds the connection pool. Pool acquisition later on is bounded by
    /// the r2d2 connection timeout, so no request waits forever on a dead
    /// database.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = r2d2::Pool::builder()
            .max_size(POOL_MAX_SIZE)
            .build(manager)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl SessionStore for PgSessionStore {
    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        Ok(Box::new(PgUnitOfWork::new(&self.pool)?))
    }
}
