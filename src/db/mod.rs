pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgSessionStore;
pub use store::{RefreshTokenRepository, SessionStore, UnitOfWork, UserRepository};
