//! Session store abstraction.
//!
//! The authenticator talks to persistence exclusively through these traits:
//! a [`SessionStore`] hands out one [`UnitOfWork`] per request, and the unit
//! exposes repository handles plus the atomic commit boundary. Repositories
//! are unaware of business rules; they persist and query records.
//!
//! Ownership is store-mediated, not graph-mediated: records reference each
//! other by foreign key and are fetched with explicit queries, never through
//! in-memory back-pointers.

use crate::db::error::StoreError;
use crate::db::models::refresh_token::{NewRefreshToken, RefreshToken};
use crate::db::models::social_login::{NewSocialLogin, SocialLogin};
use crate::db::models::user::{NewUser, UpdateUser, User};
use uuid::Uuid;

/// User records, plus the social identities they own.
pub trait UserRepository {
    fn create(&mut self, new_user: &NewUser) -> Result<User, StoreError>;
    fn find_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Emails are stored lowercased; callers normalize before querying.
    fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    fn is_username_taken(&mut self, username: &str) -> Result<bool, StoreError>;
    /// Resolve the user owning a linked (provider, provider_key) identity.
    fn find_by_social_identity(
        &mut self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError>;
    fn link_social_identity(&mut self, link: &NewSocialLogin) -> Result<SocialLogin, StoreError>;
    fn social_identities(&mut self, user_id: Uuid) -> Result<Vec<SocialLogin>, StoreError>;
    fn update(&mut self, id: Uuid, changes: &UpdateUser) -> Result<User, StoreError>;
    fn update_password(&mut self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    /// Page numbering starts at 1; out-of-range arguments are clamped.
    /// Returns the page plus the total row count.
    fn list(&mut self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), StoreError>;
    /// Deletes the user and cascades to its refresh tokens and social logins.
    fn delete(&mut self, id: Uuid) -> Result<(), StoreError>;
}

/// Refresh-token records. Revocation methods are conditional updates that
/// only touch still-active rows and report whether a row transitioned; this
/// is what serializes concurrent rotation attempts on the same secret.
pub trait RefreshTokenRepository {
    fn create(&mut self, new_token: &NewRefreshToken) -> Result<RefreshToken, StoreError>;
    /// Finds the row whatever its state; activity is the caller's check.
    fn find_by_secret(&mut self, secret: &str) -> Result<Option<RefreshToken>, StoreError>;
    fn find_by_secret_with_user(
        &mut self,
        secret: &str,
    ) -> Result<Option<(RefreshToken, User)>, StoreError>;
    fn active_for_user(&mut self, user_id: Uuid) -> Result<Vec<RefreshToken>, StoreError>;
    /// Marks the row revoked and records its successor secret, only if the
    /// row is still active. Returns false when the row was already inactive.
    fn mark_rotated(
        &mut self,
        id: Uuid,
        replaced_by_secret: &str,
        ip: Option<&str>,
    ) -> Result<bool, StoreError>;
    /// Marks the row revoked, only if still active.
    fn revoke(&mut self, id: Uuid, ip: Option<&str>) -> Result<bool, StoreError>;
    /// Revokes every active token of the user in one pass; returns the count.
    fn revoke_all_for_user(&mut self, user_id: Uuid, ip: Option<&str>)
    -> Result<usize, StoreError>;
    /// Maintenance sweep: physically deletes rows already past expiry.
    fn delete_expired(&mut self) -> Result<usize, StoreError>;
}

/// One atomic commit boundary, scoped to a single request.
///
/// Mutations made through the repository handles become durable only at
/// [`UnitOfWork::complete`]; dropping an uncompleted unit rolls everything
/// back. The explicit transaction methods mark a sub-step inside the unit
/// that can be rolled back on its own (a savepoint in relational terms) for
/// flows that need more than one commit decision inside one logical
/// operation.
pub trait UnitOfWork {
    fn users(&mut self) -> &mut dyn UserRepository;
    fn refresh_tokens(&mut self) -> &mut dyn RefreshTokenRepository;

    /// Fails with [`StoreError::TransactionState`] if a transaction is
    /// already open on this unit.
    fn begin_transaction(&mut self) -> Result<(), StoreError>;
    /// Fails with [`StoreError::TransactionState`] if none is open.
    fn commit_transaction(&mut self) -> Result<(), StoreError>;
    /// Fails with [`StoreError::TransactionState`] if none is open.
    fn rollback_transaction(&mut self) -> Result<(), StoreError>;

    /// Persists all pending mutations atomically. On a commit failure the
    /// unit rolls back before propagating the error.
    fn complete(self: Box<Self>) -> Result<(), StoreError>;
}

/// Hands out fresh units of work. Implementations must be shareable across
/// request workers; the units themselves never are.
pub trait SessionStore: Send + Sync {
    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError>;
}
