//! In-memory session store.
//!
//! Backs the test suite and local development without a Postgres instance.
//! A unit of work holds the store lock for its whole lifetime, so units are
//! serialized the same way the relational adapter serializes writers through
//! row locks: a concurrent rotation attempt on the same secret observes the
//! winner's committed revocation, never an intermediate state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::db::error::StoreError;
use crate::db::models::refresh_token::{NewRefreshToken, RefreshToken};
use crate::db::models::social_login::{NewSocialLogin, SocialLogin};
use crate::db::models::user::{NewUser, UpdateUser, User};
use crate::db::store::{RefreshTokenRepository, SessionStore, UnitOfWork, UserRepository};

#[derive(Clone, Default)]
struct StoreState {
    users: Vec<User>,
    tokens: Vec<RefreshToken>,
    social_logins: Vec<SocialLogin>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A poisoned lock only means another unit panicked mid-flight; its
        // snapshot-restore already ran in Drop, so the state is consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let state = self.lock();
        let snapshot = state.clone();
        Ok(Box::new(MemoryUnitOfWork {
            state,
            snapshot,
            savepoint: None,
            completed: false,
        }))
    }
}

struct MemoryUnitOfWork<'a> {
    state: MutexGuard<'a, StoreState>,
    /// State as of unit creation; restored when the unit is abandoned.
    snapshot: StoreState,
    savepoint: Option<StoreState>,
    completed: bool,
}

impl Drop for MemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.completed {
            *self.state = std::mem::take(&mut self.snapshot);
        }
    }
}

impl UserRepository for MemoryUnitOfWork<'_> {
    fn create(&mut self, new_user: &NewUser) -> Result<User, StoreError> {
        if self.state.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::UniqueViolation(format!(
                "users_email_key: {}",
                new_user.email
            )));
        }
        if self
            .state
            .users
            .iter()
            .any(|u| u.username == new_user.username)
        {
            return Err(StoreError::UniqueViolation(format!(
                "users_username_key: {}",
                new_user.username
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            email_verified: new_user.email_verified,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.users.push(user.clone());
        Ok(user)
    }

    fn find_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.users.iter().find(|u| u.email == email).cloned())
    }

    fn is_username_taken(&mut self, username: &str) -> Result<bool, StoreError> {
        Ok(self.state.users.iter().any(|u| u.username == username))
    }

    fn find_by_social_identity(
        &mut self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError> {
        let Some(link) = self
            .state
            .social_logins
            .iter()
            .find(|l| l.provider == provider && l.provider_key == provider_key)
        else {
            return Ok(None);
        };
        let user_id = link.user_id;
        self.find_by_id(user_id)
    }

    fn link_social_identity(&mut self, link: &NewSocialLogin) -> Result<SocialLogin, StoreError> {
        if self
            .state
            .social_logins
            .iter()
            .any(|l| l.provider == link.provider && l.provider_key == link.provider_key)
        {
            return Err(StoreError::UniqueViolation(format!(
                "social_logins_provider_key_key: {}/{}",
                link.provider, link.provider_key
            )));
        }
        if self.state.users.iter().all(|u| u.id != link.user_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "social_logins_user_id_fkey: {}",
                link.user_id
            )));
        }

        let row = SocialLogin {
            id: Uuid::new_v4(),
            user_id: link.user_id,
            provider: link.provider.clone(),
            provider_key: link.provider_key.clone(),
            provider_data: link.provider_data.clone(),
            created_at: Utc::now(),
        };
        self.state.social_logins.push(row.clone());
        Ok(row)
    }

    fn social_identities(&mut self, user_id: Uuid) -> Result<Vec<SocialLogin>, StoreError> {
        Ok(self
            .state
            .social_logins
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    fn update(&mut self, id: Uuid, changes: &UpdateUser) -> Result<User, StoreError> {
        let user = self
            .state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        if let Some(email_verified) = changes.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    fn update_password(&mut self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let user = self
            .state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    fn list(&mut self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), StoreError> {
        let page = page.max(1);
        let per_page = if per_page < 1 { 10 } else { per_page };

        let total = self.state.users.len() as i64;
        let users = self
            .state
            .users
            .iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .cloned()
            .collect();
        Ok((users, total))
    }

    fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        if self.state.users.iter().all(|u| u.id != id) {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        // Cascade, mirroring the relational foreign keys.
        self.state.tokens.retain(|t| t.user_id != id);
        self.state.social_logins.retain(|l| l.user_id != id);
        self.state.users.retain(|u| u.id != id);
        Ok(())
    }
}

impl RefreshTokenRepository for MemoryUnitOfWork<'_> {
    fn create(&mut self, new_token: &NewRefreshToken) -> Result<RefreshToken, StoreError> {
        if self
            .state
            .tokens
            .iter()
            .any(|t| t.secret == new_token.secret)
        {
            return Err(StoreError::UniqueViolation(
                "refresh_tokens_secret_key".to_string(),
            ));
        }
        if self.state.users.iter().all(|u| u.id != new_token.user_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "refresh_tokens_user_id_fkey: {}",
                new_token.user_id
            )));
        }

        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: new_token.user_id,
            secret: new_token.secret.clone(),
            expires_at: new_token.expires_at,
            revoked: false,
            created_at: Utc::now(),
            created_by_ip: new_token.created_by_ip.clone(),
            revoked_at: None,
            revoked_by_ip: None,
            replaced_by_secret: None,
        };
        self.state.tokens.push(token.clone());
        Ok(token)
    }

    fn find_by_secret(&mut self, secret: &str) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self
            .state
            .tokens
            .iter()
            .find(|t| t.secret == secret)
            .cloned())
    }

    fn find_by_secret_with_user(
        &mut self,
        secret: &str,
    ) -> Result<Option<(RefreshToken, User)>, StoreError> {
        let Some(token) = self.find_by_secret(secret)? else {
            return Ok(None);
        };
        let user = self
            .state
            .users
            .iter()
            .find(|u| u.id == token.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", token.user_id)))?;
        Ok(Some((token, user)))
    }

    fn active_for_user(&mut self, user_id: Uuid) -> Result<Vec<RefreshToken>, StoreError> {
        let now = Utc::now();
        Ok(self
            .state
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active_at(now))
            .cloned()
            .collect())
    }

    fn mark_rotated(
        &mut self,
        id: Uuid,
        replaced_by_secret: &str,
        ip: Option<&str>,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let Some(token) = self.state.tokens.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if !token.is_active_at(now) {
            return Ok(false);
        }
        token.revoked = true;
        token.revoked_at = Some(now);
        token.revoked_by_ip = ip.map(str::to_string);
        token.replaced_by_secret = Some(replaced_by_secret.to_string());
        Ok(true)
    }

    fn revoke(&mut self, id: Uuid, ip: Option<&str>) -> Result<bool, StoreError> {
        let now = Utc::now();
        let Some(token) = self.state.tokens.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if !token.is_active_at(now) {
            return Ok(false);
        }
        token.revoked = true;
        token.revoked_at = Some(now);
        token.revoked_by_ip = ip.map(str::to_string);
        Ok(true)
    }

    fn revoke_all_for_user(
        &mut self,
        user_id: Uuid,
        ip: Option<&str>,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for token in self
            .state
            .tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.is_active_at(now))
        {
            token.revoked = true;
            token.revoked_at = Some(now);
            token.revoked_by_ip = ip.map(str::to_string);
            revoked += 1;
        }
        Ok(revoked)
    }

    fn delete_expired(&mut self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let before = self.state.tokens.len();
        self.state.tokens.retain(|t| t.expires_at > now);
        Ok(before - self.state.tokens.len())
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    fn refresh_tokens(&mut self) -> &mut dyn RefreshTokenRepository {
        self
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        if self.savepoint.is_some() {
            return Err(StoreError::TransactionState(
                "transaction already open on this unit".to_string(),
            ));
        }
        self.savepoint = Some(self.state.clone());
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if self.savepoint.take().is_none() {
            return Err(StoreError::TransactionState(
                "no open transaction to commit".to_string(),
            ));
        }
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        let Some(savepoint) = self.savepoint.take() else {
            return Err(StoreError::TransactionState(
                "no open transaction to roll back".to_string(),
            ));
        };
        *self.state = savepoint;
        Ok(())
    }

    fn complete(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.savepoint.is_some() {
            return Err(StoreError::TransactionState(
                "explicit transaction still open; commit or roll back first".to_string(),
            ));
        }
        self.completed = true;
        Ok(())
    }
}
