// src/auth/service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use auth_gate_api::{
    AuthResponse, LoginRequest, RegisterRequest, SocialLoginRequest, UserResponse,
};

use crate::auth::jwt::TokenIssuer;
use crate::auth::password::PasswordHasher;
use crate::auth::social::{IdentityProvider, Provider};
use crate::db::error::StoreError;
use crate::db::models::refresh_token::RefreshToken;
use crate::db::models::social_login::NewSocialLogin;
use crate::db::models::user::{NewUser, UpdateUser, User};
use crate::db::store::{SessionStore, UnitOfWork};
use crate::error::AppError;

/// Orchestrates the authentication flows.
///
/// Every flow opens its own unit of work, reads, makes one business
/// decision, writes, and commits atomically. Expected failures come back as
/// typed [`AppError`] values; nothing here panics on bad input.
pub struct AuthService {
    store: Arc<dyn SessionStore>,
    issuer: TokenIssuer,
    identity: Arc<dyn IdentityProvider>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        issuer: TokenIssuer,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            issuer,
            identity,
        }
    }

    /// Inscription d'un nouvel utilisateur
    pub fn register(
        &self,
        request: RegisterRequest,
        ip: Option<&str>,
    ) -> Result<AuthResponse, AppError> {
        let email = request.email.trim().to_lowercase();
        if !Self::is_valid_email(&email) {
            return Err(AppError::InvalidEmail);
        }
        if !Self::is_strong_password(&request.password) {
            return Err(AppError::WeakPassword(
                "Password must be at least 8 characters with uppercase, lowercase and numbers"
                    .to_string(),
            ));
        }

        let password_hash = PasswordHasher::hash(&request.password)?;

        let mut uow = self.store.unit_of_work()?;
        if uow.users().find_by_email(&email)?.is_some()
            || uow.users().is_username_taken(request.username.trim())?
        {
            return Err(AppError::UserAlreadyExists);
        }

        let user = uow
            .users()
            .create(&NewUser {
                email,
                username: request.username.trim().to_string(),
                password_hash: Some(password_hash),
                first_name: request.first_name,
                last_name: request.last_name,
                email_verified: false,
            })
            .map_err(Self::duplicate_means_taken)?;

        let (access_token, expires_at, refresh) = self.issue_session(uow.as_mut(), &user, ip)?;
        uow.complete().map_err(Self::duplicate_means_taken)?;

        tracing::info!(user_id = %user.id, "new user registered");
        Ok(Self::session_response(access_token, expires_at, refresh, user))
    }

    /// Connexion d'un utilisateur
    pub fn login(&self, request: &LoginRequest, ip: Option<&str>) -> Result<AuthResponse, AppError> {
        let email = request.email.trim().to_lowercase();

        let mut uow = self.store.unit_of_work()?;
        let user = uow
            .users()
            .find_by_email(&email)?
            .ok_or(AppError::UserNotFound)?;

        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }
        // Social-only accounts have no password to check against.
        let Some(stored_hash) = user.password_hash.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };
        if !PasswordHasher::verify(&request.password, stored_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        // Other active sessions stay untouched; concurrent sessions are
        // permitted by design.
        let (access_token, expires_at, refresh) = self.issue_session(uow.as_mut(), &user, ip)?;
        uow.complete()?;

        tracing::debug!(user_id = %user.id, "login succeeded");
        Ok(Self::session_response(access_token, expires_at, refresh, user))
    }

    /// Connexion via un fournisseur OAuth
    pub async fn social_login(
        &self,
        request: &SocialLoginRequest,
        ip: Option<&str>,
    ) -> Result<AuthResponse, AppError> {
        let provider: Provider = request
            .provider
            .parse()
            .map_err(|_| AppError::InvalidCredentials)?;

        // A failed exchange is an authentication failure, not a fault.
        let info = self
            .identity
            .get_user_info(provider, &request.code, &request.redirect_uri)
            .await
            .ok_or(AppError::InvalidCredentials)?;
        let email = info.email.trim().to_lowercase();

        let mut uow = self.store.unit_of_work()?;
        let user = match uow
            .users()
            .find_by_social_identity(provider.as_str(), &info.provider_user_id)?
        {
            // Identity already linked: authenticate as that user.
            Some(user) => user,
            None => match uow.users().find_by_email(&email)? {
                // Known email: attach the new identity to the account.
                Some(user) => {
                    // One identity per provider per user. The key did not
                    // match above, so a second identity on the same provider
                    // would be a different provider account.
                    if uow
                        .users()
                        .social_identities(user.id)?
                        .iter()
                        .any(|l| l.provider == provider.as_str())
                    {
                        return Err(AppError::InvalidCredentials);
                    }
                    uow.users().link_social_identity(&NewSocialLogin {
                        user_id: user.id,
                        provider: provider.as_str().to_string(),
                        provider_key: info.provider_user_id,
                        provider_data: Self::provider_data(info.avatar_url.as_deref()),
                    })?;
                    user
                }
                // First visit: create a password-less account plus the link,
                // all inside this one unit of work.
                None => {
                    let username = self.derive_username(uow.as_mut(), &email)?;
                    let user = uow
                        .users()
                        .create(&NewUser {
                            email,
                            username,
                            password_hash: None,
                            first_name: info.first_name.unwrap_or_default(),
                            last_name: info.last_name.unwrap_or_default(),
                            // The provider already verified this address.
                            email_verified: true,
                        })
                        .map_err(Self::duplicate_means_taken)?;
                    uow.users().link_social_identity(&NewSocialLogin {
                        user_id: user.id,
                        provider: provider.as_str().to_string(),
                        provider_key: info.provider_user_id,
                        provider_data: Self::provider_data(info.avatar_url.as_deref()),
                    })?;
                    tracing::info!(user_id = %user.id, provider = provider.as_str(), "user created via social login");
                    user
                }
            },
        };

        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let (access_token, expires_at, refresh) = self.issue_session(uow.as_mut(), &user, ip)?;
        uow.complete().map_err(Self::duplicate_means_taken)?;

        Ok(Self::session_response(access_token, expires_at, refresh, user))
    }

    /// Rotation du refresh token.
    ///
    /// Presenting an inactive secret (already rotated, revoked, or expired)
    /// is treated as evidence of theft: every active session of the user is
    /// revoked before the call fails.
    pub fn refresh_token(&self, secret: &str, ip: Option<&str>) -> Result<AuthResponse, AppError> {
        if secret.is_empty() {
            return Err(AppError::InvalidToken);
        }

        let mut uow = self.store.unit_of_work()?;
        let Some((token, user)) = uow.refresh_tokens().find_by_secret_with_user(secret)? else {
            return Err(AppError::InvalidToken);
        };

        if !token.is_active() {
            return self.respond_to_token_reuse(uow, &user, ip, "inactive refresh token presented");
        }
        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let replacement = self.issuer.issue_refresh_token(user.id, ip);
        if !uow
            .refresh_tokens()
            .mark_rotated(token.id, &replacement.secret, ip)?
        {
            // Lost a concurrent rotation race on this secret; same response
            // as replaying a rotated token.
            return self.respond_to_token_reuse(uow, &user, ip, "concurrent refresh on a stale secret");
        }

        let refresh = uow.refresh_tokens().create(&replacement)?;
        let (access_token, expires_at) = self.issuer.issue_access_token(&user)?;
        uow.complete()?;

        Ok(Self::session_response(access_token, expires_at, refresh, user))
    }

    /// Révoque un refresh token unique.
    pub fn revoke_token(&self, secret: &str, ip: Option<&str>) -> Result<(), AppError> {
        let mut uow = self.store.unit_of_work()?;
        let token = uow
            .refresh_tokens()
            .find_by_secret(secret)?
            .ok_or(AppError::InvalidToken)?;

        if !uow.refresh_tokens().revoke(token.id, ip)? {
            // Already revoked or expired.
            return Err(AppError::InvalidToken);
        }
        uow.complete()?;
        Ok(())
    }

    /// Logout-everywhere / compromise response: revokes every active token.
    pub fn revoke_all_user_tokens(
        &self,
        user_id: Uuid,
        ip: Option<&str>,
    ) -> Result<usize, AppError> {
        let mut uow = self.store.unit_of_work()?;
        if uow.users().find_by_id(user_id)?.is_none() {
            return Err(AppError::UserNotFound);
        }
        let revoked = uow.refresh_tokens().revoke_all_for_user(user_id, ip)?;
        uow.complete()?;

        tracing::info!(user_id = %user_id, revoked, "revoked all active tokens");
        Ok(revoked)
    }

    /// Maintenance sweep: physically removes refresh tokens already expired.
    pub fn purge_expired_tokens(&self) -> Result<usize, AppError> {
        let mut uow = self.store.unit_of_work()?;
        let removed = uow.refresh_tokens().delete_expired()?;
        uow.complete()?;

        if removed > 0 {
            tracing::info!(removed, "purged expired refresh tokens");
        }
        Ok(removed)
    }

    /// Récupère un utilisateur par son ID
    pub fn get_user_by_id(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        let mut uow = self.store.unit_of_work()?;
        uow.users()
            .find_by_id(user_id)?
            .map(UserResponse::from)
            .ok_or(AppError::UserNotFound)
    }

    pub fn get_current_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        self.get_user_by_id(user_id)
    }

    /// Liste paginée des utilisateurs
    pub fn list_users(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<UserResponse>, i64), AppError> {
        let mut uow = self.store.unit_of_work()?;
        let (users, total) = uow.users().list(page, per_page)?;
        Ok((users.into_iter().map(UserResponse::from).collect(), total))
    }

    /// Supprime un utilisateur (cascade sur tokens et identités sociales)
    pub fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut uow = self.store.unit_of_work()?;
        match uow.users().delete(user_id) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => return Err(AppError::UserNotFound),
            Err(e) => return Err(e.into()),
        }
        uow.complete()?;
        Ok(())
    }

    /// Change le mot de passe de l'utilisateur
    pub fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if !Self::is_strong_password(new_password) {
            return Err(AppError::WeakPassword(
                "Password must be at least 8 characters with uppercase, lowercase and numbers"
                    .to_string(),
            ));
        }

        let mut uow = self.store.unit_of_work()?;
        let user = uow
            .users()
            .find_by_id(user_id)?
            .ok_or(AppError::UserNotFound)?;

        let Some(stored_hash) = user.password_hash.as_deref() else {
            return Err(AppError::InvalidCredentials);
        };
        if !PasswordHasher::verify(old_password, stored_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = PasswordHasher::hash(new_password)?;
        uow.users().update_password(user_id, &new_hash)?;
        uow.complete()?;
        Ok(())
    }

    /// Active ou désactive un compte
    pub fn set_user_active(&self, user_id: Uuid, is_active: bool) -> Result<UserResponse, AppError> {
        let mut uow = self.store.unit_of_work()?;
        let user = match uow.users().update(
            user_id,
            &UpdateUser {
                is_active: Some(is_active),
                ..UpdateUser::default()
            },
        ) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(AppError::UserNotFound),
            Err(e) => return Err(e.into()),
        };
        uow.complete()?;
        Ok(user.into())
    }

    // === Internals ===

    /// Creates and persists a refresh token and signs an access token for
    /// the user. The caller still owns the commit.
    fn issue_session(
        &self,
        uow: &mut dyn UnitOfWork,
        user: &User,
        ip: Option<&str>,
    ) -> Result<(String, DateTime<Utc>, RefreshToken), AppError> {
        let refresh = uow
            .refresh_tokens()
            .create(&self.issuer.issue_refresh_token(user.id, ip))?;
        let (access_token, expires_at) = self.issuer.issue_access_token(user)?;
        Ok((access_token, expires_at, refresh))
    }

    /// Theft response: revoke everything the user holds, commit that write
    /// even though the flow itself fails, and surface a distinct signal.
    fn respond_to_token_reuse(
        &self,
        mut uow: Box<dyn UnitOfWork + '_>,
        user: &User,
        ip: Option<&str>,
        reason: &'static str,
    ) -> Result<AuthResponse, AppError> {
        let revoked = uow.refresh_tokens().revoke_all_for_user(user.id, ip)?;
        uow.complete()?;
        tracing::warn!(
            user_id = %user.id,
            revoked,
            reason,
            "possible refresh token theft; revoked all active sessions"
        );
        Err(AppError::InvalidToken)
    }

    fn session_response(
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh: RefreshToken,
        user: User,
    ) -> AuthResponse {
        AuthResponse {
            access_token,
            refresh_token: refresh.secret,
            expires_at,
            user: user.into(),
        }
    }

    /// Picks a free username from the email's local part, suffixing a short
    /// random tag on collision.
    fn derive_username(
        &self,
        uow: &mut dyn UnitOfWork,
        email: &str,
    ) -> Result<String, AppError> {
        let local = email.split('@').next().unwrap_or("user");
        let base: String = local
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            .collect();
        let base = if base.is_empty() {
            "user".to_string()
        } else {
            base
        };

        if !uow.users().is_username_taken(&base)? {
            return Ok(base);
        }
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{base}-{}", &suffix[..8]))
    }

    fn provider_data(avatar_url: Option<&str>) -> Option<String> {
        avatar_url.map(|url| serde_json::json!({ "avatar_url": url }).to_string())
    }

    /// Unique violations racing past the explicit availability checks mean
    /// the same thing those checks do.
    fn duplicate_means_taken(err: StoreError) -> AppError {
        match err {
            StoreError::UniqueViolation(_) => AppError::UserAlreadyExists,
            other => AppError::Store(other),
        }
    }

    // === Helpers de validation ===

    fn is_valid_email(email: &str) -> bool {
        email.contains('@') && email.contains('.') && email.len() > 5
    }

    fn is_strong_password(password: &str) -> bool {
        if password.len() < 8 {
            return false;
        }
        let (mut upper, mut lower, mut digit) = (false, false, false);
        for c in password.chars() {
            upper |= c.is_uppercase();
            lower |= c.is_lowercase();
            digit |= c.is_ascii_digit();
            if upper && lower && digit {
                return true;
            }
        }
        upper && lower && digit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenPolicy;
    use crate::auth::social::SocialUserInfo;
    use crate::db::MemoryStore;
    use crate::db::models::refresh_token::NewRefreshToken;
    use async_trait::async_trait;
    use chrono::Duration;

    struct StubIdentity(Option<SocialUserInfo>);

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn get_user_info(
            &self,
            _provider: Provider,
            _code: &str,
            _redirect_uri: &str,
        ) -> Option<SocialUserInfo> {
            self.0.clone()
        }
    }

    fn service_with_identity(store: MemoryStore, info: Option<SocialUserInfo>) -> AuthService {
        AuthService::new(
            Arc::new(store),
            TokenIssuer::new("test_secret_key", TokenPolicy::default()),
            Arc::new(StubIdentity(info)),
        )
    }

    fn test_service(store: MemoryStore) -> AuthService {
        service_with_identity(store, None)
    }

    fn register_request(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: "Str0ng!Pass".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Example".to_string(),
        }
    }

    fn google_info(key: &str, email: &str) -> SocialUserInfo {
        SocialUserInfo {
            provider_user_id: key.to_string(),
            email: email.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            avatar_url: Some("https://example.com/a.png".to_string()),
            provider: Provider::Google,
        }
    }

    fn user_count(store: &MemoryStore) -> i64 {
        let mut uow = store.unit_of_work().unwrap();
        uow.users().list(1, 1).unwrap().1
    }

    fn active_tokens(store: &MemoryStore, user_id: Uuid) -> Vec<RefreshToken> {
        let mut uow = store.unit_of_work().unwrap();
        uow.refresh_tokens().active_for_user(user_id).unwrap()
    }

    #[test]
    fn register_returns_tokens_and_duplicate_email_fails() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let response = service
            .register(register_request("alice@example.com", "alice"), None)
            .expect("registration should succeed");
        assert!(!response.access_token.is_empty());
        assert!(!response.refresh_token.is_empty());
        assert_eq!(response.user.email, "alice@example.com");

        let err = service
            .register(register_request("alice@example.com", "alice2"), None)
            .unwrap_err();
        assert_eq!(err.error_code(), "USER_ALREADY_EXISTS");
        // No partial row survived the failed attempt.
        assert_eq!(user_count(&store), 1);
    }

    #[test]
    fn register_normalizes_email_case() {
        let store = MemoryStore::new();
        let service = test_service(store);

        service
            .register(register_request("Alice@Example.COM", "alice"), None)
            .expect("registration should succeed");

        let err = service
            .register(register_request("alice@example.com", "alice2"), None)
            .unwrap_err();
        assert_eq!(err.error_code(), "USER_ALREADY_EXISTS");
    }

    #[test]
    fn register_rejects_taken_username() {
        let store = MemoryStore::new();
        let service = test_service(store);

        service
            .register(register_request("a@example.com", "alice"), None)
            .unwrap();
        let err = service
            .register(register_request("b@example.com", "alice"), None)
            .unwrap_err();
        assert_eq!(err.error_code(), "USER_ALREADY_EXISTS");
    }

    #[test]
    fn register_rejects_weak_password_and_bad_email() {
        let service = test_service(MemoryStore::new());

        let mut weak = register_request("a@example.com", "alice");
        weak.password = "weak".to_string();
        assert_eq!(
            service.register(weak, None).unwrap_err().error_code(),
            "WEAK_PASSWORD"
        );

        assert_eq!(
            service
                .register(register_request("not-an-email", "alice"), None)
                .unwrap_err()
                .error_code(),
            "INVALID_EMAIL"
        );
    }

    #[test]
    fn login_scenario_wrong_then_right_password() {
        let store = MemoryStore::new();
        let service = test_service(store);

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        let err = service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Wr0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");

        let response = service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                Some("10.0.0.1"),
            )
            .expect("login should succeed");
        // A fresh refresh token, distinct from any prior one.
        assert_ne!(response.refresh_token, registered.refresh_token);
    }

    #[test]
    fn login_with_unknown_email_is_user_not_found() {
        let service = test_service(MemoryStore::new());
        let err = service
            .login(
                &LoginRequest {
                    email: "ghost@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "USER_NOT_FOUND");
    }

    #[test]
    fn login_does_not_revoke_other_sessions() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let first = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap();

        assert_eq!(active_tokens(&store, first.user.id).len(), 2);
    }

    #[test]
    fn inactive_account_cannot_login() {
        let store = MemoryStore::new();
        let service = test_service(store);

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        service.set_user_active(registered.user.id, false).unwrap();

        let err = service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
    }

    #[test]
    fn refresh_rotates_the_token() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        let rotated = service
            .refresh_token(&registered.refresh_token, Some("10.0.0.2"))
            .expect("refresh should succeed");

        assert_ne!(rotated.refresh_token, registered.refresh_token);

        // Exactly one active token remains, and the old row points at it.
        let active = active_tokens(&store, registered.user.id);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].secret, rotated.refresh_token);

        let mut uow = store.unit_of_work().unwrap();
        let old = uow
            .refresh_tokens()
            .find_by_secret(&registered.refresh_token)
            .unwrap()
            .unwrap();
        assert!(old.revoked);
        assert_eq!(
            old.replaced_by_secret.as_deref(),
            Some(rotated.refresh_token.as_str())
        );
        assert_eq!(old.revoked_by_ip.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn replaying_a_rotated_token_revokes_everything() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        let rotated = service
            .refresh_token(&registered.refresh_token, None)
            .unwrap();

        // Replay of the consumed secret: theft response.
        let err = service
            .refresh_token(&registered.refresh_token, Some("203.0.113.9"))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");

        // The legitimate successor token was revoked too.
        assert!(active_tokens(&store, registered.user.id).is_empty());
        let mut uow = store.unit_of_work().unwrap();
        let successor = uow
            .refresh_tokens()
            .find_by_secret(&rotated.refresh_token)
            .unwrap()
            .unwrap();
        assert!(successor.revoked);
    }

    #[test]
    fn refresh_with_unknown_secret_fails_without_side_effects() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());
        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        let err = service.refresh_token("no-such-secret", None).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");
        assert_eq!(active_tokens(&store, registered.user.id).len(), 1);
    }

    #[test]
    fn concurrent_rotation_has_exactly_one_winner() {
        let store = MemoryStore::new();
        let service = Arc::new(test_service(store));

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        let secret = registered.refresh_token;

        let results: Vec<Result<AuthResponse, AppError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let service = Arc::clone(&service);
                    let secret = secret.clone();
                    scope.spawn(move || service.refresh_token(&secret, Some("10.0.0.3")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one rotation may succeed");
        for lost in results.iter().filter(|r| r.is_err()) {
            assert_eq!(lost.as_ref().unwrap_err().error_code(), "INVALID_TOKEN");
        }
    }

    #[test]
    fn revoke_token_then_refresh_triggers_theft_response() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        let second = service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap();

        service
            .revoke_token(&registered.refresh_token, Some("10.0.0.4"))
            .expect("revoke should succeed");

        // Refreshing with the revoked secret fails and takes the second
        // (previously active) session down with it.
        let err = service
            .refresh_token(&registered.refresh_token, None)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");
        assert!(active_tokens(&store, second.user.id).is_empty());
    }

    #[test]
    fn revoke_token_is_single_use() {
        let service = test_service(MemoryStore::new());
        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        service
            .revoke_token(&registered.refresh_token, None)
            .unwrap();
        let err = service
            .revoke_token(&registered.refresh_token, None)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");

        assert_eq!(
            service.revoke_token("unknown", None).unwrap_err().error_code(),
            "INVALID_TOKEN"
        );
    }

    #[test]
    fn revoke_all_user_tokens_clears_every_session() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();
        service
            .login(
                &LoginRequest {
                    email: "alice@example.com".to_string(),
                    password: "Str0ng!Pass".to_string(),
                },
                None,
            )
            .unwrap();

        let revoked = service
            .revoke_all_user_tokens(registered.user.id, Some("10.0.0.5"))
            .unwrap();
        assert_eq!(revoked, 2);
        assert!(active_tokens(&store, registered.user.id).is_empty());

        assert_eq!(
            service
                .revoke_all_user_tokens(Uuid::new_v4(), None)
                .unwrap_err()
                .error_code(),
            "USER_NOT_FOUND"
        );
    }

    #[test]
    fn purge_expired_tokens_removes_only_expired_rows() {
        let store = MemoryStore::new();
        let service = test_service(store.clone());

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        {
            let mut uow = store.unit_of_work().unwrap();
            uow.refresh_tokens()
                .create(&NewRefreshToken {
                    user_id: registered.user.id,
                    secret: "expired-secret".to_string(),
                    expires_at: Utc::now() - Duration::hours(1),
                    created_by_ip: None,
                })
                .unwrap();
            uow.complete().unwrap();
        }

        assert_eq!(service.purge_expired_tokens().unwrap(), 1);
        assert_eq!(active_tokens(&store, registered.user.id).len(), 1);
    }

    #[tokio::test]
    async fn social_login_creates_a_passwordless_linked_account() {
        let store = MemoryStore::new();
        let service =
            service_with_identity(store.clone(), Some(google_info("g-123", "Ada@Example.com")));

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let response = service
            .social_login(&request, Some("10.0.0.6"))
            .await
            .expect("social login should succeed");

        assert_eq!(response.user.email, "ada@example.com");
        assert!(response.user.email_verified);
        assert_eq!(response.user.username, "ada");

        let mut uow = store.unit_of_work().unwrap();
        let user = uow
            .users()
            .find_by_social_identity("google", "g-123")
            .unwrap()
            .expect("identity should be linked");
        assert_eq!(user.id, response.user.id);
        assert!(user.password_hash.is_none());
        let identities = uow.users().social_identities(user.id).unwrap();
        assert_eq!(identities.len(), 1);
        assert!(
            identities[0]
                .provider_data
                .as_deref()
                .unwrap()
                .contains("avatar_url")
        );
    }

    #[tokio::test]
    async fn social_login_reuses_the_linked_account() {
        let store = MemoryStore::new();
        let service =
            service_with_identity(store, Some(google_info("g-123", "ada@example.com")));

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let first = service.social_login(&request, None).await.unwrap();
        let second = service.social_login(&request, None).await.unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn social_login_links_to_an_existing_email_account() {
        let store = MemoryStore::new();
        let service =
            service_with_identity(store.clone(), Some(google_info("g-456", "alice@example.com")));

        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let response = service.social_login(&request, None).await.unwrap();

        assert_eq!(response.user.id, registered.user.id);
        let mut uow = store.unit_of_work().unwrap();
        assert_eq!(
            uow.users().social_identities(registered.user.id).unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn failed_exchange_is_an_authentication_failure() {
        let service = service_with_identity(MemoryStore::new(), None);

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "bad-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let err = service.social_login(&request, None).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn unknown_provider_is_an_authentication_failure() {
        let service =
            service_with_identity(MemoryStore::new(), Some(google_info("g-1", "a@example.com")));

        let request = SocialLoginRequest {
            provider: "myspace".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let err = service.social_login(&request, None).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn social_username_collision_gets_a_suffix() {
        let store = MemoryStore::new();
        let service =
            service_with_identity(store, Some(google_info("g-789", "alice@other-domain.com")));

        // Occupies the "alice" username with a different email.
        service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        let response = service.social_login(&request, None).await.unwrap();

        assert_ne!(response.user.username, "alice");
        assert!(response.user.username.starts_with("alice-"));
    }

    #[tokio::test]
    async fn second_identity_on_the_same_provider_is_rejected() {
        let store = MemoryStore::new();
        let first = service_with_identity(store.clone(), Some(google_info("g-1", "ada@example.com")));
        let second =
            service_with_identity(store, Some(google_info("g-2", "ada@example.com")));

        let request = SocialLoginRequest {
            provider: "google".to_string(),
            code: "auth-code".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
        };
        first.social_login(&request, None).await.unwrap();

        // Same email, same provider, different provider account.
        let err = second.social_login(&request, None).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
    }

    #[test]
    fn change_password_requires_the_old_one() {
        let service = test_service(MemoryStore::new());
        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        let err = service
            .change_password(registered.user.id, "Wr0ng!Pass", "N3wPass!word")
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");

        service
            .change_password(registered.user.id, "Str0ng!Pass", "N3wPass!word")
            .expect("change should succeed");

        let response = service.login(
            &LoginRequest {
                email: "alice@example.com".to_string(),
                password: "N3wPass!word".to_string(),
            },
            None,
        );
        assert!(response.is_ok());
    }

    #[test]
    fn delete_user_removes_the_account() {
        let service = test_service(MemoryStore::new());
        let registered = service
            .register(register_request("alice@example.com", "alice"), None)
            .unwrap();

        service.delete_user(registered.user.id).unwrap();
        assert_eq!(
            service
                .get_user_by_id(registered.user.id)
                .unwrap_err()
                .error_code(),
            "USER_NOT_FOUND"
        );
        assert_eq!(
            service.delete_user(registered.user.id).unwrap_err().error_code(),
            "USER_NOT_FOUND"
        );
    }

    #[test]
    fn list_users_pages_through_accounts() {
        let service = test_service(MemoryStore::new());
        for i in 0..3 {
            service
                .register(
                    register_request(&format!("u{i}@example.com"), &format!("user{i}")),
                    None,
                )
                .unwrap();
        }

        let (users, total) = service.list_users(1, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(users.len(), 2);
    }
}
