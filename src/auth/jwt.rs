use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::refresh_token::NewRefreshToken;
use crate::db::models::user::User;

/// Refresh secrets carry 512 bits of CSPRNG entropy, hex-encoded.
/// They are opaque server-side values, never JWTs: a signed token stays
/// valid until expiry no matter what the server does, an opaque secret can
/// be revoked.
const REFRESH_SECRET_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token signing failed: {0}")]
    SigningFailed(jsonwebtoken::errors::Error),
    #[error("Token verification failed: {0}")]
    VerificationFailed(jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Lifetimes and claim constants for issued tokens.
#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            issuer: "auth-gate".to_string(),
            audience: "auth-gate-clients".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    policy: TokenPolicy,
}

impl TokenIssuer {
    pub fn new(secret: &str, policy: TokenPolicy) -> Self {
        // Pinning the algorithm rejects tokens whose header announces
        // anything other than HS256, whatever they are signed with.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&policy.issuer]);
        validation.set_audience(&[&policy.audience]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            policy,
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Signs a short-lived access token for the user. Returns the token and
    /// its expiry so callers can report it without re-parsing.
    pub fn issue_access_token(&self, user: &User) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.policy.access_token_ttl;

        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.policy.issuer.clone(),
            aud: self.policy.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::SigningFailed)?;
        Ok((token, expires_at))
    }

    /// Mints an unsaved refresh token; persisting it is the caller's job.
    pub fn issue_refresh_token(&self, user_id: Uuid, created_by_ip: Option<&str>) -> NewRefreshToken {
        NewRefreshToken {
            user_id,
            secret: generate_refresh_secret(),
            expires_at: Utc::now() + self.policy.refresh_token_ttl,
            created_by_ip: created_by_ip.map(str::to_string),
        }
    }

    /// Verifies signature, expiry, issuer and audience.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::VerificationFailed)
    }

    /// Subject claim of a valid token; `None` for anything that does not
    /// validate rather than an error.
    pub fn extract_user_id(&self, token: &str) -> Option<Uuid> {
        self.validate_access_token(token).ok().map(|c| c.sub)
    }
}

fn generate_refresh_secret() -> String {
    let mut buf = [0u8; REFRESH_SECRET_BYTES];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
