use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::auth::jwt::{AccessClaims, TokenIssuer};
use crate::error::AppError;

/// Extracteur d'authentification pour les routes protégées.
/// Valide `Authorization: Bearer <JWT>` via le `TokenIssuer` du state et
/// expose les claims utiles (notamment `sub`).
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub sub: uuid::Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl From<AccessClaims> for AuthClaims {
    fn from(c: AccessClaims) -> Self {
        Self {
            sub: c.sub,
            email: c.email,
            iat: c.iat,
            exp: c.exp,
        }
    }
}

impl FromRequestParts<TokenIssuer> for AuthClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        issuer: &TokenIssuer,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::InvalidTokenFormat)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::InvalidTokenFormat)?;

        const BEARER: &str = "Bearer ";
        if !auth_str.starts_with(BEARER) {
            return Err(AppError::InvalidTokenFormat);
        }

        let token = &auth_str[BEARER.len()..];

        let claims = issuer
            .validate_access_token(token)
            .map_err(|_| AppError::InvalidToken)?;

        Ok(AuthClaims::from(claims))
    }
}
