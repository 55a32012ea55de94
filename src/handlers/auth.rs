// src/handlers/auth.rs

use axum::extract::{Extension, State};
use axum::{
    Json,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use auth_gate_api::{
    AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest, RevokeTokenRequest,
    SocialLoginRequest,
};

use super::client_ip;
use crate::auth::extractors::AuthClaims;
use crate::auth::service::AuthService;
use crate::error::AppError;

/// POST /auth/register
/// Inscription d'un nouvel utilisateur
pub async fn register(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let ip = client_ip(&headers);
    let response = service.register(payload, ip.as_deref())?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
/// Connexion d'un utilisateur
pub async fn login(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ip = client_ip(&headers);
    let response = service.login(&payload, ip.as_deref())?;
    Ok(Json(response))
}

/// POST /auth/social
/// Connexion via un fournisseur OAuth (Google, GitHub, Microsoft)
pub async fn social_login(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(payload): Json<SocialLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ip = client_ip(&headers);
    let response = service.social_login(&payload, ip.as_deref()).await?;
    Ok(Json(response))
}

/// POST /auth/refresh
/// Rotation du refresh token
pub async fn refresh_token(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ip = client_ip(&headers);
    let response = service.refresh_token(&payload.refresh_token, ip.as_deref())?;
    Ok(Json(response))
}

/// POST /auth/revoke
/// Révoque un refresh token unique
pub async fn revoke_token(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(payload): Json<RevokeTokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ip = client_ip(&headers);
    service.revoke_token(&payload.refresh_token, ip.as_deref())?;
    Ok(Json(serde_json::json!({ "message": "Token revoked" })))
}

/// POST /auth/logout-all
/// Déconnexion de toutes les sessions de l'utilisateur courant
pub async fn logout_all(
    claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let ip = client_ip(&headers);
    let revoked = service.revoke_all_user_tokens(claims.sub, ip.as_deref())?;
    Ok(Json(serde_json::json!({
        "message": "Logged out everywhere",
        "revoked": revoked
    })))
}
