use axum::extract::{Extension, Path, Query};
use axum::{Json, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use auth_gate_api::{ChangePasswordRequest, UserListResponse, UserResponse};

use crate::auth::extractors::AuthClaims;
use crate::auth::service::AuthService;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

/// GET /users/me
/// Récupère le profil de l'utilisateur courant
pub async fn get_current_user(
    claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = service.get_current_user(claims.sub)?;
    Ok(Json(user))
}

/// GET /users/:id
/// Récupère un utilisateur par son ID
pub async fn get_user_by_id(
    Path(user_id): Path<Uuid>,
    _claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = service.get_user_by_id(user_id)?;
    Ok(Json(user))
}

/// GET /users?page=&per_page=
/// Liste paginée des utilisateurs
pub async fn list_users(
    Query(query): Query<ListUsersQuery>,
    _claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<Json<UserListResponse>, AppError> {
    let (users, total) = service.list_users(query.page, query.per_page)?;
    Ok(Json(UserListResponse {
        users,
        total,
        page: query.page.max(1),
        per_page: query.per_page,
    }))
}

/// DELETE /users/:id
/// Supprime un utilisateur
pub async fn delete_user(
    Path(user_id): Path<Uuid>,
    claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
) -> Result<StatusCode, AppError> {
    // Un utilisateur ne peut supprimer que son propre compte
    if claims.sub != user_id {
        return Err(AppError::unauthorized(
            "You can only delete your own account",
        ));
    }

    service.delete_user(user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/:id/change-password
/// Change le mot de passe de l'utilisateur
pub async fn change_password(
    Path(user_id): Path<Uuid>,
    claims: AuthClaims,
    Extension(service): Extension<Arc<AuthService>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Un utilisateur ne peut changer que son propre mot de passe
    if claims.sub != user_id {
        return Err(AppError::unauthorized(
            "You can only change your own password",
        ));
    }

    service.change_password(user_id, &payload.old_password, &payload.new_password)?;
    Ok(Json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}
