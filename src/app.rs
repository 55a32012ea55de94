// src/app.rs

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::jwt::TokenIssuer;
use crate::auth::service::AuthService;
use crate::handlers::auth::{login, logout_all, refresh_token, register, revoke_token, social_login};
use crate::handlers::health::health;
use crate::handlers::user::{
    change_password, delete_user, get_current_user, get_user_by_id, list_users,
};

/// Configure les routes d'authentification
fn auth_routes(service: Arc<AuthService>, issuer: TokenIssuer) -> Router {
    // Public endpoints (state: AuthService)
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/social", post(social_login))
        .route("/refresh", post(refresh_token))
        .route("/revoke", post(revoke_token))
        .with_state(service.clone());

    // Protected endpoints (state: TokenIssuer) using AuthClaims
    let protected = Router::new()
        .route("/logout-all", post(logout_all))
        .with_state(issuer)
        .layer(Extension(service));

    public.merge(protected)
}

/// Configure les routes utilisateur
fn user_routes(service: Arc<AuthService>, issuer: TokenIssuer) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_current_user))
        .route("/users/{id}", get(get_user_by_id).delete(delete_user))
        .route("/users/{id}/change-password", post(change_password))
        // TokenIssuer en state pour l'extracteur AuthClaims
        .with_state(issuer)
        // Le service en extension pour les handlers
        .layer(Extension(service))
}

/// Construit l'application complète.
///
/// Composition root explicite: chaque composant et ses dépendances sont
/// listés ici, rien n'est découvert par convention.
pub fn build_router(service: Arc<AuthService>, issuer: TokenIssuer) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes(service.clone(), issuer.clone()))
        .merge(user_routes(service, issuer))
        // Middleware global de tracing
        .layer(TraceLayer::new_for_http())
}
