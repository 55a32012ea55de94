// src/error.rs

use auth_gate_api::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use crate::db::error::StoreError;

/// Application error taxonomy.
///
/// The first four variants are expected business outcomes: flows return them
/// as values and callers branch on [`AppError::error_code`] without parsing
/// message text. `Store` and `Internal` are infrastructure faults, surfaced
/// after the unit of work has rolled back; retrying is the caller's call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    // === Business outcomes ===
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid or expired token")]
    InvalidToken,

    // === Request rejections ===
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password too weak: {0}")]
    WeakPassword(String),
    #[error("Token format is invalid")]
    InvalidTokenFormat,
    #[error("Unauthorized: {0}")]
    UnauthorizedAction(String),

    // === Infrastructure faults ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code; part of the API contract.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::UserAlreadyExists => "USER_ALREADY_EXISTS",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidEmail => "INVALID_EMAIL",
            AppError::WeakPassword(_) => "WEAK_PASSWORD",
            AppError::InvalidTokenFormat => "INVALID_TOKEN_FORMAT",
            AppError::UnauthorizedAction(_) => "UNAUTHORIZED",
            AppError::Store(StoreError::Unavailable(_)) => "STORE_UNAVAILABLE",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::UnauthorizedAction(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// HTTP status plus public message and (for 5xx) the detail kept out of
    /// the response body and routed to the log instead.
    fn get_error_info(&self) -> (StatusCode, String, Option<String>) {
        match self {
            // 401 Unauthorized
            AppError::InvalidCredentials | AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            AppError::UnauthorizedAction(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),

            // 404 Not Found
            AppError::UserNotFound => (StatusCode::NOT_FOUND, self.to_string(), None),

            // 409 Conflict
            AppError::UserAlreadyExists => (StatusCode::CONFLICT, self.to_string(), None),

            // 400 Bad Request
            AppError::InvalidEmail | AppError::InvalidTokenFormat => {
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            AppError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),

            // 503 Service Unavailable
            AppError::Store(StoreError::Unavailable(detail)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The data store is temporarily unavailable".to_string(),
                Some(detail.clone()),
            ),

            // 500 Internal Server Error
            AppError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred with the data store".to_string(),
                Some(err.to_string()),
            ),
            AppError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
                Some(detail.clone()),
            ),
        }
    }

    #[cfg(test)]
    pub fn status_code(&self) -> StatusCode {
        self.get_error_info().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_code = self.error_code();
        let (status, message, internal_detail) = self.get_error_info();

        if let Some(ref detail) = internal_detail {
            tracing::error!(error_code, %status, detail, "request failed");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}

// === Conversions from capability errors ===

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::SigningFailed(e) => AppError::Internal(e.to_string()),
            TokenError::VerificationFailed(_) => AppError::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_outcomes_map_to_client_statuses() {
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::UserNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::UserAlreadyExists.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AppError::InvalidCredentials.error_code(), "INVALID_CREDENTIALS");
        assert_eq!(AppError::UserNotFound.error_code(), "USER_NOT_FOUND");
        assert_eq!(AppError::UserAlreadyExists.error_code(), "USER_ALREADY_EXISTS");
        assert_eq!(AppError::InvalidToken.error_code(), "INVALID_TOKEN");
    }

    #[test]
    fn store_unavailability_maps_to_503() {
        let err = AppError::Store(StoreError::Unavailable("pool timed out".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn internal_detail_stays_out_of_the_message() {
        let err = AppError::Internal("bcrypt exploded".to_string());
        let (_, message, detail) = err.get_error_info();
        assert!(!message.contains("bcrypt"));
        assert_eq!(detail.as_deref(), Some("bcrypt exploded"));
    }

    #[test]
    fn into_response_sets_the_status() {
        let response = AppError::UserAlreadyExists.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
