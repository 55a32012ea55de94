use serde::{Deserialize, Serialize};

// -------- REQUEST DTOs --------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String, // Plain text
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String, // Plain text
}

/// OAuth authorization-code flow: the client forwards the one-time `code`
/// it received from the provider; the server performs the exchange.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SocialLoginRequest {
    pub provider: String,
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RevokeTokenRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}
