//! # auth-gate-api
//!
//! Shared API types for the auth-gate service.
//! This crate is designed to be WASM-compatible so the same request and
//! response shapes can be used by the backend and by frontend clients.
//!
//! ## Features
//!
//! - Request DTOs (RegisterRequest, LoginRequest, SocialLoginRequest, etc.)
//! - Response DTOs (UserResponse, AuthResponse, etc.)
//! - Error response format (ErrorResponse)
//!
//! ## Example
//!
//! ```rust
//! use auth_gate_api::LoginRequest;
//!
//! let request = LoginRequest {
//!     email: "user@example.com".to_string(),
//!     password: "password123".to_string(),
//! };
//! ```

pub mod error;
pub mod requests;
pub mod responses;

// Re-exports for convenient access
pub use error::ErrorResponse;
pub use requests::*;
pub use responses::*;
