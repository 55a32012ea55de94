//! # auth-gate
//!
//! Session and token lifecycle engine for a multi-tenant user base:
//! password login, OAuth social login, and a dual-token session model
//! (short-lived JWT access tokens, long-lived opaque refresh tokens) with
//! rotation, theft detection and revocation.
//!
//! The library is organized around one orchestrator,
//! [`auth::service::AuthService`], which composes the token issuer, the
//! credential hasher, the identity normalizer and a [`db::SessionStore`]
//! behind a per-request unit of work. The binary in `main.rs` wires the
//! Postgres store; tests run against [`db::MemoryStore`].

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
