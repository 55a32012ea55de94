//! Social login: provider-neutral identity contract.
//!
//! The OAuth authorization-code exchange runs server-side behind
//! [`IdentityProvider`] so provider access tokens never reach a client. A
//! failed or invalid exchange yields `None`, which the authenticator treats
//! as an authentication failure, not a system fault. What this module does
//! own is the normalization: every provider returns its profile payload in a
//! different shape, and [`normalize_profile`] folds them into one structure.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    GitHub,
    Microsoft,
}

impl Provider {
    /// Canonical name as stored alongside social-login rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
            Provider::Microsoft => "microsoft",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown identity provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            "microsoft" => Ok(Provider::Microsoft),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Provider-neutral identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialUserInfo {
    /// The provider's unique user id (Google `sub`, GitHub numeric id, ...).
    pub provider_user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: Provider,
}

/// Server-side OAuth code exchange, normalized.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges an authorization code for the user's normalized identity.
    /// `None` when the code is invalid/expired or the exchange fails.
    async fn get_user_info(
        &self,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Option<SocialUserInfo>;
}

/// Placeholder wired in deployments without OAuth credentials configured:
/// every social login attempt fails as an authentication failure.
pub struct UnconfiguredIdentityProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredIdentityProvider {
    async fn get_user_info(
        &self,
        provider: Provider,
        _code: &str,
        _redirect_uri: &str,
    ) -> Option<SocialUserInfo> {
        tracing::warn!(
            provider = provider.as_str(),
            "social login attempted but no identity provider is configured"
        );
        None
    }
}

/// Folds a provider profile payload into [`SocialUserInfo`].
/// Returns `None` when the payload lacks the provider's id or an email —
/// accounts cannot be matched without both.
pub fn normalize_profile(provider: Provider, payload: &Value) -> Option<SocialUserInfo> {
    match provider {
        Provider::Google => Some(SocialUserInfo {
            provider_user_id: str_field(payload, "sub")?,
            email: str_field(payload, "email")?,
            first_name: str_field(payload, "given_name"),
            last_name: str_field(payload, "family_name"),
            avatar_url: str_field(payload, "picture"),
            provider,
        }),
        Provider::GitHub => {
            // GitHub ids are numeric; the display name is a single string.
            let id = match payload.get("id")? {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => return None,
            };
            let (first_name, last_name) = split_full_name(str_field(payload, "name"));
            Some(SocialUserInfo {
                provider_user_id: id,
                email: str_field(payload, "email")?,
                first_name,
                last_name,
                avatar_url: str_field(payload, "avatar_url"),
                provider,
            })
        }
        Provider::Microsoft => Some(SocialUserInfo {
            provider_user_id: str_field(payload, "id")?,
            email: str_field(payload, "mail").or_else(|| str_field(payload, "userPrincipalName"))?,
            first_name: str_field(payload, "givenName"),
            last_name: str_field(payload, "surname"),
            avatar_url: None,
            provider,
        }),
    }
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn split_full_name(name: Option<String>) -> (Option<String>, Option<String>) {
    let Some(name) = name else {
        return (None, None);
    };
    match name.trim().split_once(' ') {
        Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
        None => (Some(name.trim().to_string()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("GITHUB".parse::<Provider>().unwrap(), Provider::GitHub);
        assert_eq!("microsoft".parse::<Provider>().unwrap(), Provider::Microsoft);
        assert!("facebook".parse::<Provider>().is_err());
    }

    #[test]
    fn normalizes_google_payload() {
        let payload = json!({
            "sub": "123456789012345678901",
            "email": "ada@example.com",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "picture": "https://lh3.example.com/photo.jpg"
        });

        let info = normalize_profile(Provider::Google, &payload).unwrap();
        assert_eq!(info.provider_user_id, "123456789012345678901");
        assert_eq!(info.email, "ada@example.com");
        assert_eq!(info.first_name.as_deref(), Some("Ada"));
        assert_eq!(info.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(
            info.avatar_url.as_deref(),
            Some("https://lh3.example.com/photo.jpg")
        );
    }

    #[test]
    fn normalizes_github_payload_with_numeric_id_and_full_name() {
        let payload = json!({
            "id": 583231,
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "avatar_url": "https://avatars.example.com/u/583231"
        });

        let info = normalize_profile(Provider::GitHub, &payload).unwrap();
        assert_eq!(info.provider_user_id, "583231");
        assert_eq!(info.first_name.as_deref(), Some("Ada"));
        assert_eq!(info.last_name.as_deref(), Some("Lovelace"));
    }

    #[test]
    fn github_single_word_name_has_no_last_name() {
        let payload = json!({
            "id": 1,
            "name": "ada",
            "email": "ada@example.com"
        });

        let info = normalize_profile(Provider::GitHub, &payload).unwrap();
        assert_eq!(info.first_name.as_deref(), Some("ada"));
        assert_eq!(info.last_name, None);
    }

    #[test]
    fn github_payload_without_email_is_rejected() {
        // Users can keep their email private; no email means no account match.
        let payload = json!({ "id": 1, "name": "Ada Lovelace", "email": null });
        assert!(normalize_profile(Provider::GitHub, &payload).is_none());
    }

    #[test]
    fn normalizes_microsoft_payload_with_principal_name_fallback() {
        let payload = json!({
            "id": "a1b2c3d4",
            "userPrincipalName": "ada@example.com",
            "givenName": "Ada",
            "surname": "Lovelace"
        });

        let info = normalize_profile(Provider::Microsoft, &payload).unwrap();
        assert_eq!(info.provider_user_id, "a1b2c3d4");
        assert_eq!(info.email, "ada@example.com");
        assert_eq!(info.avatar_url, None);
    }

    #[test]
    fn missing_provider_id_is_rejected() {
        let payload = json!({ "email": "ada@example.com" });
        assert!(normalize_profile(Provider::Google, &payload).is_none());
    }
}
