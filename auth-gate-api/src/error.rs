use serde::{Deserialize, Serialize};

/// Public API error response format.
/// `error` is a stable machine-readable code clients can branch on;
/// `message` is human-readable and may change between releases.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
