//! LLM error types

use thiserror::Error;

/// Errors that can occur talking to the generation API
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimited,

    #[error("Credential can't be sent: {0}")]
    InvalidCredential(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::RateLimited => Some(429),
            LlmError::ApiError { status, .. } => Some(*status),
            LlmError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The request never produced a usable response from the server
    pub fn is_transport(&self) -> bool {
        match self {
            LlmError::Network(e) => !e.is_decode() && !e.is_status(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(LlmError::RateLimited.status(), Some(429));
        assert_eq!(
            LlmError::ApiError {
                status: 403,
                message: "Forbidden".to_string()
            }
            .status(),
            Some(403)
        );
        assert_eq!(LlmError::InvalidResponse("empty".to_string()).status(), None);
        assert_eq!(LlmError::InvalidCredential("control character".to_string()).status(), None);
    }

    #[test]
    fn test_non_network_errors_are_not_transport() {
        assert!(!LlmError::InvalidResponse("Bad JSON".to_string()).is_transport());
        assert!(!LlmError::RateLimited.is_transport());
        assert!(!LlmError::InvalidCredential("control character".to_string()).is_transport());
    }
}
