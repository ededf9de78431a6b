//! Error types for Jikan requests and filter parsing.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a remote call.
///
/// The `Display` text is what the browser shows to the user, except for
/// [`ApiError::Cancelled`] which is an internal supersession signal.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429 from the upstream API
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// HTTP 404 from the detail endpoint
    #[error("Anime not found.")]
    NotFound,

    /// Any other non-2xx status
    #[error("Upstream request failed: {status} {reason}")]
    Upstream { status: u16, reason: String },

    /// Connection, timeout or body decoding failure
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Superseded by a newer request before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// Configured base URL cannot have paths appended
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Map a non-success status to an error.
    ///
    /// `detail` enables the 404 → `NotFound` mapping, which only the
    /// by-id endpoint uses.
    pub fn from_status(status: StatusCode, detail: bool) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            StatusCode::NOT_FOUND if detail => ApiError::NotFound,
            other => ApiError::Upstream {
                status: other.as_u16(),
                reason: other.canonical_reason().unwrap_or("Unknown").to_string(),
            },
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Unrecognized value for one of the filter enumerations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseFilterError {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, false),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, true),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, false),
            ApiError::Upstream { status: 404, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, true),
            ApiError::Upstream { status: 500, .. }
        ));
    }

    #[test]
    fn test_user_visible_messages() {
        assert_eq!(
            ApiError::RateLimited.to_string(),
            "Rate limit exceeded. Please try again later."
        );
        assert_eq!(ApiError::NotFound.to_string(), "Anime not found.");
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, false).to_string(),
            "Upstream request failed: 502 Bad Gateway"
        );
        assert!(ApiError::Cancelled.is_cancelled());
        assert!(!ApiError::NotFound.is_cancelled());
    }
}
