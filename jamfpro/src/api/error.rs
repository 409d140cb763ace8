use thiserror::Error;

use super::common::ApiErrorDetails;

/// Display strings carry the HTTP status so failures can be classified from text
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthError { status: u16, message: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } | ApiError::AuthError { status, .. } => Some(*status),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }
}
