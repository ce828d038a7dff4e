//! API error types.

use crate::MutationKind;
use thiserror::Error;

/// Message used when a failed response carries no usable `message`.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Message reported for a 401 response.
pub const UNAUTHORIZED_MESSAGE: &str = "Token expired or invalid";

/// API error type.
///
/// `Clone` so every waiter on a shared fetch receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No usable token was available; no request was sent
    #[error("No valid token")]
    Unauthenticated,

    /// The server rejected the token
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    /// Non-2xx response or network failure
    #[error("{message}")]
    RequestFailed {
        /// HTTP status, absent for network-level failures
        status: Option<u16>,
        message: String,
    },

    /// Sign-in credential could not be decoded; the prior session is kept
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Input rejected before any request was sent
    #[error("{0}")]
    Validation(String),

    /// A mutation of the same kind is still outstanding
    #[error("{0} is already in progress")]
    MutationInFlight(MutationKind),

    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Session layer failure
    #[error("Session error: {0}")]
    Session(String),
}

impl ApiError {
    /// True when the caller should send the user back to sign-in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::Unauthorized)
    }

    pub(crate) fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Error for a non-2xx, non-401 response body.
    pub(crate) fn from_failed_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .filter(|message| !message.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        Self::request_failed(Some(status), message)
    }
}

impl From<crate::TransportError> for ApiError {
    fn from(err: crate::TransportError) -> Self {
        ApiError::request_failed(None, err.to_string())
    }
}

impl From<portal_session::SessionError> for ApiError {
    fn from(err: portal_session::SessionError) -> Self {
        match err {
            portal_session::SessionError::InvalidCredential(reason) => {
                ApiError::InvalidCredential(reason)
            }
            other => ApiError::Session(other.to_string()),
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
