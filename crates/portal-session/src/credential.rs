//! Credential decoding and expiry rules.
//!
//! The credential is a compact three-part token issued by the identity
//! provider. Only the middle segment is read; the signature is never
//! verified client-side.

use crate::{SessionError, SessionResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use portal_storage::StoredUser;
use serde::{Deserialize, Serialize};

/// A token counts as expired this long before its `exp` claim.
pub const EXPIRY_MARGIN_MS: i64 = 60_000;

/// Claims read from the credential payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// `exp` converted to milliseconds since the epoch (rounded down).
    pub exp_ms: i64,
    pub name: String,
    pub email: String,
    pub picture: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.exp_ms).single()
    }

    pub fn user(&self) -> User {
        User {
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.picture.clone(),
        }
    }
}

/// Display profile derived from the credential.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub avatar: String,
}

impl From<StoredUser> for User {
    fn from(user: StoredUser) -> Self {
        Self {
            name: user.name,
            email: user.email,
            avatar: user.avatar,
        }
    }
}

impl From<User> for StoredUser {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            avatar: user.avatar,
        }
    }
}

/// Decode the payload segment of `token`.
pub fn decode(token: &str) -> SessionResult<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(SessionError::InvalidCredential(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| SessionError::InvalidCredential(format!("payload is not base64url: {e}")))?;

    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| SessionError::InvalidCredential(format!("payload is not JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| SessionError::InvalidCredential("payload is not an object".to_string()))?;

    let exp = object
        .get("exp")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| SessionError::InvalidCredential("missing numeric exp claim".to_string()))?;

    let text = |key: &str| {
        object
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(Claims {
        exp_ms: (exp * 1000.0).floor() as i64,
        name: text("name"),
        email: text("email"),
        picture: text("picture"),
    })
}

/// Whether `token` must be treated as expired at `now`.
///
/// Undecodable tokens are always expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode(token) {
        Ok(claims) => claims.exp_ms < now.timestamp_millis() + EXPIRY_MARGIN_MS,
        Err(_) => true,
    }
}
