//! Offline inspection of access tokens.
//!
//! Tokens are three base64url segments; only the middle (claims) segment is
//! read. Signatures are not checked, so nothing decoded here is a trust
//! boundary. Anything that fails to decode counts as expired.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Who the token says the user is. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
}

/// Decode the claims segment of a token.
///
/// Returns `None` unless the token has exactly three dot-separated segments
/// and the middle one is base64url JSON object.
fn decode_claims(token: &str) -> Option<JsonValue> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let payload = parts[1];
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;

    match serde_json::from_slice::<JsonValue>(&bytes) {
        Ok(claims @ JsonValue::Object(_)) => Some(claims),
        _ => None,
    }
}

/// Expiry claim in seconds since the epoch, fractional seconds allowed.
fn expiry_seconds(token: &str) -> Option<f64> {
    decode_claims(token)?.get("exp")?.as_f64()
}

/// Whether the token had expired at `now`. Fails closed.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match expiry_seconds(token) {
        Some(exp) => {
            let now_secs = now.timestamp_millis() as f64 / 1000.0;
            exp < now_secs
        }
        None => {
            debug!("Failed to decode token expiry, treating as expired");
            true
        }
    }
}

/// Whether the token has expired. Malformed tokens are expired.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Expiry time carried by the token, if it can be read.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = expiry_seconds(token)?;
    DateTime::from_timestamp_millis((exp * 1000.0) as i64)
}

/// Get minutes remaining until expiry (for display)
pub fn minutes_until_expiry(token: &str) -> i64 {
    expires_at(token)
        .map(|exp| (exp - Utc::now()).num_minutes().max(0))
        .unwrap_or(0)
}

/// Identity claim of the token: `userId`, falling back to `sub`.
pub fn identity_of(token: &str) -> Option<Identity> {
    let claims = decode_claims(token)?;
    let claim = claims.get("userId").or_else(|| claims.get("sub"))?;

    let user_id = match claim {
        JsonValue::String(s) if !s.is_empty() => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(Identity { user_id })
}
