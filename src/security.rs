//! JWT bearer and HTTP Basic credential validation.
//!
//! These are plain functions, not middleware; [`crate::middleware::auth`]
//! wires them into the chain. Keeping validation free of `Context`
//! concerns makes it independently testable and reusable from handlers
//! that want to re-check credentials mid-chain.

use crate::error::{Error, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Minimal JWT claim set. Extra claims in the token are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub exp: usize,
}

impl Claims {
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes().iter().any(|s| *s == required)
    }
}

/// Strip a leading `Bearer ` prefix from an `Authorization` header value.
#[must_use]
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}

/// Verify `token`'s signature and expiry with `key`, returning its claims.
pub fn validate_bearer_jwt(token: &str, key: &DecodingKey, validation: &Validation) -> Result<Claims> {
    decode::<Claims>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| Error::Unauthorized(format!("invalid bearer token: {e}")))
}

/// Decoded `user:pass` pair from a `Basic` `Authorization` header.
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Parse and base64-decode a `Basic` `Authorization` header value (the part
/// after `Basic `).
pub fn parse_basic(header_value: &str) -> Result<BasicCredentials> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let encoded = header_value
        .strip_prefix("Basic ")
        .ok_or_else(|| Error::Unauthorized("missing Basic prefix".into()))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Unauthorized(format!("invalid base64: {e}")))?;
    let text = String::from_utf8(decoded)
        .map_err(|e| Error::Unauthorized(format!("invalid utf8 in credentials: {e}")))?;
    let (username, password) = text
        .split_once(':')
        .ok_or_else(|| Error::Unauthorized("malformed Basic credentials".into()))?;
    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
