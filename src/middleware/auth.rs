//! Bearer-JWT and HTTP Basic authentication middleware.
//!
//! Each constructor builds a [`Handler`](crate::chain::Handler) that reads
//! the `Authorization` header, validates it, and writes the resulting
//! principal into the context's local store under `"principal"` before
//! calling `advance`. Missing or invalid credentials short-circuit with
//! `Error::Unauthorized` rather than reaching the handler.

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::security::{parse_basic, validate_bearer_jwt};
use jsonwebtoken::{DecodingKey, Validation};
use std::sync::Arc;

/// JWT bearer-token authentication. `required_scope`, if set, is checked
/// against the token's `scope` claim after signature validation.
#[must_use]
pub fn bearer_jwt_middleware(key: DecodingKey, required_scope: Option<String>) -> BoxHandler {
    let validation = Validation::default();
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let header = ctx
            .header("authorization")
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("expected Bearer token".into()))?;
        let claims = validate_bearer_jwt(token, &key, &validation)?;
        if let Some(scope) = &required_scope {
            if !claims.has_scope(scope) {
                return Err(Error::Forbidden(format!("missing required scope '{scope}'")));
            }
        }
        ctx.set_local("principal", serde_json::json!({"sub": claims.sub}));
        ctx.advance()
    })
}

/// HTTP Basic authentication against a caller-supplied credential checker.
#[must_use]
pub fn basic_auth_middleware(
    check: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
) -> BoxHandler {
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let header = ctx
            .header("authorization")
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".into()))?;
        let creds = parse_basic(header)?;
        if !check(&creds.username, &creds.password) {
            return Err(Error::Unauthorized("invalid credentials".into()));
        }
        ctx.set_local("principal", serde_json::json!({"sub": creds.username}));
        ctx.advance()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::chain_of;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn terminal() -> BoxHandler {
        Arc::new(|ctx: &mut Context| {
            ctx.set_status(200);
            Ok(())
        })
    }

    fn make_jwt(secret: &[u8], scope: Option<&str>) -> String {
        let claims = crate::security::Claims {
            sub: "user-1".into(),
            scope: scope.map(str::to_string),
            exp: (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn bearer_middleware_passes_valid_token() {
        let token = make_jwt(b"secret", Some("read"));
        let mw = bearer_jwt_middleware(DecodingKey::from_secret(b"secret"), None);
        let mut ctx = Context::new();
        let mut headers = std::collections::HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        ctx.set_request(
            "GET".into(),
            "/x".into(),
            headers,
            std::collections::HashMap::new(),
            std::collections::HashMap::new(),
            Vec::new(),
        );
        ctx.begin_chain(chain_of(vec![mw, terminal()]));
        assert!(ctx.advance().is_ok());
        assert_eq!(ctx.status(), 200);
    }

    #[test]
    fn bearer_middleware_rejects_missing_header() {
        let mw = bearer_jwt_middleware(DecodingKey::from_secret(b"secret"), None);
        let mut ctx = Context::new();
        ctx.begin_chain(chain_of(vec![mw, terminal()]));
        assert!(matches!(ctx.advance(), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn bearer_middleware_enforces_required_scope() {
        let token = make_jwt(b"secret", Some("read"));
        let mw = bearer_jwt_middleware(DecodingKey::from_secret(b"secret"), Some("admin".into()));
        let mut ctx = Context::new();
        let mut headers = std::collections::HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        ctx.set_request(
            "GET".into(),
            "/x".into(),
            headers,
            std::collections::HashMap::new(),
            std::collections::HashMap::new(),
            Vec::new(),
        );
        ctx.begin_chain(chain_of(vec![mw, terminal()]));
        assert!(matches!(ctx.advance(), Err(Error::Forbidden(_))));
    }

    #[test]
    fn basic_middleware_validates_credentials() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let mw = basic_auth_middleware(|u, p| u == "alice" && p == "secret");
        let mut ctx = Context::new();
        let mut headers = std::collections::HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Basic {}", STANDARD.encode("alice:secret")),
        );
        ctx.set_request(
            "GET".into(),
            "/x".into(),
            headers,
            std::collections::HashMap::new(),
            std::collections::HashMap::new(),
            Vec::new(),
        );
        ctx.begin_chain(chain_of(vec![mw, terminal()]));
        assert!(ctx.advance().is_ok());
    }
}
