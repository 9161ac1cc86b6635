//! CORS preflight handling and response header emission.

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::Result;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// How an `Origin` header is checked against the configured allow-list.
#[derive(Clone)]
pub enum OriginValidation {
    Exact(Vec<String>),
    Wildcard,
    Regex(Vec<Regex>),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginValidation::Exact(v) => f.debug_tuple("Exact").field(v).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Regex(v) => {
                write!(f, "Regex(")?;
                for r in v {
                    write!(f, "{} ", r.as_str())?;
                }
                write!(f, ")")
            }
            OriginValidation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl OriginValidation {
    fn allows(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(list) => list.iter().any(|o| o == origin),
            OriginValidation::Wildcard => true,
            OriginValidation::Regex(list) => list.iter().any(|re| re.is_match(origin)),
            OriginValidation::Custom(f) => f(origin),
        }
    }
}

/// CORS configuration. `allow_credentials` with `Wildcard` origins is
/// rejected by [`CorsConfig::validate`]: browsers refuse
/// `Access-Control-Allow-Origin: *` alongside
/// `Access-Control-Allow-Credentials: true`.
#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allow_origins: OriginValidation,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allow_origins: OriginValidation::Wildcard,
            allow_methods: vec![
                "GET".into(),
                "POST".into(),
                "PUT".into(),
                "DELETE".into(),
                "PATCH".into(),
                "OPTIONS".into(),
            ],
            allow_headers: vec![
                "Origin".into(),
                "Content-Type".into(),
                "Accept".into(),
                "Authorization".into(),
            ],
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age: 3600,
        }
    }
}

pub struct CorsConfigError(pub String);

impl CorsConfig {
    pub fn validate(&self) -> std::result::Result<(), CorsConfigError> {
        if self.allow_credentials && matches!(self.allow_origins, OriginValidation::Wildcard) {
            return Err(CorsConfigError(
                "allow_credentials cannot be combined with a wildcard origin".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the CORS [`Handler`](crate::chain::Handler) from `config`.
///
/// Short-circuits `OPTIONS` preflight requests with a 204 and the
/// appropriate `Access-Control-*` headers; for all other requests it runs
/// the rest of the chain first, then stamps the response headers.
#[must_use]
pub fn cors_middleware(config: CorsConfig) -> BoxHandler {
    let config = Arc::new(config);
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let origin = ctx.header("origin").map(str::to_string);
        let allowed_origin = match &origin {
            Some(o) if config.allow_origins.allows(o) => Some(o.clone()),
            _ => None,
        };

        if ctx.method().eq_ignore_ascii_case("OPTIONS") {
            apply_cors_headers(ctx, &config, allowed_origin.as_deref());
            ctx.set_header("Access-Control-Allow-Methods", config.allow_methods.join(", "));
            ctx.set_header("Access-Control-Allow-Headers", config.allow_headers.join(", "));
            ctx.set_header("Access-Control-Max-Age", config.max_age.to_string());
            ctx.set_status(204);
            return Ok(());
        }

        ctx.advance()?;
        apply_cors_headers(ctx, &config, allowed_origin.as_deref());
        Ok(())
    })
}

fn apply_cors_headers(ctx: &mut Context, config: &CorsConfig, allowed_origin: Option<&str>) {
    let origin_header = if matches!(config.allow_origins, OriginValidation::Wildcard) {
        "*".to_string()
    } else if let Some(o) = allowed_origin {
        o.to_string()
    } else {
        return;
    };
    ctx.set_header("Access-Control-Allow-Origin", origin_header);
    if config.allow_credentials {
        ctx.set_header("Access-Control-Allow-Credentials", "true");
    }
    if !config.expose_headers.is_empty() {
        ctx.set_header("Access-Control-Expose-Headers", config.expose_headers.join(", "));
    }
}
