//! HTTP cache-control header emission and conditional-request handling.
//!
//! Wraps a chain with `Cache-Control`/`Vary`/`Last-Modified` stamping and an
//! `ETag` computed from the response body. When the incoming request's
//! `If-None-Match` matches the computed ETag, the body is dropped and the
//! response short-circuits to 304.

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct CacheControlConfig {
    pub max_age: u64,
    pub public: bool,
    pub vary: Vec<String>,
    pub last_modified: Option<String>,
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        CacheControlConfig {
            max_age: 60,
            public: true,
            vary: Vec::new(),
            last_modified: None,
        }
    }
}

impl CacheControlConfig {
    fn directive(&self) -> String {
        let visibility = if self.public { "public" } else { "private" };
        format!("{visibility}, max-age={}", self.max_age)
    }
}

fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{:x}\"", digest)
}

/// Build the cache-control [`Handler`](crate::chain::Handler) from `config`.
#[must_use]
pub fn cache_control_middleware(config: CacheControlConfig) -> BoxHandler {
    let config = Arc::new(config);
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let if_none_match = ctx.header("if-none-match").map(str::to_string);
        ctx.advance()?;

        let etag = etag_for(ctx.response_body());
        if if_none_match.as_deref() == Some(etag.as_str()) {
            ctx.set_body_bytes(Vec::new());
            ctx.set_status(304);
        }

        ctx.set_header("Cache-Control", config.directive());
        ctx.set_header("ETag", etag);
        if !config.vary.is_empty() {
            ctx.set_header("Vary", config.vary.join(", "));
        }
        if let Some(last_modified) = &config.last_modified {
            ctx.set_header("Last-Modified", last_modified.clone());
        }
        Ok(())
    })
}
