//! Gzip response compression.
//!
//! Rewrites the response body with gzip when its length is at or above a
//! configured threshold and the request's `Accept-Encoding` header lists
//! `gzip`. Leaves the body untouched otherwise.

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct CompressionConfig {
    pub level: u32,
    pub min_length: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            level: 6,
            min_length: 1024,
        }
    }
}

fn accepts_gzip(header: Option<&str>) -> bool {
    header
        .map(|h| h.split(',').any(|part| part.trim().starts_with("gzip")))
        .unwrap_or(false)
}

/// Build the gzip-compression [`Handler`](crate::chain::Handler) from `config`.
#[must_use]
pub fn compression_middleware(config: CompressionConfig) -> BoxHandler {
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let client_accepts_gzip = accepts_gzip(ctx.header("accept-encoding"));
        ctx.advance()?;

        if !client_accepts_gzip || ctx.response_body().len() < config.min_length {
            return Ok(());
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(config.level));
        encoder
            .write_all(ctx.response_body())
            .map_err(|e| Error::Internal(format!("gzip compression failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::Internal(format!("gzip compression failed: {e}")))?;

        ctx.set_body_bytes(compressed);
        ctx.set_header("Content-Encoding", "gzip");
        ctx.set_header("Vary", "Accept-Encoding");
        Ok(())
    })
}
