//! Token-bucket rate limiting keyed by a caller-supplied extractor.
//!
//! Defaults to keying on the remote IP found in a `x-forwarded-for` or
//! `x-real-ip` header (falls back to the constant key `"unknown"` when
//! neither is present, which degrades to a single shared bucket — callers
//! behind a trusted proxy should set the key generator explicitly).

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-key token bucket. `tokens` refills continuously at `rate` tokens per
/// `window`, capped at `rate`.
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Clone)]
pub struct RateLimiterConfig {
    pub rate: u32,
    pub window: Duration,
    pub key_generator: Arc<dyn Fn(&Context) -> String + Send + Sync>,
    /// Optional rejection override. When set, it is invoked instead of the
    /// default `Error::RateLimited` response and is responsible for
    /// stamping `Retry-After` (and any other rejection headers/body) on
    /// `ctx` itself; `retry_after` is how long until a token is next
    /// available. When `None`, a rejection surfaces as a plain
    /// `Error::RateLimited` with no `Retry-After` header.
    pub handler: Option<Arc<dyn Fn(&mut Context, Duration) + Send + Sync>>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfig {
            rate: 100,
            window: Duration::from_secs(60),
            key_generator: Arc::new(default_key_generator),
            handler: None,
        }
    }
}

/// Default `handler` implementation: sets status 429 and a `Retry-After`
/// header carrying the whole-second ceiling of `retry_after`.
#[must_use]
pub fn retry_after_handler() -> Arc<dyn Fn(&mut Context, Duration) + Send + Sync> {
    Arc::new(|ctx: &mut Context, retry_after: Duration| {
        ctx.set_status(429);
        let seconds = retry_after.as_secs_f64().ceil() as u64;
        ctx.set_header("Retry-After", seconds.to_string());
    })
}

fn default_key_generator(ctx: &Context) -> String {
    ctx.header("x-forwarded-for")
        .or_else(|| ctx.header("x-real-ip"))
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Build the rate-limiting [`Handler`](crate::chain::Handler) from `config`.
#[must_use]
pub fn rate_limit_middleware(config: RateLimiterConfig) -> BoxHandler {
    let buckets: Arc<DashMap<String, Mutex<Bucket>>> = Arc::new(DashMap::new());
    let refill_per_sec = f64::from(config.rate) / config.window.as_secs_f64();

    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let key = (config.key_generator)(ctx);
        let deficit = {
            let entry = buckets.entry(key).or_insert_with(|| {
                Mutex::new(Bucket {
                    tokens: f64::from(config.rate),
                    last_refill: Instant::now(),
                })
            });
            let mut bucket = entry.lock().expect("rate limit bucket mutex poisoned");
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(f64::from(config.rate));
            bucket.last_refill = now;
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                None
            } else {
                Some(1.0 - bucket.tokens)
            }
        };

        if let Some(deficit) = deficit {
            let retry_after = Duration::from_secs_f64(deficit / refill_per_sec);
            if let Some(handler) = &config.handler {
                handler(ctx, retry_after);
                return Ok(());
            }
            return Err(Error::RateLimited);
        }
        ctx.advance()
    })
}
