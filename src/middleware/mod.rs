//! Composable middleware: [`Handler`](crate::chain::Handler) factories for
//! cross-cutting concerns layered around route handlers.
//!
//! Each submodule builds a [`BoxHandler`](crate::chain::BoxHandler) from a
//! config struct. Middleware is ordinary chain position — there is no
//! separate before/after split. A middleware that wants to act on the way
//! out calls [`Context::advance`](crate::context::Context::advance) first,
//! then runs its post-processing after it returns.
//!
//! Typical ordering: CORS first (so preflight short-circuits before auth
//! runs), then rate limiting, then auth, then cache/compression closest to
//! the handler so they see the final response body.

pub mod auth;
pub mod cache;
pub mod compression;
pub mod cors;
pub mod observability;
pub mod rate_limit;

pub use auth::{basic_auth_middleware, bearer_jwt_middleware};
pub use cache::{cache_control_middleware, CacheControlConfig};
pub use compression::{compression_middleware, CompressionConfig};
pub use cors::{cors_middleware, CorsConfig, CorsConfigError, OriginValidation};
pub use observability::{health_handler, metrics_handler, metrics_middleware};
pub use rate_limit::{rate_limit_middleware, RateLimiterConfig};
