//! # trancer
//!
//! **trancer** is a lightweight, coroutine-powered HTTP request router,
//! middleware chain, and resource pool for building RPC-style services. It
//! runs on the `may` coroutine runtime: one coroutine per request, a 16 KB
//! default stack, and no async runtime underneath.
//!
//! ## Overview
//!
//! trancer gives you a prefix-tree route matcher, an index-advancing
//! middleware chain, a reusable request context, a generic bounded resource
//! pool, and an atomic metrics/health registry, plus a handful of thin
//! collaborators (JWT/Basic auth, CORS, HTTP cache-control, gzip
//! compression, a plugin registry, an etcd-style key-value wrapper, and an
//! HTTP↔gRPC header bridge) built on top of them.
//!
//! The library is organized into the following modules:
//!
//! - **[`route`]** — prefix-tree path matching with static, named, typed,
//!   wildcard, and catch-all segments.
//! - **[`chain`]** — the index-advancing middleware/handler executor.
//! - **[`context`]** — the per-request [`Context`](context::Context) and its
//!   free-list pool.
//! - **[`app`]** — the [`Application`](app::Application) core: route
//!   registration, dispatch, lifecycle hooks.
//! - **[`pool`]** — a generic, health-checked, bounded resource pool.
//! - **[`metrics`]** — atomic request counters and the health-check
//!   registry.
//! - **[`error`]** — the error taxonomy and its HTTP status mapping.
//! - **[`middleware`]** — CORS, auth, cache-control, compression, rate
//!   limiting, and metrics/health bridging as chain handlers.
//! - **[`security`]** — JWT and Basic credential validation.
//! - **[`server`]** — the `may_minihttp` transport wiring an `Application`
//!   up as an `HttpService`.
//! - **[`plugin`]** — a name-keyed registry of boxed capabilities.
//! - **[`etcd`]** — a thin key-value wrapper for the external
//!   persistence/service-discovery boundary.
//! - **[`grpc_bridge`]** — HTTP↔gRPC header and status translation.
//! - **[`ids`]** — trace-id generation and propagation.
//! - **[`runtime_config`]** — environment-driven coroutine stack sizing.
//! - **[`telemetry`]** — optional `tracing-subscriber` initialization for
//!   binaries embedding this crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use trancer::app::{Application, AppConfig};
//! use trancer::context::Context;
//! use std::sync::Arc;
//!
//! let mut app = Application::new(AppConfig::default());
//! app.register(http::Method::GET, "/pets/{id}", vec![Arc::new(
//!     |ctx: &mut Context| {
//!         let id = ctx.param("id").unwrap_or_default();
//!         ctx.set_body_json(&serde_json::json!({"id": id}))
//!     },
//! )])?;
//!
//! trancer::server::serve(app, "0.0.0.0:8080")?.join().unwrap();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod app;
pub mod chain;
pub mod context;
pub mod error;
pub mod etcd;
pub mod grpc_bridge;
pub mod ids;
pub mod metrics;
pub mod middleware;
pub mod plugin;
pub mod pool;
pub mod route;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod telemetry;

pub use app::{AppConfig, Application, RouteGroup};
pub use chain::{BoxHandler, Chain, Handler};
pub use context::Context;
pub use error::{Error, Result};
pub use pool::{Pool, PoolConfig, PooledGuard};
pub use route::{ParamConstraint, ParamKind, Trie};
