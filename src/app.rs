//! Application core: route registration, grouping, lifecycle hooks, and
//! the request dispatch pipeline that ties the route trie, middleware
//! chain, and request context together.

use crate::chain::{chain_of, join_chains, BoxHandler, Chain};
use crate::context::{Context, ContextPool};
use crate::error::Error;
use crate::metrics::{HealthRegistry, Metrics};
use crate::route::Trie;
use http::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Per-application tunables. Mirrors the environment-driven configuration
/// convention used elsewhere in this crate.
#[derive(Clone)]
pub struct AppConfig {
    pub name: String,
    pub max_body_bytes: usize,
    pub compression_level: u32,
    pub compression_min_length: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "trancer-app".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            compression_level: 6,
            compression_min_length: 1024,
        }
    }
}

#[derive(Default)]
struct Hooks {
    on_route_registered: Vec<Box<dyn Fn(&Method, &str) + Send + Sync>>,
    on_listen: Vec<Box<dyn Fn() -> Result<(), Error> + Send + Sync>>,
    on_shutdown: Vec<Box<dyn Fn() + Send + Sync>>,
}

/// The raw result of one dispatch: status, response headers, and body.
pub struct DispatchResult {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

struct Inner {
    routers: RwLock<HashMap<Method, Trie<Chain>>>,
    not_found: RwLock<HashMap<Method, BoxHandler>>,
    global_middleware: RwLock<Vec<BoxHandler>>,
    context_pool: ContextPool,
    metrics: Arc<Metrics>,
    health: Arc<HealthRegistry>,
    config: AppConfig,
    hooks: Hooks,
    in_flight: AtomicI64,
    registered_routes: AtomicUsize,
}

/// The application core. Cheap to clone: internally reference-counted, so
/// every worker thread/coroutine can hold its own handle.
#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

impl Application {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Application {
            inner: Arc::new(Inner {
                routers: RwLock::new(HashMap::new()),
                not_found: RwLock::new(HashMap::new()),
                global_middleware: RwLock::new(Vec::new()),
                context_pool: ContextPool::new(),
                metrics: Arc::new(Metrics::new()),
                health: Arc::new(HealthRegistry::new()),
                config,
                hooks: Hooks::default(),
                in_flight: AtomicI64::new(0),
                registered_routes: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        self.inner.metrics.clone()
    }

    #[must_use]
    pub fn health(&self) -> Arc<HealthRegistry> {
        self.inner.health.clone()
    }

    /// Append a middleware to the front of every route's effective chain.
    /// Applies to routes registered before *and* after this call: the
    /// global middleware list is read fresh on every dispatch.
    pub fn use_middleware(&self, handler: BoxHandler) {
        #[allow(clippy::unwrap_used)]
        self.inner.global_middleware.write().unwrap().push(handler);
    }

    /// Register `handlers` at `pattern` for `method`.
    pub fn register(
        &self,
        method: Method,
        pattern: &str,
        handlers: Vec<BoxHandler>,
    ) -> Result<(), Error> {
        let chain = chain_of(handlers);
        #[allow(clippy::unwrap_used)]
        let mut routers = self.inner.routers.write().unwrap();
        routers.entry(method.clone()).or_default().insert(pattern, chain)?;
        drop(routers);
        self.inner.registered_routes.fetch_add(1, Ordering::Relaxed);
        for hook in &self.inner.hooks.on_route_registered {
            hook(&method, pattern);
        }
        Ok(())
    }

    pub fn set_not_found(&self, method: Method, handler: BoxHandler) {
        #[allow(clippy::unwrap_used)]
        self.inner.not_found.write().unwrap().insert(method, handler);
    }

    /// Start a path-prefixed, middleware-scoped group of registrations.
    #[must_use]
    pub fn group(&self, prefix: &str) -> RouteGroup {
        RouteGroup {
            app: self.clone(),
            prefix: prefix.trim_end_matches('/').to_string(),
            middleware: Vec::new(),
        }
    }

    pub fn on_route_registered(&mut self, f: impl Fn(&Method, &str) + Send + Sync + 'static) {
        #[allow(clippy::unwrap_used)]
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the application is shared")
            .hooks
            .on_route_registered
            .push(Box::new(f));
    }

    pub fn on_listen(&mut self, f: impl Fn() -> Result<(), Error> + Send + Sync + 'static) {
        #[allow(clippy::unwrap_used)]
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the application is shared")
            .hooks
            .on_listen
            .push(Box::new(f));
    }

    pub fn on_shutdown(&mut self, f: impl Fn() + Send + Sync + 'static) {
        #[allow(clippy::unwrap_used)]
        Arc::get_mut(&mut self.inner)
            .expect("hooks must be registered before the application is shared")
            .hooks
            .on_shutdown
            .push(Box::new(f));
    }

    /// Run every `on_listen` hook. Called by the server wrapper right
    /// before it starts accepting connections. The first failing hook
    /// aborts startup.
    pub fn fire_on_listen(&self) -> Result<(), Error> {
        for hook in &self.inner.hooks.on_listen {
            hook()?;
        }
        self.inner.health.set_ready();
        Ok(())
    }

    /// Run every `on_shutdown` hook, logging (not propagating) failures.
    pub fn fire_on_shutdown(&self) {
        self.inner.health.set_not_ready();
        for hook in &self.inner.hooks.on_shutdown {
            hook();
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Block until there are no in-flight requests or `timeout` elapses.
    /// Used by graceful shutdown to let the last chains finish.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Run the full dispatch pipeline for one request: method/path lookup,
    /// parameter binding, chain execution, and error-to-response mapping.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        cookies: HashMap<String, String>,
        body: Vec<u8>,
        incoming_trace_id: Option<String>,
    ) -> DispatchResult {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.metrics.record_request(method.as_str());
        let mut ctx = self.inner.context_pool.acquire();

        let trace_id = crate::ids::TraceId::from_header_or_new(incoming_trace_id.as_deref()).to_string();
        ctx.set_trace_id(trace_id.clone());
        ctx.set_request(method.as_str().to_string(), path.to_string(), headers, query, cookies, body);

        let result = self.run_matched(&method, path, &mut ctx, &trace_id);

        self.inner.metrics.record_response();
        self.inner.in_flight.fetch_add(-1, Ordering::SeqCst);
        self.inner.context_pool.release(ctx);
        result
    }

    fn run_matched(
        &self,
        method: &Method,
        path: &str,
        ctx: &mut Context,
        trace_id: &str,
    ) -> DispatchResult {
        #[allow(clippy::unwrap_used)]
        let routers = self.inner.routers.read().unwrap();
        let Some(trie) = routers.get(method) else {
            drop(routers);
            let err = Error::MethodNotAllowed(format!("no routes for method {method}"));
            let status = err.status();
            return self.error_response(err, status, trace_id);
        };

        let Some((route_chain, params)) = trie.find(path) else {
            drop(routers);
            #[allow(clippy::unwrap_used)]
            let not_found = self.inner.not_found.read().unwrap().get(method).cloned();
            return match not_found {
                Some(handler) => {
                    ctx.set_params(Default::default());
                    ctx.begin_chain(chain_of(vec![handler]));
                    self.run_chain(ctx, trace_id)
                }
                None => {
                    let err = Error::NotFound(path.to_string());
                    let status = err.status();
                    self.error_response(err, status, trace_id)
                }
            };
        };

        ctx.set_params(params);
        #[allow(clippy::unwrap_used)]
        let global = self.inner.global_middleware.read().unwrap().clone();
        drop(routers);
        let effective = join_chains(&Chain::from(global.into_boxed_slice()), &route_chain);
        ctx.begin_chain(effective);
        self.run_chain(ctx, trace_id)
    }

    fn run_chain(&self, ctx: &mut Context, trace_id: &str) -> DispatchResult {
        match ctx.advance() {
            Ok(()) => {
                let mut headers = ctx.response_headers().to_vec();
                headers.push((crate::ids::TRACE_HEADER.to_string(), trace_id.to_string()));
                DispatchResult {
                    status: ctx.status(),
                    headers,
                    body: ctx.response_body().to_vec(),
                }
            }
            Err(err) => {
                let status = err.status();
                self.error_response(err, status, trace_id)
            }
        }
    }

    fn error_response(&self, err: Error, status: u16, trace_id: &str) -> DispatchResult {
        self.inner.metrics.record_error();
        let body = serde_json::to_vec(&err.to_body(Some(trace_id))).unwrap_or_default();
        DispatchResult {
            status,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (crate::ids::TRACE_HEADER.to_string(), trace_id.to_string()),
            ],
            body,
        }
    }
}

/// A prefix- and middleware-scoped batch of route registrations, produced
/// by [`Application::group`].
pub struct RouteGroup {
    app: Application,
    prefix: String,
    middleware: Vec<BoxHandler>,
}

impl RouteGroup {
    #[must_use]
    pub fn middleware(mut self, handler: BoxHandler) -> Self {
        self.middleware.push(handler);
        self
    }

    pub fn register(
        &self,
        method: Method,
        pattern: &str,
        handlers: Vec<BoxHandler>,
    ) -> Result<(), Error> {
        let full_pattern = format!("{}{}", self.prefix, pattern);
        let mut combined = self.middleware.clone();
        combined.extend(handlers);
        self.app.register(method, &full_pattern, combined)
    }
}
