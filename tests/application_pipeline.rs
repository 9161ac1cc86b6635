//! End-to-end exercise of the dispatch pipeline: routing, route groups,
//! global middleware, auth, and error mapping wired together the way a
//! real service would assemble them.

use parking_lot::RwLock;
use std::sync::Arc;
use trancer::app::{AppConfig, Application};
use trancer::context::Context;
use trancer::error::Error;
use trancer::middleware::{cors_middleware, rate_limit_middleware, CorsConfig, OriginValidation, RateLimiterConfig};

/// Shared call log used to assert ordering across middleware and handlers,
/// in the same spirit as the in-memory collectors used elsewhere in this
/// crate's tests.
#[derive(Default)]
struct CallLog {
    entries: RwLock<Vec<String>>,
}

impl CallLog {
    fn record(&self, entry: &str) {
        self.entries.write().push(entry.to_string());
    }

    fn snapshot(&self) -> Vec<String> {
        self.entries.read().clone()
    }
}

fn logging_middleware(log: Arc<CallLog>, label: &'static str) -> trancer::BoxHandler {
    Arc::new(move |ctx: &mut Context| {
        log.record(label);
        ctx.advance()
    })
}

#[test]
fn full_pipeline_runs_global_and_group_middleware_in_order() {
    let app = Application::new(AppConfig::default());
    let log = Arc::new(CallLog::default());

    app.use_middleware(logging_middleware(log.clone(), "global"));

    let group_log = log.clone();
    app.group("/api")
        .middleware(logging_middleware(group_log, "group"))
        .register(
            http::Method::GET,
            "/pets/{id}",
            vec![Arc::new(|ctx: &mut Context| {
                let id = ctx.param("id").unwrap_or_default().to_string();
                ctx.set_body_json(&serde_json::json!({"id": id}))
            })],
        )
        .unwrap();

    let result = app.dispatch(
        http::Method::GET,
        "/api/pets/7",
        Default::default(),
        Default::default(),
        Default::default(),
        Vec::new(),
        None,
    );

    assert_eq!(result.status, 200);
    assert_eq!(log.snapshot(), vec!["global", "group"]);
    let body: serde_json::Value = serde_json::from_slice(&result.body).unwrap();
    assert_eq!(body["id"], "7");
}

#[test]
fn cors_preflight_is_handled_before_route_handlers_run() {
    let app = Application::new(AppConfig::default());
    app.use_middleware(cors_middleware(CorsConfig {
        allow_origins: OriginValidation::Exact(vec!["https://example.com".into()]),
        allow_methods: vec!["GET".into(), "POST".into()],
        ..Default::default()
    }));
    app.register(
        http::Method::POST,
        "/orders",
        vec![Arc::new(|ctx: &mut Context| {
            ctx.set_status(201);
            Ok(())
        })],
    )
    .unwrap();

    let mut headers = std::collections::HashMap::new();
    headers.insert("origin".to_string(), "https://example.com".to_string());
    headers.insert("access-control-request-method".to_string(), "POST".to_string());

    let result = app.dispatch(
        http::Method::OPTIONS,
        "/orders",
        headers,
        Default::default(),
        Default::default(),
        Vec::new(),
        None,
    );

    assert_eq!(result.status, 204);
    assert!(result
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("access-control-allow-origin")));
}

#[test]
fn rate_limited_route_rejects_once_budget_is_spent() {
    let app = Application::new(AppConfig::default());
    app.use_middleware(rate_limit_middleware(RateLimiterConfig {
        rate: 1,
        window: std::time::Duration::from_secs(60),
        key_generator: Arc::new(|_ctx| "fixed-key".to_string()),
        handler: None,
    }));
    app.register(
        http::Method::GET,
        "/limited",
        vec![Arc::new(|ctx: &mut Context| {
            ctx.set_status(200);
            Ok(())
        })],
    )
    .unwrap();

    let dispatch = |app: &Application| {
        app.dispatch(
            http::Method::GET,
            "/limited",
            Default::default(),
            Default::default(),
            Default::default(),
            Vec::new(),
            None,
        )
    };

    let first = dispatch(&app);
    assert_eq!(first.status, 200);
    let second = dispatch(&app);
    assert_eq!(second.status, 429);
}

#[test]
fn handler_error_propagates_through_nested_middleware() {
    let app = Application::new(AppConfig::default());
    let log = Arc::new(CallLog::default());
    app.use_middleware(logging_middleware(log.clone(), "outer"));
    app.register(
        http::Method::DELETE,
        "/accounts/{id}",
        vec![Arc::new(|_ctx: &mut Context| -> trancer::error::Result<()> {
            Err(Error::Conflict("account has open orders".into()))
        })],
    )
    .unwrap();

    let result = app.dispatch(
        http::Method::DELETE,
        "/accounts/9",
        Default::default(),
        Default::default(),
        Default::default(),
        Vec::new(),
        None,
    );

    assert_eq!(result.status, 409);
    assert_eq!(log.snapshot(), vec!["outer"]);
}
