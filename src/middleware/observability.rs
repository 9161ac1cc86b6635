//! Bridges [`crate::metrics::Metrics`] and [`crate::metrics::HealthRegistry`]
//! into the chain, plus introspection handlers for `/health`, `/healthz`,
//! and `/metrics`-style routes.

use crate::chain::BoxHandler;
use crate::context::Context;
use crate::error::Result;
use crate::metrics::{HealthRegistry, Metrics};
use std::sync::Arc;

/// Records request/response/error counters around the rest of the chain.
/// Useful for wiring a [`Metrics`] instance into a sub-router or a chain
/// assembled outside [`crate::app::Application::dispatch`], which already
/// maintains its own counters for the top-level pipeline.
#[must_use]
pub fn metrics_middleware(metrics: Arc<Metrics>) -> BoxHandler {
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let method = ctx.method().to_string();
        metrics.record_request(&method);
        let result = ctx.advance();
        if result.is_err() {
            metrics.record_error();
        }
        metrics.record_response();
        result
    })
}

/// A handler suitable for registering at `/metrics`: serializes the current
/// [`Metrics`] snapshot as JSON.
#[must_use]
pub fn metrics_handler(metrics: Arc<Metrics>) -> BoxHandler {
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        ctx.set_body_json(&metrics.snapshot())?;
        ctx.set_status(200);
        Ok(())
    })
}

/// A handler suitable for registering at `/health` or `/healthz`: reports
/// 200 when ready, 503 otherwise, with the aggregate health body in both
/// cases.
#[must_use]
pub fn health_handler(registry: Arc<HealthRegistry>) -> BoxHandler {
    Arc::new(move |ctx: &mut Context| -> Result<()> {
        let aggregate = registry.run();
        let status = if aggregate.ready { 200 } else { 503 };
        ctx.set_body_json(&aggregate)?;
        ctx.set_status(status);
        Ok(())
    })
}
