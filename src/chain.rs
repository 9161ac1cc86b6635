//! The middleware chain executor.
//!
//! A chain is an ordered sequence of [`Handler`]s. Each handler receives the
//! request [`Context`](crate::context::Context) and may do work before and
//! after invoking the rest of the chain via [`Context::advance`]. The
//! executor's entry point starts at a synthetic index of `-1`; the first
//! call to `advance` runs handler `0`.

use crate::context::Context;
use crate::error::Result;
use std::sync::Arc;

/// A single link in a middleware chain.
///
/// Implemented for any `Fn(&mut Context) -> Result<()> + Send + Sync`
/// closure, so most handlers are written as closures; implement the trait
/// directly for middleware that carries its own state (auth providers,
/// CORS config, rate limiters).
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut Context) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync,
{
    fn call(&self, ctx: &mut Context) -> Result<()> {
        self(ctx)
    }
}

/// A boxed, reference-counted handler, cheap to share across routes that
/// register the same middleware.
pub type BoxHandler = Arc<dyn Handler>;

/// An immutable, shareable sequence of handlers. Routes are terminal
/// chains; the Application prepends global middleware ahead of them at
/// dispatch time.
pub type Chain = Arc<[BoxHandler]>;

/// Build a [`Chain`] from a list of handlers.
#[must_use]
pub fn chain_of(handlers: Vec<BoxHandler>) -> Chain {
    Arc::from(handlers.into_boxed_slice())
}

/// Concatenate two chains, used to splice global middleware ahead of a
/// route's own handlers without mutating either input.
#[must_use]
pub fn join_chains(prefix: &Chain, suffix: &Chain) -> Chain {
    let mut combined = Vec::with_capacity(prefix.len() + suffix.len());
    combined.extend(prefix.iter().cloned());
    combined.extend(suffix.iter().cloned());
    Arc::from(combined.into_boxed_slice())
}

/// Wraps a panic raised anywhere downstream into an `Error::Internal`
/// instead of unwinding across the coroutine boundary. Installed as the
/// first handler of every chain when the Application's panic recovery is
/// enabled.
pub fn recover() -> BoxHandler {
    Arc::new(|ctx: &mut Context| -> Result<()> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| ctx.advance()));
        match result {
            Ok(inner) => inner,
            Err(payload) => {
                let message = crate::error::panic_message(&*payload);
                tracing::error!(panic = %message, "handler panicked, recovered");
                Err(crate::error::Error::Internal(message))
            }
        }
    })
}
