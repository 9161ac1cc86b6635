//! Structured logging initialization.
//!
//! This crate instruments itself with `tracing` throughout; this module is
//! the thin, optional `tracing-subscriber` wiring a binary embedding
//! trancer can call at startup. It is not wired in automatically —
//! multiple libraries initializing the global subscriber is a common
//! footgun, so callers opt in explicitly.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Initialize a global `tracing` subscriber reading its filter from
/// `RUST_LOG` (default `info`), writing to stdout through a non-blocking
/// writer. Returns the worker guard; drop it to flush buffered log lines on
/// shutdown.
pub fn init_tracing(format: LogFormat) -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty().with_writer(writer)).init(),
    }
    guard
}
