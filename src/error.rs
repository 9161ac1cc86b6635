//! Structured error taxonomy shared across the router, chain executor,
//! resource pool, and application core.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. The
//! variants map onto HTTP status codes via [`Error::status`] so the
//! application core can turn an unhandled error into a response without
//! each middleware having to know about transport concerns.

use std::fmt;

/// The crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("pool closed")]
    PoolClosed,

    #[error("malformed route pattern: {0}")]
    BadPattern(String),
}

/// The integer error code embedded in a structured error body.
///
/// Distinct from the HTTP status: some error kinds share a status (e.g.
/// every 4xx maps to itself) but the code field lets clients distinguish
/// application-level outcomes without parsing the message string.
impl Error {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Error::BadInput(_) | Error::BadPattern(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::Conflict(_) => 409,
            Error::RateLimited => 429,
            Error::Internal(_) => 500,
            Error::Timeout(_) => 504,
            Error::PoolClosed => 503,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadInput(_) => "bad_input",
            Error::BadPattern(_) => "bad_pattern",
            Error::NotFound(_) => "not_found",
            Error::MethodNotAllowed(_) => "method_not_allowed",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(_) => "conflict",
            Error::RateLimited => "rate_limited",
            Error::Internal(_) => "internal_error",
            Error::Timeout(_) => "timeout",
            Error::PoolClosed => "pool_closed",
        }
    }

    /// Serialize to the `{code, message, hint}` body shape, `hint` carrying
    /// the trace-id when one is supplied.
    #[must_use]
    pub fn to_body(&self, trace_id: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
            "hint": trace_id,
        })
    }
}

/// Wraps an arbitrary panic payload into a displayable message, used by the
/// Recover middleware and the server's own panic trap.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Lightweight classification used where only the kind (not the message)
/// matters, e.g. metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    NotFound,
    MethodNotAllowed,
    Unauthorized,
    Forbidden,
    Conflict,
    RateLimited,
    Internal,
    Timeout,
    PoolClosed,
    BadPattern,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadInput(_) => ErrorKind::BadInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::RateLimited => ErrorKind::RateLimited,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::PoolClosed => ErrorKind::PoolClosed,
            Error::BadPattern(_) => ErrorKind::BadPattern,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
