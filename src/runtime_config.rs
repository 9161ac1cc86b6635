//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the coroutine runtime
//! underlying request dispatch.
//!
//! ## `TRANCER_STACK_SIZE`
//!
//! Sets the stack size for per-request coroutines. Accepts decimal
//! (`16384`) or hex (`0x4000`) values. Default: `0x4000` (16 KB).
//!
//! Larger stacks support deeper handler call chains at the cost of memory:
//! 800 concurrent requests × 1 MB stack = 800 MB virtual memory, so tune
//! this based on handler complexity and expected concurrency.

use std::env;

/// Runtime configuration loaded from environment variables. Load this at
/// startup via [`RuntimeConfig::from_env`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for request coroutines in bytes (default: 16 KB / 0x4000).
    pub stack_size: usize,
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("TRANCER_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        RuntimeConfig { stack_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_var() {
        std::env::remove_var("TRANCER_STACK_SIZE");
        assert_eq!(RuntimeConfig::from_env().stack_size, 0x4000);
    }

    #[test]
    fn parses_hex_value() {
        std::env::set_var("TRANCER_STACK_SIZE", "0x8000");
        assert_eq!(RuntimeConfig::from_env().stack_size, 0x8000);
        std::env::remove_var("TRANCER_STACK_SIZE");
    }

    #[test]
    fn parses_decimal_value() {
        std::env::set_var("TRANCER_STACK_SIZE", "32768");
        assert_eq!(RuntimeConfig::from_env().stack_size, 32768);
        std::env::remove_var("TRANCER_STACK_SIZE");
    }
}
