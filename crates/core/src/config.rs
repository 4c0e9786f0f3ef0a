//! Runtime limits
//!
//! Configuration is read from environment variables:
//!
//! - `STACKBIND_MAX_STACK`: maximum number of value-stack slots (default 1000000)
//! - `STACKBIND_MAX_CALL_DEPTH`: maximum nesting of guest calls (default 200)
//!
//! Unparseable or zero values fall back to the defaults.

pub const DEFAULT_MAX_STACK: usize = 1_000_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Limits enforced by a runtime instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Calls are refused with `stack overflow` once the stack holds more slots
    pub max_stack: usize,
    /// Calls are refused with `stack overflow` beyond this many nested frames
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let max_stack = std::env::var("STACKBIND_MAX_STACK")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_STACK);

        let max_call_depth = std::env::var("STACKBIND_MAX_CALL_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_CALL_DEPTH);

        Self {
            max_stack,
            max_call_depth,
        }
    }
}
