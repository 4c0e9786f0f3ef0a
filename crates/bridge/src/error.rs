//! Host-level errors and the error translator
//!
//! Marshalling failures inside the marshallers are plain `None` results; they
//! only become an `Error` at the function-bridge boundary, where the caller
//! asked for a value of a specific type and did not get one.
//!
//! The other direction (a native closure rejecting an argument the guest
//! passed) never produces an `Error`: the trampoline raises a
//! `stackbind_core::GuestError` instead, so guest code can catch it.

use stackbind_core::{State, describe_error_value};
use std::fmt;

/// Failure reported to host code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Calling an empty function, a stale registry slot, or a released runtime
    Invocation {
        operation: &'static str,
        message: String,
    },
    /// A protected call caught a guest error; `message` is the guest's text
    GuestRuntime {
        operation: &'static str,
        message: String,
    },
    /// A value crossing the bridge did not have the declared type
    Marshal {
        operation: &'static str,
        message: String,
    },
}

impl Error {
    pub fn invocation(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Invocation {
            operation,
            message: message.into(),
        }
    }

    pub fn marshal(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Marshal {
            operation,
            message: message.into(),
        }
    }

    /// Translate the error object a failed protected call left on top of the
    /// stack, removing it.
    pub fn from_stack(operation: &'static str, state: &State) -> Self {
        let message = state
            .value_at(state.top())
            .map(|value| describe_error_value(&value))
            .unwrap_or_else(|| "unknown guest error".to_string());
        state.pop(1);
        Error::GuestRuntime { operation, message }
    }

    /// Name of the operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            Error::Invocation { operation, .. }
            | Error::GuestRuntime { operation, .. }
            | Error::Marshal { operation, .. } => *operation,
        }
    }

    /// Human-readable message, without the operation suffix
    pub fn message(&self) -> &str {
        match self {
            Error::Invocation { message, .. }
            | Error::GuestRuntime { message, .. }
            | Error::Marshal { message, .. } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [Function: {}]", self.message(), self.operation())
    }
}

impl std::error::Error for Error {}
