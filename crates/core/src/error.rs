//! Guest-side error handling
//!
//! A guest error carries an arbitrary guest value (usually a string message).
//! Native entry points raise one by returning `Err(GuestError)`; the runtime
//! then unwinds to the nearest protected call.
//!
//! Unwinding through native frames uses the panic machinery with a private
//! marker payload (`GuestUnwind`), so the innermost `protected_call` can tell
//! a guest error apart from a genuine host panic and re-raise the latter.
//! Guest values are `!Send`, so the error itself travels in the state's
//! pending-error slot rather than inside the payload.

use crate::value::GuestValue;
use std::fmt;

/// An error raised inside the guest runtime
#[derive(Debug, Clone)]
pub struct GuestError {
    value: GuestValue,
}

/// Result type of native entry points
pub type GuestResult<T> = Result<T, GuestError>;

impl GuestError {
    /// Raise a string message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            value: GuestValue::from(message.into()),
        }
    }

    /// Raise an arbitrary guest value (the argument of `error(v)`)
    pub fn from_value(value: GuestValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &GuestValue {
        &self.value
    }

    pub fn into_value(self) -> GuestValue {
        self.value
    }

    /// Message text: the string itself, or a description of a non-string error object
    pub fn message(&self) -> String {
        describe_error_value(&self.value)
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for GuestError {}

/// Render an error object left on the stack by a failed protected call
pub fn describe_error_value(value: &GuestValue) -> String {
    match value {
        GuestValue::String(s) => s.to_string(),
        GuestValue::Number(_) => value.to_string(),
        other => format!("(error object is a {} value)", other.category().name()),
    }
}

/// Outcome of a protected call
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Results are on the stack
    Ok,
    /// The error object is on top of the stack
    RuntimeError,
}

/// Panic payload used to unwind a guest error to the nearest protected call
pub(crate) struct GuestUnwind;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_string() {
        let err = GuestError::new("boom");
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_message_from_number_and_other_values() {
        assert_eq!(GuestError::from_value(GuestValue::Number(12.0)).message(), "12");
        assert_eq!(
            GuestError::from_value(GuestValue::Boolean(true)).message(),
            "(error object is a boolean value)"
        );
        assert_eq!(
            GuestError::from_value(GuestValue::Nil).message(),
            "(error object is a nil value)"
        );
    }
}
