//! Tagged values: a category plus a matching payload
//!
//! Used where the category is only known at runtime. The payload variant
//! always agrees with `category()`, because the two are the same enum.

use crate::classify::Nil;
use crate::composite::Args;
use crate::error::Error;
use crate::function::{Function, FunctionSnapshot};
use crate::marshal::{Peek, Push};
use stackbind_core::{State, ValueCategory};
use std::ffi::c_void;

#[derive(Debug, Clone)]
pub enum TaggedValue {
    Null,
    Boolean(bool),
    Number(f64),
    /// Pushed as a number; never produced by peeking
    Integer(i64),
    String(String),
    LightPointer(*mut c_void),
    Function(FunctionSnapshot),
}

impl TaggedValue {
    pub fn category(&self) -> ValueCategory {
        match self {
            TaggedValue::Null => ValueCategory::Null,
            TaggedValue::Boolean(_) => ValueCategory::Boolean,
            TaggedValue::Number(_) | TaggedValue::Integer(_) => ValueCategory::Number,
            TaggedValue::String(_) => ValueCategory::String,
            TaggedValue::LightPointer(_) => ValueCategory::LightPointer,
            TaggedValue::Function(_) => ValueCategory::Function,
        }
    }
}

impl Push for TaggedValue {
    fn push(&self, state: &State) -> Result<usize, Error> {
        match self {
            TaggedValue::Null => state.push_nil(),
            TaggedValue::Boolean(b) => state.push_boolean(*b),
            TaggedValue::Number(n) => state.push_number(*n),
            TaggedValue::Integer(i) => state.push_number(*i as f64),
            TaggedValue::String(s) => state.push_string(s),
            TaggedValue::LightPointer(p) => return p.push(state),
            TaggedValue::Function(snapshot) => return snapshot.push(state),
        }
        Ok(1)
    }
}

impl Peek for TaggedValue {
    const SLOTS: usize = 1;

    /// Scalars only; a function slot does not peek, since that would pin it
    fn peek(state: &State, index: usize) -> Option<Self> {
        match state.get_type(index) {
            ValueCategory::Null => Some(TaggedValue::Null),
            ValueCategory::Boolean => state.to_boolean(index).map(TaggedValue::Boolean),
            ValueCategory::Number => state.to_number(index).map(TaggedValue::Number),
            ValueCategory::String => state
                .to_string(index)
                .map(|s| TaggedValue::String(s.to_string())),
            ValueCategory::LightPointer => {
                state.to_light_pointer(index).map(TaggedValue::LightPointer)
            }
            _ => None,
        }
    }
}

impl From<Nil> for TaggedValue {
    fn from(_: Nil) -> Self {
        TaggedValue::Null
    }
}

impl From<bool> for TaggedValue {
    fn from(value: bool) -> Self {
        TaggedValue::Boolean(value)
    }
}

impl From<f64> for TaggedValue {
    fn from(value: f64) -> Self {
        TaggedValue::Number(value)
    }
}

impl From<i64> for TaggedValue {
    fn from(value: i64) -> Self {
        TaggedValue::Integer(value)
    }
}

impl From<&str> for TaggedValue {
    fn from(value: &str) -> Self {
        TaggedValue::String(value.to_string())
    }
}

impl From<String> for TaggedValue {
    fn from(value: String) -> Self {
        TaggedValue::String(value)
    }
}

impl From<*mut c_void> for TaggedValue {
    fn from(value: *mut c_void) -> Self {
        TaggedValue::LightPointer(value)
    }
}

impl<A, R> From<&Function<A, R>> for TaggedValue
where
    A: Args + 'static,
    R: Push + Peek + 'static,
{
    fn from(value: &Function<A, R>) -> Self {
        TaggedValue::Function(value.snapshot())
    }
}
