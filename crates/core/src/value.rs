//! Guest values
//!
//! `GuestValue` is what the guest runtime talks about. Values are cheap to
//! clone: strings, closures and userdata are reference counted (`Rc`), which
//! also makes the whole runtime `!Send` - a runtime instance belongs to the
//! thread that created it.

use crate::category::ValueCategory;
use crate::error::GuestResult;
use crate::state::State;
use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

/// Native entry point of a guest function.
///
/// The callee sees its arguments at stack indices `1..=top` and returns the
/// number of results it left on top of the stack.
pub type GuestFn = fn(&State) -> GuestResult<usize>;

/// A guest function: an entry point plus the upvalues bound when it was pushed
pub struct Closure {
    pub(crate) entry: GuestFn,
    pub(crate) upvalues: Box<[GuestValue]>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("entry", &(self.entry as usize as *const ()))
            .field("upvalues", &self.upvalues.len())
            .finish()
    }
}

/// Value held in a stack slot, the registry, or a global
#[derive(Clone, Default)]
pub enum GuestValue {
    #[default]
    Nil,
    Boolean(bool),
    /// The runtime's only numeric type
    Number(f64),
    String(Rc<str>),
    LightPointer(*mut c_void),
    Function(Rc<Closure>),
    /// Opaque host data; only native code can look inside
    UserData(Rc<dyn Any>),
}

impl GuestValue {
    pub fn category(&self) -> ValueCategory {
        match self {
            GuestValue::Nil => ValueCategory::Null,
            GuestValue::Boolean(_) => ValueCategory::Boolean,
            GuestValue::Number(_) => ValueCategory::Number,
            GuestValue::String(_) => ValueCategory::String,
            GuestValue::LightPointer(_) => ValueCategory::LightPointer,
            GuestValue::Function(_) => ValueCategory::Function,
            GuestValue::UserData(_) => ValueCategory::UserData,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, GuestValue::Nil)
    }

    /// Truthiness: everything except nil and false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, GuestValue::Nil | GuestValue::Boolean(false))
    }
}

impl fmt::Debug for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestValue::Nil => write!(f, "Nil"),
            GuestValue::Boolean(b) => write!(f, "Boolean({})", b),
            GuestValue::Number(n) => write!(f, "Number({})", n),
            GuestValue::String(s) => write!(f, "String({:?})", s),
            GuestValue::LightPointer(p) => write!(f, "LightPointer({:p})", p),
            GuestValue::Function(c) => write!(f, "Function({:p})", Rc::as_ptr(c)),
            GuestValue::UserData(u) => write!(f, "UserData({:p})", Rc::as_ptr(u) as *const ()),
        }
    }
}

/// Guest-side string conversion, as used by `tostring` and error messages
impl fmt::Display for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestValue::Nil => write!(f, "nil"),
            GuestValue::Boolean(b) => write!(f, "{}", b),
            GuestValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            GuestValue::String(s) => f.write_str(s),
            GuestValue::LightPointer(p) => write!(f, "lightuserdata: {:p}", p),
            GuestValue::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
            GuestValue::UserData(u) => write!(f, "userdata: {:p}", Rc::as_ptr(u) as *const ()),
        }
    }
}

impl From<bool> for GuestValue {
    fn from(value: bool) -> Self {
        GuestValue::Boolean(value)
    }
}

impl From<f64> for GuestValue {
    fn from(value: f64) -> Self {
        GuestValue::Number(value)
    }
}

impl From<&str> for GuestValue {
    fn from(value: &str) -> Self {
        GuestValue::String(Rc::from(value))
    }
}

impl From<String> for GuestValue {
    fn from(value: String) -> Self {
        GuestValue::String(Rc::from(value))
    }
}
