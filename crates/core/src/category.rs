//! Value categories
//!
//! Every value the guest runtime can hold, and every host type the bridge can
//! marshal, belongs to exactly one `ValueCategory`. The discriminants follow
//! the classic tag numbering of Lua-style runtimes (`None` is -1, `Null` is 0)
//! so they can be logged and compared against external tooling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime-visible type tag of a stack slot or a marshallable host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ValueCategory {
    /// No value: an empty slot, or a host type with no category
    None = -1,
    Null = 0,
    Boolean = 1,
    LightPointer = 2,
    Number = 3,
    String = 4,
    Table = 5,
    Function = 6,
    UserData = 7,
    Thread = 8,
}

impl ValueCategory {
    /// Name used in guest-facing messages (`type()` results, error text)
    pub fn name(self) -> &'static str {
        match self {
            ValueCategory::None => "no value",
            ValueCategory::Null => "nil",
            ValueCategory::Boolean => "boolean",
            ValueCategory::LightPointer => "lightuserdata",
            ValueCategory::Number => "number",
            ValueCategory::String => "string",
            ValueCategory::Table => "table",
            ValueCategory::Function => "function",
            ValueCategory::UserData => "userdata",
            ValueCategory::Thread => "thread",
        }
    }

    /// Raw tag as reported by `get_type`
    pub fn tag(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
