//! Stackbind Core: a minimal stack-based guest runtime
//!
//! This crate provides the runtime side of the stackbind host/guest bridge:
//! the value-exchange stack, call frames, the registry of pinned values,
//! globals, and direct and protected calls. It has no parser or
//! compiler; guest functions are native entry points operating on the stack,
//! like C functions registered with a Lua-style interpreter.
//!
//! Key design principles:
//! - GuestValue: What the runtime talks about (nil, boolean, number, string, ...)
//! - State: A shared handle; every operation borrows the interior briefly
//! - Frames: Stack indices are 1-based and relative to the running function
//!
//! # Modules
//!
//! - `category`: Value categories shared with the host-side type classifier
//! - `value`: The `GuestValue` enum and native closures
//! - `error`: Guest errors and protected-call status
//! - `registry`: Persistent handles for values that outlive the stack
//! - `state`: The runtime instance (stack, frames, registry, globals, calls)
//! - `baselib`: `print`, `type`, `pcall` and friends
//! - `config`: Limits loaded from the environment

pub mod baselib;
pub mod category;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod value;

pub use baselib::Library;
pub use category::ValueCategory;
pub use config::RuntimeConfig;
pub use error::{CallStatus, GuestError, GuestResult, describe_error_value};
pub use registry::{Registry, RegistryIndex};
pub use state::{ResultMode, State, WeakState};
pub use value::{Closure, GuestFn, GuestValue};
