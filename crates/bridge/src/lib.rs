//! Stackbind: typed marshalling between Rust and a stack-based guest runtime
//!
//! Host values cross into the guest runtime through its value stack. This
//! crate hides that protocol behind three traits:
//!
//! - `Classify`: the one value category a host type marshals as
//! - `Push`: write a host value, reporting how many slots it took
//! - `Peek`: read a host value back, or report that the slot does not fit
//!
//! Scalars take one slot. Tuples take the sum of their elements' slots, and
//! `Option<T>` takes `T`'s slots when set and none otherwise.
//!
//! `Function<A, R>` carries callables both ways. A host closure pushed onto
//! the stack becomes a guest function; a guest function peeked from the stack
//! becomes a handle the host can `execute` or `execute_protected`.
//!
//! ```ignore
//! let state = State::new();
//! let add2: Function<(i32, i32), i32> = Function::new(|a: i32, b: i32| a + b);
//! state.set_global("add2", &add2)?;
//!
//! if let Global::Found(mul) = state.get_global::<Function<(i32, i32), i32>>("mul") {
//!     assert_eq!(mul.execute_protected((6, 7))?, 42);
//! }
//! ```

pub mod classify;
pub mod composite;
pub mod error;
pub mod function;
pub mod globals;
pub mod marshal;
pub mod scalar;
pub mod tagged;

pub use classify::{Classify, Nil, category_of};
pub use composite::Args;
pub use error::Error;
pub use function::{Function, FunctionKind, FunctionSnapshot, NativeFn};
pub use globals::{Global, Globals};
pub use marshal::{Peek, Push, peek, pop, push};
pub use tagged::TaggedValue;

pub use stackbind_core::{Library, State, ValueCategory};
