//! Function bridge
//!
//! A `Function<A, R>` is a typed handle to something callable with the
//! argument tuple `A`, returning `R`. Its descriptor is in one of three
//! states:
//!
//! - **Empty**: nothing to call. Invoking or pushing it is an error.
//! - **Native**: a host closure. Pushing it installs a guest closure whose
//!   single upvalue is the descriptor and whose entry point is the
//!   trampoline, so guest code can call back into the host.
//! - **Registered**: a guest function pinned in the runtime's registry. Only
//!   peeking a guest function produces this state.
//!
//! Handles are reference counted. Clones share one descriptor; the registry
//! slot of a Registered descriptor is released when the last handle (or the
//! last guest closure holding a native descriptor that captured it) goes
//! away. A descriptor does not keep its runtime alive: once the runtime is
//! dropped the handle is no longer callable and its drop does nothing.

use crate::classify::Classify;
use crate::composite::Args;
use crate::error::Error;
use crate::marshal::{Peek, Push};
use stackbind_core::{
    CallStatus, GuestError, GuestFn, GuestResult, GuestValue, RegistryIndex, ResultMode, State,
    ValueCategory, WeakState,
};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Backing state of a function descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    None,
    Native,
    Registered,
}

enum Backing<A, R> {
    None,
    Native(Box<dyn Fn(A) -> R>),
    Registered {
        state: WeakState,
        index: RegistryIndex,
    },
}

/// The shared descriptor behind every clone of a `Function`
struct Context<A, R> {
    backing: Backing<A, R>,
}

impl<A, R> Drop for Context<A, R> {
    fn drop(&mut self) {
        if let Backing::Registered { state, index } = &self.backing {
            match state.upgrade() {
                Some(state) => {
                    state.unpin(*index);
                }
                None => debug!(slot = index.get(), "runtime gone; registry slot not released"),
            }
        }
    }
}

/// Host closures that can back a `Function<A, R>`.
///
/// Implemented for every `Fn` taking up to eight arguments, so a closure's
/// parameter list maps directly onto the argument tuple.
pub trait NativeFn<A, R>: 'static {
    fn call_native(&self, args: A) -> R;
}

impl<F, R> NativeFn<(), R> for F
where
    F: Fn() -> R + 'static,
{
    fn call_native(&self, _args: ()) -> R {
        self()
    }
}

macro_rules! native_fn {
    ($($name:ident),+) => {
        impl<F, R, $($name),+> NativeFn<($($name,)+), R> for F
        where
            F: Fn($($name),+) -> R + 'static,
        {
            #[allow(non_snake_case)]
            fn call_native(&self, ($($name,)+): ($($name,)+)) -> R {
                self($($name),+)
            }
        }
    };
}

native_fn!(A1);
native_fn!(A1, A2);
native_fn!(A1, A2, A3);
native_fn!(A1, A2, A3, A4);
native_fn!(A1, A2, A3, A4, A5);
native_fn!(A1, A2, A3, A4, A5, A6);
native_fn!(A1, A2, A3, A4, A5, A6, A7);
native_fn!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Typed callable crossing the host/guest boundary
pub struct Function<A, R> {
    context: Rc<Context<A, R>>,
}

/// Point-in-time copy of a descriptor's backing, for `TaggedValue`.
///
/// A registered snapshot records the slot only; it does not keep the slot
/// pinned.
#[derive(Clone)]
pub enum FunctionSnapshot {
    Empty,
    Native {
        context: Rc<dyn Any>,
        entry: GuestFn,
    },
    Registered {
        index: RegistryIndex,
    },
}

impl fmt::Debug for FunctionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionSnapshot::Empty => write!(f, "Empty"),
            FunctionSnapshot::Native { context, .. } => {
                write!(f, "Native({:p})", Rc::as_ptr(context))
            }
            FunctionSnapshot::Registered { index } => write!(f, "Registered({})", index),
        }
    }
}

impl FunctionSnapshot {
    pub fn kind(&self) -> FunctionKind {
        match self {
            FunctionSnapshot::Empty => FunctionKind::None,
            FunctionSnapshot::Native { .. } => FunctionKind::Native,
            FunctionSnapshot::Registered { .. } => FunctionKind::Registered,
        }
    }

    pub(crate) fn push(&self, state: &State) -> Result<usize, Error> {
        match self {
            FunctionSnapshot::Empty => Err(Error::invocation(
                "TaggedValue::push",
                "function snapshot has no backing",
            )),
            FunctionSnapshot::Native { context, entry } => {
                state.push_userdata(context.clone());
                state.push_native_closure(*entry, 1);
                Ok(1)
            }
            FunctionSnapshot::Registered { index } => {
                push_registered(state, *index, "TaggedValue::push")?;
                Ok(1)
            }
        }
    }
}

/// Push the function pinned at `index`, or fail leaving the stack as it was
fn push_registered(
    state: &State,
    index: RegistryIndex,
    operation: &'static str,
) -> Result<(), Error> {
    let category = state.push_registry(index);
    if category != ValueCategory::Function {
        state.pop(1);
        return Err(Error::invocation(
            operation,
            format!("registry slot {} holds {}", index, category),
        ));
    }
    Ok(())
}

impl<A, R> Function<A, R> {
    /// A descriptor with no backing
    pub fn empty() -> Self {
        Self {
            context: Rc::new(Context {
                backing: Backing::None,
            }),
        }
    }

    pub fn kind(&self) -> FunctionKind {
        match self.context.backing {
            Backing::None => FunctionKind::None,
            Backing::Native(_) => FunctionKind::Native,
            Backing::Registered { .. } => FunctionKind::Registered,
        }
    }

    /// Number of handles sharing this descriptor
    pub fn reference_count(&self) -> usize {
        Rc::strong_count(&self.context)
    }

    /// True unless the descriptor is empty or its runtime has been dropped
    pub fn is_callable(&self) -> bool {
        match &self.context.backing {
            Backing::None => false,
            Backing::Native(_) => true,
            Backing::Registered { state, .. } => state.is_alive(),
        }
    }

    /// Give up this handle's share of the descriptor, leaving it empty
    pub fn release(&mut self) {
        *self = Self::empty();
    }

    /// Registry slot of a Registered descriptor
    pub fn registry_index(&self) -> Option<RegistryIndex> {
        match &self.context.backing {
            Backing::Registered { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl<A, R> Function<A, R>
where
    A: Args + 'static,
    R: Push + Peek + 'static,
{
    /// Wrap a host closure
    pub fn new<F: NativeFn<A, R>>(f: F) -> Self {
        Self {
            context: Rc::new(Context {
                backing: Backing::Native(Box::new(move |args| f.call_native(args))),
            }),
        }
    }

    /// Call the function.
    ///
    /// A guest error raised by a Registered function is not caught: it
    /// propagates to the nearest protected call, and with none active it
    /// aborts the host call chain.
    pub fn execute(&self, args: A) -> Result<R, Error> {
        self.invoke(args, false)
    }

    /// Call the function, converting a guest error into `Error::GuestRuntime`
    pub fn execute_protected(&self, args: A) -> Result<R, Error> {
        self.invoke(args, true)
    }

    pub fn snapshot(&self) -> FunctionSnapshot {
        match &self.context.backing {
            Backing::None => FunctionSnapshot::Empty,
            Backing::Native(_) => FunctionSnapshot::Native {
                context: self.context.clone(),
                entry: trampoline::<A, R>,
            },
            Backing::Registered { index, .. } => FunctionSnapshot::Registered { index: *index },
        }
    }

    fn invoke(&self, args: A, protected: bool) -> Result<R, Error> {
        let operation = if protected {
            "Function::execute_protected"
        } else {
            "Function::execute"
        };
        match &self.context.backing {
            Backing::None => Err(Error::invocation(operation, "function has no backing")),
            Backing::Native(f) => {
                trace!(operation, "calling native function");
                Ok(f(args))
            }
            Backing::Registered { state, index } => {
                let state = state
                    .upgrade()
                    .ok_or_else(|| Error::invocation(operation, "runtime has been released"))?;
                trace!(operation, slot = index.get(), "calling guest function");
                call_registered(&state, *index, args, protected, operation)
            }
        }
    }
}

fn call_registered<A: Push, R: Peek>(
    state: &State,
    index: RegistryIndex,
    args: A,
    protected: bool,
    operation: &'static str,
) -> Result<R, Error> {
    let base = state.top();
    push_registered(state, index, operation)?;
    let nargs = match args.push(state) {
        Ok(n) => n,
        Err(e) => {
            state.set_top(base);
            return Err(e);
        }
    };

    let mode = if R::SLOTS == 0 {
        ResultMode::Fixed(0)
    } else {
        ResultMode::All
    };
    if protected {
        if let CallStatus::RuntimeError = state.protected_call(nargs, mode) {
            let err = Error::from_stack(operation, state);
            warn!(slot = index.get(), error = %err, "guest function failed");
            state.set_top(base);
            return Err(err);
        }
    } else {
        state.call(nargs, mode);
    }

    let result = R::peek(state, base + 1);
    state.set_top(base);
    result.ok_or_else(|| Error::marshal(operation, "error popping return value"))
}

/// Entry point of every guest closure wrapping a native function
fn trampoline<A, R>(state: &State) -> GuestResult<usize>
where
    A: Args + 'static,
    R: Push + Peek + 'static,
{
    let context = match state.upvalue(1) {
        Some(GuestValue::UserData(data)) => data.downcast::<Context<A, R>>().ok(),
        _ => None,
    }
    .ok_or_else(|| GuestError::new("native function binding is missing"))?;

    let Backing::Native(f) = &context.backing else {
        return Err(GuestError::new("native function binding is missing"));
    };
    let args = A::peek_args(state)
        .map_err(|position| GuestError::new(format!("error peeking arg #{}", position)))?;
    let result = f(args);
    result
        .push(state)
        .map_err(|err| GuestError::new(err.to_string()))
}

impl<A, R> Default for Function<A, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A, R> Clone for Function<A, R> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<A, R> PartialEq for Function<A, R> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.context, &other.context)
    }
}

impl<A, R> Eq for Function<A, R> {}

impl<A, R> fmt::Debug for Function<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Function");
        out.field("kind", &self.kind());
        if let Some(index) = self.registry_index() {
            out.field("slot", &index.get());
        }
        out.field("refs", &self.reference_count()).finish()
    }
}

impl<A, R> Classify for Function<A, R> {
    const CATEGORY: ValueCategory = ValueCategory::Function;
}

impl<A, R> Push for Function<A, R>
where
    A: Args + 'static,
    R: Push + Peek + 'static,
{
    fn push(&self, state: &State) -> Result<usize, Error> {
        const OPERATION: &str = "Function::push";
        match &self.context.backing {
            Backing::None => Err(Error::invocation(OPERATION, "function has no backing")),
            Backing::Native(_) => {
                state.push_userdata(self.context.clone());
                state.push_native_closure(trampoline::<A, R>, 1);
                Ok(1)
            }
            Backing::Registered { state: owner, index } => {
                if !owner.is_alive() {
                    return Err(Error::invocation(OPERATION, "runtime has been released"));
                }
                if !owner.refers_to(state) {
                    return Err(Error::invocation(
                        OPERATION,
                        "function belongs to a different runtime",
                    ));
                }
                push_registered(state, *index, OPERATION)?;
                Ok(1)
            }
        }
    }
}

impl<A, R> Peek for Function<A, R> {
    const SLOTS: usize = 1;

    /// Pins the guest function; the slot is released with the last handle
    fn peek(state: &State, index: usize) -> Option<Self> {
        if state.get_type(index) != ValueCategory::Function {
            return None;
        }
        let slot = state.pin(index)?;
        Some(Self {
            context: Rc::new(Context {
                backing: Backing::Registered {
                    state: state.downgrade(),
                    index: slot,
                },
            }),
        })
    }
}
