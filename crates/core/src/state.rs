//! Runtime state: value stack, call frames, registry, globals
//!
//! `State` is a cheap handle (`Rc`) to one runtime instance. Every operation
//! takes `&self` and borrows the interior only for the duration of that
//! operation, never across a call into a guest function, so native code can
//! re-enter the runtime freely.
//!
//! ## Stack indices
//!
//! ```text
//! absolute:  0     1     2     3     4     5
//!          ┌─────┬─────┬─────┬─────┬─────┬─────┐
//!          │ h1  │ h2  │ fn  │ a1  │ a2  │ r1  │
//!          └─────┴─────┴─────┴─────┴─────┴─────┘
//!                            ↑ frame base
//! frame-relative:             1     2     3
//! ```
//!
//! Indices are 1-based and relative to the current frame. Host code runs in
//! the bottom frame; a native entry point sees its first argument at index 1.
//!
//! ## Errors
//!
//! A guest error raised inside `call` unwinds (as a panic carrying a private
//! marker) to the nearest enclosing `protected_call`. With no protected call
//! active there is nothing to catch it, and the host call chain is aborted
//! with an `unprotected error in call to guest runtime` panic.

use crate::category::ValueCategory;
use crate::config::RuntimeConfig;
use crate::error::{CallStatus, GuestError, GuestResult, GuestUnwind};
use crate::registry::{Registry, RegistryIndex};
use crate::value::{Closure, GuestFn, GuestValue};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// How many results a call leaves on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Exactly `n` results: extra results are dropped, missing ones are nil
    Fixed(usize),
    /// Every result the callee returned
    All,
}

struct Frame {
    /// Absolute stack position of index 1
    base: usize,
    closure: Option<Rc<Closure>>,
}

struct Inner {
    stack: RefCell<Vec<GuestValue>>,
    frames: RefCell<Vec<Frame>>,
    registry: RefCell<Registry>,
    globals: RefCell<HashMap<String, GuestValue>>,
    protected_depth: Cell<usize>,
    pending_error: RefCell<Option<GuestError>>,
    config: RuntimeConfig,
}

/// Handle to a runtime instance
#[derive(Clone)]
pub struct State {
    inner: Rc<Inner>,
}

/// Non-owning handle; does not keep the runtime alive
#[derive(Clone)]
pub struct WeakState {
    inner: Weak<Inner>,
}

impl WeakState {
    pub fn upgrade(&self) -> Option<State> {
        self.inner.upgrade().map(|inner| State { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// True if this handle refers to `state`
    pub fn refers_to(&self, state: &State) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&state.inner))
    }
}

impl fmt::Debug for WeakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakState({:p}, alive={})", self.inner.as_ptr(), self.is_alive())
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("top", &self.top())
            .field("frames", &self.inner.frames.borrow().len())
            .field("registry", &self.registry_len())
            .finish()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Pops the frame it pushed, also when a guest error unwinds through it
struct FrameGuard<'a> {
    state: &'a State,
}

impl<'a> FrameGuard<'a> {
    fn enter(state: &'a State, base: usize, closure: Rc<Closure>) -> Self {
        state.inner.frames.borrow_mut().push(Frame {
            base,
            closure: Some(closure),
        });
        Self { state }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let frame = self.state.inner.frames.borrow_mut().pop();
        drop(frame);
    }
}

impl State {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                stack: RefCell::new(Vec::new()),
                frames: RefCell::new(vec![Frame {
                    base: 0,
                    closure: None,
                }]),
                registry: RefCell::new(Registry::new()),
                globals: RefCell::new(HashMap::new()),
                protected_depth: Cell::new(0),
                pending_error: RefCell::new(None),
                config,
            }),
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    pub fn downgrade(&self) -> WeakState {
        WeakState {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same runtime instance
    pub fn ptr_eq(&self, other: &State) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Stack
    // =========================================================================

    fn base(&self) -> usize {
        self.inner.frames.borrow().last().map_or(0, |f| f.base)
    }

    fn absolute(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return None;
        }
        let abs = self.base() + index - 1;
        (abs < self.inner.stack.borrow().len()).then_some(abs)
    }

    fn with_slot<T>(&self, index: usize, f: impl FnOnce(&GuestValue) -> T) -> Option<T> {
        let abs = self.absolute(index)?;
        let stack = self.inner.stack.borrow();
        stack.get(abs).map(f)
    }

    /// Number of slots in the current frame
    pub fn top(&self) -> usize {
        self.inner.stack.borrow().len() - self.base()
    }

    /// Truncate the current frame to `top` slots, or pad it with nil
    pub fn set_top(&self, top: usize) {
        let target = self.base() + top;
        let removed = {
            let mut stack = self.inner.stack.borrow_mut();
            if target <= stack.len() {
                stack.split_off(target)
            } else {
                stack.resize(target, GuestValue::Nil);
                Vec::new()
            }
        };
        drop(removed);
    }

    /// Remove `n` slots from the top (fewer if the frame is shorter)
    pub fn pop(&self, n: usize) {
        self.set_top(self.top().saturating_sub(n));
    }

    /// Move the top value down to `index`, shifting the values above it up
    pub fn insert(&self, index: usize) {
        let abs = self.absolute(index);
        assert!(abs.is_some(), "insert: invalid stack index {}", index);
        let mut stack = self.inner.stack.borrow_mut();
        if let (Some(abs), Some(value)) = (abs, stack.pop()) {
            stack.insert(abs, value);
        }
    }

    /// Runtime type tag at `index`; `ValueCategory::None` when out of range
    pub fn get_type(&self, index: usize) -> ValueCategory {
        self.with_slot(index, GuestValue::category)
            .unwrap_or(ValueCategory::None)
    }

    pub fn is_nil(&self, index: usize) -> bool {
        self.get_type(index) == ValueCategory::Null
    }

    pub fn value_at(&self, index: usize) -> Option<GuestValue> {
        self.with_slot(index, GuestValue::clone)
    }

    pub fn to_boolean(&self, index: usize) -> Option<bool> {
        self.with_slot(index, |v| match v {
            GuestValue::Boolean(b) => Some(*b),
            _ => None,
        })
        .flatten()
    }

    pub fn to_number(&self, index: usize) -> Option<f64> {
        self.with_slot(index, |v| match v {
            GuestValue::Number(n) => Some(*n),
            _ => None,
        })
        .flatten()
    }

    /// Shares the guest's string buffer; no copy is made
    pub fn to_string(&self, index: usize) -> Option<Rc<str>> {
        self.with_slot(index, |v| match v {
            GuestValue::String(s) => Some(s.clone()),
            _ => None,
        })
        .flatten()
    }

    pub fn to_light_pointer(&self, index: usize) -> Option<*mut c_void> {
        self.with_slot(index, |v| match v {
            GuestValue::LightPointer(p) => Some(*p),
            _ => None,
        })
        .flatten()
    }

    pub fn push_value(&self, value: GuestValue) {
        self.inner.stack.borrow_mut().push(value);
    }

    pub fn push_nil(&self) {
        self.push_value(GuestValue::Nil);
    }

    pub fn push_boolean(&self, value: bool) {
        self.push_value(GuestValue::Boolean(value));
    }

    pub fn push_number(&self, value: f64) {
        self.push_value(GuestValue::Number(value));
    }

    pub fn push_string(&self, value: &str) {
        self.push_value(GuestValue::String(Rc::from(value)));
    }

    pub fn push_shared_string(&self, value: Rc<str>) {
        self.push_value(GuestValue::String(value));
    }

    pub fn push_light_pointer(&self, value: *mut c_void) {
        self.push_value(GuestValue::LightPointer(value));
    }

    pub fn push_userdata(&self, value: Rc<dyn Any>) {
        self.push_value(GuestValue::UserData(value));
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Pin a copy of the value at `index`; nil and empty slots are not pinned
    pub fn pin(&self, index: usize) -> Option<RegistryIndex> {
        let value = self.value_at(index)?;
        let category = value.category();
        let pinned = self.inner.registry.borrow_mut().pin(value);
        if let Some(slot) = pinned {
            debug!(slot = slot.get(), %category, "pinned guest value");
        }
        pinned
    }

    /// Release a registry slot; false if it was already free
    pub fn unpin(&self, index: RegistryIndex) -> bool {
        let removed = self.inner.registry.borrow_mut().unpin(index);
        let found = removed.is_some();
        if found {
            debug!(slot = index.get(), "unpinned guest value");
        }
        drop(removed);
        found
    }

    /// Push the pinned value (nil for a free slot) and report its type
    pub fn push_registry(&self, index: RegistryIndex) -> ValueCategory {
        let value = self
            .inner
            .registry
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default();
        let category = value.category();
        self.push_value(value);
        category
    }

    /// Number of live registry slots
    pub fn registry_len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    // =========================================================================
    // Globals
    // =========================================================================

    /// Push the global `name` (nil when unset) and report its type
    pub fn push_global(&self, name: &str) -> ValueCategory {
        let value = self
            .inner
            .globals
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default();
        let category = value.category();
        self.push_value(value);
        category
    }

    /// Pop the top value into the global `name`; storing nil removes it
    pub fn store_global(&self, name: &str) {
        assert!(self.top() > 0, "store_global: empty stack");
        let value = self.inner.stack.borrow_mut().pop().unwrap_or_default();
        let previous = if value.is_nil() {
            self.inner.globals.borrow_mut().remove(name)
        } else {
            self.inner
                .globals
                .borrow_mut()
                .insert(name.to_string(), value)
        };
        drop(previous);
    }

    /// Names of all set globals, sorted
    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.globals.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Push `entry` as a function and store it in the global `name`
    pub fn register(&self, name: &str, entry: GuestFn) {
        self.push_function(entry);
        self.store_global(name);
    }

    // =========================================================================
    // Functions and calls
    // =========================================================================

    /// Pop `upvalues` values and push a function closing over them.
    ///
    /// The first popped-over value becomes upvalue 1.
    pub fn push_native_closure(&self, entry: GuestFn, upvalues: usize) {
        assert!(
            upvalues <= self.top(),
            "push_native_closure: {} upvalues requested but frame holds {}",
            upvalues,
            self.top()
        );
        let captured = {
            let mut stack = self.inner.stack.borrow_mut();
            let at = stack.len() - upvalues;
            stack.split_off(at)
        };
        self.push_value(GuestValue::Function(Rc::new(Closure {
            entry,
            upvalues: captured.into_boxed_slice(),
        })));
    }

    pub fn push_function(&self, entry: GuestFn) {
        self.push_native_closure(entry, 0);
    }

    /// Upvalue `index` (1-based) of the running function
    pub fn upvalue(&self, index: usize) -> Option<GuestValue> {
        let frames = self.inner.frames.borrow();
        let closure = frames.last()?.closure.as_ref()?;
        closure.upvalues.get(index.checked_sub(1)?).cloned()
    }

    /// Number of active guest call frames (the host frame is not counted)
    pub fn call_depth(&self) -> usize {
        self.inner.frames.borrow().len() - 1
    }

    /// Call the function sitting below the top `nargs` values.
    ///
    /// The function and arguments are replaced by the results. A guest error
    /// unwinds to the nearest protected call; with none active it aborts the
    /// host call chain.
    pub fn call(&self, nargs: usize, results: ResultMode) {
        if let Err(err) = self.invoke(nargs, results) {
            self.throw(err)
        }
    }

    /// Like `call`, but a guest error is caught.
    ///
    /// On `CallStatus::RuntimeError` the function and arguments are removed
    /// and the error object is left on top of the stack. Host panics are
    /// re-raised after the stack has been restored.
    pub fn protected_call(&self, nargs: usize, results: ResultMode) -> CallStatus {
        assert!(
            nargs < self.top(),
            "protected_call: no function below {} arguments",
            nargs
        );
        let callee_abs = self.inner.stack.borrow().len() - nargs - 1;
        let depth = self.inner.frames.borrow().len();

        let protected = &self.inner.protected_depth;
        protected.set(protected.get() + 1);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.invoke(nargs, results)));
        protected.set(protected.get() - 1);

        let err = match outcome {
            Ok(Ok(())) => return CallStatus::Ok,
            Ok(Err(err)) => err,
            Err(payload) => {
                if payload.downcast_ref::<GuestUnwind>().is_none() {
                    self.unwind_to(callee_abs, depth);
                    panic::resume_unwind(payload);
                }
                self.inner
                    .pending_error
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| GuestError::new("unknown guest error"))
            }
        };

        self.unwind_to(callee_abs, depth);
        trace!(error = %err, "protected call caught guest error");
        self.push_value(err.into_value());
        CallStatus::RuntimeError
    }

    fn throw(&self, err: GuestError) -> ! {
        if self.inner.protected_depth.get() > 0 {
            *self.inner.pending_error.borrow_mut() = Some(err);
            panic::resume_unwind(Box::new(GuestUnwind));
        }
        panic!(
            "unprotected error in call to guest runtime ({})",
            err.message()
        )
    }

    fn unwind_to(&self, stack_len: usize, depth: usize) {
        let frames = {
            let mut frames = self.inner.frames.borrow_mut();
            let keep = depth.min(frames.len());
            frames.split_off(keep)
        };
        drop(frames);
        let values = {
            let mut stack = self.inner.stack.borrow_mut();
            let keep = stack_len.min(stack.len());
            stack.split_off(keep)
        };
        drop(values);
    }

    fn invoke(&self, nargs: usize, results: ResultMode) -> GuestResult<()> {
        assert!(nargs < self.top(), "call: no function below {} arguments", nargs);
        let callee_abs = self.inner.stack.borrow().len() - nargs - 1;
        let callee = self.inner.stack.borrow()[callee_abs].clone();
        let closure = match callee {
            GuestValue::Function(closure) => closure,
            other => {
                return Err(GuestError::new(format!(
                    "attempt to call a {} value",
                    other.category().name()
                )));
            }
        };

        let config = self.inner.config;
        if self.call_depth() >= config.max_call_depth || callee_abs + 1 + nargs > config.max_stack {
            return Err(GuestError::new("stack overflow"));
        }

        let entry = closure.entry;
        let returned = {
            let _frame = FrameGuard::enter(self, callee_abs + 1, closure);
            entry(self)?
        };

        let discarded = {
            let mut stack = self.inner.stack.borrow_mut();
            let len = stack.len();
            let returned = returned.min(len.saturating_sub(callee_abs + 1));
            let mut values = stack.split_off(len - returned);
            let discarded = stack.split_off(callee_abs);
            if let ResultMode::Fixed(n) = results {
                values.resize(n, GuestValue::Nil);
            }
            stack.extend(values);
            discarded
        };
        drop(discarded);
        Ok(())
    }
}
