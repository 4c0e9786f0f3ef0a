//! Base library
//!
//! The handful of global functions guest code needs to drive and inspect the
//! bridge: `print`, `type`, `tostring`, `error`, `assert`, `pcall` and
//! `select`. Their behavior follows the classic base library of Lua-style
//! runtimes.

use crate::error::{CallStatus, GuestError, GuestResult};
use crate::state::{ResultMode, State};
use crate::value::GuestValue;

/// Library selection for `State::open_library`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    /// Every library this runtime ships
    All,
    Base,
}

impl State {
    pub fn open_library(&self, library: Library) {
        match library {
            Library::All | Library::Base => open_base(self),
        }
    }
}

fn open_base(state: &State) {
    state.register("print", base_print);
    state.register("type", base_type);
    state.register("tostring", base_tostring);
    state.register("error", base_error);
    state.register("assert", base_assert);
    state.register("pcall", base_pcall);
    state.register("select", base_select);
}

fn check_any(state: &State, name: &str) -> GuestResult<GuestValue> {
    state
        .value_at(1)
        .ok_or_else(|| GuestError::new(format!("bad argument #1 to '{}' (value expected)", name)))
}

fn base_print(state: &State) -> GuestResult<usize> {
    let line = (1..=state.top())
        .map(|i| state.value_at(i).unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join("\t");
    println!("{}", line);
    Ok(0)
}

fn base_type(state: &State) -> GuestResult<usize> {
    let value = check_any(state, "type")?;
    state.push_string(value.category().name());
    Ok(1)
}

fn base_tostring(state: &State) -> GuestResult<usize> {
    let value = check_any(state, "tostring")?;
    state.push_string(&value.to_string());
    Ok(1)
}

fn base_error(state: &State) -> GuestResult<usize> {
    Err(GuestError::from_value(state.value_at(1).unwrap_or_default()))
}

fn base_assert(state: &State) -> GuestResult<usize> {
    let value = check_any(state, "assert")?;
    if value.is_truthy() {
        return Ok(state.top());
    }
    match state.value_at(2) {
        Some(message) => Err(GuestError::from_value(message)),
        None => Err(GuestError::new("assertion failed!")),
    }
}

fn base_pcall(state: &State) -> GuestResult<usize> {
    check_any(state, "pcall")?;
    match state.protected_call(state.top() - 1, ResultMode::All) {
        CallStatus::Ok => {
            state.push_boolean(true);
            state.insert(1);
            Ok(state.top())
        }
        CallStatus::RuntimeError => {
            state.push_boolean(false);
            state.insert(1);
            Ok(2)
        }
    }
}

fn base_select(state: &State) -> GuestResult<usize> {
    let count = state.top().saturating_sub(1);
    if state.to_string(1).as_deref() == Some("#") {
        state.push_number(count as f64);
        return Ok(1);
    }
    match state.to_number(1) {
        Some(n) if n >= 1.0 => Ok(count.saturating_sub(n as usize - 1)),
        _ => Err(GuestError::new(
            "bad argument #1 to 'select' (index out of range)",
        )),
    }
}
