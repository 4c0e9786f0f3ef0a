//! Marshalling traits
//!
//! `Push` writes a host value onto the guest stack and reports how many slots
//! it used. `Peek` reads a host value from a stack index without removing it;
//! `pop` is a peek at the topmost slots followed by their removal.
//!
//! Marshalling failure is not an error here: `peek` and `pop` return `None`
//! when the slot is absent or holds the wrong type, and leave the stack
//! untouched. Callers decide whether absence matters.
//!
//! `pop` removes only the slots the value was actually read from, which for a
//! tuple ending in an unset `Option` is fewer than `SLOTS`.

use crate::error::Error;
use stackbind_core::State;

/// Host values that can be written to the guest stack
pub trait Push {
    /// Push `self` and return the number of slots written.
    ///
    /// On failure nothing is left on the stack.
    fn push(&self, state: &State) -> Result<usize, Error>;
}

/// Host values that can be read from the guest stack
pub trait Peek: Sized {
    /// Slots occupied when fully present; fixed per type
    const SLOTS: usize;

    /// Read the value starting at the 1-based `index` of the current frame
    fn peek(state: &State, index: usize) -> Option<Self>;

    /// Read the value at `index` along with the number of slots it was read
    /// from. Only types that may be partly absent (`Option` and tuples
    /// holding one) report fewer than `SLOTS`.
    fn peek_span(state: &State, index: usize) -> Option<(Self, usize)> {
        Self::peek(state, index).map(|value| (value, Self::SLOTS))
    }

    /// Read the value ending at the top of the stack and remove exactly the
    /// slots it was read from.
    ///
    /// Widths are tried from `SLOTS` down, so when both a set and an unset
    /// trailing optional fit the top slots, the set reading wins.
    fn pop(state: &State) -> Option<Self> {
        let top = state.top();
        for width in (0..=Self::SLOTS.min(top)).rev() {
            match Self::peek_span(state, top + 1 - width) {
                Some((value, used)) if used == width => {
                    state.pop(width);
                    return Some(value);
                }
                _ => {}
            }
        }
        None
    }
}

impl<T: Push + ?Sized> Push for &T {
    fn push(&self, state: &State) -> Result<usize, Error> {
        (**self).push(state)
    }
}

/// Push `value`, returning the number of slots written
pub fn push<T: Push + ?Sized>(state: &State, value: &T) -> Result<usize, Error> {
    value.push(state)
}

/// Read a `T` at `index` without removing it
pub fn peek<T: Peek>(state: &State, index: usize) -> Option<T> {
    T::peek(state, index)
}

/// Read a `T` from the top of the stack and remove it
pub fn pop<T: Peek>(state: &State) -> Option<T> {
    T::pop(state)
}
