//! Scalar marshaller
//!
//! One stack slot per value. Numbers travel as the runtime's `f64` and are
//! converted with `as` on the way back, so peeking a fractional number as an
//! integer truncates. Strings come back either as an owned copy (`String`) or
//! sharing the guest's buffer (`Rc<str>`). A null light pointer is pushed as
//! nil, and nil peeks back as a null pointer.

use crate::classify::Nil;
use crate::error::Error;
use crate::marshal::{Peek, Push};
use stackbind_core::State;
use std::ffi::c_void;
use std::rc::Rc;

macro_rules! number {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Push for $ty {
                fn push(&self, state: &State) -> Result<usize, Error> {
                    state.push_number(*self as f64);
                    Ok(1)
                }
            }

            impl Peek for $ty {
                const SLOTS: usize = 1;

                fn peek(state: &State, index: usize) -> Option<Self> {
                    state.to_number(index).map(|n| n as $ty)
                }
            }
        )+
    };
}

number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Push for Nil {
    fn push(&self, state: &State) -> Result<usize, Error> {
        state.push_nil();
        Ok(1)
    }
}

impl Peek for Nil {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        state.is_nil(index).then_some(Nil)
    }
}

impl Push for bool {
    fn push(&self, state: &State) -> Result<usize, Error> {
        state.push_boolean(*self);
        Ok(1)
    }
}

impl Peek for bool {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        state.to_boolean(index)
    }
}

impl Push for str {
    fn push(&self, state: &State) -> Result<usize, Error> {
        state.push_string(self);
        Ok(1)
    }
}

impl Push for String {
    fn push(&self, state: &State) -> Result<usize, Error> {
        state.push_string(self);
        Ok(1)
    }
}

impl Peek for String {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        state.to_string(index).map(|s| s.to_string())
    }
}

impl Push for Rc<str> {
    fn push(&self, state: &State) -> Result<usize, Error> {
        state.push_shared_string(self.clone());
        Ok(1)
    }
}

impl Peek for Rc<str> {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        state.to_string(index)
    }
}

impl Push for char {
    fn push(&self, state: &State) -> Result<usize, Error> {
        let mut buf = [0u8; 4];
        state.push_string(self.encode_utf8(&mut buf));
        Ok(1)
    }
}

impl Peek for char {
    const SLOTS: usize = 1;

    // First character of the string; an empty string has none
    fn peek(state: &State, index: usize) -> Option<Self> {
        state.to_string(index)?.chars().next()
    }
}

impl<T> Push for *mut T {
    fn push(&self, state: &State) -> Result<usize, Error> {
        if self.is_null() {
            state.push_nil();
        } else {
            state.push_light_pointer(self.cast::<c_void>());
        }
        Ok(1)
    }
}

impl<T> Peek for *mut T {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        match state.to_light_pointer(index) {
            Some(p) => Some(p.cast::<T>()),
            None => state.is_nil(index).then(std::ptr::null_mut),
        }
    }
}

impl<T> Push for *const T {
    fn push(&self, state: &State) -> Result<usize, Error> {
        self.cast_mut().push(state)
    }
}

impl<T> Peek for *const T {
    const SLOTS: usize = 1;

    fn peek(state: &State, index: usize) -> Option<Self> {
        <*mut T>::peek(state, index).map(|p| p.cast_const())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{peek, pop, push};
    use stackbind_core::ValueCategory;

    fn round_trip<T: Push + Peek>(value: T) -> Option<T> {
        let state = State::new();
        assert_eq!(push(&state, &value).ok(), Some(1));
        pop::<T>(&state).filter(|_| state.top() == 0)
    }

    #[test]
    fn test_number_round_trip() {
        assert_eq!(round_trip(0i32), Some(0));
        assert_eq!(round_trip(-17i64), Some(-17));
        assert_eq!(round_trip(u64::from(u32::MAX)), Some(u64::from(u32::MAX)));
        assert_eq!(round_trip(2.5f64), Some(2.5));
        assert_eq!(round_trip(-0.125f32), Some(-0.125));
    }

    #[test]
    fn test_number_peek_truncates() {
        let state = State::new();
        state.push_number(3.9);
        assert_eq!(peek::<i32>(&state, 1), Some(3));
    }

    #[test]
    fn test_boolean_round_trip() {
        assert_eq!(round_trip(true), Some(true));
        assert_eq!(round_trip(false), Some(false));
    }

    #[test]
    fn test_boolean_is_not_a_number() {
        let state = State::new();
        push(&state, &true).unwrap();
        assert_eq!(state.get_type(1), ValueCategory::Boolean);
        assert_eq!(peek::<i32>(&state, 1), None);
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(round_trip(String::from("hello")), Some(String::from("hello")));
        assert_eq!(round_trip(String::new()), Some(String::new()));
        assert_eq!(round_trip(Rc::<str>::from("shared")).as_deref(), Some("shared"));
    }

    #[test]
    fn test_shared_string_peek_does_not_copy() {
        let state = State::new();
        let original: Rc<str> = Rc::from("buffer");
        push(&state, &original).unwrap();
        let peeked = peek::<Rc<str>>(&state, 1).unwrap();
        assert!(Rc::ptr_eq(&original, &peeked));
    }

    #[test]
    fn test_str_push() {
        let state = State::new();
        assert_eq!(push(&state, "slice").unwrap(), 1);
        assert_eq!(peek::<String>(&state, 1).as_deref(), Some("slice"));
    }

    #[test]
    fn test_char_round_trip() {
        assert_eq!(round_trip('x'), Some('x'));
        assert_eq!(round_trip('é'), Some('é'));

        let state = State::new();
        state.push_string("");
        assert_eq!(peek::<char>(&state, 1), None);
    }

    #[test]
    fn test_nil_round_trip() {
        assert_eq!(round_trip(Nil), Some(Nil));
        let state = State::new();
        state.push_number(0.0);
        assert_eq!(peek::<Nil>(&state, 1), None);
    }

    #[test]
    fn test_light_pointer_round_trip() {
        let mut target = 5u32;
        let ptr: *mut u32 = &mut target;
        assert_eq!(round_trip(ptr), Some(ptr));
        let cptr: *const u32 = ptr;
        assert_eq!(round_trip(cptr), Some(cptr));
    }

    #[test]
    fn test_null_pointer_travels_as_nil() {
        let state = State::new();
        push(&state, &std::ptr::null_mut::<c_void>()).unwrap();
        assert_eq!(state.get_type(1), ValueCategory::Null);
        assert_eq!(peek::<*mut c_void>(&state, 1), Some(std::ptr::null_mut()));
        assert_eq!(round_trip(std::ptr::null::<u8>()), Some(std::ptr::null()));
    }

    #[test]
    fn test_wrong_type_and_absent_slot() {
        let state = State::new();
        assert_eq!(peek::<i32>(&state, 1), None);
        assert_eq!(pop::<bool>(&state), None);

        state.push_string("7");
        assert_eq!(peek::<f64>(&state, 1), None);
        assert_eq!(pop::<bool>(&state), None);
        assert_eq!(state.top(), 1);
        assert_eq!(peek::<*mut c_void>(&state, 1), None);
    }
}
