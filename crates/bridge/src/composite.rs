//! Composite marshaller: tuples and optionals
//!
//! Tuples are pushed left to right; element `i` is peeked at the base index
//! plus the slots read by the elements before it. Peeking short-circuits on
//! the first element that fails.
//!
//! `Option<T>` never fails to peek or pop: it reports whether the inner
//! operation succeeded. `None` pushes nothing at all, so a function called
//! with an unset trailing optional sees a shorter argument list. An unset
//! optional reads zero slots, or the one slot of a nil placeholder, and the
//! elements after it start where it stopped.
//!
//! `()` is the zero-width tuple and doubles as the "no result" return type.

use crate::error::Error;
use crate::marshal::{Peek, Push};
use stackbind_core::State;

/// Argument lists of bridged functions.
///
/// The trampoline peeks arguments starting at index 1 of the callee's frame;
/// on failure it needs the 1-based position of the offending argument.
pub trait Args: Push + Peek {
    /// Peek every argument from the current frame, or report the position of
    /// the first one that does not fit
    fn peek_args(state: &State) -> Result<Self, usize>;
}

impl Push for () {
    fn push(&self, _state: &State) -> Result<usize, Error> {
        Ok(0)
    }
}

impl Peek for () {
    const SLOTS: usize = 0;

    fn peek(_state: &State, _index: usize) -> Option<Self> {
        Some(())
    }
}

impl Args for () {
    fn peek_args(_state: &State) -> Result<Self, usize> {
        Ok(())
    }
}

macro_rules! tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Push),+> Push for ($($name,)+) {
            fn push(&self, state: &State) -> Result<usize, Error> {
                let base = state.top();
                let mut slots = 0;
                $(
                    match self.$idx.push(state) {
                        Ok(n) => slots += n,
                        Err(e) => {
                            state.set_top(base);
                            return Err(e);
                        }
                    }
                )+
                Ok(slots)
            }
        }

        impl<$($name: Peek),+> Peek for ($($name,)+) {
            const SLOTS: usize = 0 $(+ <$name as Peek>::SLOTS)+;

            fn peek(state: &State, index: usize) -> Option<Self> {
                Self::peek_span(state, index).map(|(value, _)| value)
            }

            fn peek_span(state: &State, index: usize) -> Option<(Self, usize)> {
                let mut offset = 0;
                let value = ($(
                    {
                        let (value, used) = <$name as Peek>::peek_span(state, index + offset)?;
                        offset += used;
                        value
                    },
                )+);
                Some((value, offset))
            }
        }

        impl<$($name: Push + Peek),+> Args for ($($name,)+) {
            #[allow(unused_assignments)]
            fn peek_args(state: &State) -> Result<Self, usize> {
                let mut offset = 0;
                Ok(($(
                    {
                        let (value, used) =
                            <$name as Peek>::peek_span(state, 1 + offset).ok_or($idx + 1usize)?;
                        offset += used;
                        value
                    },
                )+))
            }
        }
    };
}

tuple!(A 0);
tuple!(A 0, B 1);
tuple!(A 0, B 1, C 2);
tuple!(A 0, B 1, C 2, D 3);
tuple!(A 0, B 1, C 2, D 3, E 4);
tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

impl<T: Push> Push for Option<T> {
    fn push(&self, state: &State) -> Result<usize, Error> {
        match self {
            Some(value) => value.push(state),
            None => Ok(0),
        }
    }
}

impl<T: Peek> Peek for Option<T> {
    const SLOTS: usize = T::SLOTS;

    fn peek(state: &State, index: usize) -> Option<Self> {
        Some(T::peek(state, index))
    }

    fn peek_span(state: &State, index: usize) -> Option<(Self, usize)> {
        match T::peek_span(state, index) {
            Some((value, used)) => Some((Some(value), used)),
            None if state.is_nil(index) => Some((None, T::SLOTS.min(1))),
            None => Some((None, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Nil;
    use crate::marshal::{peek, pop, push};

    #[test]
    fn test_tuple_order_and_width() {
        let state = State::new();
        let slots = push(&state, &(1i32, String::from("two"), true)).unwrap();
        assert_eq!(slots, 3);
        assert_eq!(state.top(), 3);
        assert_eq!(<(i32, String, bool) as Peek>::SLOTS, 3);

        let (a, b, c) = pop::<(i32, String, bool)>(&state).unwrap();
        assert_eq!((a, b.as_str(), c), (1, "two", true));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_tuple_peek_at_offset() {
        let state = State::new();
        state.push_string("below");
        push(&state, &(10u8, 20u8)).unwrap();
        assert_eq!(peek::<(u8, u8)>(&state, 2), Some((10, 20)));
        assert_eq!(peek::<(u8, u8)>(&state, 1), None);
    }

    #[test]
    fn test_tuple_pop_failure_leaves_stack() {
        let state = State::new();
        push(&state, &(1.0f64, 2.0f64)).unwrap();
        assert!(pop::<(f64, bool)>(&state).is_none());
        assert_eq!(state.top(), 2);
        assert!(pop::<(f64, f64, f64)>(&state).is_none());
        assert_eq!(state.top(), 2);
    }

    #[test]
    fn test_nested_tuple_widths() {
        let state = State::new();
        let value = ((1i32, 2i32), 3i32, (Nil, 'z'));
        assert_eq!(push(&state, &value).unwrap(), 5);
        let back = pop::<((i32, i32), i32, (Nil, char))>(&state).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_optional_peek_never_fails() {
        let state = State::new();
        assert_eq!(peek::<Option<i32>>(&state, 1), Some(None));
        state.push_string("text");
        assert_eq!(peek::<Option<i32>>(&state, 1), Some(None));
        assert_eq!(peek::<Option<String>>(&state, 1), Some(Some("text".to_string())));
        assert_eq!(pop::<Option<bool>>(&state), Some(None));
        assert_eq!(state.top(), 1);
        assert_eq!(pop::<Option<String>>(&state), Some(Some("text".to_string())));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_optional_push_width() {
        let state = State::new();
        assert_eq!(push(&state, &Some(4i32)).unwrap(), 1);
        assert_eq!(push(&state, &None::<i32>).unwrap(), 0);
        assert_eq!(push(&state, &(1i32, None::<bool>)).unwrap(), 1);
        assert_eq!(state.top(), 2);
    }

    #[test]
    fn test_optional_tail_in_tuple() {
        let state = State::new();
        push(&state, &(5i32,)).unwrap();
        assert_eq!(peek::<(i32, Option<i32>)>(&state, 1), Some((5, None)));
    }

    #[test]
    fn test_unit_is_zero_width() {
        let state = State::new();
        assert_eq!(push(&state, &()).unwrap(), 0);
        assert_eq!(pop::<()>(&state), Some(()));
        assert_eq!(<() as Args>::peek_args(&state), Ok(()));
    }

    #[test]
    fn test_peek_args_reports_position() {
        let state = State::new();
        state.push_number(1.0);
        state.push_string("not a number");
        assert_eq!(<(i32, i32) as Args>::peek_args(&state), Err(2));
        assert_eq!(<(i32, String) as Args>::peek_args(&state).map(|(a, _)| a), Ok(1));
        assert_eq!(<(bool,) as Args>::peek_args(&state), Err(1));
    }

    #[test]
    fn test_peek_args_after_optional() {
        let state = State::new();
        state.push_nil();
        state.push_number(5.0);
        assert_eq!(<(Option<i32>, i32) as Args>::peek_args(&state), Ok((None, 5)));

        state.set_top(0);
        state.push_string("name");
        assert_eq!(
            <(Option<i32>, String) as Args>::peek_args(&state),
            Ok((None, "name".to_string()))
        );
        assert_eq!(<(Option<i32>, i32) as Args>::peek_args(&state), Err(2));
    }

    #[test]
    fn test_pop_tuple_with_unset_trailing_optional() {
        let state = State::new();
        assert_eq!(push(&state, &(5i32, None::<i32>)).unwrap(), 1);
        assert_eq!(pop::<(i32, Option<i32>)>(&state), Some((5, None)));
        assert_eq!(state.top(), 0);

        state.push_string("below");
        push(&state, &(5i32, None::<i32>)).unwrap();
        assert_eq!(pop::<(i32, Option<i32>)>(&state), Some((5, None)));
        assert_eq!(state.top(), 1);
        assert_eq!(state.to_string(1).as_deref(), Some("below"));
    }

    #[test]
    fn test_pop_tuple_prefers_set_optional() {
        let state = State::new();
        push(&state, &(1i32, Some(5i32))).unwrap();
        assert_eq!(pop::<(i32, Option<i32>)>(&state), Some((1, Some(5))));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_nil_placeholder_fills_optional() {
        let state = State::new();
        state.push_number(5.0);
        state.push_nil();
        assert_eq!(
            <(i32, Option<i32>) as Peek>::peek_span(&state, 1),
            Some(((5, None), 2))
        );
        assert_eq!(pop::<(i32, Option<i32>)>(&state), Some((5, None)));
        assert_eq!(state.top(), 0);
    }
}
