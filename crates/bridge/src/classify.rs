//! Type classifier
//!
//! Maps a host type to the one `ValueCategory` it marshals as. The mapping is
//! a closed set of trait implementations, resolved entirely at compile time:
//!
//! | host type                                   | category       |
//! |---------------------------------------------|----------------|
//! | `Nil`                                       | `Null`         |
//! | integers, floats                            | `Number`       |
//! | `bool`                                      | `Boolean`      |
//! | `str`, `String`, `Rc<str>`, `char`          | `String`       |
//! | `Function<A, R>`                            | `Function`     |
//! | `*const T`, `*mut T`                        | `LightPointer` |
//! | `Option<T>`, `&T`                           | that of `T`    |
//!
//! Numbers are classified before strings, so a numeric type never becomes a
//! string; `char` is not numeric in Rust and is therefore a one-character
//! string. `bool` is its own category and never marshals as 0/1.
//!
//! A type with no implementation has no category; using it where a category
//! is required is a compile error. That requirement is made in one place:
//! `Globals::get_global` compares `T::CATEGORY` with the stored value before
//! peeking. `Push` and `Peek` do not require `Classify`, since tuples span
//! several slots and `TaggedValue` picks its category per value. Every
//! single-slot marshaller also implements `Classify` and pushes a value of
//! exactly that category. `Table`, `Thread` and `UserData` have no host
//! representation.

use stackbind_core::ValueCategory;
use std::rc::Rc;

/// A host type with a fixed value category
pub trait Classify {
    const CATEGORY: ValueCategory;
}

/// Category of `T`, usable in const contexts
pub const fn category_of<T: Classify + ?Sized>() -> ValueCategory {
    T::CATEGORY
}

/// The host-side spelling of the guest's nil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Nil;

impl Classify for Nil {
    const CATEGORY: ValueCategory = ValueCategory::Null;
}

macro_rules! classify {
    ($category:ident: $($ty:ty),+ $(,)?) => {
        $(
            impl Classify for $ty {
                const CATEGORY: ValueCategory = ValueCategory::$category;
            }
        )+
    };
}

classify!(Number: i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
classify!(Boolean: bool);
classify!(String: str, String, Rc<str>, char);

impl<T> Classify for *const T {
    const CATEGORY: ValueCategory = ValueCategory::LightPointer;
}

impl<T> Classify for *mut T {
    const CATEGORY: ValueCategory = ValueCategory::LightPointer;
}

impl<T: Classify> Classify for Option<T> {
    const CATEGORY: ValueCategory = T::CATEGORY;
}

impl<T: Classify + ?Sized> Classify for &T {
    const CATEGORY: ValueCategory = T::CATEGORY;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::marshal::Push;
    use stackbind_core::State;
    use std::ffi::c_void;

    fn pushed_category<T: Push + Classify + ?Sized>(value: &T) -> ValueCategory {
        let state = State::new();
        assert_eq!(value.push(&state).unwrap(), 1);
        let category = state.get_type(1);
        assert_eq!(category, T::CATEGORY);
        category
    }

    #[test]
    fn test_scalar_categories() {
        assert_eq!(category_of::<Nil>(), ValueCategory::Null);
        assert_eq!(category_of::<i32>(), ValueCategory::Number);
        assert_eq!(category_of::<u8>(), ValueCategory::Number);
        assert_eq!(category_of::<f64>(), ValueCategory::Number);
        assert_eq!(category_of::<bool>(), ValueCategory::Boolean);
        assert_eq!(category_of::<str>(), ValueCategory::String);
        assert_eq!(category_of::<String>(), ValueCategory::String);
        assert_eq!(category_of::<Rc<str>>(), ValueCategory::String);
        assert_eq!(category_of::<*mut c_void>(), ValueCategory::LightPointer);
        assert_eq!(category_of::<*const u32>(), ValueCategory::LightPointer);
    }

    #[test]
    fn test_char_is_a_string() {
        assert_eq!(category_of::<char>(), ValueCategory::String);
    }

    #[test]
    fn test_wrappers_inherit_category() {
        assert_eq!(category_of::<Option<bool>>(), ValueCategory::Boolean);
        assert_eq!(category_of::<&str>(), ValueCategory::String);
        assert_eq!(category_of::<Option<&String>>(), ValueCategory::String);
    }

    #[test]
    fn test_classification_is_const() {
        const NUMBER: ValueCategory = category_of::<i64>();
        assert_eq!(NUMBER, ValueCategory::Number);
    }

    #[test]
    fn test_pushed_values_match_their_category() {
        let mut target = 0u32;
        assert_eq!(pushed_category(&Nil), ValueCategory::Null);
        assert_eq!(pushed_category(&-4i16), ValueCategory::Number);
        assert_eq!(pushed_category(&2.5f32), ValueCategory::Number);
        assert_eq!(pushed_category(&false), ValueCategory::Boolean);
        assert_eq!(pushed_category("text"), ValueCategory::String);
        assert_eq!(pushed_category(&String::from("text")), ValueCategory::String);
        assert_eq!(pushed_category(&Rc::<str>::from("text")), ValueCategory::String);
        assert_eq!(pushed_category(&'c'), ValueCategory::String);
        assert_eq!(pushed_category(&Some(7u64)), ValueCategory::Number);
        assert_eq!(
            pushed_category(&(&mut target as *mut u32)),
            ValueCategory::LightPointer
        );
        let double: Function<(i32,), i32> = Function::new(|x: i32| x * 2);
        assert_eq!(pushed_category(&double), ValueCategory::Function);
    }
}
