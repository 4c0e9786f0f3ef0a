//! Typed access to guest globals

use crate::classify::Classify;
use crate::error::Error;
use crate::marshal::{Peek, Push};
use stackbind_core::{State, ValueCategory};

/// Outcome of reading a typed global
#[derive(Debug, Clone, PartialEq)]
pub enum Global<T> {
    Found(T),
    NotFound,
    /// The global is set, but holds this category instead
    WrongType(ValueCategory),
}

impl<T> Global<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Global::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Global variable access for `State`
pub trait Globals {
    /// Read the global `name` as a `T`; the stack is left unchanged
    fn get_global<T: Peek + Classify>(&self, name: &str) -> Global<T>;

    /// Set the global `name`. A value that pushes nothing (an unset
    /// optional) removes it.
    fn set_global<T: Push + ?Sized>(&self, name: &str, value: &T) -> Result<(), Error>;

    fn remove_global(&self, name: &str);

    /// Category of the global `name`; `Null` when unset
    fn global_type(&self, name: &str) -> ValueCategory;
}

impl Globals for State {
    fn get_global<T: Peek + Classify>(&self, name: &str) -> Global<T> {
        let base = self.top();
        let category = self.push_global(name);
        let result = if category == ValueCategory::Null {
            Global::NotFound
        } else if category != T::CATEGORY {
            Global::WrongType(category)
        } else {
            match T::peek(self, base + 1) {
                Some(value) => Global::Found(value),
                None => Global::WrongType(category),
            }
        };
        self.set_top(base);
        result
    }

    fn set_global<T: Push + ?Sized>(&self, name: &str, value: &T) -> Result<(), Error> {
        let base = self.top();
        match value.push(self)? {
            0 => self.remove_global(name),
            _ => {
                self.set_top(base + 1);
                self.store_global(name);
            }
        }
        self.set_top(base);
        Ok(())
    }

    fn remove_global(&self, name: &str) {
        self.push_nil();
        self.store_global(name);
    }

    fn global_type(&self, name: &str) -> ValueCategory {
        let category = self.push_global(name);
        self.pop(1);
        category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;

    #[test]
    fn test_set_and_get() {
        let state = State::new();
        state.set_global("answer", &42i32).unwrap();
        state.set_global("name", "stackbind").unwrap();
        assert_eq!(state.get_global::<i32>("answer"), Global::Found(42));
        assert_eq!(
            state.get_global::<String>("name"),
            Global::Found("stackbind".to_string())
        );
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_not_found_and_wrong_type() {
        let state = State::new();
        state.set_global("flag", &true).unwrap();
        assert_eq!(state.get_global::<i32>("missing"), Global::NotFound);
        assert_eq!(
            state.get_global::<i32>("flag"),
            Global::WrongType(ValueCategory::Boolean)
        );
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_unset_optional_removes() {
        let state = State::new();
        state.set_global("x", &1.5f64).unwrap();
        assert_eq!(state.global_type("x"), ValueCategory::Number);
        state.set_global("x", &None::<f64>).unwrap();
        assert_eq!(state.global_type("x"), ValueCategory::Null);
        assert!(state.global_names().is_empty());
    }

    #[test]
    fn test_remove_global() {
        let state = State::new();
        state.set_global("gone", "soon").unwrap();
        state.remove_global("gone");
        assert_eq!(state.get_global::<String>("gone"), Global::NotFound);
    }

    #[test]
    fn test_tuple_stores_first_element() {
        let state = State::new();
        state.set_global("pair", &(1i32, 2i32)).unwrap();
        assert_eq!(state.get_global::<i32>("pair"), Global::Found(1));
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_function_global() {
        let state = State::new();
        let square: Function<(f64,), f64> = Function::new(|x: f64| x * x);
        state.set_global("square", &square).unwrap();
        assert_eq!(state.global_type("square"), ValueCategory::Function);

        let found = state.get_global::<Function<(f64,), f64>>("square").found();
        let square = found.expect("square is a function");
        assert_eq!(square.execute((3.0,)), Ok(9.0));
    }

    #[test]
    fn test_empty_function_is_not_stored() {
        let state = State::new();
        let empty: Function<(), ()> = Function::empty();
        assert!(state.set_global("f", &empty).is_err());
        assert_eq!(state.global_type("f"), ValueCategory::Null);
        assert_eq!(state.top(), 0);
    }
}
