//! Registry: persistent storage for guest values
//!
//! The registry keeps a guest value alive beyond its stack lifetime. Pinning
//! returns an integer handle; unpinning frees the slot for reuse. Nil is never
//! pinned (there is nothing to keep alive), matching the `ref`/`unref`
//! protocol of Lua-style runtimes.

use crate::value::GuestValue;
use std::fmt;

/// Handle to a pinned registry value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryIndex(u32);

impl RegistryIndex {
    pub fn get(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for RegistryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot table with a free list
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Option<GuestValue>>,
    free: Vec<usize>,
    live: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return its handle; `None` for nil
    pub fn pin(&mut self, value: GuestValue) -> Option<RegistryIndex> {
        if value.is_nil() {
            return None;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(value);
                slot
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        // Handles start at 1 so 0 never names a slot
        Some(RegistryIndex(slot as u32 + 1))
    }

    /// Release a slot, handing back the value it held.
    ///
    /// The caller drops the returned value after releasing any borrow of the
    /// registry: dropping a value can run host destructors that unpin again.
    pub fn unpin(&mut self, index: RegistryIndex) -> Option<GuestValue> {
        let slot = index.slot();
        let value = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, index: RegistryIndex) -> Option<&GuestValue> {
        self.slots.get(index.slot())?.as_ref()
    }

    /// Number of live (pinned) values
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_and_get() {
        let mut registry = Registry::new();
        let idx = registry.pin(GuestValue::from(3.0)).unwrap();
        assert_eq!(idx.get(), 1);
        assert_eq!(registry.len(), 1);
        assert!(matches!(registry.get(idx), Some(GuestValue::Number(n)) if *n == 3.0));
    }

    #[test]
    fn test_nil_is_never_pinned() {
        let mut registry = Registry::new();
        assert!(registry.pin(GuestValue::Nil).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unpin_frees_and_reuses_slot() {
        let mut registry = Registry::new();
        let a = registry.pin(GuestValue::from("a")).unwrap();
        let b = registry.pin(GuestValue::from("b")).unwrap();
        assert_eq!(registry.len(), 2);

        assert!(registry.unpin(a).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(a).is_none());

        let c = registry.pin(GuestValue::from("c")).unwrap();
        assert_eq!(c, a);
        assert!(registry.get(b).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_double_unpin_is_harmless() {
        let mut registry = Registry::new();
        let a = registry.pin(GuestValue::from(true)).unwrap();
        assert!(registry.unpin(a).is_some());
        assert!(registry.unpin(a).is_none());
        assert_eq!(registry.len(), 0);
    }
}
