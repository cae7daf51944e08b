// Non-owning lookup tables of live resources.
//
// Each table is a small arena of weak references with two secondary indexes: one by backend
// handle, one by declared name. Removing a resource only has to clear its arena slot; both
// indexes are updated from the slot's content.

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

#[derive(Debug)]
struct Slot<K, T> {
  handle: K,
  name: Option<String>,
  object: Weak<T>,
}

#[derive(Debug)]
pub(crate) struct Registry<K, T> {
  slots: Vec<Option<Slot<K, T>>>,
  free: Vec<usize>,
  by_handle: HashMap<K, usize>,
  by_name: HashMap<String, usize>,
}

impl<K, T> Registry<K, T>
where
  K: Copy + Eq + Hash,
{
  pub(crate) fn new() -> Self {
    Registry {
      slots: Vec::new(),
      free: Vec::new(),
      by_handle: HashMap::new(),
      by_name: HashMap::new(),
    }
  }

  pub(crate) fn insert(&mut self, handle: K, name: Option<&str>, object: &Rc<T>) {
    debug_assert!(
      !self.by_handle.contains_key(&handle),
      "handle registered twice"
    );

    let slot = Slot {
      handle,
      name: name.map(str::to_owned),
      object: Rc::downgrade(object),
    };

    let index = match self.free.pop() {
      Some(index) => {
        self.slots[index] = Some(slot);
        index
      }

      None => {
        self.slots.push(Some(slot));
        self.slots.len() - 1
      }
    };

    self.by_handle.insert(handle, index);

    if let Some(name) = name {
      self.by_name.insert(name.to_owned(), index);
    }
  }

  /// Remove the entry of a handle; returns `false` if the handle was not registered.
  pub(crate) fn remove(&mut self, handle: K) -> bool {
    let index = match self.by_handle.remove(&handle) {
      Some(index) => index,
      None => return false,
    };

    if let Some(slot) = self.slots[index].take() {
      if let Some(name) = slot.name {
        if self.by_name.get(&name) == Some(&index) {
          self.by_name.remove(&name);
        }
      }
    }

    self.free.push(index);
    true
  }

  pub(crate) fn get(&self, handle: K) -> Option<Rc<T>> {
    let index = *self.by_handle.get(&handle)?;
    self.slots[index].as_ref()?.object.upgrade()
  }

  pub(crate) fn find(&self, name: &str) -> Option<Rc<T>> {
    let index = *self.by_name.get(name)?;
    self.slots[index].as_ref()?.object.upgrade()
  }

  pub(crate) fn len(&self) -> usize {
    self.by_handle.len()
  }

  // Live objects, in slot order.
  pub(crate) fn objects(&self) -> impl Iterator<Item = Rc<T>> + '_ {
    self
      .slots
      .iter()
      .flatten()
      .filter_map(|slot| slot.object.upgrade())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_get_remove() {
    let mut reg = Registry::<u32, &'static str>::new();
    let a = Rc::new("a");
    let b = Rc::new("b");

    reg.insert(1, Some("first"), &a);
    reg.insert(2, None, &b);

    assert_eq!(reg.len(), 2);
    assert_eq!(reg.get(1).as_deref(), Some(&"a"));
    assert_eq!(reg.find("first").as_deref(), Some(&"a"));

    assert!(reg.remove(1));
    assert!(!reg.remove(1));
    assert!(reg.get(1).is_none());
    assert!(reg.find("first").is_none());
    assert_eq!(reg.len(), 1);
  }

  #[test]
  fn slots_are_reused() {
    let mut reg = Registry::<u32, u8>::new();
    let a = Rc::new(1);
    let b = Rc::new(2);

    reg.insert(1, None, &a);
    reg.remove(1);
    reg.insert(2, None, &b);

    assert_eq!(reg.slots.len(), 1);
    assert_eq!(reg.get(2).as_deref(), Some(&2));
  }

  #[test]
  fn dead_objects_are_not_returned() {
    let mut reg = Registry::<u32, u8>::new();
    let a = Rc::new(1);

    reg.insert(1, Some("a"), &a);
    drop(a);

    assert!(reg.get(1).is_none());
    assert!(reg.find("a").is_none());
  }
}
