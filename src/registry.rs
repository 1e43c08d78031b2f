//! Named object registry.
//!
//! [`NamedRegistry`] is the single keyed store behind every named asset cache
//! (textures, sprite definitions). An entry couples a bounded-length name, a
//! default-initialized payload and an optional cleanup hook that runs exactly
//! once before the payload is dropped. Hooks let each asset kind attach its own
//! teardown (for example handing a GPU handle back for deletion) without the
//! registry knowing anything about the payload.
//!
//! Entries are addressed either by name or by a [`NamedHandle`], a `Copy`
//! index/generation pair. Handles never own the payload; once an entry is
//! freed or overwritten, every handle issued for it resolves to `None`.
//!
//! # Allocation policies
//!
//! | Policy            | Name absent        | Name present                          |
//! |-------------------|--------------------|---------------------------------------|
//! | `FailIfExists`    | allocate           | `None`, existing entry untouched      |
//! | `Overwrite`       | allocate           | cleanup old payload, reset, new hook  |
//! | `ReturnExisting`  | allocate           | hand back the existing entry          |

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use arrayvec::ArrayString;
use log::{debug, warn};
use rustc_hash::FxHashMap;

/// Maximum length of a registry name in bytes.
pub const NAME_MAX: usize = 256;

/// Bounded-length registry key.
pub type Name = ArrayString<NAME_MAX>;

/// Teardown callback invoked once on the payload before it is released.
pub type CleanupHook<T> = Box<dyn FnMut(&mut T) + Send + Sync>;

/// What [`NamedRegistry::alloc`] does when the name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocPolicy {
    /// Return `None`; the caller treats it as "already defined".
    FailIfExists,
    /// Destroy the existing payload and hand back a fresh one under the same name.
    Overwrite,
    /// Hand back the existing payload instead of allocating.
    ReturnExisting,
}

/// Non-owning reference to a registry entry.
pub struct NamedHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NamedHandle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for NamedHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NamedHandle<T> {}

impl<T> PartialEq for NamedHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for NamedHandle<T> {}

impl<T> Hash for NamedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for NamedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedHandle({}v{})", self.index, self.generation)
    }
}

/// Result of a successful [`NamedRegistry::alloc`].
#[derive(Debug)]
pub struct Allocation<T> {
    pub handle: NamedHandle<T>,
    /// `true` when the payload is freshly default-initialized, `false` when an
    /// existing payload was returned.
    pub created: bool,
}

impl<T> Clone for Allocation<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Allocation<T> {}

struct Entry<T> {
    name: Name,
    payload: T,
    cleanup: Option<CleanupHook<T>>,
}

impl<T> Entry<T> {
    fn run_cleanup(&mut self) {
        if let Some(mut hook) = self.cleanup.take() {
            hook(&mut self.payload);
        }
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// Truncate `name` to at most [`NAME_MAX`] bytes on a char boundary.
pub fn bounded_name(name: &str) -> Name {
    let mut bounded = Name::new();
    for ch in name.chars() {
        if bounded.try_push(ch).is_err() {
            break;
        }
    }
    bounded
}

/// Keyed store of default-initialized payloads with per-entry cleanup hooks.
pub struct NamedRegistry<T> {
    slots: Vec<Slot<T>>,
    names: FxHashMap<Name, u32>,
    vacant: Vec<u32>,
}

impl<T> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NamedRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            names: FxHashMap::default(),
            vacant: Vec::new(),
        }
    }

    fn handle_at(&self, index: u32) -> NamedHandle<T> {
        NamedHandle::new(index, self.slots[index as usize].generation)
    }

    fn slot(&self, handle: NamedHandle<T>) -> Option<&Entry<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn slot_mut(&mut self, handle: NamedHandle<T>) -> Option<&mut Entry<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Allocate a payload under `name`, or deal with the existing one per `policy`.
    pub fn alloc(
        &mut self,
        name: &str,
        cleanup: Option<CleanupHook<T>>,
        policy: AllocPolicy,
    ) -> Option<Allocation<T>>
    where
        T: Default,
    {
        let key = bounded_name(name);
        if key.len() < name.len() {
            warn!("Name '{}' truncated to {} bytes", key, NAME_MAX);
        }

        if let Some(&index) = self.names.get(&key) {
            return match policy {
                AllocPolicy::FailIfExists => None,
                AllocPolicy::ReturnExisting => Some(Allocation {
                    handle: self.handle_at(index),
                    created: false,
                }),
                AllocPolicy::Overwrite => {
                    let slot = &mut self.slots[index as usize];
                    if let Some(entry) = slot.entry.as_mut() {
                        entry.run_cleanup();
                        entry.payload = T::default();
                        entry.cleanup = cleanup;
                    }
                    slot.generation = slot.generation.wrapping_add(1);
                    debug!("Overwrote registry entry '{}'", key);
                    Some(Allocation {
                        handle: self.handle_at(index),
                        created: true,
                    })
                }
            };
        }

        let entry = Entry {
            name: key,
            payload: T::default(),
            cleanup,
        };
        let index = match self.vacant.pop() {
            Some(index) => {
                self.slots[index as usize].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.names.insert(key, index);
        Some(Allocation {
            handle: self.handle_at(index),
            created: true,
        })
    }

    /// Handle of the entry called `name`, if any.
    pub fn handle(&self, name: &str) -> Option<NamedHandle<T>> {
        self.names
            .get(&bounded_name(name))
            .map(|&index| self.handle_at(index))
    }

    /// Read-only lookup by name. Never allocates.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.handle(name).and_then(|handle| self.resolve(handle))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let handle = self.handle(name)?;
        self.resolve_mut(handle)
    }

    /// Follow a handle; `None` once the entry was freed or overwritten.
    pub fn resolve(&self, handle: NamedHandle<T>) -> Option<&T> {
        self.slot(handle).map(|entry| &entry.payload)
    }

    pub fn resolve_mut(&mut self, handle: NamedHandle<T>) -> Option<&mut T> {
        self.slot_mut(handle).map(|entry| &mut entry.payload)
    }

    pub fn name_of(&self, handle: NamedHandle<T>) -> Option<&str> {
        self.slot(handle).map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&bounded_name(name))
    }

    /// Run the entry's cleanup hook, unlink it and drop the payload.
    ///
    /// Returns `false` when the handle is stale.
    pub fn free(&mut self, handle: NamedHandle<T>) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
        else {
            return false;
        };
        let Some(mut entry) = slot.entry.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        entry.run_cleanup();
        self.names.remove(&entry.name);
        self.vacant.push(handle.index);
        debug!("Freed registry entry '{}'", entry.name);
        true
    }

    pub fn free_named(&mut self, name: &str) -> bool {
        match self.handle(name) {
            Some(handle) => self.free(handle),
            None => false,
        }
    }

    /// Free every entry and return how many were freed.
    pub fn free_all(&mut self) -> usize {
        let live: Vec<NamedHandle<T>> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| NamedHandle::new(index as u32, slot.generation))
            .collect();
        live.into_iter().filter(|&handle| self.free(handle)).count()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate live entries as `(name, payload)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .map(|entry| (entry.name.as_str(), &entry.payload))
    }
}

impl<T> Drop for NamedRegistry<T> {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.free_all();
        }
    }
}
