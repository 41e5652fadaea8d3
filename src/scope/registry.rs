//! Scope registries: the storage behind every scope

use super::reference::{RefKind, Reference};
use crate::{error::Error, key::ErasedKey, types::ArcService};
use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique identifier for a registry slot owner (a binding or a sub-scope)
#[inline]
pub(crate) fn next_owner_id() -> u64 {
    NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed)
}

#[inline]
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A callback invoked exactly once on a value when the registry holding it lets it go
pub type Disposer = Arc<
    dyn Fn(&ArcService)
    + Send
    + Sync
>;

/// Identifies a slot in a registry: the owner (binding or sub-scope) plus an optional argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    owner: u64,
    arg: Option<ErasedKey>,
}

impl RegistryKey {
    /// A slot owned by `owner` with no argument
    #[inline]
    pub fn new(owner: u64) -> Self {
        Self { owner, arg: None }
    }

    /// A slot owned by `owner` for a given argument
    #[inline]
    pub fn with_arg<A: Eq + Hash + Debug + Send + Sync + 'static>(owner: u64, arg: A) -> Self {
        Self { owner, arg: Some(ErasedKey::new(arg)) }
    }
}

/// How a missing value is created and held
pub struct Creation<'a> {
    /// Reference strategy of the slot
    pub kind: RefKind,
    /// Disposal callback of the slot
    pub disposer: Option<Disposer>,
    /// Produces the value
    pub create: &'a mut dyn FnMut() -> Result<ArcService, Error>,
}

/// Thread-safe storage of scoped values.
///
/// Creation is single-flight: for a given [`RegistryKey`] at most one creation runs at a time,
/// and concurrent callers observe its result.
pub trait ScopeRegistry: Send + Sync + 'static {
    /// Returns the stored value or creates, stores and returns a new one
    fn get_or_create(&self, key: RegistryKey, creation: Creation<'_>) -> Result<ArcService, Error>;

    /// Returns the stored value, if any
    fn get(&self, key: &RegistryKey) -> Option<ArcService>;

    /// Removes a slot, disposing its value
    fn remove(&self, key: &RegistryKey);

    /// Removes every slot, disposing every value exactly once
    fn clear(&self);

    /// Number of slots
    fn len(&self) -> usize;

    /// Returns `true` if there are no slots
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Slot {
    reference: Reference,
    disposer: Option<Disposer>,
}

type SharedSlot = Arc<Mutex<Slot>>;

impl Slot {
    #[inline]
    fn shared(kind: RefKind, disposer: Option<Disposer>) -> SharedSlot {
        Arc::new(Mutex::new(Slot { reference: Reference::new(kind), disposer }))
    }
}

fn fill(slot: &SharedSlot, create: &mut dyn FnMut() -> Result<ArcService, Error>) -> Result<ArcService, Error> {
    let mut slot = lock(slot);
    if let Some(value) = slot.reference.get() {
        return Ok(value);
    }
    let value = create()?;
    slot.reference.put(value.clone());
    Ok(value)
}

fn dispose(slot: &SharedSlot) {
    let (values, disposer) = {
        let mut slot = lock(slot);
        (slot.reference.drain(), slot.disposer.clone())
    };
    if let Some(disposer) = disposer {
        for value in &values {
            disposer(value);
        }
    }
}

/// A registry holding any number of slots
#[derive(Default)]
pub struct StandardScopeRegistry {
    slots: Mutex<HashMap<RegistryKey, SharedSlot>>,
}

impl Debug for StandardScopeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardScopeRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl StandardScopeRegistry {
    /// Creates an empty registry
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopeRegistry for StandardScopeRegistry {
    fn get_or_create(&self, key: RegistryKey, creation: Creation<'_>) -> Result<ArcService, Error> {
        let Creation { kind, disposer, create } = creation;
        let slot = lock(&self.slots)
            .entry(key.clone())
            .or_insert_with(|| Slot::shared(kind, disposer))
            .clone();

        let result = fill(&slot, create);
        if result.is_err() {
            // nobody else waits on this slot and it holds nothing
            let mut slots = lock(&self.slots);
            if slots.get(&key).is_some_and(|s| Arc::ptr_eq(s, &slot)) && Arc::strong_count(&slot) == 2 {
                slots.remove(&key);
            }
        }
        result
    }

    fn get(&self, key: &RegistryKey) -> Option<ArcService> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let slot = lock(&slot);
        slot.reference.get()
    }

    fn remove(&self, key: &RegistryKey) {
        let slot = lock(&self.slots).remove(key);
        if let Some(slot) = slot {
            dispose(&slot);
        }
    }

    fn clear(&self) {
        let slots = std::mem::take(&mut *lock(&self.slots));
        #[cfg(feature = "tracing")]
        tracing::debug!("clearing scope registry with {} slot(s)", slots.len());
        for slot in slots.into_values() {
            dispose(&slot);
        }
    }

    fn len(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// A registry holding a single slot: storing under a new key disposes the previous value
#[derive(Default)]
pub struct SingleItemScopeRegistry {
    current: Mutex<Option<(RegistryKey, SharedSlot)>>,
}

impl Debug for SingleItemScopeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleItemScopeRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl SingleItemScopeRegistry {
    /// Creates an empty registry
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopeRegistry for SingleItemScopeRegistry {
    fn get_or_create(&self, key: RegistryKey, creation: Creation<'_>) -> Result<ArcService, Error> {
        let Creation { kind, disposer, create } = creation;
        let (slot, evicted) = {
            let mut current = lock(&self.current);
            match current.as_ref() {
                Some((k, slot)) if *k == key => (slot.clone(), None),
                _ => {
                    let slot = Slot::shared(kind, disposer);
                    let evicted = current.replace((key, slot.clone()));
                    (slot, evicted)
                }
            }
        };
        if let Some((_, evicted)) = evicted {
            dispose(&evicted);
        }
        fill(&slot, create)
    }

    fn get(&self, key: &RegistryKey) -> Option<ArcService> {
        let slot = match lock(&self.current).as_ref() {
            Some((k, slot)) if k == key => slot.clone(),
            _ => return None,
        };
        let slot = lock(&slot);
        slot.reference.get()
    }

    fn remove(&self, key: &RegistryKey) {
        let removed = {
            let mut current = lock(&self.current);
            match current.as_ref() {
                Some((k, _)) if k == key => current.take(),
                _ => None,
            }
        };
        if let Some((_, slot)) = removed {
            dispose(&slot);
        }
    }

    fn clear(&self) {
        let removed = lock(&self.current).take();
        if let Some((_, slot)) = removed {
            dispose(&slot);
        }
    }

    fn len(&self) -> usize {
        usize::from(lock(&self.current).is_some())
    }
}
