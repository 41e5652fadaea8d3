//! Reference strategies that decide how a scope holds on to a created value

use crate::types::ArcService;
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    thread::ThreadId,
};
use thread_local::ThreadLocal;

/// How a scoped value is held by its registry
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// The registry keeps the value alive until it is removed or the scope is cleared
    #[default]
    Strong,
    /// The registry keeps a weak reference; a new value is created once every user dropped the previous one
    Weak,
    /// One value per calling thread, dropped when the thread exits
    ThreadLocal,
}

type WeakService = Weak<dyn Any + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

std::thread_local! {
    /// Values owned by the current thread, by reference id
    static OWNED: RefCell<HashMap<u64, ArcService>> = RefCell::new(HashMap::new());
}

/// Per-thread values: the thread owns its value, the reference only sees it.
///
/// Slots of exited threads are recycled by [`ThreadLocal`]; the owner thread id tells a
/// recycled slot apart from a live one.
pub(crate) struct ThreadValues {
    id: u64,
    seen: ThreadLocal<RefCell<Option<(ThreadId, WeakService)>>>,
}

impl ThreadValues {
    fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            seen: ThreadLocal::new(),
        }
    }

    fn get(&self) -> Option<ArcService> {
        let current = std::thread::current().id();
        let seen = self.seen.get()?.borrow();
        let value = match seen.as_ref() {
            Some((owner, value)) if *owner == current => value.upgrade(),
            _ => None,
        };
        value
    }

    fn put(&mut self, value: ArcService) {
        let weak = Arc::downgrade(&value);
        let replaced = OWNED.try_with(|owned| owned.borrow_mut().insert(self.id, value));
        drop(replaced);
        let slot = self.seen.get_or(|| RefCell::new(None));
        *slot.borrow_mut() = Some((std::thread::current().id(), weak));
    }

    fn drain(&mut self) -> Vec<ArcService> {
        let values = self
            .seen
            .iter_mut()
            .filter_map(|slot| slot.get_mut().take())
            .filter_map(|(_, value)| value.upgrade())
            .collect();
        self.seen.clear();
        let id = self.id;
        let owned = OWNED.try_with(|owned| owned.borrow_mut().remove(&id));
        drop(owned);
        // Values still owned by other live threads must not be seen again
        self.id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        values
    }
}

pub(crate) enum Reference {
    Strong(Option<ArcService>),
    Weak(Option<WeakService>),
    ThreadLocal(ThreadValues),
}

impl Reference {
    #[inline]
    pub(crate) fn new(kind: RefKind) -> Self {
        match kind {
            RefKind::Strong => Reference::Strong(None),
            RefKind::Weak => Reference::Weak(None),
            RefKind::ThreadLocal => Reference::ThreadLocal(ThreadValues::new()),
        }
    }

    /// The value visible to the calling thread, if still alive
    pub(crate) fn get(&self) -> Option<ArcService> {
        match self {
            Reference::Strong(value) => value.clone(),
            Reference::Weak(value) => value.as_ref().and_then(Weak::upgrade),
            Reference::ThreadLocal(values) => values.get(),
        }
    }

    pub(crate) fn put(&mut self, value: ArcService) {
        match self {
            Reference::Strong(slot) => *slot = Some(value),
            Reference::Weak(slot) => *slot = Some(Arc::downgrade(&value)),
            Reference::ThreadLocal(values) => values.put(value),
        }
    }

    /// Takes every live value out of the reference, leaving it empty
    pub(crate) fn drain(&mut self) -> Vec<ArcService> {
        match self {
            Reference::Strong(slot) => slot.take().into_iter().collect(),
            Reference::Weak(slot) => slot.take().and_then(|w| w.upgrade()).into_iter().collect(),
            Reference::ThreadLocal(values) => values.drain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_reference_keeps_value() {
        let mut reference = Reference::new(RefKind::Strong);
        reference.put(Arc::new(5u8));
        assert!(reference.get().is_some());
        assert_eq!(reference.drain().len(), 1);
        assert!(reference.get().is_none());
    }

    #[test]
    fn weak_reference_forgets_dropped_value() {
        let mut reference = Reference::new(RefKind::Weak);
        let value: ArcService = Arc::new(5u8);
        reference.put(value.clone());
        assert!(reference.get().is_some());

        drop(value);
        assert!(reference.get().is_none());
    }

    #[test]
    fn thread_local_reference_is_per_thread() {
        let mut reference = Reference::new(RefKind::ThreadLocal);
        reference.put(Arc::new(1u8));

        std::thread::scope(|s| {
            s.spawn(|| assert!(reference.get().is_none()));
        });
        assert!(reference.get().is_some());
    }

    #[test]
    fn thread_local_values_are_dropped_when_their_thread_exits() {
        let mut reference = Reference::new(RefKind::ThreadLocal);
        let value: ArcService = Arc::new(1u8);
        let weak = Arc::downgrade(&value);

        std::thread::scope(|s| s.spawn(|| reference.put(value)).join().unwrap());

        assert!(weak.upgrade().is_none());
        assert!(reference.get().is_none());
        assert!(reference.drain().is_empty());
    }

    #[test]
    fn draining_hides_values_of_live_threads() {
        let mut reference = Reference::new(RefKind::ThreadLocal);
        reference.put(Arc::new(1u8));

        assert_eq!(reference.drain().len(), 1);
        assert!(reference.get().is_none());

        reference.put(Arc::new(2u8));
        assert_eq!(reference.get().and_then(|v| v.downcast_ref::<u8>().copied()), Some(2));
    }
}
