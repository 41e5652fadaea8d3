//! Containers built on first access or set after creation

use super::{Container, ContainerBuilder};
use crate::{error::Error, scope::lock};
use std::{
    fmt::{Debug, Formatter},
    sync::{Mutex, OnceLock},
};

type Configure = Box<
    dyn FnOnce(&mut ContainerBuilder) -> Result<(), Error>
    + Send
>;

enum State {
    Pending(Configure),
    Failed(Error),
    Built,
}

/// A container configured now and built on first access.
///
/// Ready callbacks and eager singletons run when the container is built.
/// A failed build is reported on every later access.
pub struct LazyContainer {
    state: Mutex<State>,
    container: OnceLock<Container>,
}

impl Debug for LazyContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyContainer")
            .field("built", &self.container.get().is_some())
            .finish()
    }
}

impl LazyContainer {
    /// Creates a container that runs `configure` on a fresh builder on first access
    #[inline]
    pub fn new(configure: impl FnOnce(&mut ContainerBuilder) -> Result<(), Error> + Send + 'static) -> Self {
        Self {
            state: Mutex::new(State::Pending(Box::new(configure))),
            container: OnceLock::new(),
        }
    }

    /// Builds the container if needed and returns it
    pub fn get(&self) -> Result<&Container, Error> {
        if let Some(container) = self.container.get() {
            return Ok(container);
        }

        let mut state = lock(&self.state);
        match std::mem::replace(&mut *state, State::Built) {
            State::Built => self
                .container
                .get()
                .ok_or_else(|| Error::configuration("Lazy container is being built")),
            State::Failed(err) => {
                *state = State::Failed(err.clone());
                Err(err)
            }
            State::Pending(configure) => {
                let mut builder = ContainerBuilder::new();
                let built = configure(&mut builder).and_then(|_| builder.build());
                match built {
                    Ok(container) => Ok(self.container.get_or_init(|| container)),
                    Err(err) => {
                        *state = State::Failed(err.clone());
                        Err(err)
                    }
                }
            }
        }
    }

    /// Returns `true` once the container has been built
    #[inline]
    pub fn is_built(&self) -> bool {
        self.container.get().is_some()
    }
}

/// A container handle created empty and set once later.
///
/// Any access before [`LateInitContainer::set`] fails with [`Error::UninitializedAccess`].
#[derive(Debug, Default)]
pub struct LateInitContainer {
    container: OnceLock<Container>,
}

impl LateInitContainer {
    /// Creates an uninitialized handle
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backing container; fails if it was already set
    pub fn set(&self, container: Container) -> Result<(), Error> {
        self.container
            .set(container)
            .map_err(|_| Error::configuration("Late-init container has already been initialized"))
    }

    /// The backing container
    #[inline]
    pub fn get(&self) -> Result<&Container, Error> {
        self.container.get().ok_or(Error::UninitializedAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn it_builds_on_first_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyContainer::new(move |builder| {
            counter.fetch_add(1, Ordering::SeqCst);
            builder.bind_instance(None, 5u8)
        });

        assert!(!lazy.is_built());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(*lazy.get().unwrap().instance::<u8>(None).unwrap(), 5);
        assert_eq!(*lazy.get().unwrap().instance::<u8>(None).unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn it_keeps_reporting_a_failed_build() {
        let lazy = LazyContainer::new(|builder| builder.bind_instance(None, ()));

        assert!(matches!(lazy.get(), Err(Error::Configuration(_))));
        assert!(matches!(lazy.get(), Err(Error::Configuration(_))));
    }

    #[test]
    fn it_fails_before_late_init() {
        let late = LateInitContainer::new();

        assert!(matches!(late.get(), Err(Error::UninitializedAccess)));

        late.set(ContainerBuilder::new().build().unwrap()).unwrap();

        assert!(late.get().is_ok());
        assert!(late.set(ContainerBuilder::new().build().unwrap()).is_err());
    }
}
