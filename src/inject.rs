//! Utilities to inject dependencies when a type is created by the container

use crate::{container::Resolver, error::Error};

/// A trait that adds the ability to inject dependencies when a type is created by the container
///
/// If there is no need to inject other dependencies, the `struct` must implement the `Default` trait
///
/// # Example
/// ```
/// use diorama::ContainerBuilder;
///
/// #[derive(Default)]
/// struct Clock;
///
/// let mut builder = ContainerBuilder::new();
/// builder.bind_injected_singleton::<Clock>(None).unwrap();
///
/// let container = builder.build().unwrap();
/// assert!(container.instance::<Clock>(None).is_ok());
/// ```
///
/// If it's required to construct a `struct` from other dependencies, the `Inject` can be implemented manually
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use diorama::{ContainerBuilder, Inject, Resolver, error::Error};
///
/// #[derive(Default)]
/// struct Clock;
///
/// struct Scheduler {
///     clock: Arc<Clock>,
/// }
///
/// impl Inject for Scheduler {
///     fn inject(resolver: &Resolver) -> Result<Self, Error> {
///         let clock = resolver.instance::<Clock>(None)?;
///         Ok(Self { clock })
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.bind_injected_singleton::<Clock>(None).unwrap();
/// builder.bind_injected::<Scheduler>(None).unwrap();
///
/// let container = builder.build().unwrap();
/// let scheduler = container.instance::<Scheduler>(None).unwrap();
/// assert!(Arc::ptr_eq(&scheduler.clock, &container.instance::<Clock>(None).unwrap()));
/// ```
pub trait Inject: Sized + Send + Sync + 'static {
    /// Creates `Self`, resolving its dependencies
    fn inject(resolver: &Resolver) -> Result<Self, Error>;
}

impl<T: Default + Send + Sync + 'static> Inject for T {
    #[inline]
    fn inject(_: &Resolver) -> Result<Self, Error> {
        Ok(Self::default())
    }
}
