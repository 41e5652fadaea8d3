//! Fallback sources consulted when no binding matches

use super::Resolver;
use crate::{error::Error, factory::AnyFactory, key::Key};

/// A last-resort source of factories for keys that have no binding.
///
/// Sources are asked in registration order; the first one returning a factory wins.
/// They are never asked for overridden bindings.
///
/// # Example
/// ```
/// use diorama::{ContainerBuilder, factory::AnyFactory, key::Key};
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_external_source(|_: &diorama::Resolver, key: &Key| {
///     Ok::<_, diorama::Error>(key.created_type().is::<u32>().then(|| AnyFactory::from_fn(|_: ()| Ok(42u32))))
/// });
///
/// let container = builder.build().unwrap();
/// assert_eq!(*container.instance::<u32>(None).unwrap(), 42);
/// ```
pub trait ExternalSource: Send + Sync + 'static {
    /// A factory for `key`, or `None` if this source cannot serve it
    fn get_factory(&self, resolver: &Resolver, key: &Key) -> Result<Option<AnyFactory>, Error>;
}

impl<F> ExternalSource for F
where
    F: Fn(&Resolver, &Key) -> Result<Option<AnyFactory>, Error> + Send + Sync + 'static,
{
    #[inline]
    fn get_factory(&self, resolver: &Resolver, key: &Key) -> Result<Option<AnyFactory>, Error> {
        self(resolver, key)
    }
}
