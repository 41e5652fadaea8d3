//! Type-erased and typed factory handles

use crate::{error::Error, types::ArcService};
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};

type FactoryFn = Arc<
    dyn Fn(ArcService) -> Result<ArcService, Error>
    + Send
    + Sync
>;

/// A type-erased factory: takes an erased argument, returns an erased value
#[derive(Clone)]
pub struct AnyFactory {
    inner: FactoryFn,
}

impl Debug for AnyFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AnyFactory(..)")
    }
}

impl AnyFactory {
    /// Wraps an erased function
    #[inline]
    pub fn new(f: impl Fn(ArcService) -> Result<ArcService, Error> + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// Wraps a typed function taking an `A` and creating a `T`
    pub fn from_fn<A, T>(f: impl Fn(A) -> Result<T, Error> + Send + Sync + 'static) -> Self
    where
        A: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Self::new(move |arg: ArcService| {
            let arg = downcast_arg::<A>(&arg)?;
            f(arg).map(|value| Arc::new(value) as ArcService)
        })
    }

    /// Calls the factory with an erased argument
    #[inline]
    pub fn call(&self, arg: ArcService) -> Result<ArcService, Error> {
        (self.inner)(arg)
    }

    /// Calls a factory that takes no argument
    #[inline]
    pub fn call_unit(&self) -> Result<ArcService, Error> {
        self.call(Arc::new(()))
    }

    /// Maps every produced value
    pub(crate) fn map(self, f: impl Fn(ArcService) -> Result<ArcService, Error> + Send + Sync + 'static) -> Self {
        Self::new(move |arg| f(self.call(arg)?))
    }
}

/// Recovers a typed argument from its erased form
#[inline]
pub(crate) fn downcast_arg<A: Clone + 'static>(arg: &ArcService) -> Result<A, Error> {
    arg.downcast_ref::<A>()
        .cloned()
        .ok_or(Error::ResolveFailed(std::any::type_name::<A>()))
}

/// Recovers a typed value from its erased form
#[inline]
pub(crate) fn downcast_value<T: Send + Sync + 'static>(value: ArcService) -> Result<Arc<T>, Error> {
    value
        .downcast::<T>()
        .map_err(|_| Error::ResolveFailed(std::any::type_name::<T>()))
}

/// A typed factory creating `T` values from `A` arguments
pub struct Factory<A, T> {
    inner: AnyFactory,
    _types: PhantomData<fn(A) -> T>,
}

impl<A, T> Clone for Factory<A, T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _types: PhantomData }
    }
}

impl<A, T> Debug for Factory<A, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Factory<{}, {}>", std::any::type_name::<A>(), std::any::type_name::<T>())
    }
}

impl<A: Send + Sync + 'static, T: Send + Sync + 'static> Factory<A, T> {
    #[inline]
    pub(crate) fn new(inner: AnyFactory) -> Self {
        Self { inner, _types: PhantomData }
    }

    /// Creates or retrieves the value for `arg`
    #[inline]
    pub fn call(&self, arg: A) -> Result<Arc<T>, Error> {
        self.inner.call(Arc::new(arg)).and_then(downcast_value::<T>)
    }

    /// The erased factory
    #[inline]
    pub fn erased(&self) -> &AnyFactory {
        &self.inner
    }
}

/// A typed factory creating `T` values without argument
pub struct Provider<T> {
    inner: AnyFactory,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Provider<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _type: PhantomData }
    }
}

impl<T> Debug for Provider<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Provider<{}>", std::any::type_name::<T>())
    }
}

impl<T: Send + Sync + 'static> Provider<T> {
    #[inline]
    pub(crate) fn new(inner: AnyFactory) -> Self {
        Self { inner, _type: PhantomData }
    }

    /// Creates or retrieves a value
    #[inline]
    pub fn get(&self) -> Result<Arc<T>, Error> {
        self.inner.call_unit().and_then(downcast_value::<T>)
    }

    /// The erased factory
    #[inline]
    pub fn erased(&self) -> &AnyFactory {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_calls_typed_factories() {
        let factory = Factory::<u32, String>::new(AnyFactory::from_fn(|n: u32| Ok(format!("#{n}"))));
        assert_eq!(*factory.call(7).unwrap(), "#7");
    }

    #[test]
    fn it_rejects_wrong_argument_type() {
        let factory = AnyFactory::from_fn(|n: u32| Ok(n + 1));
        assert!(matches!(factory.call(Arc::new("nope")), Err(Error::ResolveFailed(_))));
    }

    #[test]
    fn it_rejects_wrong_value_type() {
        let provider = Provider::<String>::new(AnyFactory::from_fn(|_: ()| Ok(1u8)));
        assert!(matches!(provider.get(), Err(Error::ResolveFailed(_))));
    }
}
