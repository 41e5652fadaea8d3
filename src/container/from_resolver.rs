//! Extractors for fetching creator parameters from a resolver

use super::{Lazy, Resolver};
use crate::{
    error::Error,
    factory::Provider,
};
use std::sync::Arc;

/// A trait that defines how to extract `Self` from a [`Resolver`]
pub trait FromResolver: Sized + Send + Sync {
    /// Extracts `Self` from the resolver
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error>;
}

impl FromResolver for Resolver {
    #[inline]
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
        Ok(resolver.clone())
    }
}

impl FromResolver for () {
    #[inline]
    fn from_resolver(_: &Resolver) -> Result<Self, Error> {
        Ok(())
    }
}

/// The untagged instance of `T`
impl<T: Send + Sync + 'static> FromResolver for Arc<T> {
    #[inline]
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
        resolver.instance::<T>(None)
    }
}

/// The untagged instance of `T`, if any
impl<T: Send + Sync + 'static> FromResolver for Option<Arc<T>> {
    #[inline]
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
        resolver.instance_or_none::<T>(None)
    }
}

impl<T: Send + Sync + 'static> FromResolver for Provider<T> {
    #[inline]
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
        resolver.provider::<T>(None)
    }
}

impl<T: Send + Sync + 'static> FromResolver for Lazy<T> {
    #[inline]
    fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
        Ok(resolver.lazy::<T>(None))
    }
}

macro_rules! define_generic_from_resolver {
    ($($T: ident),*) => {
        impl<$($T: FromResolver),+> FromResolver for ($($T,)+) {
            #[inline]
            #[allow(non_snake_case)]
            fn from_resolver(resolver: &Resolver) -> Result<Self, Error> {
                let tuple = (
                    $(
                    $T::from_resolver(resolver)?,
                    )*
                );
                Ok(tuple)
            }
        }
    }
}

define_generic_from_resolver! { T1 }
define_generic_from_resolver! { T1, T2 }
define_generic_from_resolver! { T1, T2, T3 }
define_generic_from_resolver! { T1, T2, T3, T4 }
define_generic_from_resolver! { T1, T2, T3, T4, T5 }
