//! Set and map multi-bindings

use super::Binding;
use crate::{
    container::Resolver,
    error::Error,
    factory::{downcast_value, AnyFactory},
    key::Key,
    types::{ArcService, TypeToken},
};
use indexmap::IndexMap;
use std::{hash::Hash, sync::Arc};

type Collect = Arc<
    dyn Fn(Vec<ArcService>) -> Result<ArcService, Error>
    + Send
    + Sync
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultiKind {
    Set,
    Map,
}

/// Collects the values of several element bindings into one value.
///
/// A set of `T` resolves to `Vec<Arc<T>>`, a map of `K` to `V` resolves to `IndexMap<K, V>`
/// built from elements creating `(K, V)` pairs. Elements are re-evaluated on every request,
/// each according to its own scope.
#[derive(Clone)]
pub struct MultiBinding {
    kind: MultiKind,
    context_type: TypeToken,
    arg_type: TypeToken,
    element_type: TypeToken,
    created_type: TypeToken,
    elements: Vec<Arc<dyn Binding>>,
    collect: Collect,
}

impl MultiBinding {
    /// An empty set of `T` values
    #[inline]
    pub fn set<T: Send + Sync + 'static>() -> Self {
        Self::arg_set::<(), T>()
    }

    /// An empty set of `T` values created from `A` arguments
    pub fn arg_set<A: 'static, T: Send + Sync + 'static>() -> Self {
        Self {
            kind: MultiKind::Set,
            context_type: TypeToken::any(),
            arg_type: TypeToken::of::<A>(),
            element_type: TypeToken::of::<T>(),
            created_type: TypeToken::of::<Vec<Arc<T>>>(),
            elements: Vec::new(),
            collect: Arc::new(|values: Vec<ArcService>| {
                let values = values
                    .into_iter()
                    .map(downcast_value::<T>)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(values) as ArcService)
            }),
        }
    }

    /// An empty map of `K` to `V`
    pub fn map<K, V>() -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Self {
            kind: MultiKind::Map,
            context_type: TypeToken::any(),
            arg_type: TypeToken::unit(),
            element_type: TypeToken::of::<(K, V)>(),
            created_type: TypeToken::of::<IndexMap<K, V>>(),
            elements: Vec::new(),
            collect: Arc::new(|values: Vec<ArcService>| {
                let mut map = IndexMap::with_capacity(values.len());
                for value in values {
                    let (k, v) = downcast_value::<(K, V)>(value)?.as_ref().clone();
                    map.insert(k, v);
                }
                Ok(Arc::new(map) as ArcService)
            }),
        }
    }

    /// Type of the values the elements create
    #[inline]
    pub fn element_type(&self) -> TypeToken {
        self.element_type
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if there are no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// A new multi-binding with one more element
    pub fn with_element(&self, element: Arc<dyn Binding>) -> Result<Self, Error> {
        if element.created_type() != self.element_type {
            return Err(Error::configuration(format!(
                "Cannot add a {} creating {} to a {} of {}",
                element.factory_name(),
                element.created_type(),
                self.factory_name(),
                self.element_type
            )));
        }
        if element.arg_type() != self.arg_type {
            return Err(Error::configuration(format!(
                "Cannot add a {} taking {} to a {} taking {}",
                element.factory_name(),
                element.arg_type(),
                self.factory_name(),
                self.arg_type
            )));
        }
        let mut next = self.clone();
        next.elements.push(element);
        Ok(next)
    }
}

impl Binding for MultiBinding {
    #[inline]
    fn factory_name(&self) -> &'static str {
        match self.kind {
            MultiKind::Set => "set",
            MultiKind::Map => "map",
        }
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.context_type
    }

    #[inline]
    fn arg_type(&self) -> TypeToken {
        self.arg_type
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        self.created_type
    }

    fn get_factory(&self, key: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        let element_key = Key::new(key.context_type(), self.arg_type, self.element_type, key.tag().cloned());
        let resolver = resolver.for_set_elements();
        let factories = self
            .elements
            .iter()
            .map(|element| element.get_factory(&element_key, &resolver))
            .collect::<Result<Vec<_>, _>>()?;
        let collect = self.collect.clone();
        Ok(AnyFactory::new(move |arg| {
            let values = factories
                .iter()
                .map(|factory| factory.call(arg.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            collect(values)
        }))
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        let mut copy = self.clone();
        copy.elements = self
            .elements
            .iter()
            .map(|element| element.copy().unwrap_or_else(|| element.clone()))
            .collect();
        Some(Arc::new(copy))
    }

    #[inline]
    fn as_multi(&self) -> Option<&MultiBinding> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{InstanceBinding, ProviderBinding};

    #[test]
    fn it_checks_element_types() {
        let set = MultiBinding::set::<String>();
        assert!(set.with_element(Arc::new(InstanceBinding::new(String::from("a")))).is_ok());
        assert!(matches!(
            set.with_element(Arc::new(InstanceBinding::new(1u8))),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn adding_an_element_keeps_the_original() {
        let set = MultiBinding::set::<u8>();
        let bigger = set.with_element(Arc::new(ProviderBinding::new(|_| Ok(1u8)))).unwrap();

        assert!(set.is_empty());
        assert_eq!(bigger.len(), 1);
        assert_eq!(bigger.description(), "set { Vec<Arc<u8>> }");
    }
}
