//! Bindings serving every subtype of a declared supertype

use super::Binding;
use crate::{
    container::Resolver,
    error::Error,
    factory::{downcast_value, AnyFactory},
    key::Key,
    scope::{lock, next_owner_id, Creation, RefKind, RegistryKey, Scope},
    types::{ArcService, TypeToken},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

type SpecializeFn = Arc<
    dyn Fn(TypeToken) -> Result<Arc<dyn Binding>, Error>
    + Send
    + Sync
>;

enum Specializations {
    Forever(Mutex<HashMap<TypeToken, Arc<dyn Binding>>>),
    Scoped(Arc<dyn Scope>),
}

struct Specialized(Arc<dyn Binding>);

/// Serves requests for any subtype of `created_type` by asking a block for a binding specialized
/// to the concrete requested type.
///
/// Specialized bindings are cached per concrete type, indefinitely by default or in the registry
/// of an explicit scope (and then evicted with it).
pub struct SubTypesBinding {
    id: u64,
    context_type: TypeToken,
    created_type: TypeToken,
    specialize: SpecializeFn,
    cache: Specializations,
}

impl SubTypesBinding {
    /// Serves subtypes of `Super`
    pub fn new<Super: ?Sized + 'static>(
        specialize: impl Fn(TypeToken) -> Result<Arc<dyn Binding>, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: next_owner_id(),
            context_type: TypeToken::any(),
            created_type: TypeToken::of::<Super>(),
            specialize: Arc::new(specialize),
            cache: Specializations::Forever(Mutex::new(HashMap::new())),
        }
    }

    /// Caches specialized bindings in `scope` instead of forever
    #[inline]
    pub fn scoped(mut self, scope: Arc<dyn Scope>) -> Self {
        self.context_type = scope.context_type();
        self.cache = Specializations::Scoped(scope);
        self
    }

    /// Restricts the binding to contexts of type `C`
    #[inline]
    pub fn on_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeToken::of::<C>();
        self
    }

    fn specialized(&self, ty: TypeToken, resolver: &Resolver) -> Result<Arc<dyn Binding>, Error> {
        let binding = match &self.cache {
            Specializations::Forever(cache) => {
                let mut cache = lock(cache);
                match cache.get(&ty) {
                    Some(binding) => binding.clone(),
                    None => {
                        let binding = (self.specialize)(ty)?;
                        cache.insert(ty, binding.clone());
                        binding
                    }
                }
            }
            Specializations::Scoped(scope) => {
                let specialize = self.specialize.clone();
                let cell = scope.registry(resolver.context())?.get_or_create(
                    RegistryKey::with_arg(self.id, ty),
                    Creation {
                        kind: RefKind::Strong,
                        disposer: None,
                        create: &mut || specialize(ty).map(|b| Arc::new(Specialized(b)) as ArcService),
                    },
                )?;
                downcast_value::<Specialized>(cell)?.0.clone()
            }
        };
        if binding.created_type() != ty {
            return Err(Error::configuration(format!(
                "Subtypes binding for {} returned a binding creating {} when asked for {}",
                self.created_type,
                binding.created_type(),
                ty
            )));
        }
        Ok(binding)
    }
}

impl Binding for SubTypesBinding {
    #[inline]
    fn factory_name(&self) -> &'static str {
        "subTypes"
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.context_type
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        self.created_type
    }

    #[inline]
    fn scope(&self) -> Option<&dyn Scope> {
        match &self.cache {
            Specializations::Scoped(scope) => Some(scope.as_ref()),
            Specializations::Forever(_) => None,
        }
    }

    fn get_factory(&self, key: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        self.specialized(key.created_type(), resolver)?
            .get_factory(key, resolver)
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        let cache = match &self.cache {
            Specializations::Forever(_) => Specializations::Forever(Mutex::new(HashMap::new())),
            Specializations::Scoped(scope) => Specializations::Scoped(scope.clone()),
        };
        Some(Arc::new(Self {
            id: next_owner_id(),
            context_type: self.context_type,
            created_type: self.created_type,
            specialize: self.specialize.clone(),
            cache,
        }))
    }

    #[inline]
    fn supports_subtypes(&self) -> bool {
        true
    }
}
