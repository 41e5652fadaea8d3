//! Provider, factory, instance, singleton, multiton and eager singleton bindings

use super::{ArgCreator, Binding, Creator};
use crate::{
    container::{FromResolver, GenericFactory, Resolver},
    error::Error,
    factory::{downcast_arg, AnyFactory},
    key::Key,
    scope::{closer, next_owner_id, Closeable, Creation, Disposer, RefKind, RegistryKey, Scope, UnboundedScope},
    types::{ArcService, TypeToken},
};
use std::{fmt::Debug, hash::Hash, sync::Arc};

#[inline]
fn erase<T: Send + Sync + 'static>(value: T) -> ArcService {
    Arc::new(value)
}

#[inline]
fn inject<T, F, Args>(factory: F) -> Creator<T>
where
    T: Send + Sync + 'static,
    F: GenericFactory<Args, Output = T>,
    Args: FromResolver,
{
    Arc::new(move |resolver: &Resolver| {
        let args = Args::from_resolver(resolver)?;
        factory.call(args)
    })
}

/// Creates a new value on every request
pub struct ProviderBinding<T> {
    creator: Creator<T>,
    context_type: TypeToken,
}

impl<T: Send + Sync + 'static> ProviderBinding<T> {
    /// Creates a provider from a creator function
    #[inline]
    pub fn new(creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self { creator: Arc::new(creator), context_type: TypeToken::any() }
    }

    /// Creates a provider whose creator receives its dependencies as parameters
    #[inline]
    pub fn from_fn<F, Args>(factory: F) -> Self
    where
        F: GenericFactory<Args, Output = T>,
        Args: FromResolver,
    {
        Self { creator: inject(factory), context_type: TypeToken::any() }
    }

    /// Restricts the binding to contexts of type `C`
    #[inline]
    pub fn on_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeToken::of::<C>();
        self
    }
}

impl<T: Send + Sync + 'static> Binding for ProviderBinding<T> {
    #[inline]
    fn factory_name(&self) -> &'static str {
        "provider"
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.context_type
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    fn get_factory(&self, _: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        let creator = self.creator.clone();
        let resolver = resolver.clone();
        Ok(AnyFactory::new(move |_| creator(&resolver).map(erase)))
    }
}

/// Creates a new value from an argument on every request
pub struct FactoryBinding<A, T> {
    creator: ArgCreator<A, T>,
    context_type: TypeToken,
}

impl<A, T> FactoryBinding<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Creates a factory from a creator function
    #[inline]
    pub fn new(creator: impl Fn(&Resolver, A) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self { creator: Arc::new(creator), context_type: TypeToken::any() }
    }

    /// Restricts the binding to contexts of type `C`
    #[inline]
    pub fn on_context<C: 'static>(mut self) -> Self {
        self.context_type = TypeToken::of::<C>();
        self
    }
}

impl<A, T> Binding for FactoryBinding<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    #[inline]
    fn factory_name(&self) -> &'static str {
        "factory"
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.context_type
    }

    #[inline]
    fn arg_type(&self) -> TypeToken {
        TypeToken::of::<A>()
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    fn get_factory(&self, _: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        let creator = self.creator.clone();
        let resolver = resolver.clone();
        Ok(AnyFactory::new(move |arg| {
            let arg = downcast_arg::<A>(&arg)?;
            creator(&resolver, arg).map(erase)
        }))
    }
}

/// Always returns the same, already existing value
pub struct InstanceBinding<T> {
    value: Arc<T>,
}

impl<T: Send + Sync + 'static> InstanceBinding<T> {
    /// Binds a value
    #[inline]
    pub fn new(value: T) -> Self {
        Self { value: Arc::new(value) }
    }

    /// Binds an already shared value
    #[inline]
    pub fn from_arc(value: Arc<T>) -> Self {
        Self { value }
    }
}

impl<T: Send + Sync + 'static> Binding for InstanceBinding<T> {
    #[inline]
    fn factory_name(&self) -> &'static str {
        "instance"
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    fn get_factory(&self, _: &Key, _: &Resolver) -> Result<AnyFactory, Error> {
        let value: ArcService = self.value.clone();
        Ok(AnyFactory::new(move |_| Ok(value.clone())))
    }
}

/// Creates one value per scope registry and hands it out until the scope lets it go
pub struct SingletonBinding<T> {
    id: u64,
    scope: Arc<dyn Scope>,
    explicit_scope: bool,
    creator: Creator<T>,
    ref_kind: RefKind,
    disposer: Option<Disposer>,
}

impl<T: Send + Sync + 'static> SingletonBinding<T> {
    /// Creates a singleton held by its own unbounded scope
    #[inline]
    pub fn new(creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self::with_creator(Arc::new(UnboundedScope::new()), false, Arc::new(creator))
    }

    /// Creates a singleton held by `scope`
    #[inline]
    pub fn scoped(scope: Arc<dyn Scope>, creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self::with_creator(scope, true, Arc::new(creator))
    }

    /// Creates a singleton whose creator receives its dependencies as parameters
    #[inline]
    pub fn from_fn<F, Args>(factory: F) -> Self
    where
        F: GenericFactory<Args, Output = T>,
        Args: FromResolver,
    {
        Self::with_creator(Arc::new(UnboundedScope::new()), false, inject(factory))
    }

    fn with_creator(scope: Arc<dyn Scope>, explicit_scope: bool, creator: Creator<T>) -> Self {
        Self {
            id: next_owner_id(),
            scope,
            explicit_scope,
            creator,
            ref_kind: RefKind::Strong,
            disposer: None,
        }
    }

    /// Holds the value with the given reference kind
    #[inline]
    pub fn with_ref(mut self, kind: RefKind) -> Self {
        self.ref_kind = kind;
        self
    }

    /// Calls `dispose` on the value when its scope lets it go
    pub fn with_disposer(mut self, dispose: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.disposer = Some(Arc::new(move |value: &ArcService| {
            if let Some(value) = value.downcast_ref::<T>() {
                dispose(value);
            }
        }));
        self
    }

    /// Closes the value when its scope lets it go
    #[inline]
    pub fn closeable(mut self) -> Self
    where
        T: Closeable,
    {
        self.disposer = Some(closer::<T>());
        self
    }

    /// Slot of this singleton in its scope registries
    #[inline]
    pub fn registry_key(&self) -> RegistryKey {
        RegistryKey::new(self.id)
    }
}

impl<T: Send + Sync + 'static> Binding for SingletonBinding<T> {
    #[inline]
    fn factory_name(&self) -> &'static str {
        "singleton"
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.scope.context_type()
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    #[inline]
    fn scope(&self) -> Option<&dyn Scope> {
        self.explicit_scope.then_some(self.scope.as_ref())
    }

    fn get_factory(&self, _: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        let registry = self.scope.registry(resolver.context())?;
        let key = self.registry_key();
        let kind = self.ref_kind;
        let disposer = self.disposer.clone();
        let creator = self.creator.clone();
        let resolver = resolver.clone();
        Ok(AnyFactory::new(move |_| {
            registry.get_or_create(key.clone(), Creation {
                kind,
                disposer: disposer.clone(),
                create: &mut || creator(&resolver).map(erase),
            })
        }))
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            id: next_owner_id(),
            scope: self.scope.clone(),
            explicit_scope: self.explicit_scope,
            creator: self.creator.clone(),
            ref_kind: self.ref_kind,
            disposer: self.disposer.clone(),
        }))
    }
}

/// Creates one value per scope registry and per argument
pub struct MultitonBinding<A, T> {
    id: u64,
    scope: Arc<dyn Scope>,
    explicit_scope: bool,
    creator: ArgCreator<A, T>,
    ref_kind: RefKind,
    disposer: Option<Disposer>,
}

impl<A, T> MultitonBinding<A, T>
where
    A: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Creates a multiton held by its own unbounded scope
    #[inline]
    pub fn new(creator: impl Fn(&Resolver, A) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self::with_creator(Arc::new(UnboundedScope::new()), false, Arc::new(creator))
    }

    /// Creates a multiton held by `scope`
    #[inline]
    pub fn scoped(scope: Arc<dyn Scope>, creator: impl Fn(&Resolver, A) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self::with_creator(scope, true, Arc::new(creator))
    }

    fn with_creator(scope: Arc<dyn Scope>, explicit_scope: bool, creator: ArgCreator<A, T>) -> Self {
        Self {
            id: next_owner_id(),
            scope,
            explicit_scope,
            creator,
            ref_kind: RefKind::Strong,
            disposer: None,
        }
    }

    /// Holds values with the given reference kind
    #[inline]
    pub fn with_ref(mut self, kind: RefKind) -> Self {
        self.ref_kind = kind;
        self
    }

    /// Closes values when their scope lets them go
    #[inline]
    pub fn closeable(mut self) -> Self
    where
        T: Closeable,
    {
        self.disposer = Some(closer::<T>());
        self
    }

    /// Slot of the value created for `arg` in the scope registries
    #[inline]
    pub fn registry_key(&self, arg: A) -> RegistryKey {
        RegistryKey::with_arg(self.id, arg)
    }
}

impl<A, T> Binding for MultitonBinding<A, T>
where
    A: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    #[inline]
    fn factory_name(&self) -> &'static str {
        "multiton"
    }

    #[inline]
    fn context_type(&self) -> TypeToken {
        self.scope.context_type()
    }

    #[inline]
    fn arg_type(&self) -> TypeToken {
        TypeToken::of::<A>()
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    #[inline]
    fn scope(&self) -> Option<&dyn Scope> {
        self.explicit_scope.then_some(self.scope.as_ref())
    }

    fn get_factory(&self, _: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        let registry = self.scope.registry(resolver.context())?;
        let id = self.id;
        let kind = self.ref_kind;
        let disposer = self.disposer.clone();
        let creator = self.creator.clone();
        let resolver = resolver.clone();
        Ok(AnyFactory::new(move |arg| {
            let arg = downcast_arg::<A>(&arg)?;
            registry.get_or_create(RegistryKey::with_arg(id, arg.clone()), Creation {
                kind,
                disposer: disposer.clone(),
                create: &mut || creator(&resolver, arg.clone()).map(erase),
            })
        }))
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            id: next_owner_id(),
            scope: self.scope.clone(),
            explicit_scope: self.explicit_scope,
            creator: self.creator.clone(),
            ref_kind: self.ref_kind,
            disposer: self.disposer.clone(),
        }))
    }
}

/// A singleton created during the ready phase instead of on first request
pub struct EagerSingletonBinding<T> {
    inner: SingletonBinding<T>,
}

impl<T: Send + Sync + 'static> EagerSingletonBinding<T> {
    /// Creates an eager singleton from a creator function
    #[inline]
    pub fn new(creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static) -> Self {
        Self { inner: SingletonBinding::new(creator) }
    }

    /// Closes the value when the binding's scope lets it go
    #[inline]
    pub fn closeable(self) -> Self
    where
        T: Closeable,
    {
        Self { inner: self.inner.closeable() }
    }
}

impl<T: Send + Sync + 'static> Binding for EagerSingletonBinding<T> {
    #[inline]
    fn factory_name(&self) -> &'static str {
        "eagerSingleton"
    }

    #[inline]
    fn created_type(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    #[inline]
    fn get_factory(&self, key: &Key, resolver: &Resolver) -> Result<AnyFactory, Error> {
        self.inner.get_factory(key, resolver)
    }

    fn copy(&self) -> Option<Arc<dyn Binding>> {
        Some(Arc::new(Self {
            inner: SingletonBinding {
                id: next_owner_id(),
                scope: Arc::new(UnboundedScope::new()),
                explicit_scope: false,
                creator: self.inner.creator.clone(),
                ref_kind: self.inner.ref_kind,
                disposer: self.inner.disposer.clone(),
            },
        }))
    }

    #[inline]
    fn is_eager(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binding::describe, scope::ContextScope};

    #[derive(Debug)]
    struct Person(String);

    #[test]
    fn it_describes_bindings() {
        let provider = ProviderBinding::new(|_| Ok(Person("a".into())));
        let factory = FactoryBinding::new(|_, name: String| Ok(Person(name)));
        let scoped = SingletonBinding::scoped(Arc::new(ContextScope::<u32>::new()), |_| Ok(Person("b".into())));
        let contexted = ProviderBinding::new(|_| Ok(1u8)).on_context::<String>();

        assert_eq!(provider.description(), "provider { Person }");
        assert_eq!(factory.description(), "factory { String -> Person }");
        assert_eq!(scoped.description(), "scoped(ContextScope).singleton { Person }");
        assert_eq!(contexted.description(), "contexted<String>().provider { u8 }");
        assert!(describe(&factory, true).contains("alloc::string::String"));
    }

    #[test]
    fn copies_get_their_own_slot() {
        let singleton = SingletonBinding::new(|_| Ok(Person("x".into())));
        let copy = singleton.copy().unwrap();

        assert_eq!(copy.factory_name(), "singleton");
        assert_ne!(singleton.registry_key(), SingletonBinding::<Person>::new(|_| Ok(Person("y".into()))).registry_key());
        assert!(ProviderBinding::new(|_| Ok(1u8)).copy().is_none());
    }

    #[test]
    fn eager_singletons_are_eager() {
        let eager = EagerSingletonBinding::new(|_| Ok(1u8));
        assert!(eager.is_eager());
        assert!(eager.copy().unwrap().is_eager());
        assert!(!SingletonBinding::new(|_| Ok(1u8)).is_eager());
    }
}
