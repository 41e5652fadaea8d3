//! Scopes: where scoped bindings keep the values they create

use crate::{
    context::Context,
    error::Error,
    types::{ArcService, TypeToken},
};
use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    marker::PhantomData,
    sync::{Arc, Mutex, Weak},
};

pub use self::{
    reference::RefKind,
    registry::{
        Creation, Disposer, RegistryKey, ScopeRegistry, SingleItemScopeRegistry, StandardScopeRegistry,
    },
};

pub(crate) use self::registry::{lock, next_owner_id};

pub mod reference;
pub mod registry;

/// A value that must be released when the scope holding it lets it go
pub trait Closeable: Send + Sync + 'static {
    /// Releases the value; called exactly once per stored value
    fn close(&self);
}

/// A [`Disposer`] calling [`Closeable::close`] on values of type `T`
pub fn closer<T: Closeable>() -> Disposer {
    Arc::new(|value: &ArcService| {
        if let Some(value) = value.downcast_ref::<T>() {
            value.close();
        }
    })
}

/// Maps a context to the registry holding the values created for it
pub trait Scope: Send + Sync + 'static {
    /// Context type the scope expects; [`TypeToken::any`] if it ignores the context
    fn context_type(&self) -> TypeToken;

    /// The registry for a given context
    fn registry(&self, context: &Context) -> Result<Arc<dyn ScopeRegistry>, Error>;

    /// Human readable name used in binding descriptions
    fn name(&self) -> String {
        let name = std::any::type_name::<Self>();
        let base = name.split('<').next().unwrap_or(name);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }
}

/// Whether a scope creates multi-item or single-item registries
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// [`StandardScopeRegistry`]
    #[default]
    Standard,
    /// [`SingleItemScopeRegistry`]
    SingleItem,
}

impl RegistryKind {
    #[inline]
    fn create(self) -> Arc<dyn ScopeRegistry> {
        match self {
            RegistryKind::Standard => Arc::new(StandardScopeRegistry::new()),
            RegistryKind::SingleItem => Arc::new(SingleItemScopeRegistry::new()),
        }
    }
}

/// A scope with one registry that lives as long as the scope, regardless of context
pub struct UnboundedScope {
    registry: Arc<dyn ScopeRegistry>,
}

impl Default for UnboundedScope {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for UnboundedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnboundedScope")
            .field("len", &self.registry.len())
            .finish()
    }
}

impl UnboundedScope {
    /// Creates a scope backed by a [`StandardScopeRegistry`]
    #[inline]
    pub fn new() -> Self {
        Self::with_registry(RegistryKind::Standard)
    }

    /// Creates a scope backed by the given registry kind
    #[inline]
    pub fn with_registry(kind: RegistryKind) -> Self {
        Self { registry: kind.create() }
    }

    /// Disposes and forgets every value of the scope
    #[inline]
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl Scope for UnboundedScope {
    #[inline]
    fn context_type(&self) -> TypeToken {
        TypeToken::any()
    }

    #[inline]
    fn registry(&self, _: &Context) -> Result<Arc<dyn ScopeRegistry>, Error> {
        Ok(self.registry.clone())
    }
}

/// A scope holding one registry per context value, compared by equality
pub struct ContextScope<C> {
    registries: Mutex<HashMap<C, Arc<dyn ScopeRegistry>>>,
    kind: RegistryKind,
}

impl<C: Eq + Hash + Clone + Send + Sync + 'static> Default for ContextScope<C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Debug for ContextScope<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextScope")
            .field("context", &std::any::type_name::<C>())
            .field("registries", &lock(&self.registries).len())
            .finish()
    }
}

impl<C: Eq + Hash + Clone + Send + Sync + 'static> ContextScope<C> {
    /// Creates a scope with [`StandardScopeRegistry`] registries
    #[inline]
    pub fn new() -> Self {
        Self::with_registry(RegistryKind::Standard)
    }

    /// Creates a scope with registries of the given kind
    #[inline]
    pub fn with_registry(kind: RegistryKind) -> Self {
        Self { registries: Mutex::new(HashMap::new()), kind }
    }

    /// Drops the registry of a context, disposing its values
    pub fn remove(&self, context: &C) {
        let removed = lock(&self.registries).remove(context);
        if let Some(registry) = removed {
            registry.clear();
        }
    }

    /// Drops every registry, disposing every value
    pub fn clear(&self) {
        let registries = std::mem::take(&mut *lock(&self.registries));
        for registry in registries.into_values() {
            registry.clear();
        }
    }

    /// Number of live context registries
    #[inline]
    pub fn len(&self) -> usize {
        lock(&self.registries).len()
    }

    /// Returns `true` if no context has a registry
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Eq + Hash + Clone + Send + Sync + 'static> Scope for ContextScope<C> {
    #[inline]
    fn context_type(&self) -> TypeToken {
        TypeToken::of::<C>()
    }

    fn registry(&self, context: &Context) -> Result<Arc<dyn ScopeRegistry>, Error> {
        let context = context.expect::<C>()?;
        let registry = lock(&self.registries)
            .entry(context.clone())
            .or_insert_with(|| self.kind.create())
            .clone();
        Ok(registry)
    }
}

/// A scope holding one registry per shared context allocation, compared by identity.
///
/// Contexts must be passed with [`Context::shared`]. A registry is dropped, and its values
/// disposed, once its context has been dropped everywhere else.
pub struct IdentityScope<C> {
    registries: Mutex<HashMap<usize, (Weak<dyn Any + Send + Sync>, Arc<dyn ScopeRegistry>)>>,
    kind: RegistryKind,
    _context: PhantomData<fn(C)>,
}

impl<C: Send + Sync + 'static> Default for IdentityScope<C> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Debug for IdentityScope<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityScope")
            .field("context", &std::any::type_name::<C>())
            .field("registries", &lock(&self.registries).len())
            .finish()
    }
}

impl<C: Send + Sync + 'static> IdentityScope<C> {
    /// Creates a scope with [`StandardScopeRegistry`] registries
    #[inline]
    pub fn new() -> Self {
        Self::with_registry(RegistryKind::Standard)
    }

    /// Creates a scope with registries of the given kind
    #[inline]
    pub fn with_registry(kind: RegistryKind) -> Self {
        Self {
            registries: Mutex::new(HashMap::new()),
            kind,
            _context: PhantomData,
        }
    }

    /// Drops the registry of a context, disposing its values
    pub fn remove(&self, context: &Arc<C>) {
        let removed = lock(&self.registries).remove(&(Arc::as_ptr(context) as *const () as usize));
        if let Some((_, registry)) = removed {
            registry.clear();
        }
    }

    /// Number of live context registries
    pub fn len(&self) -> usize {
        self.prune();
        lock(&self.registries).len()
    }

    /// Returns `true` if no context has a registry
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disposes the registries of contexts that no longer exist
    pub fn prune(&self) {
        let dead: Vec<_> = {
            let mut registries = lock(&self.registries);
            let keys: Vec<_> = registries
                .iter()
                .filter(|(_, (context, _))| context.strong_count() == 0)
                .map(|(k, _)| *k)
                .collect();
            keys.into_iter().filter_map(|k| registries.remove(&k)).collect()
        };
        for (_, registry) in dead {
            registry.clear();
        }
    }
}

impl<C: Send + Sync + 'static> Scope for IdentityScope<C> {
    #[inline]
    fn context_type(&self) -> TypeToken {
        TypeToken::of::<C>()
    }

    fn registry(&self, context: &Context) -> Result<Arc<dyn ScopeRegistry>, Error> {
        context.expect::<C>()?;
        let value = context
            .value()
            .ok_or_else(|| Error::configuration("Identity scopes require a context value"))?;
        self.prune();

        let address = Arc::as_ptr(value) as *const () as usize;
        let mut registries = lock(&self.registries);
        let (_, registry) = registries
            .entry(address)
            .or_insert_with(|| (Arc::downgrade(value), self.kind.create()));
        Ok(registry.clone())
    }
}

struct RegistryHolder(Arc<dyn ScopeRegistry>);

/// A scope nested in a parent scope: each child context gets its own registry, stored in the
/// registry of the parent context, so clearing the parent clears the children.
pub struct SubScope<C, P> {
    parent: Arc<dyn Scope>,
    parent_context: Arc<dyn Fn(&C) -> P + Send + Sync>,
    id: u64,
    kind: RegistryKind,
}

impl<C, P> Debug for SubScope<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubScope")
            .field("context", &std::any::type_name::<C>())
            .field("parent", &self.parent.name())
            .finish()
    }
}

impl<C, P> SubScope<C, P>
where
    C: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Creates a sub-scope of `parent`; `parent_context` narrows a child context to its parent context
    pub fn new(parent: Arc<dyn Scope>, parent_context: impl Fn(&C) -> P + Send + Sync + 'static) -> Self {
        Self {
            parent,
            parent_context: Arc::new(parent_context),
            id: next_owner_id(),
            kind: RegistryKind::Standard,
        }
    }

    /// Uses registries of the given kind for child contexts
    #[inline]
    pub fn with_registry(mut self, kind: RegistryKind) -> Self {
        self.kind = kind;
        self
    }
}

impl<C, P> Scope for SubScope<C, P>
where
    C: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    #[inline]
    fn context_type(&self) -> TypeToken {
        TypeToken::of::<C>()
    }

    fn registry(&self, context: &Context) -> Result<Arc<dyn ScopeRegistry>, Error> {
        let child = context.expect::<C>()?;
        let parent_context = Context::new((self.parent_context)(child));
        let parent_registry = self.parent.registry(&parent_context)?;

        let kind = self.kind;
        let holder = parent_registry.get_or_create(RegistryKey::with_arg(self.id, child.clone()), Creation {
            kind: RefKind::Strong,
            disposer: Some(Arc::new(|value: &ArcService| {
                if let Some(holder) = value.downcast_ref::<RegistryHolder>() {
                    holder.0.clear();
                }
            })),
            create: &mut || Ok(Arc::new(RegistryHolder(kind.create())) as ArcService),
        })?;

        holder
            .downcast::<RegistryHolder>()
            .map(|holder| holder.0.clone())
            .map_err(|_| Error::ResolveFailed(std::any::type_name::<RegistryHolder>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Resource(Arc<AtomicUsize>);

    impl Closeable for Resource {
        fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn store(registry: &dyn ScopeRegistry, owner: u64, closed: &Arc<AtomicUsize>) -> ArcService {
        let closed = closed.clone();
        registry.get_or_create(RegistryKey::new(owner), Creation {
            kind: RefKind::Strong,
            disposer: Some(closer::<Resource>()),
            create: &mut || Ok(Arc::new(Resource(closed.clone())) as ArcService),
        }).unwrap()
    }

    #[test]
    fn unbounded_scope_ignores_context() {
        let scope = UnboundedScope::new();
        let a = scope.registry(&Context::none()).unwrap();
        let b = scope.registry(&Context::new(1u8)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(scope.name(), "UnboundedScope");
    }

    #[test]
    fn context_scope_separates_by_equality() {
        let closed = Arc::new(AtomicUsize::new(0));
        let scope = ContextScope::<String>::new();

        let a = scope.registry(&Context::new(String::from("a"))).unwrap();
        let a_again = scope.registry(&Context::new(String::from("a"))).unwrap();
        let b = scope.registry(&Context::new(String::from("b"))).unwrap();

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));

        store(a.as_ref(), 1, &closed);
        scope.remove(&String::from("a"));

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(scope.len(), 1);
        assert!(scope.registry(&Context::new(5u8)).is_err());
    }

    #[test]
    fn identity_scope_separates_by_allocation() {
        let closed = Arc::new(AtomicUsize::new(0));
        let scope = IdentityScope::<String>::new();

        let first = Arc::new(String::from("same"));
        let second = Arc::new(String::from("same"));

        let a = scope.registry(&Context::shared(first.clone())).unwrap();
        let b = scope.registry(&Context::shared(second.clone())).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        store(a.as_ref(), 1, &closed);
        drop(a);
        drop(first);
        scope.prune();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn clearing_the_parent_clears_sub_scopes() {
        let closed = Arc::new(AtomicUsize::new(0));
        let parent = Arc::new(ContextScope::<u32>::new());
        let sub = SubScope::new(parent.clone(), |request: &(u32, u32)| request.0);

        let child = sub.registry(&Context::new((1u32, 7u32))).unwrap();
        let same = sub.registry(&Context::new((1u32, 7u32))).unwrap();
        let other = sub.registry(&Context::new((1u32, 8u32))).unwrap();
        assert!(Arc::ptr_eq(&child, &same));
        assert!(!Arc::ptr_eq(&child, &other));

        store(child.as_ref(), 1, &closed);
        parent.clear();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(child.is_empty());
    }
}
