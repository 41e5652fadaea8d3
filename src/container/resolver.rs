//! Resolution of keys into factories and values

use super::tree::{Found, Tree};
use crate::{
    context::Context,
    error::{DependencyLoop, Error, LoopStep},
    factory::{downcast_value, AnyFactory, Factory, Provider},
    key::{IntoTag, Key},
    types::{ArcService, TypeToken},
};
use std::{
    fmt::{Debug, Formatter},
    sync::{Arc, OnceLock},
};

/// A key being resolved, linked to the resolution that requested it
struct Node {
    key: Key,
    override_level: usize,
    parent: Option<Arc<Node>>,
}

impl Node {
    /// Fails if `key` at `override_level` is already being resolved up the chain
    fn check(node: Option<&Arc<Node>>, key: &Key, override_level: usize, qualified: bool) -> Result<(), Error> {
        let is_loop = std::iter::successors(node.map(|n| &**n), |n| n.parent.as_deref())
            .any(|n| n.key == *key && n.override_level == override_level);
        if !is_loop {
            return Ok(());
        }

        let mut steps = Vec::new();
        for n in std::iter::successors(node.map(|n| &**n), |n| n.parent.as_deref()) {
            steps.push(LoopStep { key: n.key.clone(), override_level: n.override_level });
            if n.key == *key && n.override_level == override_level {
                break;
            }
        }
        steps.reverse();
        steps.push(LoopStep { key: key.clone(), override_level });

        #[cfg(feature = "tracing")]
        tracing::warn!("dependency loop detected on {}", key.bind_description());

        Err(Error::DependencyLoop(DependencyLoop::new(steps, qualified)))
    }
}

/// The binding a resolver is positioned on
struct Frame {
    key: Key,
    override_level: usize,
    in_set: bool,
}

/// Resolves keys into factories and values.
///
/// A resolver carries the context it resolves on, an optional receiver and, when it is handed to
/// a binding, the chain of keys being resolved (for loop detection) and the position of the binding
/// in its override chain (for overridden access).
#[derive(Clone)]
pub struct Resolver {
    tree: Arc<Tree>,
    context: Context,
    receiver: Option<ArcService>,
    node: Option<Arc<Node>>,
    frame: Option<Arc<Frame>>,
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("context", &self.context)
            .field("bindings", &self.tree.bindings().len())
            .finish()
    }
}

impl Resolver {
    #[inline]
    pub(crate) fn new(tree: Arc<Tree>) -> Self {
        Self {
            tree,
            context: Context::none(),
            receiver: None,
            node: None,
            frame: None,
        }
    }

    #[inline]
    pub(crate) fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// The context this resolver resolves on
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The context value if it is a `C`
    #[inline]
    pub fn context_value<C: 'static>(&self) -> Option<&C> {
        self.context.downcast_ref::<C>()
    }

    /// The receiver if it is a `R`
    #[inline]
    pub fn receiver<R: 'static>(&self) -> Option<&R> {
        self.receiver.as_ref()?.downcast_ref::<R>()
    }

    /// A resolver resolving on the given context value
    #[inline]
    pub fn on<C: Send + Sync + 'static>(&self, context: C) -> Self {
        self.on_context(Context::new(context))
    }

    /// A resolver resolving on a shared context value; identity scopes key on the allocation
    #[inline]
    pub fn on_shared<C: Send + Sync + 'static>(&self, context: Arc<C>) -> Self {
        self.on_context(Context::shared(context))
    }

    /// A resolver resolving on the given context
    #[inline]
    pub fn on_context(&self, context: Context) -> Self {
        Self { context, ..self.clone() }
    }

    /// A resolver passing `receiver` to the bindings it calls
    #[inline]
    pub fn with_receiver<R: Send + Sync + 'static>(&self, receiver: R) -> Self {
        Self { receiver: Some(Arc::new(receiver)), ..self.clone() }
    }

    /// A resolver for the elements of a set or map binding, which have no override chain
    pub(crate) fn for_set_elements(&self) -> Self {
        let frame = self.frame.as_ref().map(|frame| {
            Arc::new(Frame {
                key: frame.key.clone(),
                override_level: frame.override_level,
                in_set: true,
            })
        });
        Self { frame, ..self.clone() }
    }

    #[inline]
    fn qualified(&self) -> bool {
        self.tree.config().full_description_on_error()
    }

    #[inline]
    fn key<A: ?Sized + 'static, T: ?Sized + 'static>(&self, tag: impl IntoTag) -> Key {
        Key::new(self.context.type_token(), TypeToken::of::<A>(), TypeToken::of::<T>(), tag.into_tag())
    }

    /// The factory serving `key`; `override_level` `n > 0` selects the n-th overridden binding
    pub fn any_factory(&self, key: &Key, override_level: usize) -> Result<AnyFactory, Error> {
        self.any_factory_or_none(key, override_level)?
            .ok_or_else(|| self.tree.not_found(key))
    }

    /// Same as [`Resolver::any_factory`] but returns `None` instead of failing when nothing serves `key`
    pub fn any_factory_or_none(&self, key: &Key, override_level: usize) -> Result<Option<AnyFactory>, Error> {
        if let Some(found) = self.tree.find(key, override_level) {
            return self.build(key, override_level, found).map(Some);
        }
        if override_level == 0 && !self.tree.external_sources().is_empty() {
            Node::check(self.node.as_ref(), key, 0, self.qualified())?;
            let resolver = self.child(key, 0, self.context.clone(), None);
            for source in self.tree.external_sources() {
                if let Some(factory) = source.get_factory(&resolver, key)? {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("{} served by an external source", key.bind_description());
                    return Ok(Some(factory));
                }
            }
        }
        Ok(None)
    }

    /// Factories of every binding whose created type is assignable to the one of `key`,
    /// regardless of tag, upcast to that type
    pub fn all_any_factories(&self, key: &Key) -> Result<Vec<AnyFactory>, Error> {
        self.tree
            .all_matching(key, self.context.type_token())
            .into_iter()
            .map(|found| {
                let real = found.key.clone();
                let factory = self.build(&real, 0, found)?;
                if real.created_type() == key.created_type() {
                    return Ok(factory);
                }
                let oracle = self.tree.oracle().clone();
                let (from, to) = (real.created_type(), key.created_type());
                Ok(factory.map(move |value| {
                    oracle
                        .upcast(value, &from, &to)
                        .ok_or(Error::ResolveFailed(to.qualified_name()))
                }))
            })
            .collect()
    }

    fn build(&self, requested: &Key, override_level: usize, found: Found<'_>) -> Result<AnyFactory, Error> {
        Node::check(self.node.as_ref(), requested, override_level, self.qualified())?;
        let context = match &found.path {
            Some(path) => path.apply(&self.context)?,
            None => self.context.clone(),
        };
        let frame = Frame {
            key: found.key,
            override_level,
            in_set: false,
        };
        let resolver = self.child(requested, override_level, context, Some(frame));
        found.entry.binding.get_factory(requested, &resolver)
    }

    /// A resolver for whatever serves `requested`, with `requested` pushed onto the loop chain
    fn child(&self, requested: &Key, override_level: usize, context: Context, frame: Option<Frame>) -> Self {
        Self {
            tree: self.tree.clone(),
            context,
            receiver: self.receiver.clone(),
            node: Some(Arc::new(Node {
                key: requested.clone(),
                override_level,
                parent: self.node.clone(),
            })),
            frame: frame.map(Arc::new),
        }
    }

    /// A factory of `T` values taking `A` arguments
    #[inline]
    pub fn factory<A, T>(&self, tag: impl IntoTag) -> Result<Factory<A, T>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.any_factory(&self.key::<A, T>(tag), 0).map(Factory::new)
    }

    /// Same as [`Resolver::factory`] but returns `None` when nothing is bound
    #[inline]
    pub fn factory_or_none<A, T>(&self, tag: impl IntoTag) -> Result<Option<Factory<A, T>>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.any_factory_or_none(&self.key::<A, T>(tag), 0)
            .map(|f| f.map(Factory::new))
    }

    /// A provider of `T` values
    #[inline]
    pub fn provider<T: Send + Sync + 'static>(&self, tag: impl IntoTag) -> Result<Provider<T>, Error> {
        self.any_factory(&self.key::<(), T>(tag), 0).map(Provider::new)
    }

    /// Same as [`Resolver::provider`] but returns `None` when nothing is bound
    #[inline]
    pub fn provider_or_none<T: Send + Sync + 'static>(&self, tag: impl IntoTag) -> Result<Option<Provider<T>>, Error> {
        self.any_factory_or_none(&self.key::<(), T>(tag), 0)
            .map(|f| f.map(Provider::new))
    }

    /// Resolves a `T` value now
    #[inline]
    pub fn instance<T: Send + Sync + 'static>(&self, tag: impl IntoTag) -> Result<Arc<T>, Error> {
        self.provider::<T>(tag)?.get()
    }

    /// Same as [`Resolver::instance`] but returns `None` when nothing is bound
    #[inline]
    pub fn instance_or_none<T: Send + Sync + 'static>(&self, tag: impl IntoTag) -> Result<Option<Arc<T>>, Error> {
        self.provider_or_none::<T>(tag)?
            .map(|p| p.get())
            .transpose()
    }

    /// Resolves a `T` value for an `A` argument now
    #[inline]
    pub fn instance_with<A, T>(&self, tag: impl IntoTag, arg: A) -> Result<Arc<T>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.factory::<A, T>(tag)?.call(arg)
    }

    /// Same as [`Resolver::instance_with`] but returns `None` when nothing is bound
    #[inline]
    pub fn instance_with_or_none<A, T>(&self, tag: impl IntoTag, arg: A) -> Result<Option<Arc<T>>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.factory_or_none::<A, T>(tag)?
            .map(|f| f.call(arg))
            .transpose()
    }

    /// A handle resolving a `T` value on first use
    #[inline]
    pub fn lazy<T: Send + Sync + 'static>(&self, tag: impl IntoTag) -> Lazy<T> {
        Lazy {
            resolver: self.clone(),
            key: self.key::<(), T>(tag),
            value: OnceLock::new(),
        }
    }

    /// Factories of every binding creating values usable as `T` from `A` arguments, any tag
    pub fn all_factories<A, T>(&self) -> Result<Vec<Factory<A, T>>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.all_any_factories(&self.key::<A, T>(None))
            .map(|all| all.into_iter().map(Factory::new).collect())
    }

    /// Providers of every binding creating values usable as `T`, any tag
    pub fn all_providers<T: Send + Sync + 'static>(&self) -> Result<Vec<Provider<T>>, Error> {
        self.all_any_factories(&self.key::<(), T>(None))
            .map(|all| all.into_iter().map(Provider::new).collect())
    }

    /// Values of every binding creating values usable as `T`, any tag
    pub fn all_instances<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, Error> {
        self.all_providers::<T>()?
            .iter()
            .map(Provider::get)
            .collect()
    }

    fn overridden(&self) -> Result<(Key, usize), Error> {
        let frame = self.frame.as_ref().ok_or_else(|| {
            Error::configuration("Overridden bindings can only be accessed from within a binding")
        })?;
        if frame.in_set {
            return Err(Error::configuration("Set and map element bindings cannot access overridden bindings"));
        }
        Ok((frame.key.clone(), frame.override_level + 1))
    }

    /// The factory of the binding the current one overrides
    pub fn overridden_factory<A, T>(&self) -> Result<Factory<A, T>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let (key, level) = self.overridden()?;
        self.any_factory(&key, level).map(Factory::new)
    }

    /// Same as [`Resolver::overridden_factory`] but returns `None` if nothing is overridden
    pub fn overridden_factory_or_none<A, T>(&self) -> Result<Option<Factory<A, T>>, Error>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let (key, level) = self.overridden()?;
        self.any_factory_or_none(&key, level)
            .map(|f| f.map(Factory::new))
    }

    /// The provider of the binding the current one overrides
    pub fn overridden_provider<T: Send + Sync + 'static>(&self) -> Result<Provider<T>, Error> {
        let (key, level) = self.overridden()?;
        self.any_factory(&key, level).map(Provider::new)
    }

    /// Same as [`Resolver::overridden_provider`] but returns `None` if nothing is overridden
    pub fn overridden_provider_or_none<T: Send + Sync + 'static>(&self) -> Result<Option<Provider<T>>, Error> {
        let (key, level) = self.overridden()?;
        self.any_factory_or_none(&key, level)
            .map(|f| f.map(Provider::new))
    }

    /// A value of the binding the current one overrides
    #[inline]
    pub fn overridden_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.overridden_provider::<T>()?.get()
    }

    /// Same as [`Resolver::overridden_instance`] but returns `None` if nothing is overridden
    #[inline]
    pub fn overridden_instance_or_none<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, Error> {
        self.overridden_provider_or_none::<T>()?
            .map(|p| p.get())
            .transpose()
    }
}

/// A value resolved on first use, then kept
pub struct Lazy<T> {
    resolver: Resolver,
    key: Key,
    value: OnceLock<Arc<T>>,
}

impl<T> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lazy")
            .field("key", &self.key)
            .field("initialized", &self.value.get().is_some())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Lazy<T> {
    /// Resolves the value on first call, returns the same value afterwards
    pub fn get(&self) -> Result<Arc<T>, Error> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let value = self
            .resolver
            .any_factory(&self.key, 0)?
            .call_unit()
            .and_then(downcast_value::<T>)?;
        Ok(self.value.get_or_init(|| value).clone())
    }

    /// Returns `true` once the value has been resolved
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }
}
