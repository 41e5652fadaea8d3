//! Container builder and frozen container

use crate::{
    binding::{
        Binding, EagerSingletonBinding, FactoryBinding, InstanceBinding, MultiBinding, MultitonBinding,
        ProviderBinding, SingletonBinding,
    },
    config::DiConfig,
    context::{ContextGraph, ContextTranslator},
    error::Error,
    inject::Inject,
    key::{IntoTag, Key, SearchSpecs},
    types::{ExactTypes, TypeOracle, TypeToken},
};
use std::{
    collections::HashSet,
    fmt::{Debug, Formatter},
    hash::Hash,
    ops::Deref,
    sync::Arc,
};

use self::tree::{BindingMap, Entry, Tree};

pub use self::{
    copy::CopyMode,
    external::ExternalSource,
    from_resolver::FromResolver,
    generic_factory::GenericFactory,
    lazy::{LateInitContainer, LazyContainer},
    module::Module,
    resolver::{Lazy, Resolver},
};

pub mod copy;
pub mod external;
pub mod from_resolver;
pub mod generic_factory;
pub mod lazy;
pub mod module;
pub mod resolver;
mod describe;
pub(crate) mod tree;

type ReadyFn = Box<
    dyn FnOnce(&Resolver) -> Result<(), Error>
    + Send
>;

/// Override policy of a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideMode {
    /// Re-binding a key replaces the previous binding unless the binding says otherwise
    AllowSilent,
    /// Re-binding a key requires the binding to be flagged as an override
    AllowExplicit,
    /// Re-binding a key is an error
    Forbid,
}

impl OverrideMode {
    #[inline]
    fn get(allow: bool, silent: bool) -> Self {
        match (allow, silent) {
            (false, _) => OverrideMode::Forbid,
            (true, true) => OverrideMode::AllowSilent,
            (true, false) => OverrideMode::AllowExplicit,
        }
    }

    #[inline]
    fn is_allowed(self) -> bool {
        self != OverrideMode::Forbid
    }

    /// Whether a binding must or must not override; `None` means either is fine
    fn must(self, overrides: Option<bool>) -> Result<Option<bool>, Error> {
        match self {
            OverrideMode::AllowSilent => Ok(overrides),
            OverrideMode::AllowExplicit => Ok(Some(overrides.unwrap_or(false))),
            OverrideMode::Forbid if overrides == Some(true) => {
                Err(Error::overriding("Overriding has been forbidden"))
            }
            OverrideMode::Forbid => Ok(Some(false)),
        }
    }
}

enum ReadyCallback {
    User(ReadyFn),
    Eager(Key),
}

/// Collects bindings, modules and callbacks, then freezes them into a [`Container`].
///
/// # Example
/// ```
/// use diorama::ContainerBuilder;
///
/// struct Database(String);
/// struct Repository(std::sync::Arc<Database>);
///
/// let mut builder = ContainerBuilder::new();
/// builder.bind_singleton(None, |_| Ok(Database("users".into()))).unwrap();
/// builder.bind_provider(None, |r| Ok(Repository(r.instance(None)?))).unwrap();
///
/// let container = builder.build().unwrap();
/// let repository = container.instance::<Repository>(None).unwrap();
/// assert_eq!(repository.0.0, "users");
/// ```
pub struct ContainerBuilder {
    bindings: BindingMap,
    callbacks: Vec<ReadyCallback>,
    translators: Vec<ContextTranslator>,
    external: Vec<Arc<dyn ExternalSource>>,
    imported_modules: HashSet<String>,
    mode: OverrideMode,
    module: Option<Arc<str>>,
    prefix: String,
    config: DiConfig,
    oracle: Arc<dyn TypeOracle>,
}

impl Debug for ContainerBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("bindings", &self.bindings.len())
            .field("callbacks", &self.callbacks.len())
            .field("translators", &self.translators.len())
            .field("external", &self.external.len())
            .field("imported_modules", &self.imported_modules)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Default for ContainerBuilder {
    #[inline]
    fn default() -> Self {
        Self::with_config(DiConfig::default())
    }
}

impl ContainerBuilder {
    /// Creates a new container builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new container builder with the given configuration
    pub fn with_config(config: DiConfig) -> Self {
        Self {
            bindings: BindingMap::new(),
            callbacks: Vec::new(),
            translators: Vec::new(),
            external: Vec::new(),
            imported_modules: HashSet::new(),
            mode: OverrideMode::get(true, config.allow_silent_override()),
            module: None,
            prefix: String::new(),
            config,
            oracle: Arc::new(ExactTypes),
        }
    }

    /// Replaces the type relation used for subtype lookups and "all" resolutions
    #[inline]
    pub fn with_type_oracle(mut self, oracle: impl TypeOracle) -> Self {
        self.oracle = Arc::new(oracle);
        self
    }

    fn check_overrides(&self, key: &Key, overrides: Option<bool>) -> Result<(), Error> {
        let Some(must) = self.mode.must(overrides)? else {
            return Ok(());
        };
        let exists = self.bindings.contains_key(key);
        if must && !exists {
            return Err(Error::overriding(format!(
                "Binding {} must override an existing binding.",
                key.bind_description()
            )));
        }
        if !must && exists {
            return Err(Error::overriding(format!(
                "Binding {} must not override an existing binding.",
                key.bind_description()
            )));
        }
        Ok(())
    }

    #[inline]
    fn check_match(&self, allow_override: bool) -> Result<(), Error> {
        if !self.mode.is_allowed() && allow_override {
            return Err(Error::overriding("Overriding has been forbidden"));
        }
        Ok(())
    }

    /// Registers a binding under its own context, argument and created types.
    ///
    /// `overrides` flags the binding as an override (`Some(true)`), as a new binding
    /// (`Some(false)`) or leaves it to the override policy (`None`).
    #[inline]
    pub fn bind(&mut self, tag: impl IntoTag, overrides: Option<bool>, binding: impl Binding) -> Result<(), Error> {
        self.bind_arc(tag, overrides, Arc::new(binding))
    }

    /// Same as [`ContainerBuilder::bind`] for an already shared binding
    pub fn bind_arc(&mut self, tag: impl IntoTag, overrides: Option<bool>, binding: Arc<dyn Binding>) -> Result<(), Error> {
        let key = Key::new(binding.context_type(), binding.arg_type(), binding.created_type(), tag.into_tag());
        self.register(key, overrides, binding)
    }

    fn register(&mut self, key: Key, overrides: Option<bool>, binding: Arc<dyn Binding>) -> Result<(), Error> {
        if key.created_type().is_unit() {
            return Err(Error::configuration(format!(
                "Binding {} creates the unit type, which is not supported",
                key.bind_description()
            )));
        }
        self.check_overrides(&key, overrides)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("{} with {}", key.bind_description(), binding.description());

        if binding.is_eager() {
            self.callbacks.push(ReadyCallback::Eager(key.clone()));
        }
        let entry = Entry { binding, from_module: self.module.clone() };
        self.bindings.entry(key).or_default().insert(0, entry);
        Ok(())
    }

    /// Binds an instance
    #[inline]
    pub fn bind_instance<T: Send + Sync + 'static>(&mut self, tag: impl IntoTag, value: T) -> Result<(), Error> {
        self.bind(tag, None, InstanceBinding::new(value))
    }

    /// Binds a provider creating a new `T` on every request
    #[inline]
    pub fn bind_provider<T: Send + Sync + 'static>(
        &mut self,
        tag: impl IntoTag,
        creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.bind(tag, None, ProviderBinding::new(creator))
    }

    /// Binds a factory creating a new `T` from an `A` on every request
    #[inline]
    pub fn bind_factory<A, T>(
        &mut self,
        tag: impl IntoTag,
        creator: impl Fn(&Resolver, A) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error>
    where
        A: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.bind(tag, None, FactoryBinding::new(creator))
    }

    /// Binds a singleton created on first request
    #[inline]
    pub fn bind_singleton<T: Send + Sync + 'static>(
        &mut self,
        tag: impl IntoTag,
        creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.bind(tag, None, SingletonBinding::new(creator))
    }

    /// Binds a singleton created when the container is built
    #[inline]
    pub fn bind_eager_singleton<T: Send + Sync + 'static>(
        &mut self,
        tag: impl IntoTag,
        creator: impl Fn(&Resolver) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.bind(tag, None, EagerSingletonBinding::new(creator))
    }

    /// Binds a multiton creating one `T` per distinct `A`
    #[inline]
    pub fn bind_multiton<A, T>(
        &mut self,
        tag: impl IntoTag,
        creator: impl Fn(&Resolver, A) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error>
    where
        A: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.bind(tag, None, MultitonBinding::new(creator))
    }

    /// Binds a provider creating `T` through its [`Inject`] implementation
    #[inline]
    pub fn bind_injected<T: Inject>(&mut self, tag: impl IntoTag) -> Result<(), Error> {
        self.bind(tag, None, ProviderBinding::new(T::inject))
    }

    /// Binds a singleton created through its [`Inject`] implementation
    #[inline]
    pub fn bind_injected_singleton<T: Inject>(&mut self, tag: impl IntoTag) -> Result<(), Error> {
        self.bind(tag, None, SingletonBinding::new(T::inject))
    }

    /// Imports the bindings of a module.
    ///
    /// A module is identified by its name under the current prefix, and a module with a
    /// non-empty identity can be imported only once. `allow_override` lets its bindings
    /// override existing ones.
    pub fn import(&mut self, module: &Module, allow_override: bool) -> Result<(), Error> {
        let name = format!("{}{}", self.prefix, module.name());
        let named = !name.is_empty();
        if named && self.imported_modules.contains(&name) {
            return Err(Error::configuration(format!("Module \"{name}\" has already been imported!")));
        }
        self.check_match(allow_override)?;
        if named {
            self.imported_modules.insert(name.clone());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("importing module \"{name}\"");

        let prefix = format!("{}{}", self.prefix, module.prefix());
        let saved_prefix = std::mem::replace(&mut self.prefix, prefix);
        let saved_module = std::mem::replace(&mut self.module, named.then(|| Arc::from(name)));
        let saved_mode = std::mem::replace(
            &mut self.mode,
            OverrideMode::get(allow_override, module.allow_silent_override()),
        );

        let result = module.init(self);

        self.prefix = saved_prefix;
        self.module = saved_module;
        self.mode = saved_mode;
        result
    }

    /// Imports every module in order
    pub fn import_all<'a>(&mut self, modules: impl IntoIterator<Item = &'a Module>, allow_override: bool) -> Result<(), Error> {
        modules
            .into_iter()
            .try_for_each(|module| self.import(module, allow_override))
    }

    /// Imports a named module unless it has already been imported
    pub fn import_once(&mut self, module: &Module, allow_override: bool) -> Result<(), Error> {
        if module.name().is_empty() {
            return Err(Error::configuration("import_once must be given a named module."));
        }
        let name = format!("{}{}", self.prefix, module.name());
        if self.imported_modules.contains(&name) {
            return Ok(());
        }
        self.import(module, allow_override)
    }

    /// Returns `true` if a module of this name has been imported
    #[inline]
    pub fn is_imported(&self, name: &str) -> bool {
        self.imported_modules.contains(name)
    }

    /// Registers a callback run once the container is built, after the callbacks registered before it
    #[inline]
    pub fn on_ready(&mut self, callback: impl FnOnce(&Resolver) -> Result<(), Error> + Send + 'static) {
        self.callbacks.push(ReadyCallback::User(Box::new(callback)));
    }

    /// Registers a translation from contexts of one type to contexts of another
    #[inline]
    pub fn register_context_translator(&mut self, translator: ContextTranslator) {
        self.translators.push(translator);
    }

    /// Registers a function providing a `C` context to resolutions made without a suitable one
    #[inline]
    pub fn register_context_finder<C: Send + Sync + 'static>(&mut self, find: impl Fn() -> C + Send + Sync + 'static) {
        self.translators.push(ContextTranslator::finder(find));
    }

    /// Adds a source consulted when no binding matches a key
    #[inline]
    pub fn add_external_source(&mut self, source: impl ExternalSource) {
        self.external.push(Arc::new(source));
    }

    /// Binds an empty set of `T`, resolved as `Vec<Arc<T>>`
    #[inline]
    pub fn bind_set<T: Send + Sync + 'static>(&mut self, tag: impl IntoTag) -> Result<(), Error> {
        self.bind(tag, None, MultiBinding::set::<T>())
    }

    /// Binds an empty set of `T` created from `A` arguments, resolved as `Vec<Arc<T>>`
    #[inline]
    pub fn bind_arg_set<A: 'static, T: Send + Sync + 'static>(&mut self, tag: impl IntoTag) -> Result<(), Error> {
        self.bind(tag, None, MultiBinding::arg_set::<A, T>())
    }

    /// Binds an empty map of `K` to `V`, resolved as `IndexMap<K, V>`
    #[inline]
    pub fn bind_map<K, V>(&mut self, tag: impl IntoTag) -> Result<(), Error>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.bind(tag, None, MultiBinding::map::<K, V>())
    }

    /// Adds an element to the set of `T` bound with the same tag
    #[inline]
    pub fn add_to_set<T: Send + Sync + 'static>(&mut self, tag: impl IntoTag, element: impl Binding) -> Result<(), Error> {
        self.add_element(Key::of::<Vec<Arc<T>>>(tag), Arc::new(element))
    }

    /// Adds an element to the set of `T` created from `A` arguments bound with the same tag
    #[inline]
    pub fn add_to_arg_set<A: 'static, T: Send + Sync + 'static>(
        &mut self,
        tag: impl IntoTag,
        element: impl Binding,
    ) -> Result<(), Error> {
        self.add_element(Key::with_arg::<A, Vec<Arc<T>>>(tag), Arc::new(element))
    }

    /// Adds an entry, a binding creating `(K, V)`, to the map bound with the same tag
    #[inline]
    pub fn add_to_map<K, V>(&mut self, tag: impl IntoTag, entry: impl Binding) -> Result<(), Error>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.add_element(Key::of::<indexmap::IndexMap<K, V>>(tag), Arc::new(entry))
    }

    fn add_element(&mut self, key: Key, element: Arc<dyn Binding>) -> Result<(), Error> {
        let Some(active) = self.bindings.get_mut(&key).and_then(|stack| stack.first_mut()) else {
            return Err(Error::configuration(format!("No set binding to {}", key.bind_description())));
        };
        let Some(multi) = active.binding.as_multi() else {
            return Err(Error::configuration(format!(
                "{} is associated to a {} while it should be associated with a set or map binding",
                key.bind_description(),
                active.binding.factory_name()
            )));
        };
        active.binding = Arc::new(multi.with_element(element)?);
        Ok(())
    }

    /// Brings the bindings of `container` into this builder.
    ///
    /// Bindings selected by `copy` get a fresh copy that holds its own values; the others
    /// are shared with `container`. Context translators and external sources are carried over,
    /// and modules imported by `container` count as imported here.
    pub fn extend(&mut self, container: &Container, allow_override: bool, copy: &CopyMode) -> Result<(), Error> {
        self.check_match(allow_override)?;

        let tree = container.resolver.tree();
        let copied = copy.keys(tree.bindings())?;
        for (key, stack) in tree.bindings() {
            if !allow_override {
                self.check_overrides(key, None)?;
            }
            let stack = if copied.contains(key) {
                let mut copies = stack.clone();
                for entry in copies.iter_mut() {
                    if let Some(copy) = entry.binding.copy() {
                        entry.binding = copy;
                    }
                }
                if copies.first().is_some_and(|e| e.binding.is_eager()) {
                    self.callbacks.push(ReadyCallback::Eager(key.clone()));
                }
                copies
            } else {
                stack.clone()
            };
            self.imported_modules
                .extend(stack.iter().filter_map(|e| e.from_module.as_deref().map(String::from)));
            self.bindings.insert(key.clone(), stack);
        }

        self.translators.extend(tree.graph().translators().iter().cloned());
        self.external.extend(tree.external_sources().iter().cloned());

        #[cfg(feature = "tracing")]
        tracing::debug!("extended a container of {} bindings, {} copied", tree.bindings().len(), copied.len());

        Ok(())
    }

    /// Freezes the bindings and runs the ready callbacks in registration order
    pub fn build(self) -> Result<Container, Error> {
        let Self { bindings, callbacks, translators, external, oracle, config, .. } = self;
        let tree = Tree::new(bindings, ContextGraph::new(translators), external, oracle, config);
        let container = Container { resolver: Resolver::new(Arc::new(tree)) };

        #[cfg(feature = "tracing")]
        tracing::debug!("container built with {} bindings", container.len());

        for callback in callbacks {
            match callback {
                ReadyCallback::User(callback) => callback(&container.resolver)?,
                ReadyCallback::Eager(key) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("creating eager {}", key.bind_description());
                    container.resolver.any_factory(&key, 0)?.call_unit()?;
                }
            }
        }
        Ok(container)
    }
}

/// A frozen set of bindings, resolved through the [`Resolver`] it dereferences to
#[derive(Clone)]
pub struct Container {
    resolver: Resolver,
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.len())
            .finish()
    }
}

impl Deref for Container {
    type Target = Resolver;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.resolver
    }
}

impl Container {
    /// Creates a new container builder
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// The root resolver
    #[inline]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Number of bound keys
    #[inline]
    pub fn len(&self) -> usize {
        self.resolver.tree().bindings().len()
    }

    /// Returns `true` if nothing is bound
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every bound key, in registration order
    pub fn keys(&self) -> Vec<Key> {
        self.resolver.tree().bindings().keys().cloned().collect()
    }

    /// Bindings matching a partial key, active binding first
    #[inline]
    pub fn find(&self, specs: &SearchSpecs) -> Vec<(Key, Vec<Arc<dyn Binding>>)> {
        self.resolver.tree().find_specs(specs)
    }

    /// Keys of the bindings creating values of exactly type `T`, any tag
    pub fn keys_of<T: ?Sized + 'static>(&self) -> Vec<Key> {
        let ty = TypeToken::of::<T>();
        self.resolver
            .tree()
            .bindings()
            .keys()
            .filter(|key| key.created_type() == ty)
            .cloned()
            .collect()
    }

    /// The binding table, one line per key
    #[inline]
    pub fn description(&self, with_overrides: bool) -> String {
        describe::describe_bindings(self.resolver.tree().bindings().iter(), false, with_overrides, 0)
    }

    /// Same as [`Container::description`] with fully qualified type names
    #[inline]
    pub fn full_description(&self, with_overrides: bool) -> String {
        describe::describe_bindings(self.resolver.tree().bindings().iter(), true, with_overrides, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_resolves_override_modes() {
        assert_eq!(OverrideMode::get(false, true), OverrideMode::Forbid);
        assert_eq!(OverrideMode::get(true, true), OverrideMode::AllowSilent);
        assert_eq!(OverrideMode::get(true, false), OverrideMode::AllowExplicit);
    }

    #[test]
    fn it_computes_override_requirements() {
        assert_eq!(OverrideMode::AllowSilent.must(None).unwrap(), None);
        assert_eq!(OverrideMode::AllowSilent.must(Some(true)).unwrap(), Some(true));
        assert_eq!(OverrideMode::AllowExplicit.must(None).unwrap(), Some(false));
        assert_eq!(OverrideMode::AllowExplicit.must(Some(true)).unwrap(), Some(true));
        assert_eq!(OverrideMode::Forbid.must(None).unwrap(), Some(false));
        assert!(matches!(OverrideMode::Forbid.must(Some(true)), Err(Error::Overriding(_))));
    }

    #[test]
    fn it_rejects_unit_bindings() {
        let mut builder = ContainerBuilder::new();

        let err = builder.bind_instance(None, ()).unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn it_stacks_overrides() {
        let mut builder = ContainerBuilder::new();
        builder.bind_instance(None, 1u8).unwrap();
        builder.bind(None, Some(true), InstanceBinding::new(2u8)).unwrap();

        let container = builder.build().unwrap();

        assert_eq!(*container.instance::<u8>(None).unwrap(), 2);
        assert_eq!(container.find(&SearchSpecs::new().with_type::<u8>())[0].1.len(), 2);
    }

    #[test]
    fn it_describes_the_binding_table() {
        let module = Module::new("numbers", |builder| builder.bind_instance("answer", 42u32));
        let mut builder = ContainerBuilder::new();
        builder.bind_singleton(None, |_| Ok(String::from("x"))).unwrap();
        builder.import(&module, false).unwrap();

        let description = builder.build().unwrap().description(false);

        assert_eq!(
            description,
            "bind<String>() { singleton { String } }\n\
             module numbers {\n    bind<u32>(tag = \"answer\") { instance { u32 } }\n}\n"
        );
    }
}
