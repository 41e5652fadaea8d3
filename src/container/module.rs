//! Reusable groups of bindings

use super::ContainerBuilder;
use crate::error::Error;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

type ModuleInit = Arc<
    dyn Fn(&mut ContainerBuilder) -> Result<(), Error>
    + Send
    + Sync
>;

/// A named, reusable configuration block that can be imported into builders.
///
/// # Example
/// ```
/// use diorama::{ContainerBuilder, Module};
///
/// let storage = Module::new("storage", |builder| {
///     builder.bind_instance(None, String::from("postgres://localhost"))
/// });
///
/// let mut builder = ContainerBuilder::new();
/// builder.import(&storage, false).unwrap();
///
/// let container = builder.build().unwrap();
/// assert_eq!(*container.instance::<String>(None).unwrap(), "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Module {
    name: String,
    prefix: String,
    allow_silent_override: bool,
    init: ModuleInit,
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("allow_silent_override", &self.allow_silent_override)
            .finish()
    }
}

impl Module {
    /// Creates a named module
    #[inline]
    pub fn new(
        name: impl Into<String>,
        init: impl Fn(&mut ContainerBuilder) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            allow_silent_override: false,
            init: Arc::new(init),
        }
    }

    /// Creates a module without name; it can be imported any number of times
    #[inline]
    pub fn anonymous(init: impl Fn(&mut ContainerBuilder) -> Result<(), Error> + Send + Sync + 'static) -> Self {
        Self::new("", init)
    }

    /// Prefixes the names of the modules this module imports
    #[inline]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Lets this module's bindings replace existing ones without being flagged as overrides
    #[inline]
    pub fn with_silent_override(mut self) -> Self {
        self.allow_silent_override = true;
        self
    }

    /// The module name, empty for anonymous modules
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub(crate) fn allow_silent_override(&self) -> bool {
        self.allow_silent_override
    }

    #[inline]
    pub(crate) fn init(&self, builder: &mut ContainerBuilder) -> Result<(), Error> {
        (self.init)(builder)
    }
}
