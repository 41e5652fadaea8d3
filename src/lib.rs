//! # Diorama
//!
//! > Typed dependency resolution container: bindings keyed by context, argument, type and tag,
//! > scoped singletons and multitons, context translation and override chains.
//!
//! ## Features
//! * Provider, factory, instance, singleton, multiton and eager singleton bindings
//! * Scopes with strong, weak and thread-local references
//! * Context translators and context finders
//! * Explicit, silent or forbidden overrides with access to overridden bindings
//! * Modules, container extension with binding copies
//! * Set and map multi-bindings
//! * Dependency loop detection
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use diorama::{ContainerBuilder, Module};
//!
//! struct Config { url: String }
//! struct Client { config: Arc<Config> }
//!
//! let network = Module::new("network", |builder| {
//!     builder.bind_singleton(None, |r| Ok(Client { config: r.instance(None)? }))
//! });
//!
//! let mut builder = ContainerBuilder::new();
//! builder.bind_instance(None, Config { url: "https://example.org".into() }).unwrap();
//! builder.import(&network, false).unwrap();
//!
//! let container = builder.build().unwrap();
//! let client = container.instance::<Client>(None).unwrap();
//!
//! assert_eq!(client.config.url, "https://example.org");
//! assert!(Arc::ptr_eq(&client, &container.instance::<Client>(None).unwrap()));
//! ```

pub use crate::{
    config::DiConfig,
    container::{
        Container, ContainerBuilder, CopyMode, ExternalSource, FromResolver, GenericFactory, LateInitContainer,
        Lazy, LazyContainer, Module, Resolver,
    },
    context::{Context, ContextTranslator},
    error::Error,
    factory::{AnyFactory, Factory, Provider},
    inject::Inject,
    key::{Key, SearchSpecs, Tag},
};

pub mod binding;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod factory;
pub mod inject;
pub mod key;
pub mod scope;
pub mod types;
