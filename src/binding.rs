//! Bindings: recipes that create values for keys

use crate::{
    container::Resolver,
    error::Error,
    factory::AnyFactory,
    key::Key,
    scope::Scope,
    types::TypeToken,
};
use std::sync::Arc;

pub use self::{
    multi::MultiBinding,
    standard::{
        EagerSingletonBinding, FactoryBinding, InstanceBinding, MultitonBinding, ProviderBinding, SingletonBinding,
    },
    subtypes::SubTypesBinding,
};

pub mod multi;
pub mod standard;
pub mod subtypes;

/// A creator function taking no argument
pub(crate) type Creator<T> = Arc<
    dyn Fn(&Resolver) -> Result<T, Error>
    + Send
    + Sync
>;

/// A creator function taking an argument
pub(crate) type ArgCreator<A, T> = Arc<
    dyn Fn(&Resolver, A) -> Result<T, Error>
    + Send
    + Sync
>;

/// A named recipe producing values for a key.
///
/// The [`Resolver`] handed to [`Binding::get_factory`] is already positioned on the binding:
/// its context is the binding's context, dependency loops are tracked through it and it grants
/// access to the overridden bindings of the same key.
pub trait Binding: Send + Sync + 'static {
    /// Kind of binding: `singleton`, `provider`, `factory`...
    fn factory_name(&self) -> &'static str;

    /// Context type the binding is restricted to
    fn context_type(&self) -> TypeToken {
        TypeToken::any()
    }

    /// Argument type the factory takes
    fn arg_type(&self) -> TypeToken {
        TypeToken::unit()
    }

    /// Type of the created values
    fn created_type(&self) -> TypeToken;

    /// The scope holding created values, if any
    fn scope(&self) -> Option<&dyn Scope> {
        None
    }

    /// Builds a factory for `key`
    fn get_factory(&self, key: &Key, resolver: &Resolver) -> Result<AnyFactory, Error>;

    /// A copy with its own state, used when a container is extended with copying.
    ///
    /// `None` means the binding holds no state and is shared as is.
    fn copy(&self) -> Option<Arc<dyn Binding>> {
        None
    }

    /// Returns `true` if the binding can serve subtypes of its created type
    fn supports_subtypes(&self) -> bool {
        false
    }

    /// Returns `true` if the binding must be forced during the ready phase
    fn is_eager(&self) -> bool {
        false
    }

    /// Downcasts to a multi-binding
    fn as_multi(&self) -> Option<&MultiBinding> {
        None
    }

    /// `singleton { Foo }`
    fn description(&self) -> String {
        describe(self, false)
    }

    /// Same as [`Binding::description`] with fully qualified type names
    fn full_description(&self) -> String {
        describe(self, true)
    }
}

pub(crate) fn describe<B: Binding + ?Sized>(binding: &B, qualified: bool) -> String {
    let mut out = String::new();
    if let Some(scope) = binding.scope() {
        out.push_str(&format!("scoped({}).", scope.name()));
    } else if !binding.context_type().is_any() {
        out.push_str(&format!("contexted<{}>().", binding.context_type().name(qualified)));
    }
    out.push_str(binding.factory_name());
    out.push_str(" { ");
    if !binding.arg_type().is_unit() {
        out.push_str(&format!("{} -> ", binding.arg_type().name(qualified)));
    }
    out.push_str(&binding.created_type().name(qualified));
    out.push_str(" }");
    out
}
