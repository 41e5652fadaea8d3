//! The frozen binding table and key lookup

use super::{describe::describe_bindings, ExternalSource};
use crate::{
    binding::Binding,
    config::DiConfig,
    context::{ContextGraph, TranslationPath},
    error::Error,
    key::{Key, SearchSpecs, Tag},
    types::{TypeOracle, TypeToken},
};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// A binding as registered, with the module it came from
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) binding: Arc<dyn Binding>,
    pub(crate) from_module: Option<Arc<str>>,
}

/// Override chain of a key: index 0 is active, index `n` is the n-th overridden binding
pub(crate) type EntryStack = SmallVec<[Entry; 1]>;

pub(crate) type BindingMap = IndexMap<Key, EntryStack>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct Signature {
    arg: TypeToken,
    created: TypeToken,
    tag: Option<Tag>,
}

impl Signature {
    #[inline]
    fn of(key: &Key) -> Self {
        Self {
            arg: key.arg_type(),
            created: key.created_type(),
            tag: key.tag().cloned(),
        }
    }
}

/// Where a key that has no entry of its own is actually served from
#[derive(Clone)]
struct Redirect {
    key: Key,
    path: Option<TranslationPath>,
}

/// Result of a lookup
pub(crate) struct Found<'a> {
    /// Key of the entry stack that matched
    pub(crate) key: Key,
    pub(crate) entry: &'a Entry,
    /// Context translation to apply before calling the binding
    pub(crate) path: Option<TranslationPath>,
}

pub(crate) struct Tree {
    bindings: BindingMap,
    by_signature: HashMap<Signature, Vec<Key>>,
    subtypes: Vec<Key>,
    graph: ContextGraph,
    external: Vec<Arc<dyn ExternalSource>>,
    oracle: Arc<dyn TypeOracle>,
    config: DiConfig,
    redirects: RwLock<HashMap<Key, Redirect>>,
}

impl Tree {
    pub(crate) fn new(
        bindings: BindingMap,
        graph: ContextGraph,
        external: Vec<Arc<dyn ExternalSource>>,
        oracle: Arc<dyn TypeOracle>,
        config: DiConfig,
    ) -> Self {
        let mut by_signature: HashMap<Signature, Vec<Key>> = HashMap::new();
        let mut subtypes = Vec::new();
        for (key, stack) in &bindings {
            by_signature.entry(Signature::of(key)).or_default().push(key.clone());
            if stack.first().is_some_and(|e| e.binding.supports_subtypes()) {
                subtypes.push(key.clone());
            }
        }
        Self {
            bindings,
            by_signature,
            subtypes,
            graph,
            external,
            oracle,
            config,
            redirects: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub(crate) fn bindings(&self) -> &BindingMap {
        &self.bindings
    }

    #[inline]
    pub(crate) fn graph(&self) -> &ContextGraph {
        &self.graph
    }

    #[inline]
    pub(crate) fn external_sources(&self) -> &[Arc<dyn ExternalSource>] {
        &self.external
    }

    #[inline]
    pub(crate) fn oracle(&self) -> &Arc<dyn TypeOracle> {
        &self.oracle
    }

    #[inline]
    pub(crate) fn config(&self) -> &DiConfig {
        &self.config
    }

    /// Finds the entry serving `key` at `override_level`.
    ///
    /// Lookup order: the exact key, the same key on any context, a context translation to a key
    /// bound on another context, a subtypes binding. Indirect hits are memoised.
    pub(crate) fn find(&self, key: &Key, override_level: usize) -> Option<Found<'_>> {
        if let Some(stack) = self.bindings.get(key) {
            return stack.get(override_level).map(|entry| Found { key: key.clone(), entry, path: None });
        }

        let cached = self
            .redirects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let redirect = match cached {
            Some(redirect) => redirect,
            None => {
                let redirect = self.redirect(key)?;
                self.redirects
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.clone(), redirect.clone());
                redirect
            }
        };

        let entry = self.bindings.get(&redirect.key)?.get(override_level)?;
        Some(Found { key: redirect.key, entry, path: redirect.path })
    }

    fn redirect(&self, key: &Key) -> Option<Redirect> {
        let context = key.context_type();
        if !context.is_any() {
            let any = key.on_context(TypeToken::any());
            if self.bindings.contains_key(&any) {
                return Some(Redirect { key: any, path: None });
            }
        }

        if !self.graph.is_empty() {
            if let Some(candidates) = self.by_signature.get(&Signature::of(key)) {
                let reachable = self.graph.path(context, |ty| {
                    !ty.is_any() && candidates.iter().any(|k| k.context_type() == *ty)
                });
                if let Some((target, path)) = reachable {
                    return Some(Redirect { key: key.on_context(target), path: Some(path) });
                }
            }
        }

        self.subtypes
            .iter()
            .find(|sub| {
                sub.arg_type() == key.arg_type()
                    && sub.tag() == key.tag()
                    && (sub.context_type().is_any() || sub.context_type() == context)
                    && self.oracle.is_assignable_from(&sub.created_type(), &key.created_type())
            })
            .map(|sub| Redirect { key: sub.clone(), path: None })
    }

    /// Every active binding whose created type is assignable to the requested one, any tag,
    /// reachable from `context`
    pub(crate) fn all_matching(&self, key: &Key, context: TypeToken) -> Vec<Found<'_>> {
        self.bindings
            .iter()
            .filter_map(|(k, stack)| {
                let entry = stack.first()?;
                if entry.binding.supports_subtypes()
                    || k.arg_type() != key.arg_type()
                    || !self.oracle.is_assignable_from(&key.created_type(), &k.created_type())
                {
                    return None;
                }
                let path = if k.context_type().is_any() || k.context_type() == context {
                    None
                } else {
                    let target = k.context_type();
                    Some(self.graph.path(context, |ty| *ty == target)?.1)
                };
                Some(Found { key: k.clone(), entry, path })
            })
            .collect()
    }

    /// Bindings matching a partial key, with their whole override chains
    pub(crate) fn find_specs(&self, specs: &SearchSpecs) -> Vec<(Key, Vec<Arc<dyn Binding>>)> {
        self.bindings
            .iter()
            .filter(|(key, _)| specs.matches(key))
            .map(|(key, stack)| (key.clone(), stack.iter().map(|e| e.binding.clone()).collect()))
            .collect()
    }

    /// The error reported when nothing serves `key`
    pub(crate) fn not_found(&self, key: &Key) -> Error {
        let qualified = self.config.full_description_on_error();

        let unreachable = self
            .by_signature
            .get(&Signature::of(key))
            .and_then(|keys| keys.iter().find(|k| k.context_type() != key.context_type()));
        if let Some(candidate) = unreachable {
            return Error::configuration(format!(
                "{} is bound on context {}, but no context of that type can be obtained from {}: \
                 resolve on such a context, or register a context translator or a context finder",
                candidate.render(qualified),
                candidate.context_type().name(qualified),
                key.context_type().name(qualified),
            ));
        }

        let mut message = format!("No binding found for {}", key.render(qualified));
        let for_type: Vec<_> = self
            .bindings
            .iter()
            .filter(|(k, _)| k.created_type() == key.created_type())
            .collect();
        if !for_type.is_empty() {
            message.push_str("\nAvailable bindings for this type:\n");
            message.push_str(&describe_bindings(for_type.into_iter(), qualified, false, 8));
        }
        if self.config.full_container_tree_on_error() {
            message.push_str("\nRegistered in this container:\n");
            message.push_str(&describe_bindings(self.bindings.iter(), qualified, false, 8));
        }
        Error::NotFound { key: key.clone(), message }
    }
}
