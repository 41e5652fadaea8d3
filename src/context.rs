//! Resolution contexts and the context-translation graph

use crate::{
    error::Error,
    types::{ArcService, TypeToken},
};
use std::{
    collections::{HashSet, VecDeque},
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// A value bindings can be scoped to (a session, a request, a user...) together with its type.
///
/// [`Context::none`] is the default: its type is the wildcard and it carries no value.
#[derive(Clone)]
pub struct Context {
    ty: TypeToken,
    value: Option<ArcService>,
}

impl Default for Context {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(_) => write!(f, "Context({})", self.ty),
            None => f.write_str("Context(none)"),
        }
    }
}

impl Context {
    /// The absence of context
    #[inline]
    pub fn none() -> Self {
        Self { ty: TypeToken::any(), value: None }
    }

    /// Wraps a context value
    #[inline]
    pub fn new<C: Send + Sync + 'static>(value: C) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Wraps an already shared context value; identity scopes key on this allocation
    #[inline]
    pub fn shared<C: Send + Sync + 'static>(value: Arc<C>) -> Self {
        Self { ty: TypeToken::of::<C>(), value: Some(value) }
    }

    /// The context type, [`TypeToken::any`] for no context
    #[inline]
    pub fn type_token(&self) -> TypeToken {
        self.ty
    }

    /// Returns `true` if there is no context value
    #[inline]
    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }

    /// The erased context value
    #[inline]
    pub fn value(&self) -> Option<&ArcService> {
        self.value.as_ref()
    }

    /// A reference to the context value if it is a `C`
    #[inline]
    pub fn downcast_ref<C: 'static>(&self) -> Option<&C> {
        self.value.as_ref()?.downcast_ref::<C>()
    }

    /// The shared context value if it is a `C`
    #[inline]
    pub fn downcast<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.value.clone()?.downcast::<C>().ok()
    }

    pub(crate) fn expect<C: 'static>(&self) -> Result<&C, Error> {
        self.downcast_ref::<C>().ok_or_else(|| {
            Error::configuration(format!(
                "Expected a context of type {} but got {}",
                TypeToken::of::<C>(),
                self.ty
            ))
        })
    }
}

type TranslateFn = Arc<
    dyn Fn(&Context) -> Result<Context, Error>
    + Send
    + Sync
>;

/// An edge of the context-translation graph: turns a context of one type into a context of another.
///
/// A translator whose source type is the wildcard is a context finder: it supplies a context
/// when the caller has none.
#[derive(Clone)]
pub struct ContextTranslator {
    from: TypeToken,
    to: TypeToken,
    translate: TranslateFn,
}

impl Debug for ContextTranslator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextTranslator({} -> {})", self.from, self.to)
    }
}

impl ContextTranslator {
    /// A translator from `F` contexts to `T` contexts
    pub fn new<F, T>(translate: impl Fn(&F) -> T + Send + Sync + 'static) -> Self
    where
        F: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Self {
            from: TypeToken::of::<F>(),
            to: TypeToken::of::<T>(),
            translate: Arc::new(move |ctx: &Context| ctx.expect::<F>().map(|c| Context::new(translate(c)))),
        }
    }

    /// A context finder: produces a `T` context out of nothing
    pub fn finder<T>(find: impl Fn() -> T + Send + Sync + 'static) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            from: TypeToken::any(),
            to: TypeToken::of::<T>(),
            translate: Arc::new(move |_: &Context| Ok(Context::new(find()))),
        }
    }

    /// Source context type
    #[inline]
    pub fn from_type(&self) -> TypeToken {
        self.from
    }

    /// Target context type
    #[inline]
    pub fn to_type(&self) -> TypeToken {
        self.to
    }

    #[inline]
    pub(crate) fn translate(&self, ctx: &Context) -> Result<Context, Error> {
        (self.translate)(ctx)
    }
}

/// A sequence of translators leading from the caller's context type to a binding's context type
#[derive(Debug, Clone)]
pub(crate) struct TranslationPath {
    steps: Vec<ContextTranslator>,
}

impl TranslationPath {
    pub(crate) fn apply(&self, ctx: &Context) -> Result<Context, Error> {
        self.steps
            .iter()
            .try_fold(ctx.clone(), |ctx, step| step.translate(&ctx))
    }
}

/// All registered translators, searched breadth-first
#[derive(Debug, Clone, Default)]
pub(crate) struct ContextGraph {
    translators: Vec<ContextTranslator>,
}

impl ContextGraph {
    #[inline]
    pub(crate) fn new(translators: Vec<ContextTranslator>) -> Self {
        Self { translators }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    #[inline]
    pub(crate) fn translators(&self) -> &[ContextTranslator] {
        &self.translators
    }

    /// Shortest chain of translators from `from` to the first reachable type accepted by `is_target`.
    ///
    /// Context finders apply from any type. Ties are broken by translator registration order.
    /// Cycles in the graph are harmless.
    pub(crate) fn path(&self, from: TypeToken, is_target: impl Fn(&TypeToken) -> bool) -> Option<(TypeToken, TranslationPath)> {
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([(from, Vec::<ContextTranslator>::new())]);
        while let Some((current, steps)) = queue.pop_front() {
            if !steps.is_empty() && is_target(&current) {
                return Some((current, TranslationPath { steps }));
            }
            for translator in self.translators.iter().filter(|t| t.from == current || t.from.is_any()) {
                if visited.insert(translator.to) {
                    let mut next = steps.clone();
                    next.push(translator.clone());
                    queue.push_back((translator.to, next));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Request(u32);

    #[derive(Debug, PartialEq)]
    struct Session(u32);

    #[derive(Debug, PartialEq)]
    struct User(u32);

    fn graph() -> ContextGraph {
        ContextGraph::new(vec![
            ContextTranslator::new(|r: &Request| Session(r.0 * 10)),
            ContextTranslator::new(|s: &Session| User(s.0 + 1)),
            ContextTranslator::new(|u: &User| Request(u.0)),
            ContextTranslator::finder(|| Session(0)),
        ])
    }

    #[test]
    fn it_translates_through_a_chain() {
        let (to, path) = graph()
            .path(TypeToken::of::<Request>(), |t| *t == TypeToken::of::<User>())
            .unwrap();
        assert_eq!(to, TypeToken::of::<User>());

        let ctx = path.apply(&Context::new(Request(4))).unwrap();
        assert_eq!(ctx.downcast_ref::<User>(), Some(&User(41)));
    }

    #[test]
    fn cycles_terminate() {
        let found = graph().path(TypeToken::of::<Request>(), |t| *t == TypeToken::of::<u8>());
        assert!(found.is_none());
    }

    #[test]
    fn finders_start_from_no_context() {
        let (_, path) = graph()
            .path(TypeToken::any(), |t| *t == TypeToken::of::<Session>())
            .unwrap();
        let ctx = path.apply(&Context::none()).unwrap();
        assert_eq!(ctx.downcast_ref::<Session>(), Some(&Session(0)));

        assert!(graph().path(TypeToken::of::<User>(), |t| *t == TypeToken::of::<u8>()).is_none());
    }

    #[test]
    fn wrong_context_type_is_a_configuration_error() {
        let translator = ContextTranslator::new(|r: &Request| Session(r.0));
        assert!(matches!(translator.translate(&Context::new(5u8)), Err(Error::Configuration(_))));
    }
}
