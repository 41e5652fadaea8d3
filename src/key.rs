//! Binding keys, tags and search specifications

use crate::types::TypeToken;
use std::{
    any::Any,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// An object-safe view over a hashable, comparable and printable value.
///
/// Implemented for every `T: Eq + Hash + Debug + Send + Sync + 'static`.
pub trait DynKey: Any + Send + Sync {
    /// Upcasts to [`Any`]
    fn as_any(&self) -> &dyn Any;

    /// Compares with another erased key; values of different types are never equal
    fn dyn_eq(&self, other: &dyn DynKey) -> bool;

    /// Feeds the value into a hasher
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Formats the value
    fn dyn_fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

impl<T> DynKey for T
where
    T: Eq + Hash + Debug + Send + Sync + 'static,
{
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn dyn_eq(&self, other: &dyn DynKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    #[inline]
    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        std::any::TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    #[inline]
    fn dyn_fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A shared erased key value, used for tags and multiton arguments
#[derive(Clone)]
pub(crate) struct ErasedKey(Arc<dyn DynKey>);

impl ErasedKey {
    #[inline]
    pub(crate) fn new<T: Eq + Hash + Debug + Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl PartialEq for ErasedKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for ErasedKey {}

impl Hash for ErasedKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl Debug for ErasedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.dyn_fmt(f)
    }
}

/// An optional discriminator distinguishing several bindings of the same type
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag(ErasedKey);

impl Tag {
    /// Creates a tag from any hashable value.
    ///
    /// String slices are stored as [`String`], so `"a"` and `String::from("a")` are the same tag.
    #[inline]
    pub fn new<T: Eq + Hash + Debug + Send + Sync + 'static>(value: T) -> Self {
        match (&value as &dyn Any).downcast_ref::<&'static str>() {
            Some(s) => Self(ErasedKey::new(s.to_string())),
            None => Self(ErasedKey::new(value)),
        }
    }

    /// Returns the tag value if it is of type `T`
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.0.as_any().downcast_ref::<T>()
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.downcast_ref::<String>() {
            Some(s) => f.write_str(s),
            None => Debug::fmt(&self.0, f),
        }
    }
}

impl From<&'static str> for Tag {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tag {
    #[inline]
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Anything usable as an optional tag: `None`, a [`Tag`], a string
pub trait IntoTag {
    /// Converts into an optional tag
    fn into_tag(self) -> Option<Tag>;
}

impl IntoTag for Option<Tag> {
    #[inline]
    fn into_tag(self) -> Option<Tag> {
        self
    }
}

impl IntoTag for Tag {
    #[inline]
    fn into_tag(self) -> Option<Tag> {
        Some(self)
    }
}

impl IntoTag for &'static str {
    #[inline]
    fn into_tag(self) -> Option<Tag> {
        Some(self.into())
    }
}

impl IntoTag for String {
    #[inline]
    fn into_tag(self) -> Option<Tag> {
        Some(self.into())
    }
}

/// Identity of a binding: context type, argument type, created type and an optional tag.
///
/// Keys are immutable and cache their hash.
#[derive(Clone)]
pub struct Key {
    context_type: TypeToken,
    arg_type: TypeToken,
    created_type: TypeToken,
    tag: Option<Tag>,
    hash: u64,
}

impl Key {
    /// Creates a new key
    pub fn new(context_type: TypeToken, arg_type: TypeToken, created_type: TypeToken, tag: Option<Tag>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        context_type.hash(&mut hasher);
        arg_type.hash(&mut hasher);
        created_type.hash(&mut hasher);
        tag.hash(&mut hasher);
        Self {
            context_type,
            arg_type,
            created_type,
            tag,
            hash: hasher.finish(),
        }
    }

    /// A key for a value of `T` taking no argument, on any context
    #[inline]
    pub fn of<T: ?Sized + 'static>(tag: impl IntoTag) -> Self {
        Self::new(TypeToken::any(), TypeToken::unit(), TypeToken::of::<T>(), tag.into_tag())
    }

    /// A key for a value of `T` created from an argument of type `A`, on any context
    #[inline]
    pub fn with_arg<A: ?Sized + 'static, T: ?Sized + 'static>(tag: impl IntoTag) -> Self {
        Self::new(TypeToken::any(), TypeToken::of::<A>(), TypeToken::of::<T>(), tag.into_tag())
    }

    /// The same key on another context type
    #[inline]
    pub fn on_context(&self, context_type: TypeToken) -> Self {
        Self::new(context_type, self.arg_type, self.created_type, self.tag.clone())
    }

    /// Type of the context the binding is restricted to
    #[inline]
    pub fn context_type(&self) -> TypeToken {
        self.context_type
    }

    /// Type of the argument the factory takes
    #[inline]
    pub fn arg_type(&self) -> TypeToken {
        self.arg_type
    }

    /// Type of the value the factory creates
    #[inline]
    pub fn created_type(&self) -> TypeToken {
        self.created_type
    }

    /// The optional tag
    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// `bind<Type>(tag = "t")`
    pub fn bind_description(&self) -> String {
        self.render_bind(false)
    }

    /// Same as [`Key::bind_description`] with fully qualified type names
    pub fn bind_full_description(&self) -> String {
        self.render_bind(true)
    }

    /// `Type tagged "t" on context Ctx, with argument Arg`
    pub fn description(&self) -> String {
        self.render(false)
    }

    /// Same as [`Key::description`] with fully qualified type names
    pub fn full_description(&self) -> String {
        self.render(true)
    }

    pub(crate) fn render_bind(&self, qualified: bool) -> String {
        let mut out = format!("bind<{}>", self.created_type.name(qualified));
        match &self.tag {
            Some(tag) => out.push_str(&format!("(tag = \"{tag}\")")),
            None => out.push_str("()"),
        }
        out
    }

    pub(crate) fn render(&self, qualified: bool) -> String {
        let mut out = self.created_type.name(qualified);
        if let Some(tag) = &self.tag {
            out.push_str(&format!(" tagged \"{tag}\""));
        }
        if !self.context_type.is_any() {
            out.push_str(&format!(" on context {}", self.context_type.name(qualified)));
        }
        if !self.arg_type.is_unit() {
            out.push_str(&format!(", with argument {}", self.arg_type.name(qualified)));
        }
        out
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.context_type == other.context_type
            && self.arg_type == other.arg_type
            && self.created_type == other.created_type
            && self.tag == other.tag
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Tag constraint of a [`SearchSpecs`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagSpec {
    /// Matches any tag, including no tag
    #[default]
    Any,
    /// Matches only untagged bindings
    Untagged,
    /// Matches bindings with exactly this tag
    Tagged(Tag),
}

/// A partial key used to search the binding table: every unset field matches anything
#[derive(Debug, Clone, Default)]
pub struct SearchSpecs {
    /// Context type constraint
    pub context_type: Option<TypeToken>,
    /// Argument type constraint
    pub arg_type: Option<TypeToken>,
    /// Created type constraint
    pub created_type: Option<TypeToken>,
    /// Tag constraint
    pub tag: TagSpec,
}

impl SearchSpecs {
    /// A search matching every binding
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the created type to `T`
    #[inline]
    pub fn with_type<T: ?Sized + 'static>(mut self) -> Self {
        self.created_type = Some(TypeToken::of::<T>());
        self
    }

    /// Restricts the argument type to `A`
    #[inline]
    pub fn with_arg<A: ?Sized + 'static>(mut self) -> Self {
        self.arg_type = Some(TypeToken::of::<A>());
        self
    }

    /// Restricts the context type to `C`
    #[inline]
    pub fn with_context<C: ?Sized + 'static>(mut self) -> Self {
        self.context_type = Some(TypeToken::of::<C>());
        self
    }

    /// Restricts the tag
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = TagSpec::Tagged(tag.into());
        self
    }

    /// Matches only untagged bindings
    #[inline]
    pub fn untagged(mut self) -> Self {
        self.tag = TagSpec::Untagged;
        self
    }

    /// Returns `true` if the key satisfies every set constraint
    pub fn matches(&self, key: &Key) -> bool {
        self.context_type.is_none_or(|t| t == key.context_type)
            && self.arg_type.is_none_or(|t| t == key.arg_type)
            && self.created_type.is_none_or(|t| t == key.created_type)
            && match &self.tag {
                TagSpec::Any => true,
                TagSpec::Untagged => key.tag.is_none(),
                TagSpec::Tagged(tag) => key.tag.as_ref() == Some(tag),
            }
    }
}

impl Display for SearchSpecs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(t) = &self.created_type {
            parts.push(format!("type = {t}"));
        }
        if let Some(t) = &self.context_type {
            parts.push(format!("context = {t}"));
        }
        if let Some(t) = &self.arg_type {
            parts.push(format!("argument = {t}"));
        }
        match &self.tag {
            TagSpec::Any => {}
            TagSpec::Untagged => parts.push("untagged".into()),
            TagSpec::Tagged(tag) => parts.push(format!("tag = \"{tag}\"")),
        }
        write!(f, "[{}]", parts.join(", "))
    }
}
