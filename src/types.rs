//! Runtime type descriptors and the type-relationship oracle

use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet, VecDeque},
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// A type-erased shared value as stored and handed out by the container
pub type ArcService = Arc<
    dyn Any
    + Send
    + Sync
>;

/// A comparable, hashable and printable runtime descriptor of a type.
///
/// Two tokens are equal when they describe the same [`TypeId`].
/// [`TypeToken::any`] is the wildcard used for "no context" and "any context".
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl PartialEq for TypeToken {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Display for TypeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.simple_name())
    }
}

impl TypeToken {
    /// Creates a token describing `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The wildcard type, matching any context
    #[inline]
    pub fn any() -> Self {
        Self::of::<dyn Any>()
    }

    /// The unit type `()`
    #[inline]
    pub fn unit() -> Self {
        Self::of::<()>()
    }

    /// Returns `true` if this token is the wildcard
    #[inline]
    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<dyn Any>()
    }

    /// Returns `true` if this token describes `()`
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    /// Returns `true` if this token describes `T`
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Fully qualified type name
    #[inline]
    pub fn qualified_name(&self) -> &'static str {
        if self.is_any() { "Any" } else { self.name }
    }

    /// Type name with every module path stripped, e.g. `Arc<Foo>` for `alloc::sync::Arc<my::Foo>`
    pub fn simple_name(&self) -> String {
        if self.is_any() {
            return "Any".into();
        }
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for c in self.name.chars() {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                segment.push(c);
            } else {
                out.push_str(strip_path(&segment));
                segment.clear();
                out.push(c);
            }
        }
        out.push_str(strip_path(&segment));
        out
    }

    /// Either the simple or the qualified name
    #[inline]
    pub(crate) fn name(&self, qualified: bool) -> String {
        if qualified {
            self.qualified_name().into()
        } else {
            self.simple_name()
        }
    }
}

#[inline]
fn strip_path(segment: &str) -> &str {
    segment.rsplit("::").next().unwrap_or(segment)
}

/// Answers type-relationship questions the container cannot answer from [`TypeId`] alone.
///
/// The default implementation only knows that every type is assignable to itself and to the wildcard.
pub trait TypeOracle: Send + Sync + 'static {
    /// Returns `true` if a value of type `sub` can be used where `sup` is expected
    fn is_assignable_from(&self, sup: &TypeToken, sub: &TypeToken) -> bool {
        sup == sub || sup.is_any()
    }

    /// Converts a value of type `from` into a value of type `to`, if a conversion is known
    fn upcast(&self, value: ArcService, from: &TypeToken, to: &TypeToken) -> Option<ArcService> {
        if from == to { Some(value) } else { None }
    }
}

/// A [`TypeOracle`] that only knows exact type identity
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactTypes;

impl TypeOracle for ExactTypes {}

type Upcaster = Arc<
    dyn Fn(ArcService) -> Option<ArcService>
    + Send
    + Sync
>;

/// A [`TypeOracle`] backed by declared subtype relations.
///
/// Relations are transitive: declaring `Dog: Animal` and `Animal: Creature` makes `Dog` assignable to `Creature`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use diorama::types::{TypeHierarchy, TypeOracle, TypeToken};
///
/// trait Animal: Send + Sync { fn name(&self) -> &str; }
/// struct Dog;
/// impl Animal for Dog { fn name(&self) -> &str { "dog" } }
///
/// let mut hierarchy = TypeHierarchy::new();
/// hierarchy.declare::<Dog, Arc<dyn Animal>>(|dog| dog as Arc<dyn Animal>);
///
/// assert!(hierarchy.is_assignable_from(&TypeToken::of::<Arc<dyn Animal>>(), &TypeToken::of::<Dog>()));
/// ```
#[derive(Default, Clone)]
pub struct TypeHierarchy {
    supers: HashMap<TypeToken, Vec<(TypeToken, Upcaster)>>,
}

impl Debug for TypeHierarchy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.supers.iter().map(|(sub, sups)| (sub, sups.iter().map(|(s, _)| s).collect::<Vec<_>>())))
            .finish()
    }
}

impl TypeHierarchy {
    /// Creates an empty hierarchy
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `Sub` may be used as `Super`, converting with `upcast`
    pub fn declare<Sub, Super>(&mut self, upcast: impl Fn(Arc<Sub>) -> Super + Send + Sync + 'static) -> &mut Self
    where
        Sub: Send + Sync + 'static,
        Super: Send + Sync + 'static,
    {
        let upcaster: Upcaster = Arc::new(move |value: ArcService| {
            value
                .downcast::<Sub>()
                .ok()
                .map(|sub| Arc::new(upcast(sub)) as ArcService)
        });
        self.supers
            .entry(TypeToken::of::<Sub>())
            .or_default()
            .push((TypeToken::of::<Super>(), upcaster));
        self
    }

    /// Breadth-first path of upcasters leading from `from` to `to`
    fn path(&self, from: &TypeToken, to: &TypeToken) -> Option<Vec<Upcaster>> {
        let mut visited = HashSet::from([*from]);
        let mut queue = VecDeque::from([(*from, Vec::<Upcaster>::new())]);
        while let Some((current, path)) = queue.pop_front() {
            if &current == to {
                return Some(path);
            }
            for (sup, upcaster) in self.supers.get(&current).into_iter().flatten() {
                if visited.insert(*sup) {
                    let mut next = path.clone();
                    next.push(upcaster.clone());
                    queue.push_back((*sup, next));
                }
            }
        }
        None
    }
}

impl TypeOracle for TypeHierarchy {
    fn is_assignable_from(&self, sup: &TypeToken, sub: &TypeToken) -> bool {
        sup == sub || sup.is_any() || self.path(sub, sup).is_some()
    }

    fn upcast(&self, value: ArcService, from: &TypeToken, to: &TypeToken) -> Option<ArcService> {
        self.path(from, to)?
            .iter()
            .try_fold(value, |value, upcaster| upcaster(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Animal: Send + Sync {
        fn sound(&self) -> &'static str;
    }

    struct Dog;

    impl Animal for Dog {
        fn sound(&self) -> &'static str {
            "woof"
        }
    }

    struct Creature(Arc<dyn Animal>);

    #[test]
    fn it_strips_module_paths() {
        let token = TypeToken::of::<Arc<std::collections::HashMap<String, Vec<u8>>>>();
        assert_eq!(token.simple_name(), "Arc<HashMap<String, Vec<u8>>>");
        assert!(token.qualified_name().starts_with("alloc::sync::Arc"));
    }

    #[test]
    fn it_compares_by_type_id() {
        assert_eq!(TypeToken::of::<u32>(), TypeToken::of::<u32>());
        assert_ne!(TypeToken::of::<u32>(), TypeToken::of::<u64>());
        assert!(TypeToken::any().is_any());
        assert!(TypeToken::unit().is_unit());
        assert_eq!(TypeToken::any().to_string(), "Any");
    }

    #[test]
    fn exact_types_only_match_themselves_and_any() {
        let oracle = ExactTypes;
        assert!(oracle.is_assignable_from(&TypeToken::of::<u8>(), &TypeToken::of::<u8>()));
        assert!(oracle.is_assignable_from(&TypeToken::any(), &TypeToken::of::<u8>()));
        assert!(!oracle.is_assignable_from(&TypeToken::of::<u8>(), &TypeToken::of::<u16>()));
    }

    #[test]
    fn it_upcasts_transitively() {
        let mut hierarchy = TypeHierarchy::new();
        hierarchy
            .declare::<Dog, Arc<dyn Animal>>(|dog| dog as Arc<dyn Animal>)
            .declare::<Arc<dyn Animal>, Creature>(|animal| Creature(animal.as_ref().clone()));

        let from = TypeToken::of::<Dog>();
        let to = TypeToken::of::<Creature>();
        assert!(hierarchy.is_assignable_from(&to, &from));
        assert!(!hierarchy.is_assignable_from(&from, &to));

        let value = hierarchy
            .upcast(Arc::new(Dog), &from, &to)
            .unwrap()
            .downcast::<Creature>()
            .unwrap();
        assert_eq!(value.0.sound(), "woof");
    }
}
