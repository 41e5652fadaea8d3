#![allow(missing_docs)]

use diorama::{
    binding::{ProviderBinding, SingletonBinding},
    scope::{ContextScope, IdentityScope, RegistryKind, Scope, SubScope},
    ContainerBuilder, ContextTranslator, Error,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Request(u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Session(u32);

#[derive(Debug)]
struct User(u32);

fn user_on_session() -> ProviderBinding<User> {
    ProviderBinding::new(|r| {
        r.context_value::<Session>()
            .map(|session| User(session.0))
            .ok_or_else(|| Error::other("no session"))
    })
    .on_context::<Session>()
}

#[test]
fn it_resolves_on_the_bound_context() {
    let mut builder = ContainerBuilder::new();
    builder.bind(None, None, user_on_session()).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.on(Session(3)).instance::<User>(None).unwrap().0, 3);
}

#[test]
fn it_translates_contexts() {
    let mut builder = ContainerBuilder::new();
    builder.register_context_translator(ContextTranslator::new(|r: &Request| Session(r.0 + 100)));
    builder.bind(None, None, user_on_session()).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.on(Request(1)).instance::<User>(None).unwrap().0, 101);
    assert_eq!(container.on(Request(2)).instance::<User>(None).unwrap().0, 102);
}

#[test]
fn it_translates_through_several_steps() {
    let mut builder = ContainerBuilder::new();
    builder.register_context_translator(ContextTranslator::new(|n: &u32| Request(*n)));
    builder.register_context_translator(ContextTranslator::new(|r: &Request| Session(r.0 * 2)));
    builder.bind(None, None, user_on_session()).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.on(21u32).instance::<User>(None).unwrap().0, 42);
}

#[test]
fn it_finds_a_context_when_none_is_given() {
    let mut builder = ContainerBuilder::new();
    builder.register_context_finder(|| Session(7));
    builder.bind(None, None, user_on_session()).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.instance::<User>(None).unwrap().0, 7);
}

#[test]
fn it_prefers_bindings_without_context() {
    let mut builder = ContainerBuilder::new();
    builder.bind(None, None, user_on_session()).unwrap();
    builder.bind_provider(None, |_| Ok(User(0))).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.on(Session(3)).instance::<User>(None).unwrap().0, 3);
    assert_eq!(container.on(Request(3)).instance::<User>(None).unwrap().0, 0);
}

#[test]
fn it_reports_unreachable_contexts() {
    let mut builder = ContainerBuilder::new();
    builder.bind(None, None, user_on_session()).unwrap();
    let container = builder.build().unwrap();

    let err = container.on(Request(1)).instance::<User>(None).unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("on context Session"));
    assert!(container.on(Request(1)).instance_or_none::<User>(None).unwrap().is_none());
}

#[test]
fn it_keeps_one_singleton_per_context_value() {
    let scope = Arc::new(ContextScope::<Session>::new());
    let mut builder = ContainerBuilder::new();
    builder
        .bind(
            None,
            None,
            SingletonBinding::scoped(scope.clone(), |r| {
                r.context_value::<Session>()
                    .map(|s| User(s.0))
                    .ok_or_else(|| Error::other("no session"))
            }),
        )
        .unwrap();
    let container = builder.build().unwrap();

    let first = container.on(Session(1)).instance::<User>(None).unwrap();
    let again = container.on(Session(1)).instance::<User>(None).unwrap();
    let other = container.on(Session(2)).instance::<User>(None).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(scope.len(), 2);

    scope.remove(&Session(1));
    let renewed = container.on(Session(1)).instance::<User>(None).unwrap();

    assert!(!Arc::ptr_eq(&first, &renewed));
    assert_eq!(container.description(false), "bind<User>() { scoped(ContextScope).singleton { User } }\n");
}

#[test]
fn it_keys_identity_scopes_on_the_allocation() {
    let scope = Arc::new(IdentityScope::<Session>::new());
    let mut builder = ContainerBuilder::new();
    builder
        .bind(None, None, SingletonBinding::scoped(scope.clone(), |r| {
            r.context_value::<Session>()
                .map(|s| User(s.0))
                .ok_or_else(|| Error::other("no session"))
        }))
        .unwrap();
    let container = builder.build().unwrap();

    let session = Arc::new(Session(1));
    let twin = Arc::new(Session(1));

    let first = container.on_shared(session.clone()).instance::<User>(None).unwrap();
    let again = container.on_shared(session.clone()).instance::<User>(None).unwrap();
    let other = container.on_shared(twin.clone()).instance::<User>(None).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(scope.len(), 2);

    drop(twin);
    scope.prune();
    assert_eq!(scope.len(), 1);
}

#[test]
fn it_clears_sub_scopes_with_their_parent() {
    let sessions = Arc::new(ContextScope::<Session>::new());
    let requests = Arc::new(SubScope::new(sessions.clone(), |r: &Request| Session(r.0 / 10)));
    let mut builder = ContainerBuilder::new();
    builder
        .bind(None, None, SingletonBinding::scoped(requests.clone(), |r| {
            r.context_value::<Request>()
                .map(|req| User(req.0))
                .ok_or_else(|| Error::other("no request"))
        }))
        .unwrap();
    let container = builder.build().unwrap();

    let first = container.on(Request(11)).instance::<User>(None).unwrap();
    let again = container.on(Request(11)).instance::<User>(None).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    sessions.remove(&Session(1));

    let renewed = container.on(Request(11)).instance::<User>(None).unwrap();
    assert!(!Arc::ptr_eq(&first, &renewed));
    assert_eq!(requests.context_type(), diorama::types::TypeToken::of::<Request>());
}

#[test]
fn it_keeps_a_single_item_per_registry() {
    let scope = Arc::new(ContextScope::<Session>::with_registry(RegistryKind::SingleItem));
    let mut builder = ContainerBuilder::new();
    builder
        .bind(None, None, SingletonBinding::scoped(scope.clone(), |_| Ok(User(1))))
        .unwrap();
    builder
        .bind(None, None, SingletonBinding::scoped(scope.clone(), |_| Ok(String::from("u"))))
        .unwrap();
    let container = builder.build().unwrap();
    let resolver = container.on(Session(1));

    let first = resolver.instance::<User>(None).unwrap();
    resolver.instance::<String>(None).unwrap();
    let second = resolver.instance::<User>(None).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn it_rejects_contexts_of_the_wrong_type() {
    let scope = Arc::new(ContextScope::<Session>::new());
    let mut builder = ContainerBuilder::new();
    builder
        .bind(None, None, SingletonBinding::scoped(scope, |_| Ok(User(1))))
        .unwrap();
    let container = builder.build().unwrap();

    assert!(container.instance::<User>(None).is_err());
}
