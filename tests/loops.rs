#![allow(missing_docs)]

use diorama::{
    binding::SingletonBinding,
    ContainerBuilder, Error, Key,
};
use std::sync::Arc;

#[derive(Debug)]
struct A(Arc<B>);

#[derive(Debug)]
struct B(Arc<C>);

#[derive(Debug)]
struct C(Arc<A>);

#[test]
fn it_detects_a_three_step_loop() {
    let mut builder = ContainerBuilder::new();
    builder.bind_provider(None, |r| Ok(A(r.instance(None)?))).unwrap();
    builder.bind_provider(None, |r| Ok(B(r.instance(None)?))).unwrap();
    builder.bind_provider(None, |r| Ok(C(r.instance(None)?))).unwrap();
    let container = builder.build().unwrap();

    let err = container.instance::<A>(None).unwrap_err();

    let Error::DependencyLoop(chain) = &err else {
        panic!("expected a dependency loop, got {err}");
    };
    let keys: Vec<_> = chain.steps().iter().map(|step| step.key.clone()).collect();
    assert_eq!(keys, vec![Key::of::<A>(None), Key::of::<B>(None), Key::of::<C>(None), Key::of::<A>(None)]);

    let text = err.to_string();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines, vec![
        "Dependency recursion:",
        "     bind<A>()",
        "    ╔╩>bind<B>()",
        "    ║  ╚>bind<C>()",
        "    ║    ╚>bind<A>()",
        "    ╚══════╝",
    ]);
}

#[test]
fn it_detects_loops_through_singletons() {
    let mut builder = ContainerBuilder::new();
    builder.bind(None, None, SingletonBinding::new(|r| Ok(A(r.instance(None)?)))).unwrap();
    builder.bind(None, None, SingletonBinding::new(|r| Ok(B(r.instance(None)?)))).unwrap();
    builder.bind(None, None, SingletonBinding::new(|r| Ok(C(r.instance(None)?)))).unwrap();
    let container = builder.build().unwrap();

    assert!(matches!(container.instance::<B>(None), Err(Error::DependencyLoop(_))));
    assert!(matches!(container.instance::<B>(None), Err(Error::DependencyLoop(_))));
}

#[test]
fn it_detects_a_self_loop() {
    let mut builder = ContainerBuilder::new();
    builder
        .bind_provider(None, |r| r.instance::<String>(None).map(|s| format!("{s}!")))
        .unwrap();
    let container = builder.build().unwrap();

    let Err(Error::DependencyLoop(chain)) = container.instance::<String>(None) else {
        panic!("expected a dependency loop");
    };

    assert_eq!(chain.steps().len(), 2);
}

#[test]
fn it_does_not_confuse_override_levels_with_loops() {
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, String::from("base")).unwrap();
    builder
        .bind(None, Some(true), diorama::binding::ProviderBinding::new(|r| {
            r.overridden_instance::<String>().map(|s| format!("{s}+"))
        }))
        .unwrap();
    let container = builder.build().unwrap();

    assert_eq!(*container.instance::<String>(None).unwrap(), "base+");
}

#[test]
fn it_marks_overridden_steps_in_loops() {
    let mut builder = ContainerBuilder::new();
    builder
        .bind(None, None, diorama::binding::ProviderBinding::new(|r| {
            r.instance::<u8>(None).map(|n| *n)
        }))
        .unwrap();
    builder
        .bind(None, Some(true), diorama::binding::ProviderBinding::new(|r| {
            r.overridden_instance::<u8>().map(|n| *n + 1)
        }))
        .unwrap();
    let container = builder.build().unwrap();

    let err = container.instance::<u8>(None).unwrap_err();

    let Error::DependencyLoop(chain) = &err else {
        panic!("expected a dependency loop, got {err}");
    };
    let levels: Vec<_> = chain.steps().iter().map(|step| step.override_level).collect();
    assert_eq!(levels, vec![0, 1, 0]);
    assert!(err.to_string().contains("    ╔╩>overridden bind<u8>()"));
}

#[test]
fn it_allows_the_same_dependency_twice() {
    struct Pair(Arc<u8>, Arc<u8>);

    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();
    builder
        .bind_provider(None, |r| Ok(Pair(r.instance(None)?, r.instance(None)?)))
        .unwrap();
    let container = builder.build().unwrap();

    let pair = container.instance::<Pair>(None).unwrap();
    assert!(Arc::ptr_eq(&pair.0, &pair.1));
}

#[test]
fn it_resolves_a_tagged_chain_sharing_types_with_a_loop() {
    struct X(Option<Arc<Y>>);
    struct Y(Arc<Z>);
    struct Z(Option<Arc<X>>);

    let mut builder = ContainerBuilder::new();
    builder.bind_provider(None, |r| Ok(X(Some(r.instance(None)?)))).unwrap();
    builder.bind_provider(None, |r| Ok(Y(r.instance(None)?))).unwrap();
    builder.bind_provider(None, |r| Ok(Z(Some(r.instance(None)?)))).unwrap();

    builder.bind_provider("other", |r| Ok(X(Some(r.instance("other")?)))).unwrap();
    builder.bind_provider("other", |r| Ok(Y(r.instance("other")?))).unwrap();
    builder.bind_provider("other", |r| Ok(Z(Some(r.instance("leaf")?)))).unwrap();
    builder.bind_provider("leaf", |_| Ok(X(None))).unwrap();
    let container = builder.build().unwrap();

    let root = container.instance::<X>("other").unwrap();
    let leaf = root.0.as_ref().and_then(|y| y.0 .0.as_ref()).unwrap();
    assert!(leaf.0.is_none());

    assert!(matches!(container.instance::<X>(None), Err(Error::DependencyLoop(_))));
    assert!(matches!(container.instance::<Z>(None), Err(Error::DependencyLoop(_))));
}
