#![allow(missing_docs)]

use diorama::{
    binding::{InstanceBinding, ProviderBinding, SingletonBinding},
    ContainerBuilder, DiConfig, Error, Module,
};
use std::sync::Arc;

#[derive(Debug)]
struct Greeting(String);

#[test]
fn it_rejects_implicit_overrides() {
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();

    let err = builder.bind_instance(None, 2u8).unwrap_err();

    assert!(matches!(err, Error::Overriding(_)));
    assert_eq!(err.to_string(), "Binding bind<u8>() must not override an existing binding.");
}

#[test]
fn it_rejects_overrides_of_nothing() {
    let mut builder = ContainerBuilder::new();

    let err = builder.bind(None, Some(true), InstanceBinding::new(2u8)).unwrap_err();

    assert_eq!(err.to_string(), "Binding bind<u8>() must override an existing binding.");
}

#[test]
fn it_accepts_explicit_overrides() {
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();
    builder.bind(None, Some(true), InstanceBinding::new(2u8)).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(*container.instance::<u8>(None).unwrap(), 2);
}

#[test]
fn it_overrides_silently_when_configured() {
    let mut builder = ContainerBuilder::with_config(DiConfig::new().with_silent_override());
    builder.bind_instance(None, 1u8).unwrap();
    builder.bind_instance(None, 2u8).unwrap();
    builder.bind_instance(None, 3u16).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(*container.instance::<u8>(None).unwrap(), 2);
    assert_eq!(*container.instance::<u16>(None).unwrap(), 3);
}

#[test]
fn it_still_checks_explicit_flags_in_silent_mode() {
    let mut builder = ContainerBuilder::with_config(DiConfig::new().with_silent_override());
    builder.bind_instance(None, 1u8).unwrap();

    assert!(builder.bind(None, Some(false), InstanceBinding::new(2u8)).is_err());
    assert!(builder.bind(None, Some(true), InstanceBinding::new(3u16)).is_err());
}

#[test]
fn it_forbids_overrides_in_modules_imported_without_permission() {
    let module = Module::new("forbidden", |builder| {
        builder.bind(None, Some(true), InstanceBinding::new(2u8))
    });
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();

    let err = builder.import(&module, false).unwrap_err();

    assert!(matches!(err, Error::Overriding(_)));
    assert_eq!(err.to_string(), "Overriding has been forbidden");
}

#[test]
fn it_rejects_implicit_overrides_in_forbidden_modules() {
    let module = Module::new("clashing", |builder| builder.bind_instance(None, 2u8));
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();

    let err = builder.import(&module, false).unwrap_err();

    assert_eq!(err.to_string(), "Binding bind<u8>() must not override an existing binding.");
}

#[test]
fn it_lets_permitted_modules_override() {
    let module = Module::new("patch", |builder| {
        builder.bind(None, Some(true), InstanceBinding::new(2u8))
    });
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();
    builder.import(&module, true).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(*container.instance::<u8>(None).unwrap(), 2);
}

#[test]
fn it_lets_silent_modules_override_without_flag() {
    let module = Module::new("patch", |builder| builder.bind_instance(None, 2u8)).with_silent_override();
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();
    builder.import(&module, true).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(*container.instance::<u8>(None).unwrap(), 2);
}

#[test]
fn it_forbids_permissive_imports_inside_forbidden_modules() {
    let inner = Module::new("inner", |_| Ok(()));
    let outer = Module::new("outer", move |builder| builder.import(&inner, true));
    let mut builder = ContainerBuilder::new();

    let err = builder.import(&outer, false).unwrap_err();

    assert_eq!(err.to_string(), "Overriding has been forbidden");
}

#[test]
fn it_restores_the_policy_after_an_import() {
    let module = Module::new("strict", |builder| builder.bind_instance(None, 1u8));
    let mut builder = ContainerBuilder::with_config(DiConfig::new().with_silent_override());
    builder.import(&module, false).unwrap();

    builder.bind_instance(None, 2u8).unwrap();
}

#[test]
fn it_reaches_overridden_bindings() {
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, Greeting("hello".into())).unwrap();
    builder
        .bind(
            None,
            Some(true),
            ProviderBinding::new(|r| {
                let base = r.overridden_instance::<Greeting>()?;
                Ok(Greeting(format!("{}, world", base.0)))
            }),
        )
        .unwrap();
    builder
        .bind(
            None,
            Some(true),
            SingletonBinding::new(|r| {
                let base = r.overridden_instance::<Greeting>()?;
                Ok(Greeting(format!("{}!", base.0)))
            }),
        )
        .unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.instance::<Greeting>(None).unwrap().0, "hello, world!");
}

#[test]
fn it_returns_none_when_nothing_is_overridden() {
    let mut builder = ContainerBuilder::new();
    builder
        .bind_provider(None, |r| {
            let base = r.overridden_instance_or_none::<Greeting>()?;
            Ok(Greeting(base.map_or_else(|| "first".into(), |g| g.0.clone())))
        })
        .unwrap();
    let container = builder.build().unwrap();

    assert_eq!(container.instance::<Greeting>(None).unwrap().0, "first");
}

#[test]
fn it_reports_a_missing_overridden_binding() {
    let mut builder = ContainerBuilder::new();
    builder
        .bind_provider(None, |r| r.overridden_instance::<Greeting>().map(|g| Greeting(g.0.clone())))
        .unwrap();
    let container = builder.build().unwrap();

    assert!(container.instance::<Greeting>(None).unwrap_err().is_not_found());
}

#[test]
fn it_refuses_overridden_access_outside_bindings() {
    let container = ContainerBuilder::new().build().unwrap();

    assert!(matches!(container.overridden_instance::<Greeting>(), Err(Error::Configuration(_))));
}

#[test]
fn it_describes_override_chains() {
    let mut builder = ContainerBuilder::new();
    builder.bind_instance(None, 1u8).unwrap();
    builder.bind(None, Some(true), ProviderBinding::new(|_| Ok(2u8))).unwrap();
    let container = builder.build().unwrap();

    let description = container.description(true);
    let lines: Vec<_> = description.lines().collect();

    assert_eq!(lines[0], "bind<u8>() { provider { u8 } }");
    assert_eq!(lines[1].trim_start(), "overrides instance { u8 }");
    assert_eq!(Arc::strong_count(&container.instance::<u8>(None).unwrap()), 1);
}
