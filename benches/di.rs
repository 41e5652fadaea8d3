#![allow(missing_docs)]

use diorama::{ContainerBuilder, ContextTranslator};
use criterion::{criterion_group, criterion_main, Criterion};
use std::{hint::black_box, sync::Arc};

struct Config(u32);
struct Service(Arc<Config>);
struct Request(u32);
struct Session(u32);

fn benchmark(c: &mut Criterion) {
    let mut builder = ContainerBuilder::new();
    builder.bind_singleton(None, |_| Ok(Config(1))).unwrap();
    builder.bind_provider(None, |r| Ok(Service(r.instance(None)?))).unwrap();
    builder.bind_multiton(None, |_, n: u32| Ok(Config(n))).unwrap();
    builder.register_context_translator(ContextTranslator::new(|r: &Request| Session(r.0)));
    builder
        .bind(
            None,
            None,
            diorama::binding::ProviderBinding::new(|r| Ok(r.context_value::<Session>().map_or(0, |s| s.0)))
                .on_context::<Session>(),
        )
        .unwrap();
    let container = builder.build().unwrap();

    c.bench_function("singleton", |b| b.iter(|| {
        black_box(container.instance::<Config>(None).unwrap());
    }));
    c.bench_function("provider", |b| b.iter(|| {
        black_box(container.instance::<Service>(None).unwrap());
    }));
    c.bench_function("multiton", |b| b.iter(|| {
        black_box(container.instance_with::<u32, Config>(None, 7).unwrap());
    }));
    c.bench_function("translated context", |b| b.iter(|| {
        black_box(container.on(Request(3)).instance::<u32>(None).unwrap());
    }));
    c.bench_function("not found", |b| b.iter(|| {
        black_box(container.instance_or_none::<String>(None).unwrap());
    }));
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
