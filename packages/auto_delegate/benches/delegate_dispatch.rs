//! Dispatch cost of `Function` against `Box<dyn FnMut>` and of multicast invocation across
//! receiver policies.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::cell::Cell;
use std::hint::black_box;
use std::pin::Pin;
use std::rc::Rc;

use auto_delegate::{
    AutoDelegateContainer, Function, MulticastDelegate, Reflect, Reflector, WeakDelegateContainer,
};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const RECEIVER_COUNT: usize = 32;

struct Sink {
    total: Cell<u64>,
    reflector: Reflector,
}

impl Sink {
    fn new() -> Self {
        Self {
            total: Cell::new(0),
            reflector: Reflector::new(),
        }
    }

    fn accept(&self, value: u64) {
        self.total.set(self.total.get().wrapping_add(value));
    }
}

// SAFETY: The reflector is a field of the sink, which is not Unpin. No other
// field invokes a delegate when dropped.
unsafe impl Reflect for Sink {
    fn reflector(&self) -> &Reflector {
        &self.reflector
    }
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("function_dispatch");

    let small = [1_u64; 2];
    let mut inline = Function::<(u64,), u64>::new(move |x: u64| x.wrapping_add(small[0]));
    group.bench_function("function_inline", |b| {
        b.iter(|| inline.invoke(black_box((7,))));
    });

    let large = [1_u64; 16];
    let mut boxed = Function::<(u64,), u64>::new(move |x: u64| x.wrapping_add(large[15]));
    group.bench_function("function_heap", |b| {
        b.iter(|| boxed.invoke(black_box((7,))));
    });

    let mut dyn_fn: Box<dyn FnMut(u64) -> u64> = Box::new(move |x: u64| x.wrapping_add(small[1]));
    group.bench_function("box_dyn_fnmut", |b| {
        b.iter(|| dyn_fn(black_box(7)));
    });

    group.bench_function("function_construct_inline", |b| {
        b.iter(|| Function::<(u64,), u64>::new(move |x: u64| x.wrapping_add(small[0])));
    });

    group.finish();

    let mut group = c.benchmark_group("multicast_invoke");

    let sinks: Vec<Pin<Box<Sink>>> = (0..RECEIVER_COUNT).map(|_| Box::pin(Sink::new())).collect();

    let tracked = AutoDelegateContainer::<(u64,)>::new();
    for sink in &sinks {
        tracked.bind_tracked(sink.as_ref(), Sink::accept);
    }
    group.bench_function("tracked", |b| {
        b.iter(|| tracked.invoke(black_box((3,))));
    });

    let shared_sinks: Vec<Rc<Sink>> = (0..RECEIVER_COUNT).map(|_| Rc::new(Sink::new())).collect();

    let weak = WeakDelegateContainer::<(u64,)>::new();
    for sink in &shared_sinks {
        weak.bind_weak(&Rc::downgrade(sink), Sink::accept);
    }
    group.bench_function("weak", |b| {
        b.iter(|| weak.invoke(black_box((3,))));
    });

    let free = MulticastDelegate::<(u64,)>::new();
    for sink in &shared_sinks {
        let sink = Rc::clone(sink);
        free.bind(move |value: u64| sink.accept(value));
    }
    group.bench_function("free_closures", |b| {
        b.iter(|| free.invoke(black_box((3,))));
    });

    group.bench_function("bind_and_drop_tracked", |b| {
        b.iter(|| {
            let delegate = AutoDelegateContainer::<(u64,)>::new();
            for sink in &sinks {
                delegate.bind_tracked(sink.as_ref(), Sink::accept);
            }
            delegate
        });
    });

    group.finish();

    drop(tracked);
    drop(sinks);
}
