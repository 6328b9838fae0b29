use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tagstack::{ConcurrentTagStack, LocalTagStack, Query, StackCursor, Tag, TagSet, TagStack};

const ITEMS: usize = 10_000;

fn tag_sets() -> Vec<TagSet> {
    ["red", "green", "blue", "yellow"]
        .iter()
        .map(|name| Tag::set_of([*name]).expect("valid tag"))
        .collect()
}

fn filled<S: TagStack<usize>>(mut stack: S, tags: &[TagSet]) -> S {
    for value in 0..ITEMS {
        stack
            .push(value, tags[value % tags.len()].clone())
            .expect("open stack");
    }
    stack
}

fn drain<S: TagStack<usize>>(stack: &mut S, query: Query) -> usize {
    let mut cursor = stack.cursor(query).expect("open stack");
    let mut removed = 0;
    while cursor.next().is_some() {
        cursor.remove().expect("single owner");
        removed += 1;
    }
    removed
}

fn push_benchmark(c: &mut Criterion) {
    let tags = tag_sets();
    c.bench_function("local push", |b| {
        b.iter(|| black_box(filled(LocalTagStack::new(), &tags).len()))
    });
    c.bench_function("concurrent push", |b| {
        b.iter(|| black_box(filled(ConcurrentTagStack::new(), &tags).len()))
    });
}

fn query_benchmark(c: &mut Criterion) {
    let tags = tag_sets();
    let red = Query::all_tags(tags[0].clone());
    let local = filled(LocalTagStack::new(), &tags);
    let concurrent = filled(ConcurrentTagStack::new(), &tags);
    c.bench_function("local size", |b| {
        b.iter(|| black_box(TagStack::size(&local, &red).expect("open stack")))
    });
    c.bench_function("concurrent size", |b| {
        b.iter(|| black_box(concurrent.size(&red).expect("open stack")))
    });
}

fn drain_benchmark(c: &mut Criterion) {
    let tags = tag_sets();
    let red = Query::all_tags(tags[0].clone());
    c.bench_function("local drain", |b| {
        b.iter_batched(
            || filled(LocalTagStack::new(), &tags),
            |mut stack| black_box(drain(&mut stack, red.clone())),
            BatchSize::SmallInput,
        )
    });
    c.bench_function("concurrent drain", |b| {
        b.iter_batched(
            || filled(ConcurrentTagStack::new(), &tags),
            |mut stack| black_box(drain(&mut stack, red.clone())),
            BatchSize::SmallInput,
        )
    });
    c.bench_function("concurrent pop", |b| {
        b.iter_batched(
            || filled(ConcurrentTagStack::new(), &tags),
            |stack| {
                let mut popped = 0;
                while stack.pop().expect("open stack").is_some() {
                    popped += 1;
                }
                black_box(popped)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, push_benchmark, query_benchmark, drain_benchmark);
criterion_main!(benches);
