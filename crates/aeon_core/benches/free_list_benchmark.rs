//! # Free List Benchmark
//!
//! Measures push/pop round trips on the lock-free free list, single-threaded
//! and with several threads recycling handles at once.

#![allow(missing_docs)]

use std::sync::Arc;

use aeon_core::{FreeList, HandleArena};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_push_pop(c: &mut Criterion) {
    let mut arena = HandleArena::new();
    let handles: Vec<_> = (0..64u32).map(|i| arena.insert(i)).collect();
    let list = FreeList::new();
    for handle in &handles {
        list.push(*handle);
    }

    c.bench_function("free_list_push_pop", |b| {
        b.iter(|| {
            let handle = list.pop().unwrap();
            list.push(black_box(handle));
        });
    });
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_list_contended");

    for threads in [2usize, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let list = Arc::new(FreeList::new());
            for i in 0..256u32 {
                list.push(i);
            }

            b.iter(|| {
                std::thread::scope(|scope| {
                    for _ in 0..threads {
                        let list = Arc::clone(&list);
                        scope.spawn(move || {
                            for _ in 0..1000 {
                                if let Some(entry) = list.pop() {
                                    list.push(black_box(entry));
                                }
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_contended);
criterion_main!(benches);
