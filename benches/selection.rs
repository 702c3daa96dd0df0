//! Benchmarks for inlining decisions.
//!
//! Measures the hot paths of a profile-guided inlining run on synthetic
//! programs:
//! - Building the call graph index from a static profile
//! - Selecting the best call site
//! - A complete pass driven by the scheduler

extern crate profinline;

use std::{collections::HashMap, hint::black_box};

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use profinline::{compiler::Selector, prelude::*};

/// Builds a layered module: every function of layer `n` calls `fan_out`
/// functions of layer `n + 1`, from blocks of varying weight.
fn layered_module(layers: usize, width: usize, fan_out: usize) -> Module {
    let mut module = Module::new();
    let mut previous: Vec<FunctionId> = Vec::new();

    for layer in 0..layers {
        let current: Vec<FunctionId> = (0..width)
            .map(|i| module.add_function(format!("l{layer}_{i}")))
            .collect();

        for (i, &function) in current.iter().enumerate() {
            let entry = module.entry(function).unwrap();
            for _ in 0..(4 + i % 7) {
                module.push(entry, Instruction::Op).unwrap();
            }
            if layer == 0 {
                module.set_root(function, 10_000).unwrap();
            }
        }

        for (i, &caller) in previous.iter().enumerate() {
            for k in 0..fan_out {
                let weight = u32::try_from(100 + (i * 37 + k * 113) % 900).unwrap();
                let block = module.add_block(caller, weight).unwrap();
                let callee = current[(i + k) % width];
                module.push(block, Instruction::Call(callee)).unwrap();
            }
        }
        previous = current;
    }
    module
}

fn bench_index_build(c: &mut Criterion) {
    let module = layered_module(8, 64, 4);
    let profile = StaticProfiler::default().profile(&module).unwrap();

    c.bench_function("index_build_8x64", |b| {
        b.iter(|| {
            let index = CallGraphIndex::build(black_box(&module), &profile).unwrap();
            black_box(index)
        });
    });
}

fn bench_select_best(c: &mut Criterion) {
    let module = layered_module(8, 64, 4);
    let profile = StaticProfiler::default().profile(&module).unwrap();
    let index = CallGraphIndex::build(&module, &profile).unwrap();
    let constraints = InlineConfig::default().constraints().unwrap();
    let counts = HashMap::new();

    c.bench_function("select_best_8x64", |b| {
        b.iter(|| {
            let selector = Selector::new(&index, &constraints, black_box(500), &counts);
            black_box(selector.select_best())
        });
    });
}

fn bench_full_pass(c: &mut Criterion) {
    let module = layered_module(6, 32, 3);

    c.bench_function("full_pass_6x32", |b| {
        b.iter_batched(
            || module.clone(),
            |mut module| {
                let profile = StaticProfiler::default().profile(&module).unwrap();
                let constraints = InlineConfig::default().constraints().unwrap();
                let mut state =
                    PolicyState::analyze(constraints, &module, &profile, &InstructionCount)
                        .unwrap();

                let mut profiler = StaticProfiler::default();
                let mut simplifier = DeadFunctionElimination::new();
                let mut collaborators: Collaborators<'_, Module> = Collaborators {
                    profiler: &mut profiler,
                    simplifier: &mut simplifier,
                    size_metric: &InstructionCount,
                };
                let outcome = InlineScheduler::default()
                    .run(
                        &mut module,
                        &mut state,
                        &mut CloneInliner::new(),
                        &mut collaborators,
                    )
                    .unwrap();
                black_box(outcome)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_index_build,
    bench_select_best,
    bench_full_pass
);
criterion_main!(benches);
