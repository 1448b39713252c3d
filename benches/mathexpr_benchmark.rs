// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compilation and evaluation benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use octofhir_mathexpr::{EngineConfig, ExpressionCacheConfig, MathEngine, Tolerance, Value};
use std::hint::black_box;

/// Test expressions of varying complexity
const TEST_EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "a + 1"),
    ("medium", "max(a, b) * 2 > b ? a : b"),
    ("complex", "((a + b) * (a + b) - sqrt(a ^ 2 + b ^ 2)) / (1 + abs(a - b)) >= 0.5"),
];

fn uncached_engine() -> MathEngine {
    MathEngine::with_config(EngineConfig {
        cache: ExpressionCacheConfig::disabled(),
        ..EngineConfig::default()
    })
    .expect("default definition is valid")
}

/// Benchmark compilation without the expression cache
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Elements(1));
    let engine = uncached_engine();

    for (complexity, expression) in TEST_EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("compile", complexity), expression, |b, expr| {
            b.iter(|| black_box(engine.compile(black_box(expr))))
        });
    }

    group.finish();
}

/// Benchmark compilation answered from the expression cache
fn bench_cached_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_compile");
    let engine = MathEngine::new();

    for (complexity, expression) in TEST_EXPRESSIONS {
        let _ = engine.compile(expression);
        group.bench_with_input(BenchmarkId::new("compile", complexity), expression, |b, expr| {
            b.iter(|| black_box(engine.compile(black_box(expr))))
        });
    }

    group.finish();
}

/// Benchmark evaluation of already compiled expressions
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(1));
    let engine = MathEngine::new();
    let tolerance = Tolerance::range(0.01);

    for (complexity, expression) in TEST_EXPRESSIONS {
        let compiled = engine.compile(expression).expect("benchmark expression compiles");
        let values: Vec<Value> = compiled
            .parameters()
            .iter()
            .enumerate()
            .map(|(i, _)| Value::from(i as i64 + 3))
            .collect();

        group.bench_with_input(BenchmarkId::new("exact", complexity), &values, |b, values| {
            b.iter(|| black_box(compiled.evaluate(black_box(values))))
        });
        group.bench_with_input(BenchmarkId::new("tolerant", complexity), &values, |b, values| {
            b.iter(|| black_box(compiled.evaluate_with_tolerance(black_box(values), &tolerance)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_cached_compile, bench_evaluate);
criterion_main!(benches);
