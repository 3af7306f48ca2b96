//! Checker benchmarks: whole-program checking and shape descriptor parsing.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use typtag::checker::parse_shape;
use typtag::{CheckConfig, check_source};

/// A program with `n` functions, each called once with literal arguments.
/// Parameter types are inferred from the calls, so every size takes more
/// than one pass.
fn call_chain_source(n: usize) -> String {
    let mut source = String::from("var total = number`0`;\n");
    for i in 0..n {
        source.push_str(&format!(
            "function f{i}(a, b) {{\n    var c = a * b;\n    if (c > {i}) {{\n        return c;\n    }}\n    return a + b;\n}}\n"
        ));
    }
    for i in 0..n {
        source.push_str(&format!("total = f{i}({i}, 2);\n"));
    }
    source
}

/// A program of `n` tagged array bindings with literal reassignments.
fn tagged_arrays_source(n: usize) -> String {
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!(
            "var xs{i} = array`<int,string>[]`;\nxs{i} = [[{i}, \"a\"], [2, \"b\"]];\nvar s{i} = string`item ${{\"{i}\"}}`;\n"
        ));
    }
    source
}

fn bench_check(c: &mut Criterion) {
    let config = CheckConfig::default();
    let mut group = c.benchmark_group("check");

    for n in [10, 100, 500] {
        let source = call_chain_source(n);
        group.bench_with_input(BenchmarkId::new("call_chain", n), &source, |b, source| {
            b.iter(|| check_source("bench.js", black_box(source), &config).unwrap())
        });

        let source = tagged_arrays_source(n);
        group.bench_with_input(BenchmarkId::new("tagged_arrays", n), &source, |b, source| {
            b.iter(|| check_source("bench.js", black_box(source), &config).unwrap())
        });
    }

    group.finish();
}

fn bench_parse_shape(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_shape");

    for descriptor in ["int[]", "<int,string[]>[+]", "((<bool,<int,finite[]>[],Point>[])[+])[]"] {
        group.bench_with_input(BenchmarkId::from_parameter(descriptor), descriptor, |b, descriptor| {
            b.iter(|| parse_shape(black_box(descriptor)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check, bench_parse_shape);
criterion_main!(benches);
