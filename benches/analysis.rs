//! Benchmarks for regex-audit
//!
//! Each benchmark parses once outside the loop and builds a fresh
//! `AnalysisContext` per iteration, so the per-node caches start cold.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regex_audit::{parse_literal, AnalysisContext, AnalysisOptions};

// Typical patterns from lint corpora
const EMAIL: &str = r"/^[\w.+-]+@(?:[a-z0-9-]+\.)+[a-z]{2,}$/i";
const DATE: &str = r"/^(?:\d{4}-\d{2}-\d{2}|\d{2}\/\d{2}\/\d{4}|\d{1,2}\.\d{1,2}\.\d{4})$/";
const KEYWORDS: &str = r"/\b(?:if|else|for|while|do|switch|case|break|continue|return|function|var|let|const|foo|for)\b/";
const NESTED: &str = r"/(?:(?:a|b)+c|(?:ab|ba)*d|[a-d]+)e/";

fn bench_duplications(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplications");
    for (name, literal) in [("date", DATE), ("keywords", KEYWORDS), ("nested", NESTED)] {
        let ast = parse_literal(literal).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &ast, |b, ast| {
            b.iter(|| {
                let ctx = AnalysisContext::new(ast, AnalysisOptions::default());
                black_box(ctx.duplications())
            })
        });
    }
    group.finish();
}

fn bench_backtracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtracking");
    for (name, literal) in [
        ("email", EMAIL),
        ("self_loop", r"/^(?:\w+\s?)+$/"),
        ("trade", r"/\d+\.?\d*\w*$/"),
    ] {
        let ast = parse_literal(literal).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &ast, |b, ast| {
            b.iter(|| {
                let ctx = AnalysisContext::new(ast, AnalysisOptions::default());
                black_box(ctx.backtracking())
            })
        });
    }
    group.finish();
}

fn bench_absorptions(c: &mut Criterion) {
    let ast = parse_literal(r"/\d*\d{0,3}(?:x\d*){1,3}\d{0,2}/").unwrap();

    c.bench_function("absorptions", |b| {
        b.iter(|| {
            let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
            black_box(ctx.absorptions())
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_keywords", |b| {
        b.iter(|| parse_literal(black_box(KEYWORDS)).unwrap())
    });
}

fn bench_tight_budget(c: &mut Criterion) {
    let ast = parse_literal(r"/(?:a{40}|a{40}b?|(?:a{20}){2}c)d/").unwrap();
    let options = AnalysisOptions {
        node_budget: 64,
        ..AnalysisOptions::default()
    };

    c.bench_function("duplications_tight_budget", |b| {
        b.iter(|| {
            let ctx = AnalysisContext::new(&ast, options.clone());
            black_box(ctx.duplications())
        })
    });
}

criterion_group!(
    benches,
    bench_duplications,
    bench_backtracking,
    bench_absorptions,
    bench_parse,
    bench_tight_budget,
);
criterion_main!(benches);
