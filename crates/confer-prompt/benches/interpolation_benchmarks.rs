//! Benchmark tests for prompt interpolation throughput.
//!
//! Interpolation runs on every chat turn, between the user pressing send
//! and the assistant call going out, so a single pass must stay far below
//! a millisecond even for templates much larger than the shipped cards.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use confer_core::types::BusinessProfile;
use confer_prompt::{interpolate_with_query, BUILTIN_CARDS};

fn full_profile() -> BusinessProfile {
    [
        ("company_name", "Acme Logistics"),
        ("industry", "freight"),
        ("years_active", "12"),
        ("focus", "regional delivery"),
    ]
    .into_iter()
    .collect()
}

/// A template `factor` times the size of the largest shipped card, with the
/// same placeholder density.
fn oversized_template(factor: usize) -> String {
    let base = BUILTIN_CARDS
        .iter()
        .map(|card| card.template)
        .max_by_key(|t| t.len())
        .unwrap();
    let mut out = String::with_capacity(base.len() * factor);
    for _ in 0..factor {
        out.push_str(base);
        out.push('\n');
    }
    out
}

/// Placeholder-free text of comparable size (baseline scan cost).
fn clean_text(factor: usize) -> String {
    "A paragraph with no substitutions in it at all, scanned end to end. "
        .repeat(factor * 6)
}

fn bench_interpolation(c: &mut Criterion) {
    let profile = full_profile();
    let oversized = oversized_template(100);
    let clean = clean_text(100);

    let mut group = c.benchmark_group("interpolation");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("builtin_card", |b| {
        b.iter(|| {
            interpolate_with_query(BUILTIN_CARDS[0].template, &profile, "Need a launch plan")
        });
    });

    group.bench_function("oversized_template_100x", |b| {
        b.iter(|| interpolate_with_query(&oversized, &profile, "Need a launch plan"));
    });

    group.bench_function("clean_text_100x", |b| {
        b.iter(|| interpolate_with_query(&clean, &profile, "Need a launch plan"));
    });

    group.finish();
}

criterion_group!(benches, bench_interpolation);
criterion_main!(benches);
