#![allow(
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use templet::{Context, TempletEngine, TempletInterface, Template};

mod utils;

fn templet_benchmark(c: &mut Criterion) {
    let mut engine = TempletEngine::new();

    let template_content = include_str!("template_templet.html");
    engine.add_template("profile", template_content).unwrap();

    // Generate 100 random contexts
    let contexts: Vec<Context> = utils::generate_random_contexts(100)
        .into_iter()
        .map(|json| serde_json::from_value(json).unwrap())
        .collect();

    utils::print_binary_size();

    let mut group = c.benchmark_group("Template Rendering");
    group.sample_size(50);

    group.bench_function("templet_render", |b| {
        b.iter(|| {
            for context in &contexts {
                black_box(engine.render("profile", Some(context)).unwrap());
            }
        });
    });

    group.bench_function("templet_compile", |b| {
        b.iter(|| black_box(Template::new(black_box(template_content)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, templet_benchmark);
criterion_main!(benches);
