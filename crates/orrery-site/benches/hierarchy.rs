//! Benchmarks for page building and hierarchy resolution.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use orrery_config::{LayoutConfig, TypeTables};
use orrery_site::{HierarchyResolver, PageConfig, PageConfigBuilder, TemplateRenderer};

/// Build `count` pages arranged as a tree with the given fan-out.
fn tree_pages(count: usize, breadth: usize) -> Vec<PageConfig> {
    let builder = PageConfigBuilder::new(TypeTables::default(), &LayoutConfig::default());
    (0..count)
        .map(|i| {
            let parent = if i == 0 {
                String::new()
            } else {
                format!("page-{}", (i - 1) / breadth)
            };
            let source = format!(
                "<meta name=\"orrery:parent\" content=\"{parent}\">\n<h1>Page {i}</h1>"
            );
            builder.build(&format!("page-{i}.html"), &source, i, count)
        })
        .collect()
}

/// Pages forming one long parent cycle.
fn ring_pages(count: usize) -> Vec<PageConfig> {
    let mut pages = tree_pages(count, 1);
    pages[0].parent = format!("page-{}", count - 1);
    pages
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for count in [100, 1_000, 10_000] {
        let pages = tree_pages(count, 4);
        group.bench_with_input(BenchmarkId::new("tree", count), &pages, |b, pages| {
            b.iter_with_setup(|| pages.clone(), |mut pages| HierarchyResolver::resolve(&mut pages))
        });

        let pages = ring_pages(count);
        group.bench_with_input(BenchmarkId::new("ring", count), &pages, |b, pages| {
            b.iter_with_setup(|| pages.clone(), |mut pages| HierarchyResolver::resolve(&mut pages))
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let builder = PageConfigBuilder::new(TypeTables::default(), &LayoutConfig::default());
    let source = r#"---
title: Billing
level: billing
parent: platform
tags: payments, core
---
<meta name="orrery:type" content="planet">
<h1>Billing</h1>
"#;
    let mut pages = tree_pages(200, 4);
    HierarchyResolver::resolve(&mut pages);
    let renderer = TemplateRenderer::for_batch(&pages, "html");

    let mut group = c.benchmark_group("page");

    group.bench_function("build", |b| {
        b.iter(|| builder.build("billing.md", source, 7, 20))
    });

    group.bench_function("render", |b| b.iter(|| renderer.render(&pages[1])));

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_build_and_render);
criterion_main!(benches);
