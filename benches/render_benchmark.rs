//! Benchmarks for the draw pipeline
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use service_depgraph::{
    DuplicateEdgePolicy, LayoutConfig, Link, Moments, PageWriter, Renderer, ServiceGraph, layout,
};

/// Layered fan-out: every service in one tier calls a few services in the next
fn generate_links(tiers: usize, width: usize) -> Vec<Link> {
    let mut links = Vec::new();
    for tier in 0..tiers - 1 {
        for i in 0..width {
            for step in 0..3 {
                let j = (i + step) % width;
                let moments = Moments::from_samples(&[1.0 + i as f64, 2.0 + j as f64, 3.5]);
                links.push(Link::new(
                    format!("svc-{}-{}", tier, i),
                    format!("svc-{}-{}", tier + 1, j),
                    moments,
                ));
            }
        }
    }
    // a few calls back up the stack
    for i in 0..width {
        links.push(Link::new(
            format!("svc-{}-{}", tiers - 1, i),
            format!("svc-0-{}", i),
            Moments::of(1.0),
        ));
    }
    links
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for width in [5, 20, 50] {
        let links = generate_links(5, width);
        group.bench_with_input(BenchmarkId::from_parameter(links.len()), &links, |b, links| {
            b.iter(|| ServiceGraph::build(black_box(links), DuplicateEdgePolicy::Aggregate));
        });
    }

    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();

    for width in [5, 20, 50] {
        let graph = ServiceGraph::build(&generate_links(5, width), DuplicateEdgePolicy::Aggregate);
        group.bench_with_input(BenchmarkId::from_parameter(graph.node_count()), &graph, |b, graph| {
            b.iter(|| layout(black_box(graph), &config));
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let graph = ServiceGraph::build(&generate_links(5, 20), DuplicateEdgePolicy::Aggregate);
    let mut renderer = Renderer::default();

    c.bench_function("render_100_services", |b| {
        b.iter(|| renderer.render(black_box(&graph)));
    });

    let diagram = renderer.render(&graph);
    c.bench_function("svg_markup_100_services", |b| {
        b.iter(|| black_box(&diagram).to_svg_string());
    });

    let writer = PageWriter::default();
    c.bench_function("page_100_services", |b| {
        b.iter(|| writer.render(black_box(&diagram)));
    });

    c.bench_function("hover_100_services", |b| {
        let mut diagram = diagram.clone();
        b.iter(|| {
            diagram.node_enter("svc-2-7");
            diagram.node_leave("svc-2-7");
        });
    });
}

criterion_group!(benches, bench_build, bench_layout, bench_render);
criterion_main!(benches);
