use criterion::{Criterion, criterion_group, criterion_main};
use goterms::{build_term_graph, AnnotationTable, Namespace, Propagator, TermGraph, TermRecord};

/// A layered ontology where every term below the root has two parents in the
/// layer above it, so closures overlap heavily.
fn layered_records(layers: usize, width: usize) -> Vec<TermRecord> {
    let id = |layer: usize, i: usize| format!("GO:{:03}{:04}", layer, i);
    let mut records = vec![TermRecord::new(&id(0, 0), "root", Namespace::BiologicalProcess)];
    for layer in 1..layers {
        let above = if layer == 1 { 1 } else { width };
        for i in 0..width {
            let record = TermRecord::new(&id(layer, i), "term", Namespace::BiologicalProcess)
                .is_a(&id(layer - 1, i % above))
                .is_a(&id(layer - 1, (i + 1) % above));
            records.push(record);
        }
    }
    records
}

fn annotations(graph: &TermGraph, genes: usize) -> AnnotationTable {
    let terms: Vec<&str> = graph.iter_terms().map(|(_, term)| term.id()).collect();
    let mut table = AnnotationTable::new();
    for gene in 0..genes {
        for offset in 0..5 {
            let term = terms[(gene * 7 + offset * 13) % terms.len()];
            table.add_annotation(&format!("gene{}", gene), term, "IDA", "taxon:9606", None);
        }
    }
    table
}

fn build_graph_benchmark(c: &mut Criterion) {
    let records = layered_records(12, 200);
    c.bench_function("build graph 12x200", |b| b.iter(|| {
        build_term_graph(records.clone()).unwrap()
    }));
}

fn propagate_benchmark(c: &mut Criterion) {
    let graph = build_term_graph(layered_records(12, 200)).unwrap();
    let table = annotations(&graph, 5_000);

    c.bench_function("propagate 5000 genes cold", |b| b.iter(|| {
        let graph = build_term_graph(layered_records(12, 200)).unwrap();
        Propagator::new(&graph).run(&table).unwrap()
    }));

    graph.precompute_closures();
    c.bench_function("propagate 5000 genes warm", |b| b.iter(|| {
        Propagator::new(&graph).run(&table).unwrap()
    }));
    c.bench_function("propagate 5000 genes warm sequential", |b| b.iter(|| {
        Propagator::new(&graph).parallel(false).run(&table).unwrap()
    }));
}

criterion_group!(benches,
    build_graph_benchmark,
    propagate_benchmark);
criterion_main!(benches);
