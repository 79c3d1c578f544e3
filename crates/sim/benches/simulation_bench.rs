use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phylosse_sim::evolution::{Rate, RateModel};
use phylosse_sim::simulation::DnSseBuilder;
use phylosse_sim::tree::AnnotatedTree;

fn bd_model() -> RateModel {
    RateModel::single_epoch(
        2,
        vec![
            Rate::speciation(0, 1.0),
            Rate::speciation(1, 0.5),
            Rate::extinction(0, 0.2),
            Rate::extinction(1, 0.4),
            Rate::transition(0, 1, 0.1),
            Rate::transition(1, 0, 0.1),
        ],
    )
    .unwrap()
}

fn bench_dn_sse_age(c: &mut Criterion) {
    let mut group = c.benchmark_group("dn_sse_age");

    for &age in &[2.0, 4.0, 6.0] {
        let sim = DnSseBuilder::new()
            .n_samples(1)
            .n_repeats(16)
            .rate_model(bd_model())
            .start_state(0)
            .stop_age(age)
            .origin(true)
            .seed(42)
            .build()
            .unwrap();

        group.throughput(Throughput::Elements(16));
        group.bench_with_input(BenchmarkId::from_parameter(age), &sim, |b, sim| {
            b.iter(|| black_box(sim.simulate().unwrap()))
        });
    }

    group.finish();
}

fn bench_dn_sse_taxa(c: &mut Criterion) {
    let mut group = c.benchmark_group("dn_sse_taxa");

    for &taxa in &[50.0, 200.0, 1000.0] {
        let sim = DnSseBuilder::new()
            .n_samples(1)
            .n_repeats(8)
            .rate_model(bd_model())
            .start_state(0)
            .stop_taxa(taxa)
            .origin(false)
            .condition_on_survival(true)
            .seed(7)
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(taxa), &sim, |b, sim| {
            b.iter(|| black_box(sim.simulate().unwrap()))
        });
    }

    group.finish();
}

fn bench_tree_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_io");

    let tree = DnSseBuilder::new()
        .n_samples(1)
        .rate_model(bd_model())
        .start_state(0)
        .stop_taxa(500.0)
        .origin(true)
        .condition_on_survival(true)
        .seed(3)
        .build()
        .unwrap()
        .simulate()
        .unwrap()
        .into_trees()
        .remove(0);
    let newick = tree.newick().to_string();

    group.bench_function("write_newick", |b| {
        b.iter(|| black_box(tree.to_newick(&Default::default())))
    });
    group.bench_function("parse_newick", |b| {
        b.iter(|| black_box(AnnotatedTree::from_newick(black_box(&newick), 2, 1e-9).unwrap()))
    });
    group.bench_function("reconstructed", |b| {
        b.iter(|| black_box(tree.reconstructed().unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_dn_sse_age, bench_dn_sse_taxa, bench_tree_io);
criterion_main!(benches);
