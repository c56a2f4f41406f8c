//! Benchmarks for adapter generation throughput

use compiler::adapter::{generate_adapter_classes, DesugarAdapterResolver};
use compiler::classfile::ClassFileOptions;
use compiler::deliver::AdapterBundleBuilder;
use compiler::langmodel::{InvocationKind, InvocationSiteRecord, MethodInvocationSite, MethodKey};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const DESCRIPTORS: [&str; 4] = [
    "(Ljava/time/Instant;)V",
    "(IJLjava/time/Duration;)Ljava/time/Instant;",
    "()J",
    "(Ljava/lang/String;D)Ljava/time/ZoneId;",
];

/// `sites` call sites spread over `sites / 8` owners.
fn generate_record(sites: usize) -> InvocationSiteRecord {
    (0..sites)
        .map(|i| {
            let owner = format!("android/gen/Owner{}", i / 8);
            let method = MethodKey::parse(&owner, &format!("call{}", i), DESCRIPTORS[i % DESCRIPTORS.len()])
                .expect("valid site");
            let kind = if i % 3 == 0 {
                InvocationKind::Static
            } else {
                InvocationKind::Virtual
            };
            MethodInvocationSite::new(kind, method, false)
        })
        .collect()
}

fn benchmark_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_adapter_classes");
    let resolver = DesugarAdapterResolver::default();
    let options = ClassFileOptions::default();

    for sites in [16, 256, 4096] {
        let record = generate_record(sites);
        group.bench_with_input(BenchmarkId::from_parameter(sites), &record, |b, record| {
            b.iter(|| {
                let artifacts = generate_adapter_classes(black_box(record), &resolver, &options)
                    .expect("generation succeeds");
                let bytes: usize = artifacts.iter().map(|a| a.content().len()).sum();
                black_box(bytes)
            });
        });
    }
    group.finish();
}

fn benchmark_bundle(c: &mut Criterion) {
    let record = generate_record(1024);
    let artifacts = generate_adapter_classes(
        &record,
        &DesugarAdapterResolver::default(),
        &ClassFileOptions::default(),
    )
    .expect("generation succeeds");

    c.bench_function("bundle_1024_sites", |b| {
        b.iter(|| {
            let mut builder = AdapterBundleBuilder::new();
            for artifact in &artifacts {
                builder.add_artifact(artifact).expect("unique paths");
            }
            black_box(builder.to_bytes().expect("bundle serializes"))
        });
    });
}

criterion_group!(benches, benchmark_generation, benchmark_bundle);
criterion_main!(benches);
