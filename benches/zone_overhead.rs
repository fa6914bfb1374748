use std::hint::black_box;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use zonemark::Owner;

/// cargo bench --bench zone_overhead
fn zone_overhead(criterion: &mut Criterion) {
    zonemark::init();

    let mut group = criterion.benchmark_group("zone_overhead");
    group.bench_function("enter_exit", |bencher| {
        bencher.iter(|| {
            let zone = zonemark::zone!(MethodLookupFast, "bench");
            black_box(&zone);
        });
    });
    group.bench_function("enter_exit_annotated", |bencher| {
        bencher.iter(|| {
            let zone = zonemark::zone!(TypeCacheLookup, "bench");
            zone.annotate("Tuple{Int64, String}");
            black_box(&zone);
        });
    });
    group.bench_function("mask_check", |bencher| {
        bencher.iter(|| black_box(zonemark::is_enabled(Owner::Gc)));
    });
    group.finish();

    #[cfg(feature = "counts")]
    eprintln!("{}", zonemark::CountsReport::capture());
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = zone_overhead
}

criterion_main!(benches);
