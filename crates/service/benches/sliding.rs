use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ravennakit_service::rtp::PacketStats;
use ravennakit_service::sliding::SlidingStats;

fn criterion_benchmark(c: &mut Criterion) {
    let mut sliding_criterion = c.benchmark_group("sliding");

    let mut stats = SlidingStats::new(1024);
    let mut i = 0.0;

    sliding_criterion.throughput(Throughput::Elements(1));
    sliding_criterion.bench_function("add", |bencher| {
        bencher.iter(|| {
            stats.add(i);
            i += 1.0;
        })
    });

    sliding_criterion.bench_function("mean_min_max", |bencher| {
        bencher.iter(|| (stats.mean(), stats.min(), stats.max()))
    });

    sliding_criterion.finish();

    let mut packet_criterion = c.benchmark_group("packet_stats");

    let mut stats = PacketStats::default();
    let mut seq = 0u16;

    packet_criterion.throughput(Throughput::Elements(1));
    packet_criterion.bench_function("update_in_order", |bencher| {
        bencher.iter(|| {
            seq = seq.wrapping_add(1);
            stats.update(seq)
        })
    });

    packet_criterion.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
