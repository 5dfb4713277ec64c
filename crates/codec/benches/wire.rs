use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ravennakit_codec::{ptp, rtp};

fn criterion_benchmark(c: &mut Criterion) {
    // A 1 ms stereo L24 AES67 packet: 12 byte header + 288 byte payload.
    let mut rtp_packet = vec![0u8; 300];
    rtp_packet[0] = 0x80;
    rtp_packet[1] = 0x61;

    #[rustfmt::skip]
    let sync_packet = [
        0x00u8, 0x02, 0x00, 0x2c, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1d,
        0xc1, 0xff, 0xfe, 0x07, 0x08, 0x09, 0x00, 0x01, 0x04, 0xd2, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    let mut wire_criterion = c.benchmark_group("wire");

    wire_criterion.throughput(Throughput::Elements(1));
    wire_criterion.bench_function("rtp_view", |bencher| {
        bencher.iter(|| {
            let view = rtp::PacketView::new(&rtp_packet).unwrap();
            (view.sequence_number(), view.timestamp(), view.ssrc())
        })
    });

    wire_criterion.bench_function("ptp_header", |bencher| {
        bencher.iter(|| ptp::MessageHeader::from_bytes(&sync_packet).unwrap())
    });

    wire_criterion.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
