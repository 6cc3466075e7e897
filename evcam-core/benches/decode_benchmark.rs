//! Benchmarks for decode and extraction throughput.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use evcam_core::codec::{Evt3Encoder, MonoEncoder};
use evcam_core::{EventPacket, Session};

const N_EVENTS: u64 = 100_000;

fn synthetic_evt3() -> Vec<u8> {
    let mut encoder = Evt3Encoder::new();
    for i in 0..N_EVENTS {
        let (x, y) = ((i * 3) & 0x7FF, i & 0x1FF);
        encoder.encode_cd(i / 4, x as u16, y as u16, (i & 1) as u8);
    }
    encoder.finish()
}

fn synthetic_mono() -> Vec<u8> {
    let mut encoder = MonoEncoder::new();
    for i in 0..N_EVENTS {
        let (x, y) = ((i * 3) & 0x7FF, i & 0x1FF);
        encoder.encode_cd((i * 250) as u32, x as u16, y as u16, (i & 1) as u8);
    }
    encoder.finish()
}

fn decode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet");
    group.throughput(Throughput::Elements(N_EVENTS));

    for (encoding, payload) in [("evt3", synthetic_evt3()), ("mono", synthetic_mono())] {
        let mut session = Session::new();
        group.bench_function(format!("{}_100k_events", encoding), |b| {
            b.iter(|| {
                let packet = EventPacket {
                    encoding,
                    width: 1280,
                    height: 720,
                    time_base: 0,
                    events: black_box(&payload),
                };
                session.decode_packet(&packet).unwrap();
                black_box(session.extract_cd_events().len())
            })
        });
    }

    group.finish();
}

fn decode_until_benchmark(c: &mut Criterion) {
    let payload = synthetic_evt3();
    let mut group = c.benchmark_group("decode_until");
    group.throughput(Throughput::Elements(N_EVENTS));

    group.bench_function("evt3_10_slices", |b| {
        b.iter(|| {
            let mut session = Session::new();
            let handle = session
                .resolve_and_configure("evt3", 1280, 720, 0)
                .unwrap();
            let step = N_EVENTS / 4 / 10;
            let mut until = 0;
            loop {
                until += step;
                let progress = session.decode_until(&handle, &payload, until).unwrap();
                black_box(session.extract_cd_events().len());
                if !progress.reached_limit {
                    break;
                }
            }
        })
    });

    group.finish();
}

criterion_group!(benches, decode_benchmark, decode_until_benchmark);
criterion_main!(benches);
