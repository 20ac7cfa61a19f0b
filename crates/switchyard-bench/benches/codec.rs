//! Frame codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use switchyard_bench::Drive;
use switchyard_protocol::{codec, Frame};

fn drive_frame() -> Frame {
    Frame::from_value(
        "drive",
        &Drive {
            throttle: 120,
            steering: -30,
            brake: false,
        },
    )
    .unwrap()
}

/// JSON text encoding and decoding.
fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_text");
    let frame = drive_frame();
    let text = codec::encode_text(&frame).unwrap();
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("encode", |b| b.iter(|| codec::encode_text(black_box(&frame))));
    group.bench_function("decode", |b| b.iter(|| codec::decode_text(black_box(&text))));

    group.finish();
}

/// Length-prefixed MessagePack encoding and decoding.
fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_binary");
    let frame = drive_frame();
    let encoded = codec::encode(&frame).unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode", |b| b.iter(|| codec::encode(black_box(&frame))));
    group.bench_function("decode", |b| b.iter(|| codec::decode(black_box(&encoded))));

    group.finish();
}

/// Frame body into a typed message.
fn bench_into_value(c: &mut Criterion) {
    let frame = drive_frame();
    c.bench_function("frame_into_drive", |b| {
        b.iter(|| black_box(frame.clone()).into_value::<Drive>())
    });
}

criterion_group!(benches, bench_text, bench_binary, bench_into_value);
criterion_main!(benches);
