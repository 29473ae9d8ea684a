//! Criterion benchmarks for resizing and encoding.
//!
//! Run with: `cargo bench --bench resize`

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use image::{DynamicImage, RgbaImage};
use std::hint::black_box;
use std::sync::Arc;

use pixgrid::image::{IdAllocator, Image, ResizeRequest};
use pixgrid::models::Size;
use pixgrid::protocol::{Codec, Command, Control, Medium};
use pixgrid::terminal::Metrics;

fn bitmap(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize");
    let metrics = Metrics::new(200, 50, 2000, 1000);
    let ids = Arc::new(IdAllocator::new(1..=u32::MAX));
    let request = ResizeRequest::within(Size::Px(256), Size::Px(256));

    group.bench_function("cold_1024_to_256", |b| {
        b.iter_batched(
            || Image::from_bitmap(bitmap(1024, 768), Arc::clone(&ids)).unwrap(),
            |image| image.resize(black_box(&request), &metrics).unwrap(),
            BatchSize::SmallInput,
        );
    });

    let cached = Image::from_bitmap(bitmap(1024, 768), Arc::clone(&ids)).unwrap();
    cached.resize(&request, &metrics).unwrap();
    group.bench_function("cached_1024_to_256", |b| {
        b.iter(|| cached.resize(black_box(&request), &metrics).unwrap());
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let codec = Codec::default();
    let payload = vec![0x5au8; 256 * 1024];
    let command = Command::new()
        .with(Control::Medium(Medium::Direct))
        .with(Control::Id(7))
        .with_payload(payload.clone());

    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("direct_256k_chunked", |b| {
        b.iter(|| codec.encode(black_box(&command)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_resize, bench_encode);
criterion_main!(benches);
