use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use image_insight::{
    analysis::{
        characteristics::{count_edge_pixels, count_unique_colors},
        statistics::{color_histogram, dominant_colors},
    },
    hash::HashService,
};

fn sample(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        Rgb([(x ^ y) as u8, (x * 3 + y) as u8, (y * 7) as u8])
    })
}

fn bench_scans(c: &mut Criterion) {
    let small = sample(200);
    let large = DynamicImage::ImageRgb8(sample(1024));

    c.bench_function("count_unique_colors 200px", |b| {
        b.iter(|| count_unique_colors(black_box(&small)))
    });
    c.bench_function("count_edge_pixels 200px", |b| {
        b.iter(|| count_edge_pixels(black_box(&small)))
    });
    c.bench_function("color_histogram 200px", |b| {
        b.iter(|| color_histogram(black_box(&small)))
    });
    c.bench_function("dominant_colors 200px", |b| {
        b.iter(|| dominant_colors(black_box(&small), 5))
    });
    c.bench_function("perceptual_hash 1024px", |b| {
        b.iter(|| HashService::perceptual(black_box(&large)))
    });
}

criterion_group!(benches, bench_scans);
criterion_main!(benches);
