use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feature_engine::{FeatureExtractor, MinMaxScaler};
use window_buffer::{Sample, Window};

fn bench_extract(c: &mut Criterion) {
    let window = Window::new(
        (0..30)
            .map(|i| {
                let t = i as f64 * 0.2;
                Sample::new(t.sin(), t.cos(), 0.98 + 0.01 * t.sin())
            })
            .collect(),
    );
    let scaler = MinMaxScaler::new([-1.0, -1.0, 0.9], [1.0, 1.0, 1.1]).unwrap();
    let extractor = FeatureExtractor::new(30);

    c.bench_function("scale_and_extract_30", |b| {
        b.iter(|| extractor.extract(&scaler.transform_window(black_box(&window))))
    });
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
