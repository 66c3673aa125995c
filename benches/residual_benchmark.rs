use criterion::{black_box, criterion_group, criterion_main, Criterion};
use photo_error::residual_test_utils::{grid_pixels, scene_from_pixels, textured_image};
use photo_error::*;

fn criterion_benchmark(c: &mut Criterion) {
    let size = ImageSize::new(480, 640).unwrap();
    let data = textured_image(size);
    let image = Image::from_contiguous(&data, size.rows, size.cols).unwrap();

    let pixels = grid_pixels(size, 3, 0);
    let (p, points) = scene_from_pixels(size, &pixels);
    let reference = vec![100.0; points.len()];
    let mut residuals = vec![0.0; points.len()];
    println!("{} points", points.len());

    let mut projector = Projector::new();
    c.bench_function("projector init", |b| {
        b.iter(|| projector.init(black_box(&p), black_box(&points), size));
    });

    for path in [ExecutionPath::Scalar, ExecutionPath::Wide] {
        let evaluator = ResidualEvaluator::new(path);
        c.bench_function(&format!("residuals {:?}", path), |b| {
            b.iter(|| {
                evaluator.run(
                    &projector,
                    black_box(&reference),
                    black_box(&image),
                    &mut residuals,
                )
            });
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
