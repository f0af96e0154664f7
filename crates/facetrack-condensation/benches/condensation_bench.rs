//! Benchmarks for the per-frame hot path of the condensation tracker.
//!
//! Run with: cargo bench -p facetrack-condensation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facetrack_classification::{
    Kernel, ProbabilisticSvmClassifier, ProbabilisticWvmClassifier, Sigmoid, SvmModelDescription,
    WvmModelDescription,
};
use facetrack_condensation::{
    ImageSize, LowVarianceSampling, MeasurementModel, ResamplingAlgorithm, ResamplingSampler,
    Sampler, SimpleTransitionModel, WvmSvmModel,
};
use facetrack_core::{DirectPatchExtractor, GrayImage, Sample, SampleContext};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const PATCH: u32 = 8;

fn frame() -> Arc<GrayImage> {
    let mut image = GrayImage::new(320, 240);
    image.fill_rect(140, 100, 40, 40, 1.0);
    Arc::new(image)
}

fn cascade() -> WvmSvmModel {
    let dims = (PATCH * PATCH) as usize;
    let mean = vec![1.0 / dims as f32; dims];
    let wvm = ProbabilisticWvmClassifier::from_description(WvmModelDescription {
        kernel: Kernel::Linear,
        vectors: vec![mean.clone()],
        coefficients: vec![1.0],
        level_thresholds: vec![0.3],
        bias: 0.0,
        sigmoid: Sigmoid { a: -10.0, b: 5.0 },
    })
    .unwrap();
    let svm = ProbabilisticSvmClassifier::from_description(SvmModelDescription {
        kernel: Kernel::Rbf { gamma: 0.05 },
        support_vectors: vec![vec![1.0; dims], vec![0.0; dims]],
        coefficients: vec![1.0, -1.0],
        bias: 0.0,
        threshold: 0.0,
        sigmoid: Sigmoid { a: -4.0, b: 0.0 },
    })
    .unwrap();
    WvmSvmModel::new(
        Box::new(DirectPatchExtractor::new(PATCH, PATCH).unwrap()),
        Box::new(wvm),
        Box::new(svm),
        0.01,
    )
    .unwrap()
}

fn particles(ctx: &mut SampleContext, rng: &mut StdRng) -> Vec<Sample> {
    ResamplingSampler::new(800, 0.35, 20, 80, SimpleTransitionModel::default())
        .unwrap()
        .create_samples(ctx, &[], ImageSize::new(320, 240), rng)
}

fn bench_resampling(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut ctx = SampleContext::default();
    let mut samples = particles(&mut ctx, &mut rng);
    for (i, sample) in samples.iter_mut().enumerate() {
        sample.weight = (i % 17) as f64;
    }

    c.bench_function("low_variance_resample_800", |bencher| {
        bencher.iter(|| LowVarianceSampling.resample(black_box(&samples), 800, &mut rng));
    });
}

fn bench_sampler(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let mut ctx = SampleContext::default();
    let previous = particles(&mut ctx, &mut rng);
    let sampler =
        ResamplingSampler::new(800, 0.35, 20, 80, SimpleTransitionModel::default()).unwrap();

    c.bench_function("resampling_sampler_800", |bencher| {
        bencher.iter(|| {
            sampler.create_samples(
                &mut ctx,
                black_box(&previous),
                ImageSize::new(320, 240),
                &mut rng,
            )
        });
    });
}

fn bench_cascade(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let mut ctx = SampleContext::default();
    let mut samples = particles(&mut ctx, &mut rng);
    let mut duplicated = vec![Sample::new(160, 120, 40, 0); 800];
    let mut model = cascade();
    let image = frame();

    c.bench_function("cascade_evaluate_800_distinct", |bencher| {
        bencher.iter(|| {
            model.update(Arc::clone(&image));
            model.evaluate(&ctx, black_box(&mut samples));
        });
    });

    c.bench_function("cascade_evaluate_800_cached", |bencher| {
        bencher.iter(|| {
            model.update(Arc::clone(&image));
            model.evaluate(&ctx, black_box(&mut duplicated));
        });
    });
}

criterion_group!(benches, bench_resampling, bench_sampler, bench_cascade);
criterion_main!(benches);
