use criterion::{black_box, criterion_group, criterion_main, Criterion};
use composite_blur::gpu::backend::TextureFormat;
use composite_blur::gpu::cpu::{CpuBackend, CpuImage};
use composite_blur::kernel::Kernel;
use composite_blur::{CompositeBlurFilter, FrameInputs, Settings};
use glam::Vec4;

fn kernel_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_new");

    for radius in [1.0_f32, 10.0, 41.0, 83.3].iter() {
        group.bench_function(format!("radius_{radius}"), |b| {
            b.iter(|| black_box(Kernel::new(black_box(*radius))))
        });
    }

    group.finish();
}

fn cpu_frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_frame");

    for (name, algorithm, key, value) in [
        ("gaussian_r10", 1, "radius", 10.0),
        ("kawase_3_5", 3, "kawase_passes", 3.5),
    ] {
        let mut settings = Settings::with_defaults();
        settings.set_int("blur_algorithm", algorithm);
        settings.set_int("blur_type", 1);
        settings.set_double(key, value);

        let mut backend = CpuBackend::new();
        let source = backend.upload(CpuImage::filled(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            Vec4::new(0.2, 0.4, 0.6, 1.0),
        ));
        let inputs = FrameInputs::new(source);
        let mut filter = CompositeBlurFilter::create(&settings);

        group.bench_function(name, |b| {
            b.iter(|| {
                filter.video_tick(1.0 / 60.0, 64, 64);
                black_box(filter.video_render(&mut backend, &inputs, None))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, kernel_benchmark, cpu_frame_benchmark);
criterion_main!(benches);
