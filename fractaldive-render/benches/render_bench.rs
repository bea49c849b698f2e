use criterion::{criterion_group, criterion_main, Criterion};

use fractaldive_core::{FractalSet, ReferenceOrbitService, ViewState};
use fractaldive_render::{render_frame, FrameSpec, Palette, RenderCancel};

fn frame(x: f64, y: f64, zoom: f64, max: u32) -> FrameSpec {
    let view = ViewState::new(x, y, zoom).expect("valid view");
    FrameSpec::new(view, FractalSet::Mandelbrot, 640, 480, max)
}

fn bench_full_frame_render(c: &mut Criterion) {
    let spec = frame(-0.5, 0.0, 1.0, 256);
    let cancel = RenderCancel::new();

    c.bench_function("full_frame_640x480", |b| {
        b.iter(|| render_frame(&spec, &mut ReferenceOrbitService::new(), &cancel));
    });
}

fn bench_perturbation_frame(c: &mut Criterion) {
    let spec = FrameSpec {
        width: 256,
        height: 256,
        ..frame(-0.743643887037151, 0.131825904205330, 1e14, 2000)
    };
    let cancel = RenderCancel::new();
    let mut service = ReferenceOrbitService::new();

    c.bench_function("perturbation_256x256_2000iter", |b| {
        b.iter(|| render_frame(&spec, &mut service, &cancel));
    });
}

fn bench_colorize(c: &mut Criterion) {
    let spec = frame(-0.5, 0.0, 1.0, 256);
    let result = render_frame(&spec, &mut ReferenceOrbitService::new(), &RenderCancel::new())
        .expect("render should succeed");
    let palette = Palette::default();

    c.bench_function("colorize_640x480", |b| {
        b.iter(|| palette.colorize(&result.iterations));
    });
}

criterion_group!(
    benches,
    bench_full_frame_render,
    bench_perturbation_frame,
    bench_colorize
);
criterion_main!(benches);
