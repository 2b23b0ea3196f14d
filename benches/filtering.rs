use criterion::{criterion_group, criterion_main, Criterion, black_box};

use pointcull::pcg::elements::{
    PointSamplerSettings, SelfPruningSettings,
    prune_points, sample_points, sample_points_parallel,
};
use pointcull::pcg::{PcgPoint, PointData, RandomStream};
use pointcull::scalability::{
    CullReaction, EffectType, ScalabilityConfig, ScalabilityManager, ScalableInstance, UpdateFrequency,
    ViewContext,
};

use glam::Vec3;

fn scatter(count: usize, seed: u32) -> Vec<PcgPoint> {
    let mut rng = RandomStream::new(seed);
    (0..count)
        .map(|_| {
            let location = Vec3::new(
                rng.frand_range(0.0, 10_000.0),
                rng.frand_range(0.0, 10_000.0),
                0.0,
            );
            let extent = rng.frand_range(10.0, 60.0);
            PcgPoint::new(location, Vec3::splat(extent), rng.next_u32())
        })
        .collect()
}

fn bench_sample_serial(c: &mut Criterion) {
    let points = scatter(100_000, 1);
    let settings = PointSamplerSettings::new(0.25, 7);

    c.bench_function("sample_100k_serial", |b| {
        b.iter(|| sample_points(black_box(&points), &settings));
    });
}

fn bench_sample_parallel(c: &mut Criterion) {
    let points = scatter(100_000, 1);
    let settings = PointSamplerSettings::new(0.25, 7);

    c.bench_function("sample_100k_parallel", |b| {
        b.iter(|| sample_points_parallel(black_box(&points), &settings));
    });
}

fn bench_octree_build(c: &mut Criterion) {
    let points = scatter(20_000, 2);

    c.bench_function("octree_build_20k", |b| {
        b.iter(|| {
            let data = PointData::new(black_box(points.clone()));
            data.octree().node_count()
        });
    });
}

fn bench_self_pruning(c: &mut Criterion) {
    let data = PointData::new(scatter(20_000, 3));
    let settings = SelfPruningSettings::default();
    // Build outside the measured loop
    let octree = data.octree();

    c.bench_function("self_prune_20k", |b| {
        b.iter(|| prune_points(black_box(data.points()), Some(octree), &settings));
    });
}

struct BenchInstance {
    location: Vec3,
}

impl ScalableInstance for BenchInstance {
    fn location(&self) -> Vec3 {
        self.location
    }

    fn activate(&mut self) {}

    fn deactivate(&mut self, _immediate: bool) {}
}

fn bench_manager_tick(c: &mut Criterion) {
    let config = ScalabilityConfig::default();
    let mut effect = EffectType::new("Bench");
    effect.update_frequency = UpdateFrequency::High;
    effect.cull_reaction = CullReaction::DeactivateResume;
    effect.settings.max_distance = Some(5_000.0);
    effect.settings.max_instances = Some(500);

    let mut manager = ScalabilityManager::new(effect, &config);
    let mut rng = RandomStream::new(4);
    for _ in 0..10_000 {
        let location = Vec3::new(rng.frand_range(-8_000.0, 8_000.0), 0.0, rng.frand_range(-8_000.0, 8_000.0));
        manager.register(BenchInstance { location });
    }

    c.bench_function("scalability_tick_10k", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let view = ViewContext::single(Vec3::new((frame as f32 * 0.05).sin() * 2_000.0, 0.0, 0.0));
            manager.tick(black_box(1.0 / 60.0), &view).evaluated
        });
    });
}

criterion_group!(
    benches,
    bench_sample_serial,
    bench_sample_parallel,
    bench_octree_build,
    bench_self_pruning,
    bench_manager_tick,
);
criterion_main!(benches);
