use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use tower_levelgen::balance::{run_balance_simulation, SimConfig};
use tower_levelgen::rules::{select_weighted, BandResolver};
use tower_levelgen::{
    GeneratorConfig, LevelGenerationSettings, LevelGenerator, RoomLayout, RoomTypeRules,
    SceneWorld,
};

fn bench_rules(c: &mut Criterion) {
    let rules = RoomTypeRules::default();

    c.bench_function("resolve_band_fresh", |b| {
        b.iter(|| BandResolver::new().resolve(black_box(&rules), black_box(0.5)))
    });

    c.bench_function("resolve_band_cached", |b| {
        let mut resolver = BandResolver::new();
        resolver.resolve(&rules, 0.5);
        b.iter(|| resolver.resolve(black_box(&rules), black_box(0.6)))
    });

    c.bench_function("select_weighted", |b| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let table = &rules.bands[1].table;
        b.iter(|| select_weighted(black_box(table), &mut rng))
    });
}

fn bench_generation(c: &mut Criterion) {
    for difficulty in [3u32, 6] {
        let settings = LevelGenerationSettings::new(
            GeneratorConfig::default()
                .with_seed(42)
                .with_difficulty(difficulty),
            RoomTypeRules::default(),
        );
        c.bench_function(&format!("generate_level_difficulty_{difficulty}"), |b| {
            let mut world = SceneWorld::new(RoomLayout::square(10.0));
            let mut generator = LevelGenerator::new(settings.clone());
            b.iter(|| generator.generate_blocking(black_box(&mut world)))
        });
    }

    c.bench_function("level_fingerprint", |b| {
        let mut world = SceneWorld::new(RoomLayout::square(10.0));
        let mut generator = LevelGenerator::new(LevelGenerationSettings::default());
        let _ = generator.generate_blocking(&mut world);
        b.iter(|| generator.graph().fingerprint())
    });
}

fn bench_balance(c: &mut Criterion) {
    let config = SimConfig {
        run_count: 256,
        ..Default::default()
    };
    c.bench_function("balance_256_runs", |b| {
        b.iter(|| run_balance_simulation(black_box(&config)))
    });
}

criterion_group!(benches, bench_rules, bench_generation, bench_balance);
criterion_main!(benches);
