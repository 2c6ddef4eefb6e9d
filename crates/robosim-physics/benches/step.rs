//! Benchmarks for the simulation tick.
//!
//! Run with: cargo bench -p robosim-physics

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use robosim_physics::World;
use robosim_scenario::{BodyDesc, Scenario};

/// The example robot in its arena with `crates` loose boxes scattered around.
fn cluttered_arena(crates: usize) -> Scenario {
    let mut scenario = Scenario::differential_drive_example();
    for i in 0..crates {
        let angle = i as f64 * 0.7;
        let radius = 0.5 + 0.1 * (i % 10) as f64;
        scenario.robot.bodies.push(
            BodyDesc::rectangle(&format!("crate_{i}"), 0.08, 0.08)
                .at(radius * angle.cos(), radius * angle.sin(), angle)
                .with_mass(0.2),
        );
    }
    scenario
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for crates in [0, 10, 40] {
        let scenario = cluttered_arena(crates);
        group.bench_with_input(BenchmarkId::from_parameter(crates), &scenario, |b, s| {
            let mut world = World::from_scenario(s).unwrap();
            let left = world.actuator_id("left_motor").unwrap();
            let right = world.actuator_id("right_motor").unwrap();
            world.set_actuator(left, 2.0).unwrap();
            world.set_actuator(right, 1.5).unwrap();
            b.iter(|| {
                world.step_default();
                black_box(world.contacts().len())
            });
        });
    }
    group.finish();
}

fn bench_sensors(c: &mut Criterion) {
    let mut world = World::from_scenario(&cluttered_arena(40)).unwrap();
    let ids: Vec<_> = world
        .sensors()
        .iter()
        .map(|s| world.sensor_id(s.name()).unwrap())
        .collect();
    c.bench_function("read_all_sensors", |b| {
        b.iter(|| {
            for &id in &ids {
                black_box(world.get_sensor(id).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_step, bench_sensors);
criterion_main!(benches);
