//! End-to-end behavior checks over whole worlds.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use robosim_physics::{Pose2, SensorValue, Vec2, World};
use robosim_scenario::{
    BodyDesc, JointDesc, JointKind, Scenario, SensorDesc, SensorKind, TorqueDrive, WorldDesc,
};

/// The example robot with no arena walls or strokes around it.
fn open_field() -> Scenario {
    let mut scenario = Scenario::differential_drive_example();
    scenario.world.bounds = None;
    scenario.world.strokes.clear();
    scenario
}

fn drive(world: &mut World, left: f64, right: f64) {
    let l = world.actuator_id("left_motor").unwrap();
    let r = world.actuator_id("right_motor").unwrap();
    world.set_actuator(l, left).unwrap();
    world.set_actuator(r, right).unwrap();
}

fn chassis_pose(world: &World) -> Pose2 {
    world.body(world.body_id("chassis").unwrap()).unwrap().pose()
}

#[test]
fn symmetric_drive_goes_straight() {
    for heading in [0.0, 0.7, -2.0] {
        let mut scenario = open_field();
        scenario.robot.spawn_pose = [0.0, 0.0, heading];
        let mut world = World::from_scenario(&scenario).unwrap();
        drive(&mut world, 1.0, 1.0);
        for _ in 0..120 {
            world.step_default();
        }
        let pose = chassis_pose(&world);
        assert_abs_diff_eq!(pose.angle, heading, epsilon = 1e-6);

        let forward = Vec2::new(heading.cos(), heading.sin());
        let along = pose.position.dot(&forward);
        let across = (pose.position - forward * along).norm();
        assert!(along > 0.5, "only moved {along}");
        assert!(across < 1e-6, "drifted sideways by {across}");
    }
}

#[test]
fn opposite_commands_spin_in_place() {
    let mut world = World::from_scenario(&open_field()).unwrap();
    drive(&mut world, -0.2, 0.2);
    let mut last = chassis_pose(&world).angle;
    for _ in 0..240 {
        world.step_default();
        let pose = chassis_pose(&world);
        assert!(pose.angle > last, "heading stalled at {}", pose.angle);
        last = pose.angle;
        assert!(pose.position.norm() < 1e-6);
    }
    assert!(last > 1.0);
}

#[test]
fn drive_force_never_exceeds_traction() {
    for normal in [0.0, 0.1, 1.0, 5.0, 50.0] {
        let mut scenario = open_field();
        for act in &mut scenario.robot.actuators {
            act.wheel.mu_long = Some(0.5);
            act.wheel.normal_force = Some(normal);
        }
        let mut world = World::from_scenario(&scenario).unwrap();
        drive(&mut world, 1.0e3, -1.0e3);
        for _ in 0..5 {
            world.step_default();
            for motor in world.actuators() {
                let report = motor.report();
                assert!(report.longitudinal_force.abs() <= 0.5 * normal + 1e-9);
                assert_relative_eq!(
                    report.longitudinal_force.abs(),
                    0.5 * normal,
                    max_relative = 1e-9
                );
            }
        }
    }
}

#[test]
fn zero_normal_load_is_inert() {
    let variants: [fn(&mut Scenario); 2] = [
        |s| {
            for act in &mut s.robot.actuators {
                act.wheel.wheel_count = Some(0);
            }
        },
        |s| {
            for act in &mut s.robot.actuators {
                act.wheel.normal_force = Some(0.0);
            }
        },
    ];
    for tweak in variants {
        let mut scenario = open_field();
        tweak(&mut scenario);
        let mut world = World::from_scenario(&scenario).unwrap();
        drive(&mut world, 5.0, 5.0);
        for _ in 0..30 {
            world.step_default();
        }
        for motor in world.actuators() {
            assert_eq!(motor.report().longitudinal_force, 0.0);
            assert_eq!(motor.report().normal_load, 0.0);
        }
        let pose = chassis_pose(&world);
        assert!(pose.is_finite());
        assert_eq!(pose, Pose2::identity());
        assert!(world.last_warning().is_none());
    }
}

#[test]
fn rigid_joint_holds_under_load() {
    let mut scenario = Scenario::new();
    scenario.robot.bodies = vec![
        BodyDesc::rectangle("base", 0.2, 0.1),
        BodyDesc::rectangle("arm", 0.2, 0.1).at(0.2, 0.0, 0.0).with_mass(0.3),
    ];
    scenario.robot.joints.push(JointDesc {
        name: "weld".into(),
        parent: Some("base".into()),
        child: "arm".into(),
        kind: JointKind::Rigid,
        anchor_parent: [0.1, 0.0],
        anchor_child: [-0.1, 0.0],
        compliance: Some(0.0),
    });
    let mut world = World::from_scenario(&scenario).unwrap();
    let arm = world.body_id("arm").unwrap();
    let weld = world.joint_id("weld").unwrap();

    for tick in 0..240 {
        let push = if tick % 60 < 30 { 2.0 } else { -2.0 };
        world
            .apply_force(arm, Vec2::new(0.0, push), Vec2::new(0.3, 0.0))
            .unwrap();
        world.step_default();
        let error = world.joint_anchor_error(weld).unwrap();
        assert!(error < 1e-4, "anchors drifted {error} at tick {tick}");
    }
    // jointed bodies do not collide with each other
    assert!(world.contacts().is_empty());
    let base = world.body(world.body_id("base").unwrap()).unwrap();
    let arm = world.body(arm).unwrap();
    assert_abs_diff_eq!(arm.pose().angle - base.pose().angle, 0.0, epsilon = 1e-4);
}

#[test]
fn contacts_do_not_tunnel() {
    let mut scenario = Scenario::new();
    scenario.world = WorldDesc {
        terrain: vec![BodyDesc::rectangle("wall", 0.1, 1.0).at(0.5, 0.0, 0.0)],
        ..WorldDesc::default()
    };
    scenario.world.settings.linear_damping = 1.0;
    scenario.robot.bodies.push(BodyDesc::rectangle("box", 0.1, 0.1));
    let mut world = World::from_scenario(&scenario).unwrap();
    let id = world.body_id("box").unwrap();

    // one tick of 120 N gives a 1 kg box about 1 m/s
    world
        .apply_force(id, Vec2::new(120.0, 0.0), Vec2::zeros())
        .unwrap();
    let mut touched = false;
    for _ in 0..240 {
        world.step_default();
        touched |= !world.contacts().is_empty();
        let x = world.body(id).unwrap().pose().position.x;
        assert!(x < 0.41, "box passed into the wall: {x}");
        assert!(world.max_penetration() < 5e-3);
    }
    assert!(touched);
    assert!(world.max_penetration() <= world.settings().contact_slop + 1e-4);
}

#[test]
fn distance_reading_shrinks_as_target_approaches() {
    let mut scenario = open_field();
    scenario.world.terrain.push(BodyDesc::rectangle("target", 0.1, 0.6).at(1.0, 0.0, 0.0));
    let mut world = World::from_scenario(&scenario).unwrap();
    let target = world.body_id("target").unwrap();
    let sensor = world.sensor_id("front_distance").unwrap();

    let mut last = f64::INFINITY;
    // near face runs from 0.95 in to 0.15; the sensor sits at 0.1 with range 1
    for k in 0..=16 {
        let x = 1.0 - 0.05 * f64::from(k);
        world.teleport_body(target, Pose2::new(x, 0.0, 0.0)).unwrap();
        let reading = match world.peek_sensor(sensor).unwrap() {
            SensorValue::Distance { reading } => reading,
            other => panic!("unexpected {other:?}"),
        };
        assert!(reading < last, "reading {reading} did not drop below {last}");
        assert!((0.0..=1.0).contains(&reading));
        last = reading;
    }
    assert_abs_diff_eq!(last, 0.05, epsilon = 1e-9);
}

#[test]
fn identical_runs_match_exactly() {
    let mut scenario = Scenario::differential_drive_example();
    scenario.world.seed = Some(42);
    // a block just ahead of the bumper
    scenario
        .world
        .terrain
        .push(BodyDesc::rectangle("block", 0.1, 0.3).at(0.3, 0.0, 0.0));
    for sensor in &mut scenario.robot.sensors {
        match &mut sensor.kind {
            SensorKind::Distance { noise_std, .. }
            | SensorKind::Line { noise_std }
            | SensorKind::LineArray { noise_std, .. } => {
                *noise_std = 0.02;
            }
            SensorKind::Imu {
                heading_noise_std,
                gyro_noise_std,
            } => {
                *heading_noise_std = 0.01;
                *gyro_noise_std = 0.01;
            }
            SensorKind::Encoder { .. } => {}
        }
    }

    let run = || {
        let mut world = World::from_scenario(&scenario).unwrap();
        let ids: Vec<_> = world.sensors().iter().map(|s| world.sensor_id(s.name()).unwrap()).collect();
        let mut trace = Vec::new();
        let mut contact_ticks = 0;
        for tick in 0..600u32 {
            // run into the block, then wander toward the arena walls
            let phase = f64::from(tick / 100);
            drive(&mut world, 2.0 + phase * 0.1, 1.5 - phase * 0.2);
            world.step_default();
            if !world.contacts().is_empty() {
                contact_ticks += 1;
            }
            let readings: Vec<_> = ids.iter().map(|&id| world.get_sensor(id).unwrap()).collect();
            trace.push((world.state_dump(), readings));
        }
        assert!(contact_ticks > 0, "the robot never touched anything");
        trace
    };

    let first = run();
    let second = run();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a, b);
    }
}

#[test]
fn noisy_distance_reads_no_hit_as_exactly_one() {
    let mut scenario = open_field();
    scenario.world.seed = Some(9);
    for sensor in &mut scenario.robot.sensors {
        if let SensorKind::Distance { noise_std, .. } = &mut sensor.kind {
            *noise_std = 0.02;
        }
    }
    let mut world = World::from_scenario(&scenario).unwrap();
    let sensor = world.sensor_id("front_distance").unwrap();
    for _ in 0..200 {
        world.step_default();
        assert_eq!(world.peek_sensor(sensor).unwrap().scalar(), 1.0);
    }
}

#[test]
fn torque_driven_wheels_follow_the_same_traction_cap() {
    let mut scenario = open_field();
    for act in &mut scenario.robot.actuators {
        act.wheel.mu_long = Some(0.5);
        act.wheel.torque = Some(TorqueDrive {
            max_torque: 0.05,
            gear_ratio: 2.0,
            motor_inertia: 1e-4,
        });
    }
    let mut world = World::from_scenario(&scenario).unwrap();
    drive(&mut world, 0.003, 0.003);
    for _ in 0..60 {
        world.step_default();
    }
    // 0.003 N·m × 2 / 0.03 m = 0.2 N per wheel, under the cap
    for motor in world.actuators() {
        assert_relative_eq!(motor.report().longitudinal_force, 0.2, max_relative = 1e-9);
        assert!(motor.motor_speed() > 0.0);
    }
    let pose = chassis_pose(&world);
    assert!(pose.position.x > 0.0);
    assert_abs_diff_eq!(pose.angle, 0.0, epsilon = 1e-6);

    // full torque asks for more than traction allows
    drive(&mut world, 1.0, 1.0);
    world.step_default();
    for motor in world.actuators() {
        let cap = 0.5 * motor.normal_load();
        assert_relative_eq!(motor.report().longitudinal_force, cap, max_relative = 1e-9);
    }
}

#[test]
fn line_array_straddles_a_line() {
    let mut scenario = Scenario::differential_drive_example();
    scenario.robot.sensors.push(SensorDesc {
        name: "line_row".into(),
        body: "chassis".into(),
        mount_pose: [0.08, 0.0, 0.0],
        kind: SensorKind::LineArray {
            offsets: vec![-0.03, 0.0, 0.03],
            noise_std: 0.0,
        },
    });
    let mut world = World::from_scenario(&scenario).unwrap();
    let row = world.sensor_id("line_row").unwrap();
    let read = |world: &World| match world.peek_sensor(row).unwrap() {
        SensorValue::LineArray { intensities } => intensities,
        other => panic!("unexpected {other:?}"),
    };

    // the example line runs along y = 0 with 2 cm thickness
    assert_eq!(read(&world), vec![0.0, 1.0, 0.0]);
    let chassis = world.body_id("chassis").unwrap();
    world.teleport_body(chassis, Pose2::new(0.0, 0.03, 0.0)).unwrap();
    assert_eq!(read(&world), vec![1.0, 0.0, 0.0]);
}
