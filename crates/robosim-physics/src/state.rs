//! Serializable views of the world: a per-tick state dump for observers and
//! a full snapshot for rewinding.

use robosim_math::{Pose2, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::ids::{ActuatorId, BodyId, SensorId};
use crate::sensor::SensorValue;
use crate::traction::TractionReport;
use crate::world::World;

/// Observable state of one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    /// Body handle.
    pub id: BodyId,
    /// Body name.
    pub name: String,
    /// Described-frame pose `[x, y, theta]`.
    pub pose: [f64; 3],
    /// Center-of-mass velocity.
    pub velocity: [f64; 2],
    /// Angular velocity (rad/s).
    pub angular_velocity: f64,
}

/// Observable state of one wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorState {
    /// Actuator handle.
    pub id: ActuatorId,
    /// Actuator name.
    pub name: String,
    /// Current command (N, or N·m for torque-driven wheels).
    pub command: f64,
    /// Motor shaft speed of torque-driven wheels (rad/s).
    #[serde(default)]
    pub motor_speed: f64,
    /// Last traction report.
    pub report: TractionReport,
}

/// A sensor reading at dump time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    /// Sensor handle.
    pub id: SensorId,
    /// Sensor name.
    pub name: String,
    /// Reading, without consuming encoder deltas.
    pub value: SensorValue,
}

/// Everything an observer sees after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDump {
    /// Simulated time (s).
    pub time: f64,
    /// Completed ticks.
    pub step: u64,
    /// Dynamic and robot bodies.
    pub bodies: Vec<BodyState>,
    /// Wheels.
    pub actuators: Vec<ActuatorState>,
    /// Sensors.
    pub sensors: Vec<SensorState>,
    /// Number of contacts in the last tick.
    pub contacts: usize,
    /// Last warning, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StateDump {
    /// Serialize as a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PhysicsError::Scenario(e.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BodySnapshot {
    pose: [f64; 3],
    prev_pose: [f64; 3],
    velocity: [f64; 2],
    angular_velocity: f64,
    force: [f64; 2],
    torque: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ActuatorSnapshot {
    command: f64,
    report: TractionReport,
    #[serde(default)]
    motor_speed: f64,
    realized_rotation: f64,
    commanded_rotation: f64,
}

/// The mutable state of a world, for restoring into the same world later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    time: f64,
    step_index: u64,
    spawn_pose: [f64; 3],
    bodies: Vec<BodySnapshot>,
    actuators: Vec<ActuatorSnapshot>,
    sensor_baselines: Vec<f64>,
}

impl World {
    /// Collect the observable state. Static environment bodies are left out.
    pub fn state_dump(&self) -> StateDump {
        let bodies = self
            .bodies()
            .filter(|(_, b)| b.can_move || b.is_robot)
            .map(|(id, b)| BodyState {
                id,
                name: b.name.clone(),
                pose: b.pose().to_array(),
                velocity: [b.velocity.x, b.velocity.y],
                angular_velocity: b.angular_velocity,
            })
            .collect();
        let actuators = self
            .actuators
            .iter()
            .enumerate()
            .map(|(i, a)| ActuatorState {
                id: ActuatorId::from_index(i),
                name: a.name.clone(),
                command: a.command,
                motor_speed: a.motor_speed,
                report: a.report,
            })
            .collect();
        let sensors = self
            .sensors
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let id = SensorId::from_index(i);
                let value = self.peek_sensor(id).ok()?;
                Some(SensorState {
                    id,
                    name: s.name.clone(),
                    value,
                })
            })
            .collect();
        StateDump {
            time: self.time,
            step: self.step_index,
            bodies,
            actuators,
            sensors,
            contacts: self.contacts.len(),
            warning: self.last_warning.clone(),
        }
    }

    /// Capture the mutable state.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            time: self.time,
            step_index: self.step_index,
            spawn_pose: self.spawn_pose.to_array(),
            bodies: self
                .bodies
                .iter()
                .map(|b| BodySnapshot {
                    pose: b.pose.to_array(),
                    prev_pose: b.prev_pose.to_array(),
                    velocity: [b.velocity.x, b.velocity.y],
                    angular_velocity: b.angular_velocity,
                    force: [b.force.x, b.force.y],
                    torque: b.torque,
                })
                .collect(),
            actuators: self
                .actuators
                .iter()
                .map(|a| ActuatorSnapshot {
                    command: a.command,
                    report: a.report,
                    motor_speed: a.motor_speed,
                    realized_rotation: a.realized_rotation,
                    commanded_rotation: a.commanded_rotation,
                })
                .collect(),
            sensor_baselines: self.sensors.iter().map(|s| s.baseline).collect(),
        }
    }

    /// Restore a snapshot taken from a world built from the same scenario.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<()> {
        let check = |what: &str, have: usize, got: usize| {
            if have == got {
                Ok(())
            } else {
                Err(PhysicsError::SnapshotMismatch(format!(
                    "{what}: world has {have}, snapshot has {got}"
                )))
            }
        };
        check("bodies", self.bodies.len(), snapshot.bodies.len())?;
        check("actuators", self.actuators.len(), snapshot.actuators.len())?;
        check("sensors", self.sensors.len(), snapshot.sensor_baselines.len())?;

        for (body, s) in self.bodies.iter_mut().zip(&snapshot.bodies) {
            body.pose = Pose2::from_array(s.pose);
            body.prev_pose = Pose2::from_array(s.prev_pose);
            body.velocity = Vec2::from(s.velocity);
            body.angular_velocity = s.angular_velocity;
            body.force = Vec2::from(s.force);
            body.torque = s.torque;
        }
        for (motor, s) in self.actuators.iter_mut().zip(&snapshot.actuators) {
            motor.command = s.command;
            motor.report = s.report;
            motor.motor_speed = s.motor_speed;
            motor.realized_rotation = s.realized_rotation;
            motor.commanded_rotation = s.commanded_rotation;
        }
        for (sensor, &baseline) in self.sensors.iter_mut().zip(&snapshot.sensor_baselines) {
            sensor.baseline = baseline;
        }
        self.time = snapshot.time;
        self.step_index = snapshot.step_index;
        self.spawn_pose = Pose2::from_array(snapshot.spawn_pose);
        self.contacts.clear();
        self.last_warning = None;
        Ok(())
    }
}
