//! The simulation world: arena storage, scenario loading and the
//! controller-facing API.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use robosim_math::{cross, Pose2, Vec2};
use robosim_scenario::{Scenario, ScenarioError, WorldSettings};
use tracing::{debug, warn};

use crate::body::Body;
use crate::contact::Contact;
use crate::environment::environment_bodies;
use crate::error::{PhysicsError, Result};
use crate::ids::{ActuatorId, BodyId, JointId, SensorId};
use crate::joint::Joint;
use crate::sensor::{cast_ray, sample_line, Sensor, SensorContext, SensorValue};
use crate::traction::Actuator;

/// Number of distinct blockage classes a world can hold.
pub const MAX_BLOCKAGE_CLASSES: usize = 64;

/// A 2D top-down world of rigid bodies, joints, wheel motors and sensors.
///
/// The world exclusively owns its objects; callers address them through
/// typed ids. Only [`World::teleport_body`], [`World::reposition_robot`],
/// [`World::reset_to_spawn`] and [`World::restore`] move bodies outside of
/// [`World::step`].
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) settings: WorldSettings,
    pub(crate) bodies: Vec<Body>,
    pub(crate) joints: Vec<Joint>,
    pub(crate) actuators: Vec<Actuator>,
    pub(crate) sensors: Vec<Sensor>,
    pub(crate) contacts: Vec<Contact>,
    /// Body index pairs `(lo, hi)` connected by a joint.
    pub(crate) jointed: HashSet<(usize, usize)>,
    body_names: HashMap<String, BodyId>,
    joint_names: HashMap<String, JointId>,
    actuator_names: HashMap<String, ActuatorId>,
    sensor_names: HashMap<String, SensorId>,
    pub(crate) spawn_pose: Pose2,
    pub(crate) seed: u64,
    pub(crate) time: f64,
    pub(crate) step_index: u64,
    pub(crate) last_warning: Option<String>,
}

/// Assigns one bit per blockage class name.
#[derive(Default)]
struct BlockageRegistry {
    classes: Vec<String>,
}

impl BlockageRegistry {
    fn mask(&mut self, names: &[String]) -> Result<u64> {
        let mut mask = 0u64;
        for name in names {
            let bit = match self.classes.iter().position(|c| c == name) {
                Some(bit) => bit,
                None => {
                    if self.classes.len() == MAX_BLOCKAGE_CLASSES {
                        return Err(PhysicsError::TooManyBlockageClasses {
                            count: self.classes.len() + 1,
                            limit: MAX_BLOCKAGE_CLASSES,
                        });
                    }
                    self.classes.push(name.clone());
                    self.classes.len() - 1
                }
            };
            mask |= 1 << bit;
        }
        Ok(mask)
    }
}

fn insert_name<I: Copy>(
    names: &mut HashMap<String, I>,
    kind: &'static str,
    name: &str,
    id: I,
) -> Result<()> {
    if names.insert(name.to_string(), id).is_some() {
        return Err(PhysicsError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl World {
    /// Build a world from a scenario. Any configuration problem is reported
    /// here and no world is created.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        let desc = &scenario.world;
        desc.settings.validate().map_err(|e| match e {
            ScenarioError::InvalidSettings(msg) => PhysicsError::InvalidSettings(msg),
            other => other.into(),
        })?;
        let robot = &scenario.robot;
        let spawn_pose = Pose2::from_array(robot.spawn_pose);
        if !spawn_pose.is_finite() {
            return Err(PhysicsError::InvalidParameter {
                owner: "robot".into(),
                reason: "spawn_pose must be finite".into(),
            });
        }

        let mut blockage = BlockageRegistry::default();
        let mut bodies = Vec::new();
        let mut body_names = HashMap::new();

        for body_desc in environment_bodies(desc) {
            let id = BodyId::from_index(bodies.len());
            insert_name(&mut body_names, "body", &body_desc.name, id)?;
            let mask = blockage.mask(&body_desc.blockage)?;
            let pose = Pose2::from_array(body_desc.pose);
            bodies.push(Body::from_desc(&body_desc, pose, mask, false)?);
        }
        for body_desc in &robot.bodies {
            let id = BodyId::from_index(bodies.len());
            insert_name(&mut body_names, "body", &body_desc.name, id)?;
            let mask = blockage.mask(&body_desc.blockage)?;
            let pose = Pose2::from_array(body_desc.pose).offset_by(&spawn_pose);
            bodies.push(Body::from_desc(body_desc, pose, mask, true)?);
        }

        let lookup = |owner: &str, name: &str| {
            body_names
                .get(name)
                .copied()
                .ok_or_else(|| PhysicsError::MissingBody {
                    owner: owner.to_string(),
                    body: name.to_string(),
                })
        };

        let mut joints = Vec::with_capacity(robot.joints.len());
        let mut joint_names = HashMap::new();
        let mut jointed = HashSet::new();
        for joint_desc in &robot.joints {
            insert_name(
                &mut joint_names,
                "joint",
                &joint_desc.name,
                JointId::from_index(joints.len()),
            )?;
            let parent = joint_desc
                .parent
                .as_deref()
                .map(|p| lookup(&joint_desc.name, p))
                .transpose()?;
            let child = lookup(&joint_desc.name, &joint_desc.child)?;
            let joint = Joint::from_desc(
                joint_desc,
                parent,
                child,
                &bodies,
                desc.settings.joint_compliance_default,
            )?;
            if let Some(p) = parent {
                let (a, b) = (p.index(), child.index());
                jointed.insert((a.min(b), a.max(b)));
            }
            joints.push(joint);
        }

        let mut wheels_per_body: HashMap<BodyId, u32> = HashMap::new();
        let mut actuator_hosts = Vec::with_capacity(robot.actuators.len());
        for act in &robot.actuators {
            let host = lookup(&act.name, &act.body)?;
            *wheels_per_body.entry(host).or_default() += 1;
            actuator_hosts.push(host);
        }
        let mut actuators = Vec::with_capacity(robot.actuators.len());
        let mut actuator_names = HashMap::new();
        for (act, host) in robot.actuators.iter().zip(actuator_hosts) {
            insert_name(
                &mut actuator_names,
                "actuator",
                &act.name,
                ActuatorId::from_index(actuators.len()),
            )?;
            actuators.push(Actuator::from_desc(
                act,
                host,
                &bodies[host.index()],
                wheels_per_body[&host],
                desc.settings.g_equiv,
            )?);
        }

        let mut sensors = Vec::with_capacity(robot.sensors.len());
        let mut sensor_names = HashMap::new();
        for sensor_desc in &robot.sensors {
            insert_name(
                &mut sensor_names,
                "sensor",
                &sensor_desc.name,
                SensorId::from_index(sensors.len()),
            )?;
            let host = lookup(&sensor_desc.name, &sensor_desc.body)?;
            let encoder_target = match &sensor_desc.kind {
                robosim_scenario::SensorKind::Encoder { actuator, .. } => actuator_names
                    .get(actuator)
                    .map(|&id: &ActuatorId| (id, &actuators[id.index()])),
                _ => None,
            };
            sensors.push(Sensor::from_desc(
                sensor_desc,
                host,
                &bodies[host.index()],
                encoder_target,
            )?);
        }

        debug!(
            world = %desc.name,
            bodies = bodies.len(),
            joints = joints.len(),
            actuators = actuators.len(),
            sensors = sensors.len(),
            blockage_classes = blockage.classes.len(),
            "loaded scenario"
        );

        Ok(Self {
            settings: desc.settings.clone(),
            bodies,
            joints,
            actuators,
            sensors,
            contacts: Vec::new(),
            jointed,
            body_names,
            joint_names,
            actuator_names,
            sensor_names,
            spawn_pose,
            seed: desc.seed.unwrap_or(0),
            time: 0.0,
            step_index: 0,
            last_warning: None,
        })
    }

    /// Read a JSON scenario file and build a world from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let scenario = Scenario::from_path(path)?;
        Self::from_scenario(&scenario)
    }

    /// Engine parameters.
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed ticks.
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Current robot spawn pose.
    pub fn spawn_pose(&self) -> Pose2 {
        self.spawn_pose
    }

    /// Most recent warning raised during the last tick, if any.
    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    /// Contacts generated during the last tick.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Look up a body by name.
    pub fn body_id(&self, name: &str) -> Option<BodyId> {
        self.body_names.get(name).copied()
    }

    /// Look up a joint by name.
    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        self.joint_names.get(name).copied()
    }

    /// Look up an actuator by name.
    pub fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.actuator_names.get(name).copied()
    }

    /// Look up a sensor by name.
    pub fn sensor_id(&self, name: &str) -> Option<SensorId> {
        self.sensor_names.get(name).copied()
    }

    /// Borrow a body.
    pub fn body(&self, id: BodyId) -> Result<&Body> {
        self.bodies.get(id.index()).ok_or(PhysicsError::UnknownBody(id))
    }

    /// Borrow a joint.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.index())
    }

    /// Borrow an actuator.
    pub fn actuator(&self, id: ActuatorId) -> Result<&Actuator> {
        self.actuators
            .get(id.index())
            .ok_or(PhysicsError::UnknownActuator(id))
    }

    /// Borrow a sensor.
    pub fn sensor(&self, id: SensorId) -> Result<&Sensor> {
        self.sensors.get(id.index()).ok_or(PhysicsError::UnknownSensor(id))
    }

    /// All bodies in id order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (BodyId::from_index(i), b))
    }

    /// All joints in id order.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// All actuators in id order.
    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    /// All sensors in id order.
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Distance between a joint's two anchors.
    pub fn joint_anchor_error(&self, id: JointId) -> Option<f64> {
        self.joint(id).map(|j| j.anchor_error(&self.bodies))
    }

    /// World pose of a sensor mount.
    pub fn sensor_pose(&self, id: SensorId) -> Result<Pose2> {
        Ok(self.sensor(id)?.world_pose(&self.bodies))
    }

    /// Deepest remaining overlap among the last tick's contacts, measured
    /// at their current positions. Zero without contacts.
    pub fn max_penetration(&self) -> f64 {
        self.contacts
            .iter()
            .map(|c| c.current_depth(&self.bodies))
            .fold(0.0, f64::max)
    }

    /// Set a wheel's command: a drive force (N), or a motor torque (N·m) for
    /// torque-driven wheels. Non-finite commands become zero.
    pub fn set_actuator(&mut self, id: ActuatorId, command: f64) -> Result<()> {
        let motor = self
            .actuators
            .get_mut(id.index())
            .ok_or(PhysicsError::UnknownActuator(id))?;
        if command.is_finite() {
            motor.command = command;
        } else {
            motor.command = 0.0;
            let msg = format!("{}: ignored non-finite command", motor.name);
            self.warn(msg);
        }
        Ok(())
    }

    fn sensor_context(&self) -> SensorContext<'_> {
        SensorContext {
            bodies: &self.bodies,
            actuators: &self.actuators,
            floor_line_intensity: self.settings.floor_line_intensity,
            seed: self.seed,
            step: self.step_index,
        }
    }

    /// Read a sensor without consuming encoder deltas.
    pub fn peek_sensor(&self, id: SensorId) -> Result<SensorValue> {
        let sensor = self.sensor(id)?;
        Ok(sensor.evaluate(id.index(), &self.sensor_context()))
    }

    /// Read a sensor. Encoders report the rotation since their previous read.
    pub fn get_sensor(&mut self, id: SensorId) -> Result<SensorValue> {
        let value = self.peek_sensor(id)?;
        let sensor = &mut self.sensors[id.index()];
        if let Some(total) = sensor.encoder_total(&self.actuators) {
            sensor.baseline = total;
        }
        Ok(value)
    }

    /// Add a world-space force at a world point, applied during the next tick.
    pub fn apply_force(&mut self, id: BodyId, force: Vec2, point: Vec2) -> Result<()> {
        let body = self
            .bodies
            .get_mut(id.index())
            .ok_or(PhysicsError::UnknownBody(id))?;
        if !(force.x.is_finite() && force.y.is_finite() && point.x.is_finite() && point.y.is_finite()) {
            let msg = format!("{}: ignored non-finite force", body.name);
            self.warn(msg);
            return Ok(());
        }
        body.force += force;
        body.torque += cross(&(point - body.pose.position), &force);
        Ok(())
    }

    /// Move a body's described frame to `pose` and stop it.
    pub fn teleport_body(&mut self, id: BodyId, pose: Pose2) -> Result<()> {
        if !pose.is_finite() {
            return Err(PhysicsError::InvalidParameter {
                owner: id.to_string(),
                reason: "teleport pose must be finite".into(),
            });
        }
        let body = self
            .bodies
            .get_mut(id.index())
            .ok_or(PhysicsError::UnknownBody(id))?;
        body.set_frame_pose(&pose);
        body.halt();
        Ok(())
    }

    /// Move every robot body to its described pose offset by `spawn_pose`,
    /// stopping it. Optionally make `spawn_pose` the new default.
    pub fn reposition_robot(&mut self, spawn_pose: Pose2, set_as_spawn: bool) {
        if !spawn_pose.is_finite() {
            self.warn("ignored non-finite spawn pose".into());
            return;
        }
        for body in self.bodies.iter_mut().filter(|b| b.is_robot) {
            let pose = body.rest_pose.offset_by(&spawn_pose);
            body.set_frame_pose(&pose);
            body.halt();
        }
        for motor in &mut self.actuators {
            motor.clear();
        }
        for sensor in &mut self.sensors {
            sensor.baseline = 0.0;
        }
        self.contacts.clear();
        if set_as_spawn {
            self.spawn_pose = spawn_pose;
        }
    }

    /// Return the robot to its spawn pose at rest.
    pub fn reset_to_spawn(&mut self) {
        self.reposition_robot(self.spawn_pose, false);
    }

    /// Distance to the first solid body along a world ray, within `range`.
    pub fn ray_cast(&self, origin: Vec2, dir: Vec2, range: f64) -> Option<f64> {
        let norm = dir.norm();
        if !(norm > 0.0 && range > 0.0) {
            return None;
        }
        cast_ray(&self.bodies, &origin, &(dir / norm), range, None)
    }

    /// Line intensity a line sensor would read at `point`.
    pub fn line_intensity_at(&self, point: Vec2) -> f64 {
        sample_line(&self.bodies, &point, self.settings.floor_line_intensity)
    }

    /// Record a warning for this tick.
    pub(crate) fn warn(&mut self, message: String) {
        warn!("{message}");
        self.last_warning = Some(message);
    }
}
