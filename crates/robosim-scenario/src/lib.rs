#![warn(missing_docs)]

//! Scenario description for the robosim engine.
//!
//! A scenario is a purely declarative description of a world (static
//! terrain, arena bounds, drawn walls and line marks, engine settings) and a
//! robot (bodies, joints, wheel motors, sensors). Cross references between
//! parts are by name. The engine validates and instantiates a scenario; this
//! crate does no simulation.
//!
//! Units are meters, kilograms, seconds and radians. Poses are
//! `[x, y, theta]` triples, points are `[x, y]` pairs.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod error;

pub use error::{Result, ScenarioError};

/// Default blockage class given to bodies that do not list any.
pub const DEFAULT_BLOCKAGE_CLASS: &str = "solid";

/// A pose as `[x, y, theta]`.
pub type PoseArray = [f64; 3];

/// A point as `[x, y]`.
pub type PointArray = [f64; 2];

/// Global engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Fixed tick length in seconds.
    pub timestep: f64,
    /// Gravity-equivalent constant used only to scale virtual wheel loads.
    pub g_equiv: f64,
    /// Constraint solver iterations per tick.
    pub solver_iterations: u32,
    /// XPBD compliance of contact constraints (m/N).
    pub contact_compliance: f64,
    /// Compliance given to joints that do not set their own.
    pub joint_compliance_default: f64,
    /// Penetration depth left uncorrected to avoid jitter (m).
    pub contact_slop: f64,
    /// Approach speed below which restitution is ignored (m/s).
    pub restitution_threshold: f64,
    /// Per-tick linear velocity multiplier.
    pub linear_damping: f64,
    /// Per-tick angular velocity multiplier.
    pub angular_damping: f64,
    /// Linear speed clamp (m/s, 0 disables).
    pub max_linear_speed: f64,
    /// Angular speed clamp (rad/s, 0 disables).
    pub max_angular_speed: f64,
    /// Largest translation a body may make in one tick (m, 0 disables).
    pub max_step_translation: f64,
    /// Line intensity read where no body carries one.
    pub floor_line_intensity: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 120.0,
            g_equiv: 9.81,
            solver_iterations: 10,
            contact_compliance: 1e-7,
            joint_compliance_default: 0.0,
            contact_slop: 5e-4,
            restitution_threshold: 0.2,
            linear_damping: 0.995,
            angular_damping: 0.995,
            max_linear_speed: 15.0,
            max_angular_speed: 40.0,
            max_step_translation: 0.5,
            floor_line_intensity: 0.0,
        }
    }
}

impl WorldSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(ScenarioError::InvalidSettings(
                "timestep must be positive".into(),
            ));
        }
        if !(self.g_equiv.is_finite() && self.g_equiv >= 0.0) {
            return Err(ScenarioError::InvalidSettings(
                "g_equiv must be non-negative".into(),
            ));
        }
        if self.solver_iterations == 0 {
            return Err(ScenarioError::InvalidSettings(
                "solver_iterations must be at least 1".into(),
            ));
        }
        let non_negative = [
            ("contact_compliance", self.contact_compliance),
            ("joint_compliance_default", self.joint_compliance_default),
            ("contact_slop", self.contact_slop),
            ("restitution_threshold", self.restitution_threshold),
            ("max_linear_speed", self.max_linear_speed),
            ("max_angular_speed", self.max_angular_speed),
            ("max_step_translation", self.max_step_translation),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ScenarioError::InvalidSettings(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }
        for (name, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScenarioError::InvalidSettings(format!(
                    "{name} must be between 0 and 1"
                )));
            }
        }
        if !self.floor_line_intensity.is_finite() {
            return Err(ScenarioError::InvalidSettings(
                "floor_line_intensity must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Surface properties of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// Coulomb friction coefficient for body-body contacts.
    pub friction: f64,
    /// Coefficient of restitution (0 = no bounce).
    pub restitution: f64,
    /// Wheel traction coefficient; falls back to `friction` when absent.
    pub traction: Option<f64>,
    /// Line intensity seen by line sensors over this body. Bodies without
    /// one are invisible to line sensors, which then read the floor.
    pub line_intensity: Option<f64>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            friction: 0.8,
            restitution: 0.0,
            traction: None,
            line_intensity: None,
        }
    }
}

fn default_blockage() -> Vec<String> {
    vec![DEFAULT_BLOCKAGE_CLASS.to_string()]
}

fn default_true() -> bool {
    true
}

fn default_mass() -> f64 {
    1.0
}

/// A rigid body: a simple polygon footprint plus mass properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    /// Unique name.
    pub name: String,
    /// Polygon vertices relative to the body origin, in order.
    pub points: Vec<PointArray>,
    /// Pose relative to the robot spawn pose (robot bodies) or the world.
    #[serde(default)]
    pub pose: PoseArray,
    /// Whether the body is dynamic.
    #[serde(default = "default_true")]
    pub can_move: bool,
    /// Mass in kg (ignored for static bodies).
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Moment of inertia about the origin; derived from the polygon when absent.
    #[serde(default)]
    pub inertia: Option<f64>,
    /// Surface material.
    #[serde(default)]
    pub material: MaterialDesc,
    /// Blockage classes; bodies collide only when their sets intersect.
    #[serde(default = "default_blockage")]
    pub blockage: Vec<String>,
}

impl BodyDesc {
    /// Axis-aligned rectangle centered on the body origin.
    pub fn rectangle(name: &str, width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::polygon(
            name,
            vec![[-hw, -hh], [hw, -hh], [hw, hh], [-hw, hh]],
        )
    }

    /// Body with the given vertices and default properties.
    pub fn polygon(name: &str, points: Vec<PointArray>) -> Self {
        Self {
            name: name.to_string(),
            points,
            pose: [0.0; 3],
            can_move: true,
            mass: default_mass(),
            inertia: None,
            material: MaterialDesc::default(),
            blockage: default_blockage(),
        }
    }

    /// Set the pose.
    pub fn at(mut self, x: f64, y: f64, theta: f64) -> Self {
        self.pose = [x, y, theta];
        self
    }

    /// Mark the body static.
    pub fn fixed(mut self) -> Self {
        self.can_move = false;
        self
    }

    /// Set the mass.
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Make the body decorative: no blockage classes, so nothing collides with it.
    pub fn decorative(mut self) -> Self {
        self.blockage.clear();
        self
    }
}

/// Joint flavor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JointKind {
    /// Anchors coincide and the relative angle is locked at its initial value.
    Rigid,
    /// Anchors coincide; the bodies may rotate relative to each other.
    Hinge {
        /// Optional `[lower, upper]` relative angle limits (rad).
        #[serde(default)]
        limits: Option<[f64; 2]>,
    },
}

impl Default for JointKind {
    fn default() -> Self {
        Self::Hinge { limits: None }
    }
}

/// A positional constraint between two bodies, or a body and the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    /// Unique name.
    pub name: String,
    /// Parent body name; `None` anchors the child to the world.
    #[serde(default)]
    pub parent: Option<String>,
    /// Child body name.
    pub child: String,
    /// Joint flavor.
    #[serde(default)]
    pub kind: JointKind,
    /// Anchor in the parent frame (a world point when `parent` is `None`).
    #[serde(default)]
    pub anchor_parent: PointArray,
    /// Anchor in the child frame.
    #[serde(default)]
    pub anchor_child: PointArray,
    /// XPBD compliance (0 = fully rigid); the world default when absent.
    #[serde(default)]
    pub compliance: Option<f64>,
}

/// Wheel motor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelParams {
    /// Motor saturation force (N); unlimited when absent.
    pub max_force: Option<f64>,
    /// Longitudinal friction coefficient; defaults to the host material traction.
    pub mu_long: Option<f64>,
    /// Lateral friction coefficient; defaults to the host material friction.
    pub mu_lat: Option<f64>,
    /// Explicit virtual normal load (N).
    pub normal_force: Option<f64>,
    /// Weight shared by the wheels of the host body (N); host mass × g_equiv when absent.
    pub equivalent_weight: Option<f64>,
    /// Number of wheels sharing the weight; counted from the host body when absent.
    pub wheel_count: Option<u32>,
    /// Fraction of lateral slip correction withheld each tick (0..1).
    pub lateral_damping: f64,
    /// Wheel radius (m) used to convert contact speed into wheel rotation.
    pub wheel_radius: f64,
    /// Wheel speed at full command (rad/s), for commanded-speed encoders.
    pub max_wheel_omega: f64,
    /// Torque-commanded motor model. Without it the command is a drive force.
    pub torque: Option<TorqueDrive>,
}

impl Default for WheelParams {
    fn default() -> Self {
        Self {
            max_force: None,
            mu_long: None,
            mu_lat: None,
            normal_force: None,
            equivalent_weight: None,
            wheel_count: None,
            lateral_damping: 0.25,
            wheel_radius: 0.03,
            max_wheel_omega: 40.0,
            torque: None,
        }
    }
}

/// Geared DC motor driving a wheel.
///
/// The command is a motor torque (N·m), saturated at `max_torque`. The wheel
/// pushes with `torque * gear_ratio / wheel_radius` before the traction cap,
/// and the motor spins up at `torque / motor_inertia`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorqueDrive {
    /// Stall torque (N·m).
    pub max_torque: f64,
    /// Torque multiplication between motor and wheel.
    pub gear_ratio: f64,
    /// Rotor inertia (kg·m²).
    pub motor_inertia: f64,
}

impl Default for TorqueDrive {
    fn default() -> Self {
        Self {
            max_torque: 0.1,
            gear_ratio: 1.0,
            motor_inertia: 1e-4,
        }
    }
}

/// A wheel motor mounted on a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDesc {
    /// Unique name.
    pub name: String,
    /// Host body name.
    pub body: String,
    /// Mount pose in the host frame; the wheel drives along its +X axis.
    #[serde(default)]
    pub mount_pose: PoseArray,
    /// Traction parameters.
    #[serde(flatten)]
    pub wheel: WheelParams,
}

impl ActuatorDesc {
    /// Wheel on `body` at local `(x, y)` driving along the body's +X.
    pub fn wheel(name: &str, body: &str, x: f64, y: f64) -> Self {
        Self {
            name: name.to_string(),
            body: body.to_string(),
            mount_pose: [x, y, 0.0],
            wheel: WheelParams::default(),
        }
    }
}

/// What an encoder integrates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderSource {
    /// Wheel speed realized at the contact point.
    #[default]
    Realized,
    /// Wheel speed implied by the command (needs `max_force`).
    Commanded,
}

fn default_range() -> f64 {
    1.0
}

fn default_line_array_offsets() -> Vec<f64> {
    vec![-0.02, -0.01, 0.0, 0.01, 0.02]
}

/// Sensor flavor and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorKind {
    /// Ray cast along the mount +X axis.
    Distance {
        /// Maximum range (m).
        #[serde(default = "default_range")]
        range: f64,
        /// Noise standard deviation on the normalized reading.
        #[serde(default)]
        noise_std: f64,
    },
    /// Line intensity sample at the mount point.
    Line {
        /// Noise standard deviation on the reading.
        #[serde(default)]
        noise_std: f64,
    },
    /// Row of line samples across the mount, one per offset along its +Y axis.
    LineArray {
        /// Lateral sample offsets (m).
        #[serde(default = "default_line_array_offsets")]
        offsets: Vec<f64>,
        /// Noise standard deviation on each sample.
        #[serde(default)]
        noise_std: f64,
    },
    /// Heading and yaw rate of the host body.
    Imu {
        /// Heading noise standard deviation (rad).
        #[serde(default)]
        heading_noise_std: f64,
        /// Yaw rate noise standard deviation (rad/s).
        #[serde(default)]
        gyro_noise_std: f64,
    },
    /// Wheel rotation accumulated since the last query.
    Encoder {
        /// Name of the wheel actuator.
        actuator: String,
        /// Integrated quantity.
        #[serde(default)]
        source: EncoderSource,
    },
}

/// A sensor mounted on a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDesc {
    /// Unique name.
    pub name: String,
    /// Host body name.
    pub body: String,
    /// Mount pose in the host frame.
    #[serde(default)]
    pub mount_pose: PoseArray,
    /// Sensor flavor.
    #[serde(flatten)]
    pub kind: SensorKind,
}

/// The robot: its parts, devices and spawn pose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotDesc {
    /// Pose added to every robot body pose at spawn.
    pub spawn_pose: PoseArray,
    /// Robot bodies.
    pub bodies: Vec<BodyDesc>,
    /// Joints between robot bodies (or to the world).
    pub joints: Vec<JointDesc>,
    /// Wheel motors.
    pub actuators: Vec<ActuatorDesc>,
    /// Sensors.
    pub sensors: Vec<SensorDesc>,
}

/// Rectangular arena turned into four static walls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum X.
    pub min_x: f64,
    /// Maximum X.
    pub max_x: f64,
    /// Minimum Y.
    pub min_y: f64,
    /// Maximum Y.
    pub max_y: f64,
}

/// What a drawn stroke becomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    /// Solid static wall segments.
    Wall,
    /// Non-blocking line mark read by line sensors.
    Line,
    /// Purely visual; ignored by the engine.
    #[default]
    Mark,
}

fn default_thickness() -> f64 {
    0.05
}

/// A polyline drawn on the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeDesc {
    /// Stroke kind.
    #[serde(default)]
    pub kind: StrokeKind,
    /// Polyline vertices (world frame).
    pub points: Vec<PointArray>,
    /// Stroke width (m).
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    /// Line intensity for `Line` strokes (defaults to 1.0).
    #[serde(default)]
    pub line_intensity: Option<f64>,
}

/// The environment the robot runs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDesc {
    /// Human-readable name.
    pub name: String,
    /// Seed for sensor noise.
    pub seed: Option<u64>,
    /// Engine parameters.
    pub settings: WorldSettings,
    /// Static terrain bodies (always immovable).
    pub terrain: Vec<BodyDesc>,
    /// Optional arena bounds.
    pub bounds: Option<Bounds>,
    /// Drawn walls and line marks.
    pub strokes: Vec<StrokeDesc>,
    /// Free-form metadata, carried through untouched.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for WorldDesc {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            seed: None,
            settings: WorldSettings::default(),
            terrain: Vec::new(),
            bounds: None,
            strokes: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A complete scenario: world plus robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Format version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// The environment.
    #[serde(default)]
    pub world: WorldDesc,
    /// The robot.
    #[serde(default)]
    pub robot: RobotDesc,
}

fn default_version() -> String {
    "0.1".to_string()
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            version: default_version(),
            world: WorldDesc::default(),
            robot: RobotDesc::default(),
        }
    }
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON scenario file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// A two-wheel differential-drive robot in an empty bounded arena.
    ///
    /// The chassis is 0.2 × 0.15 m, 1 kg, with wheels at `y = ±0.09`,
    /// a forward distance sensor, a line sensor, an IMU and two encoders.
    pub fn differential_drive_example() -> Self {
        let mut scenario = Self::new();
        scenario.world.name = "arena".to_string();
        scenario.world.bounds = Some(Bounds {
            min_x: -2.0,
            max_x: 2.0,
            min_y: -2.0,
            max_y: 2.0,
        });
        scenario.world.strokes.push(StrokeDesc {
            kind: StrokeKind::Line,
            points: vec![[-1.5, 0.0], [1.5, 0.0]],
            thickness: 0.02,
            line_intensity: None,
        });

        let robot = &mut scenario.robot;
        robot.bodies.push(BodyDesc::rectangle("chassis", 0.2, 0.15));
        robot
            .actuators
            .push(ActuatorDesc::wheel("left_motor", "chassis", 0.0, 0.09));
        robot
            .actuators
            .push(ActuatorDesc::wheel("right_motor", "chassis", 0.0, -0.09));
        robot.sensors.push(SensorDesc {
            name: "front_distance".to_string(),
            body: "chassis".to_string(),
            mount_pose: [0.1, 0.0, 0.0],
            kind: SensorKind::Distance {
                range: 1.0,
                noise_std: 0.0,
            },
        });
        robot.sensors.push(SensorDesc {
            name: "line_center".to_string(),
            body: "chassis".to_string(),
            mount_pose: [0.08, 0.0, 0.0],
            kind: SensorKind::Line { noise_std: 0.0 },
        });
        robot.sensors.push(SensorDesc {
            name: "imu".to_string(),
            body: "chassis".to_string(),
            mount_pose: [0.0; 3],
            kind: SensorKind::Imu {
                heading_noise_std: 0.0,
                gyro_noise_std: 0.0,
            },
        });
        for side in ["left", "right"] {
            robot.sensors.push(SensorDesc {
                name: format!("{side}_encoder"),
                body: "chassis".to_string(),
                mount_pose: [0.0; 3],
                kind: SensorKind::Encoder {
                    actuator: format!("{side}_motor"),
                    source: EncoderSource::Realized,
                },
            });
        }
        scenario
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_scenario() {
        let mut scenario = Scenario::differential_drive_example();
        scenario.robot.joints.push(JointDesc {
            name: "caster".to_string(),
            parent: Some("chassis".to_string()),
            child: "chassis".to_string(),
            kind: JointKind::Hinge {
                limits: Some([-0.5, 0.5]),
            },
            anchor_parent: [0.1, 0.0],
            anchor_child: [0.0, 0.0],
            compliance: Some(1e-6),
        });
        scenario
            .world
            .metadata
            .insert("note".to_string(), serde_json::json!("arena"));

        let json = scenario.to_json().expect("serialize");
        let restored = Scenario::from_json(&json).expect("deserialize");

        assert_eq!(scenario, restored);
        assert_eq!(restored.robot.sensors.len(), 5);
        assert_eq!(restored.robot.actuators.len(), 2);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let json = r#"{
            "robot": {
                "bodies": [
                    { "name": "base", "points": [[0, 0], [0.2, 0], [0.2, 0.1], [0, 0.1]] }
                ],
                "actuators": [
                    { "name": "m", "body": "base", "mu_long": 0.5 }
                ],
                "sensors": [
                    { "name": "d", "body": "base", "type": "distance" },
                    { "name": "e", "body": "base", "type": "encoder", "actuator": "m" }
                ]
            }
        }"#;
        let scenario = Scenario::from_json(json).expect("parse");

        let body = &scenario.robot.bodies[0];
        assert!(body.can_move);
        assert_eq!(body.mass, 1.0);
        assert_eq!(body.blockage, vec![DEFAULT_BLOCKAGE_CLASS.to_string()]);
        assert_eq!(scenario.world.settings, WorldSettings::default());

        let motor = &scenario.robot.actuators[0];
        assert_eq!(motor.wheel.mu_long, Some(0.5));
        assert_eq!(motor.wheel.lateral_damping, 0.25);

        match &scenario.robot.sensors[0].kind {
            SensorKind::Distance { range, noise_std } => {
                assert_eq!(*range, 1.0);
                assert_eq!(*noise_std, 0.0);
            }
            other => panic!("unexpected sensor kind {other:?}"),
        }
        match &scenario.robot.sensors[1].kind {
            SensorKind::Encoder { actuator, source } => {
                assert_eq!(actuator, "m");
                assert_eq!(*source, EncoderSource::Realized);
            }
            other => panic!("unexpected sensor kind {other:?}"),
        }
    }

    #[test]
    fn torque_wheel_and_line_array() {
        let json = r#"{
            "name": "m",
            "body": "base",
            "torque": { "max_torque": 0.2 },
            "type": "line_array"
        }"#;
        let motor: ActuatorDesc = serde_json::from_str(json).expect("parse");
        let torque = motor.wheel.torque.expect("torque model");
        assert_eq!(torque.max_torque, 0.2);
        assert_eq!(torque.gear_ratio, 1.0);
        assert_eq!(ActuatorDesc::wheel("m", "base", 0.0, 0.0).wheel.torque, None);

        let sensor: SensorDesc = serde_json::from_str(json).expect("parse");
        match sensor.kind {
            SensorKind::LineArray { offsets, noise_std } => {
                assert_eq!(offsets.len(), 5);
                assert_eq!(noise_std, 0.0);
            }
            other => panic!("unexpected sensor kind {other:?}"),
        }
    }

    #[test]
    fn joint_kind_tagging() {
        let json = r#"{ "name": "j", "child": "c", "kind": { "type": "rigid" } }"#;
        let joint: JointDesc = serde_json::from_str(json).expect("parse");
        assert_eq!(joint.kind, JointKind::Rigid);
        assert!(joint.parent.is_none());
        assert_eq!(joint.compliance, None);
    }

    #[test]
    fn settings_validation() {
        assert!(WorldSettings::default().validate().is_ok());

        let mut bad = WorldSettings::default();
        bad.timestep = 0.0;
        assert!(matches!(bad.validate(), Err(ScenarioError::InvalidSettings(_))));

        let mut bad = WorldSettings::default();
        bad.linear_damping = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = WorldSettings::default();
        bad.contact_compliance = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = Scenario::from_json("{ \"robot\": 3 }").unwrap_err();
        assert!(matches!(err, ScenarioError::Json(_)));
    }

    #[test]
    fn stroke_defaults() {
        let json = r#"{ "points": [[0, 0], [1, 0]] }"#;
        let stroke: StrokeDesc = serde_json::from_str(json).expect("parse");
        assert_eq!(stroke.kind, StrokeKind::Mark);
        assert_eq!(stroke.thickness, 0.05);
    }
}
