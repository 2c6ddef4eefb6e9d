#![warn(missing_docs)]

//! 2D top-down rigid-body simulation for small wheeled robots.
//!
//! The engine steps a [`World`] of convex-decomposed polygon bodies with an
//! XPBD (extended position-based dynamics) solver. Wheels push their host
//! bodies through a friction-capped traction model driven by a virtual
//! normal load, and sensors read distances, line intensity, heading and
//! wheel rotation from the current state.
//!
//! # Features
//!
//! - Scenario loading with full validation up front
//! - Hinge and rigid joints, optionally pinned to the world
//! - Polygon contacts with slop, compliance, friction and restitution
//! - Deterministic sensor noise and snapshot/restore
//! - A controller boundary for robot code
//!
//! # Example
//!
//! ```no_run
//! use robosim_physics::World;
//! use robosim_scenario::Scenario;
//!
//! let mut world = World::from_scenario(&Scenario::differential_drive_example())?;
//! let left = world.actuator_id("left_motor").unwrap();
//! let right = world.actuator_id("right_motor").unwrap();
//! world.set_actuator(left, 1.0)?;
//! world.set_actuator(right, 1.0)?;
//! for _ in 0..120 {
//!     world.step_default();
//! }
//! let distance = world.sensor_id("front_distance").unwrap();
//! println!("{:?}", world.get_sensor(distance)?);
//! # Ok::<(), robosim_physics::PhysicsError>(())
//! ```

mod body;
mod contact;
mod controller;
mod environment;
mod error;
mod ids;
mod joint;
mod sensor;
mod shape;
mod solver;
mod state;
mod step;
mod traction;
mod world;

pub use body::{Body, Material};
pub use contact::Contact;
pub use controller::{ControlIo, Controller, DifferentialDrive, Observer, Session};
pub use environment::{environment_bodies, BOUNDS_THICKNESS};
pub use error::{PhysicsError, Result};
pub use ids::{ActuatorId, BodyId, JointId, SensorId};
pub use joint::{Joint, JointKind};
pub use sensor::{Sensor, SensorKind, SensorValue};
pub use shape::{ConvexPart, Shape};
pub use state::{ActuatorState, BodyState, SensorState, StateDump, WorldSnapshot};
pub use traction::{Actuator, TractionReport};
pub use world::{World, MAX_BLOCKAGE_CLASSES};

pub use robosim_math::{Pose2, Vec2};
