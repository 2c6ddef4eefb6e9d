//! Error types for the simulation engine.

use robosim_scenario::ScenarioError;
use thiserror::Error;

use crate::ids::{ActuatorId, BodyId, SensorId};

/// Errors raised while loading a scenario or addressing world objects.
///
/// Degenerate runtime conditions (no traction, no ray hit, solver
/// non-convergence) are never errors.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Body polygon is unusable.
    #[error("malformed polygon for body '{body}': {reason}")]
    MalformedPolygon {
        /// Body name.
        body: String,
        /// What is wrong with the polygon.
        reason: String,
    },

    /// Dynamic body with zero, negative or non-finite mass.
    #[error("invalid mass {mass} for dynamic body '{body}'")]
    InvalidMass {
        /// Body name.
        body: String,
        /// Offending mass.
        mass: f64,
    },

    /// Explicit or derived moment of inertia is unusable.
    #[error("invalid inertia {inertia} for dynamic body '{body}'")]
    InvalidInertia {
        /// Body name.
        body: String,
        /// Offending inertia.
        inertia: f64,
    },

    /// A joint, actuator or sensor names a body that does not exist.
    #[error("'{owner}' references missing body '{body}'")]
    MissingBody {
        /// Name of the referencing joint, actuator or sensor.
        owner: String,
        /// Missing body name.
        body: String,
    },

    /// An encoder names an actuator that does not exist.
    #[error("sensor '{sensor}' references missing actuator '{actuator}'")]
    MissingActuator {
        /// Sensor name.
        sensor: String,
        /// Missing actuator name.
        actuator: String,
    },

    /// Two objects of the same kind share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Object kind ("body", "joint", ...).
        kind: &'static str,
        /// Repeated name.
        name: String,
    },

    /// A joint, actuator or sensor parameter is out of range.
    #[error("invalid parameter on '{owner}': {reason}")]
    InvalidParameter {
        /// Name of the offending object.
        owner: String,
        /// What is wrong.
        reason: String,
    },

    /// More distinct blockage classes than the collision mask can hold.
    #[error("{count} blockage classes exceed the limit of {limit}")]
    TooManyBlockageClasses {
        /// Number of classes in the scenario.
        count: usize,
        /// Maximum supported.
        limit: usize,
    },

    /// World settings are out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Scenario could not be read.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Body id does not belong to this world.
    #[error("unknown body {0}")]
    UnknownBody(BodyId),

    /// Actuator id does not belong to this world.
    #[error("unknown actuator {0}")]
    UnknownActuator(ActuatorId),

    /// Sensor id does not belong to this world.
    #[error("unknown sensor {0}")]
    UnknownSensor(SensorId),

    /// Snapshot was taken from a differently shaped world.
    #[error("snapshot does not match world: {0}")]
    SnapshotMismatch(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
