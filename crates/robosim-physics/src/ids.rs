//! Stable integer handles into the world's arenas.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Position of the object in its arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to a body.
    BodyId,
    "body"
);
arena_id!(
    /// Handle to a joint.
    JointId,
    "joint"
);
arena_id!(
    /// Handle to a wheel actuator.
    ActuatorId,
    "actuator"
);
arena_id!(
    /// Handle to a sensor.
    SensorId,
    "sensor"
);
