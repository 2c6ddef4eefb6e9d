//! Rigid bodies.
//!
//! A body integrates about its center of mass. Its shape, and every anchor
//! or mount attached to it, is stored relative to that center; the pose
//! reported to callers is the pose of the frame the scenario described it in.

use robosim_math::{cross, cross_scalar, Pose2, Tolerance, Vec2};
use robosim_scenario::{BodyDesc, MaterialDesc};

use crate::error::{PhysicsError, Result};
use crate::shape::Shape;

/// Surface properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Coefficient of restitution.
    pub restitution: f64,
    /// Wheel traction coefficient.
    pub traction: f64,
    /// Intensity read by line sensors; `None` for surfaces they ignore.
    pub line_intensity: Option<f64>,
}

impl Material {
    fn from_desc(desc: &MaterialDesc, body: &str) -> Result<Self> {
        let traction = desc.traction.unwrap_or(desc.friction);
        for (field, value) in [
            ("friction", desc.friction),
            ("restitution", desc.restitution),
            ("traction", traction),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PhysicsError::InvalidParameter {
                    owner: body.to_string(),
                    reason: format!("material {field} must be finite and non-negative"),
                });
            }
        }
        if desc.line_intensity.is_some_and(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidParameter {
                owner: body.to_string(),
                reason: "material line_intensity must be finite".into(),
            });
        }
        Ok(Self {
            friction: desc.friction,
            restitution: desc.restitution.min(1.0),
            traction,
            line_intensity: desc.line_intensity,
        })
    }
}

/// A rigid polygonal body.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) name: String,
    pub(crate) shape: Shape,
    /// Offset of the center of mass in the described frame.
    pub(crate) local_center: Vec2,
    /// Pose of the center-of-mass frame.
    pub(crate) pose: Pose2,
    pub(crate) prev_pose: Pose2,
    pub(crate) velocity: Vec2,
    pub(crate) angular_velocity: f64,
    pub(crate) force: Vec2,
    pub(crate) torque: f64,
    pub(crate) mass: f64,
    pub(crate) inertia: f64,
    pub(crate) inv_mass: f64,
    pub(crate) inv_inertia: f64,
    pub(crate) can_move: bool,
    pub(crate) material: Material,
    pub(crate) blockage: u64,
    pub(crate) is_robot: bool,
    /// Described pose at load: relative to the spawn pose for robot bodies.
    pub(crate) rest_pose: Pose2,
}

impl Body {
    /// Build a body from its description placed at `pose` (described frame).
    pub(crate) fn from_desc(desc: &BodyDesc, pose: Pose2, blockage: u64, is_robot: bool) -> Result<Self> {
        let raw = Shape::from_points(&desc.points, &desc.name)?;
        let material = Material::from_desc(&desc.material, &desc.name)?;
        if !pose.is_finite() {
            return Err(PhysicsError::InvalidParameter {
                owner: desc.name.clone(),
                reason: "pose must be finite".into(),
            });
        }

        let local_center = raw.centroid();
        let shape = raw.translated(&-local_center);

        let (mass, inertia, inv_mass, inv_inertia) = if desc.can_move {
            if !(desc.mass.is_finite() && desc.mass > 0.0) {
                return Err(PhysicsError::InvalidMass {
                    body: desc.name.clone(),
                    mass: desc.mass,
                });
            }
            let inertia = match desc.inertia {
                // explicit values are about the described origin
                Some(i) => i - desc.mass * local_center.norm_squared(),
                None => shape.inertia_about_centroid(desc.mass),
            };
            if !(inertia.is_finite() && inertia > 0.0) {
                return Err(PhysicsError::InvalidInertia {
                    body: desc.name.clone(),
                    inertia: desc.inertia.unwrap_or(inertia),
                });
            }
            (desc.mass, inertia, 1.0 / desc.mass, 1.0 / inertia)
        } else {
            (f64::INFINITY, f64::INFINITY, 0.0, 0.0)
        };

        let mut body = Self {
            name: desc.name.clone(),
            shape,
            local_center,
            pose: Pose2::identity(),
            prev_pose: Pose2::identity(),
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            force: Vec2::zeros(),
            torque: 0.0,
            mass,
            inertia,
            inv_mass,
            inv_inertia,
            can_move: desc.can_move,
            material,
            blockage,
            is_robot,
            rest_pose: Pose2::from_array(desc.pose),
        };
        body.set_frame_pose(&pose);
        Ok(body)
    }

    /// Name from the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pose of the described frame (the polygon's coordinate origin).
    pub fn pose(&self) -> Pose2 {
        Pose2 {
            position: self.pose.position - self.pose.transform_vector(&self.local_center),
            angle: self.pose.angle,
        }
    }

    /// World position of the center of mass.
    pub fn center_of_mass(&self) -> Vec2 {
        self.pose.position
    }

    /// Linear velocity of the center of mass.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Angular velocity (rad/s).
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Mass (infinite for static bodies).
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Moment of inertia about the center of mass (infinite for static bodies).
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Whether the body never moves.
    pub fn is_static(&self) -> bool {
        !self.can_move
    }

    /// Surface properties.
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Footprint, relative to the center of mass.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Whether the body belongs to the robot.
    pub fn is_robot(&self) -> bool {
        self.is_robot
    }

    /// Whether the body takes part in collisions at all.
    pub fn is_solid(&self) -> bool {
        self.blockage != 0
    }

    /// Place the described frame at `pose`.
    pub(crate) fn set_frame_pose(&mut self, pose: &Pose2) {
        self.pose = Pose2 {
            position: pose.transform_point(&self.local_center),
            angle: pose.angle,
        };
        self.prev_pose = self.pose;
    }

    /// Convert a point in the described frame to the center-of-mass frame.
    pub(crate) fn local_from_frame(&self, p: &Vec2) -> Vec2 {
        p - self.local_center
    }

    /// World position of a center-of-mass-frame point.
    #[inline]
    pub(crate) fn world_point(&self, local: &Vec2) -> Vec2 {
        self.pose.transform_point(local)
    }

    /// Velocity of the material point at world offset `r` from the center.
    #[inline]
    pub(crate) fn point_velocity(&self, r: &Vec2) -> Vec2 {
        self.velocity + cross_scalar(self.angular_velocity, r)
    }

    /// Generalized inverse mass along `n` at offset `r`.
    #[inline]
    pub(crate) fn inverse_mass_at(&self, r: &Vec2, n: &Vec2) -> f64 {
        let rn = cross(r, n);
        self.inv_mass + self.inv_inertia * rn * rn
    }

    /// Apply a velocity impulse `p` at offset `r`.
    #[inline]
    pub(crate) fn apply_impulse(&mut self, p: &Vec2, r: &Vec2) {
        self.velocity += p * self.inv_mass;
        self.angular_velocity += self.inv_inertia * cross(r, p);
    }

    /// Apply a positional correction `p` (an impulse times dt) at offset `r`.
    #[inline]
    pub(crate) fn apply_position_impulse(&mut self, p: &Vec2, r: &Vec2) {
        self.pose.position += p * self.inv_mass;
        self.pose.angle += self.inv_inertia * cross(r, p);
    }

    /// Stop the body and clear its accumulators.
    pub(crate) fn halt(&mut self) {
        self.velocity = Vec2::zeros();
        self.angular_velocity = 0.0;
        self.force = Vec2::zeros();
        self.torque = 0.0;
    }

    /// Zero any non-finite velocity component. Returns true if anything changed.
    pub(crate) fn sanitize_velocity(&mut self) -> bool {
        let bad = !(self.velocity.x.is_finite()
            && self.velocity.y.is_finite()
            && self.angular_velocity.is_finite());
        if bad {
            self.velocity = Vec2::zeros();
            self.angular_velocity = 0.0;
        }
        bad
    }

    /// Clamp speeds to the given limits (0 disables). Returns true if clamped.
    pub(crate) fn clamp_speed(&mut self, max_linear: f64, max_angular: f64) -> bool {
        let mut clamped = false;
        let speed = self.velocity.norm();
        if max_linear > 0.0 && speed > max_linear {
            self.velocity *= max_linear / speed;
            clamped = true;
        }
        if max_angular > 0.0 && self.angular_velocity.abs() > max_angular {
            self.angular_velocity = max_angular.copysign(self.angular_velocity);
            clamped = true;
        }
        clamped
    }

    /// Effective degenerate-mass check used by solvers.
    pub(crate) fn is_immovable(&self) -> bool {
        Tolerance::DEFAULT.is_degenerate_divisor(self.inv_mass)
            && Tolerance::DEFAULT.is_degenerate_divisor(self.inv_inertia)
    }
}
