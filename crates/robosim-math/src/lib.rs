#![warn(missing_docs)]

//! Math types for the robosim engine.
//!
//! Thin wrappers around nalgebra providing the planar vocabulary used by
//! the simulator: vectors, poses, bounding boxes, angle helpers and
//! tolerance constants. All lengths are meters, all angles radians.

use std::f64::consts::PI;

use nalgebra::{Rotation2, Vector2};

/// A vector (or point) in the plane.
pub type Vec2 = Vector2<f64>;

/// Rotate `v` counter-clockwise by `angle` radians.
#[inline]
pub fn rotate(v: &Vec2, angle: f64) -> Vec2 {
    Rotation2::new(angle) * v
}

/// Scalar 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
pub fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Left perpendicular of `v`, i.e. `v` rotated by +90°.
#[inline]
pub fn perp(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Velocity of a point at offset `r` on a body spinning at `omega` (ω × r).
#[inline]
pub fn cross_scalar(omega: f64, r: &Vec2) -> Vec2 {
    perp(r) * omega
}

/// Wrap an angle into the half-open interval `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Unit vector pointing along `angle`.
#[inline]
pub fn direction(angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(c, s)
}

/// A rigid planar pose: position plus heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2 {
    /// Position of the frame origin.
    pub position: Vec2,
    /// Heading in radians, counter-clockwise from +X. Not wrapped.
    pub angle: f64,
}

impl Pose2 {
    /// Create a pose from components.
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        Self {
            position: Vec2::new(x, y),
            angle,
        }
    }

    /// The identity pose at the origin.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Build from an `[x, y, theta]` triple.
    pub fn from_array(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }

    /// Convert to an `[x, y, theta]` triple.
    pub fn to_array(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.angle]
    }

    /// Map a point from this frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, local: &Vec2) -> Vec2 {
        self.position + rotate(local, self.angle)
    }

    /// Map a direction from this frame into the parent frame.
    #[inline]
    pub fn transform_vector(&self, local: &Vec2) -> Vec2 {
        rotate(local, self.angle)
    }

    /// Map a point from the parent frame into this frame.
    #[inline]
    pub fn inverse_transform_point(&self, world: &Vec2) -> Vec2 {
        rotate(&(world - self.position), -self.angle)
    }

    /// Compose: `other` is expressed in this frame, the result in the parent frame.
    pub fn compose(&self, other: &Pose2) -> Pose2 {
        Pose2 {
            position: self.transform_point(&other.position),
            angle: self.angle + other.angle,
        }
    }

    /// Add the components of `offset` (not a frame composition).
    ///
    /// Used for spawn offsets, where robot part poses are shifted
    /// component-wise by the spawn pose.
    pub fn offset_by(&self, offset: &Pose2) -> Pose2 {
        Pose2 {
            position: self.position + offset.position,
            angle: self.angle + offset.angle,
        }
    }

    /// Unit vector along the heading.
    #[inline]
    pub fn heading(&self) -> Vec2 {
        direction(self.angle)
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.angle.is_finite()
    }
}

impl Default for Pose2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
}

impl Aabb2 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Vec2::new(f64::INFINITY, f64::INFINITY),
            max: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Bounding box of a point set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Vec2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Test if a point lies inside or on the boundary.
    pub fn contains(&self, p: &Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Expand the AABB by a margin in all directions.
    pub fn expand(&mut self, margin: f64) {
        self.min.x -= margin;
        self.min.y -= margin;
        self.max.x += margin;
        self.max.y += margin;
    }

    /// Center of the box.
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in meters.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
    /// Smallest divisor treated as non-zero (inverse masses, lengths).
    pub divisor: f64,
}

impl Tolerance {
    /// Default simulation tolerances.
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        angular: 1e-12,
        divisor: 1e-12,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Vec2, b: &Vec2) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if a divisor is too small to divide by.
    pub fn is_degenerate_divisor(&self, d: f64) -> bool {
        !(d.abs() > self.divisor)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
