//! Joints between bodies, or between a body and the world.

use robosim_math::{Tolerance, Vec2};
use robosim_scenario::{JointDesc, JointKind as JointKindDesc};

use crate::body::Body;
use crate::error::{PhysicsError, Result};
use crate::ids::BodyId;
use crate::solver::{body_pair, solve_angular, solve_positional, PositionalConstraint};

/// Angular behavior of a joint. Both kinds pin the anchors together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Relative angle locked at `rest_angle`.
    Rigid {
        /// Child angle minus parent angle at load.
        rest_angle: f64,
    },
    /// Free rotation, optionally within `[lower, upper]`.
    Hinge {
        /// Relative angle limits.
        limits: Option<(f64, f64)>,
    },
}

/// A positional constraint. Anchors are stored in each body's
/// center-of-mass frame; a world anchor is a world point.
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) name: String,
    pub(crate) parent: Option<BodyId>,
    pub(crate) child: BodyId,
    pub(crate) anchor_parent: Vec2,
    pub(crate) anchor_child: Vec2,
    pub(crate) kind: JointKind,
    pub(crate) compliance: f64,
}

impl Joint {
    /// Resolve a joint description against already-built bodies.
    pub(crate) fn from_desc(
        desc: &JointDesc,
        parent: Option<BodyId>,
        child: BodyId,
        bodies: &[Body],
        default_compliance: f64,
    ) -> Result<Self> {
        let invalid = |reason: &str| PhysicsError::InvalidParameter {
            owner: desc.name.clone(),
            reason: reason.to_string(),
        };
        if parent == Some(child) {
            return Err(invalid("joint connects a body to itself"));
        }
        let compliance = desc.compliance.unwrap_or(default_compliance);
        if !(compliance.is_finite() && compliance >= 0.0) {
            return Err(invalid("compliance must be finite and non-negative"));
        }
        let mut anchors = desc.anchor_parent.iter().chain(&desc.anchor_child);
        if anchors.any(|c| !c.is_finite()) {
            return Err(invalid("anchors must be finite"));
        }

        let child_body = &bodies[child.index()];
        let parent_body = parent.map(|p| &bodies[p.index()]);
        let parent_angle = parent_body.map_or(0.0, |b| b.pose.angle);

        let kind = match desc.kind {
            JointKindDesc::Rigid => JointKind::Rigid {
                rest_angle: child_body.pose.angle - parent_angle,
            },
            JointKindDesc::Hinge { limits } => {
                if let Some([lo, hi]) = limits {
                    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                        return Err(invalid("hinge limits must satisfy lower <= upper"));
                    }
                }
                JointKind::Hinge {
                    limits: limits.map(|[lo, hi]| (lo, hi)),
                }
            }
        };

        let raw_parent = Vec2::new(desc.anchor_parent[0], desc.anchor_parent[1]);
        let raw_child = Vec2::new(desc.anchor_child[0], desc.anchor_child[1]);
        Ok(Self {
            name: desc.name.clone(),
            parent,
            child,
            anchor_parent: parent_body.map_or(raw_parent, |b| b.local_from_frame(&raw_parent)),
            anchor_child: child_body.local_from_frame(&raw_child),
            kind,
            compliance,
        })
    }

    /// Name from the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent body, or `None` for a world anchor.
    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    /// Child body.
    pub fn child(&self) -> BodyId {
        self.child
    }

    /// Angular behavior.
    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// World positions of the parent and child anchors.
    pub(crate) fn world_anchors(&self, bodies: &[Body]) -> (Vec2, Vec2) {
        let p = match self.parent {
            Some(id) => bodies[id.index()].world_point(&self.anchor_parent),
            None => self.anchor_parent,
        };
        (p, bodies[self.child.index()].world_point(&self.anchor_child))
    }

    /// Distance between the two anchors.
    pub(crate) fn anchor_error(&self, bodies: &[Body]) -> f64 {
        let (a, b) = self.world_anchors(bodies);
        (b - a).norm()
    }

    /// One solver visit: pin the anchors, then handle the relative angle.
    /// `lambdas` holds the positional and angular multipliers for this step.
    pub(crate) fn solve(&self, bodies: &mut [Body], lambdas: &mut [f64; 2], dt: f64) {
        let (mut parent, child) = match self.parent {
            Some(p) => {
                let (a, b) = body_pair(bodies, p.index(), self.child.index());
                (Some(a), b)
            }
            None => (None, &mut bodies[self.child.index()]),
        };

        let p_a = match &parent {
            Some(a) => a.world_point(&self.anchor_parent),
            None => self.anchor_parent,
        };
        let p_b = child.world_point(&self.anchor_child);
        let e = p_b - p_a;
        let c = e.norm();
        if c > Tolerance::DEFAULT.linear {
            let con = PositionalConstraint {
                normal: e / c,
                error: c,
                r_a: parent.as_ref().map_or(Vec2::zeros(), |a| p_a - a.pose.position),
                r_b: p_b - child.pose.position,
                compliance: self.compliance,
            };
            solve_positional(parent.as_deref_mut(), child, &con, &mut lambdas[0], dt, false);
        }

        let relative = child.pose.angle - parent.as_ref().map_or(0.0, |a| a.pose.angle);
        let angle_error = match self.kind {
            JointKind::Rigid { rest_angle } => Some(relative - rest_angle),
            JointKind::Hinge {
                limits: Some((lo, _)),
            } if relative < lo => Some(relative - lo),
            JointKind::Hinge {
                limits: Some((_, hi)),
            } if relative > hi => Some(relative - hi),
            JointKind::Hinge { .. } => None,
        };
        if let Some(err) = angle_error {
            if err.abs() > Tolerance::DEFAULT.angular {
                solve_angular(parent, child, err, self.compliance, &mut lambdas[1], dt);
            }
        }
    }
}
