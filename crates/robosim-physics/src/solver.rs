//! XPBD constraint solving.
//!
//! Positions are corrected directly: for a constraint `C` with gradient
//! weights `w_i` and compliance `α`, each iteration computes
//!
//! ```text
//! Δλ = (-C - α̃ λ) / (Σ w_i + α̃),   α̃ = α / dt²
//! ```
//!
//! and moves every participating body along its gradient by `w_i Δλ`.
//! Velocities are derived from the corrected positions afterwards; contact
//! restitution and friction are then applied as velocity impulses.
//!
//! Constraints are visited in a fixed order (joints in load order, then
//! contacts in generation order), so results are reproducible.

use robosim_math::{Tolerance, Vec2};
use robosim_scenario::WorldSettings;

use crate::body::Body;
use crate::contact::Contact;
use crate::joint::Joint;

/// Scalar XPBD multiplier update. Zero when the system is immovable.
#[inline]
pub(crate) fn delta_lambda(c: f64, w_sum: f64, lambda: f64, compliance: f64, dt: f64) -> f64 {
    let alpha_tilde = compliance / (dt * dt);
    let denom = w_sum + alpha_tilde;
    if Tolerance::DEFAULT.is_degenerate_divisor(denom) {
        return 0.0;
    }
    alpha_tilde.mul_add(-lambda, -c) / denom
}

/// A distance-type constraint between two attachment points.
///
/// `normal` points from the point on A to the point on B and `error` is the
/// separation to remove along it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PositionalConstraint {
    pub normal: Vec2,
    pub error: f64,
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub compliance: f64,
}

/// Apply one XPBD positional correction; `a = None` is the fixed world.
///
/// With `one_sided`, the accumulated multiplier may only push (`λ ≤ 0`).
pub(crate) fn solve_positional(
    a: Option<&mut Body>,
    b: &mut Body,
    con: &PositionalConstraint,
    lambda: &mut f64,
    dt: f64,
    one_sided: bool,
) {
    if b.is_immovable() && a.as_ref().map_or(true, |a| a.is_immovable()) {
        return;
    }
    let w_a = a
        .as_ref()
        .map_or(0.0, |a| a.inverse_mass_at(&con.r_a, &con.normal));
    let w_b = b.inverse_mass_at(&con.r_b, &con.normal);
    let mut dl = delta_lambda(con.error, w_a + w_b, *lambda, con.compliance, dt);
    if one_sided {
        dl = (*lambda + dl).min(0.0) - *lambda;
    }
    *lambda += dl;

    let p = con.normal * dl;
    if let Some(a) = a {
        a.apply_position_impulse(&-p, &con.r_a);
    }
    b.apply_position_impulse(&p, &con.r_b);
}

/// Apply one XPBD correction to the relative angle `θ_b - θ_a`.
pub(crate) fn solve_angular(
    a: Option<&mut Body>,
    b: &mut Body,
    error: f64,
    compliance: f64,
    lambda: &mut f64,
    dt: f64,
) {
    if b.is_immovable() && a.as_ref().map_or(true, |a| a.is_immovable()) {
        return;
    }
    let w_a = a.as_ref().map_or(0.0, |a| a.inv_inertia);
    let dl = delta_lambda(error, w_a + b.inv_inertia, *lambda, compliance, dt);
    *lambda += dl;
    if let Some(a) = a {
        a.pose.angle -= a.inv_inertia * dl;
    }
    b.pose.angle += b.inv_inertia * dl;
}

/// Borrow two distinct bodies mutably.
pub(crate) fn body_pair(bodies: &mut [Body], a: usize, b: usize) -> (&mut Body, &mut Body) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = bodies.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = bodies.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Run the position iterations over joints and contacts.
///
/// Non-convergence is accepted: whatever correction the iteration budget
/// achieves is kept.
pub(crate) fn solve_positions(
    bodies: &mut [Body],
    joints: &[Joint],
    contacts: &mut [Contact],
    settings: &WorldSettings,
    dt: f64,
) {
    let mut joint_lambdas = vec![[0.0_f64; 2]; joints.len()];
    for _ in 0..settings.solver_iterations {
        for (joint, lambdas) in joints.iter().zip(joint_lambdas.iter_mut()) {
            joint.solve(bodies, lambdas, dt);
        }
        for contact in contacts.iter_mut() {
            solve_contact_position(bodies, contact, settings, dt);
        }
    }
}

fn solve_contact_position(
    bodies: &mut [Body],
    contact: &mut Contact,
    settings: &WorldSettings,
    dt: f64,
) {
    let (a, b) = body_pair(bodies, contact.body_a.index(), contact.body_b.index());
    let p_a = a.world_point(&contact.local_a);
    let p_b = b.world_point(&contact.local_b);
    let depth = (p_a - p_b).dot(&contact.normal);
    if depth <= settings.contact_slop {
        return;
    }
    let con = PositionalConstraint {
        normal: -contact.normal,
        error: depth - settings.contact_slop,
        r_a: p_a - a.pose.position,
        r_b: p_b - b.pose.position,
        compliance: settings.contact_compliance,
    };
    solve_positional(Some(a), b, &con, &mut contact.lambda_normal, dt, true);
}

/// Apply restitution and friction impulses to contacts that were active.
pub(crate) fn solve_velocities(
    bodies: &mut [Body],
    contacts: &[Contact],
    settings: &WorldSettings,
    dt: f64,
) {
    let tol = Tolerance::DEFAULT;
    for contact in contacts {
        if contact.lambda_normal >= 0.0 {
            continue;
        }
        let (a, b) = body_pair(bodies, contact.body_a.index(), contact.body_b.index());
        let n = contact.normal;
        let r_a = a.world_point(&contact.local_a) - a.pose.position;
        let r_b = b.world_point(&contact.local_b) - b.pose.position;

        let relative = b.point_velocity(&r_b) - a.point_velocity(&r_a);
        let normal_speed = relative.dot(&n);
        let tangential = relative - n * normal_speed;
        let slip = tangential.norm();

        // friction: oppose slip, never reverse it
        if slip > tol.linear {
            let t = tangential / slip;
            let w = a.inverse_mass_at(&r_a, &t) + b.inverse_mass_at(&r_b, &t);
            if !tol.is_degenerate_divisor(w) {
                let normal_impulse = contact.lambda_normal.abs() / dt;
                let stop_impulse = slip / w;
                let j = (contact.friction * normal_impulse).min(stop_impulse);
                let p = t * j;
                a.apply_impulse(&p, &r_a);
                b.apply_impulse(&-p, &r_b);
            }
        }

        // restitution against the pre-solve approach speed
        let approach = contact.approach_speed;
        let e = if approach < -settings.restitution_threshold {
            contact.restitution
        } else {
            0.0
        };
        let target = (-e * approach).max(0.0);
        let relative = b.point_velocity(&r_b) - a.point_velocity(&r_a);
        let du = target - relative.dot(&n);
        let w = a.inverse_mass_at(&r_a, &n) + b.inverse_mass_at(&r_b, &n);
        if !tol.is_degenerate_divisor(w) {
            let p = n * (du / w);
            a.apply_impulse(&-p, &r_a);
            b.apply_impulse(&p, &r_b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use robosim_math::Pose2;
    use robosim_scenario::BodyDesc;

    fn unit_body(x: f64, can_move: bool) -> Body {
        let mut desc = BodyDesc::rectangle("b", 0.1, 0.1);
        desc.can_move = can_move;
        Body::from_desc(&desc, Pose2::new(x, 0.0, 0.0), 1, true).unwrap()
    }

    #[test]
    fn test_delta_lambda_rigid() {
        // equal masses split a unit error
        assert_abs_diff_eq!(delta_lambda(1.0, 2.0, 0.0, 0.0, 0.01), -0.5);
        // compliance softens the response
        assert!(delta_lambda(1.0, 2.0, 0.0, 1e-4, 0.01).abs() < 0.5);
        assert_eq!(delta_lambda(1.0, 0.0, 0.0, 0.0, 0.01), 0.0);
    }

    #[test]
    fn test_positional_pulls_points_together() {
        let mut a = unit_body(0.0, true);
        let mut b = unit_body(1.0, true);
        let con = PositionalConstraint {
            normal: Vec2::new(1.0, 0.0),
            error: 1.0,
            r_a: Vec2::zeros(),
            r_b: Vec2::zeros(),
            compliance: 0.0,
        };
        let mut lambda = 0.0;
        solve_positional(Some(&mut a), &mut b, &con, &mut lambda, 0.01, false);
        assert_abs_diff_eq!(a.pose.position.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(b.pose.position.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_static_side_does_not_move() {
        let mut wall = unit_body(0.0, false);
        let mut b = unit_body(1.0, true);
        let con = PositionalConstraint {
            normal: Vec2::new(1.0, 0.0),
            error: 1.0,
            r_a: Vec2::zeros(),
            r_b: Vec2::zeros(),
            compliance: 0.0,
        };
        let mut lambda = 0.0;
        solve_positional(Some(&mut wall), &mut b, &con, &mut lambda, 0.01, false);
        assert_eq!(wall.pose.position.x, 0.0);
        assert_abs_diff_eq!(b.pose.position.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_immovable_pair_is_skipped() {
        let mut a = unit_body(0.0, false);
        let mut b = unit_body(1.0, false);
        let con = PositionalConstraint {
            normal: Vec2::new(1.0, 0.0),
            error: 1.0,
            r_a: Vec2::zeros(),
            r_b: Vec2::zeros(),
            compliance: 1e-6,
        };
        let mut lambda = 0.0;
        solve_positional(Some(&mut a), &mut b, &con, &mut lambda, 0.01, false);
        solve_positional(None, &mut b, &con, &mut lambda, 0.01, false);
        assert_eq!(lambda, 0.0);
        solve_angular(Some(&mut a), &mut b, 0.3, 1e-6, &mut lambda, 0.01);
        assert_eq!(lambda, 0.0);
        assert_eq!(b.pose.position.x, 1.0);
    }

    #[test]
    fn test_one_sided_never_pulls() {
        let mut a = unit_body(0.0, true);
        let mut b = unit_body(1.0, true);
        let con = PositionalConstraint {
            normal: Vec2::new(1.0, 0.0),
            error: -0.2,
            r_a: Vec2::zeros(),
            r_b: Vec2::zeros(),
            compliance: 0.0,
        };
        let mut lambda = 0.0;
        solve_positional(Some(&mut a), &mut b, &con, &mut lambda, 0.01, true);
        assert_eq!(lambda, 0.0);
        assert_eq!(b.pose.position.x, 1.0);
    }

    #[test]
    fn test_angular_lock() {
        let mut a = unit_body(0.0, true);
        let mut b = unit_body(1.0, true);
        b.pose.angle = 0.4;
        let mut lambda = 0.0;
        solve_angular(Some(&mut a), &mut b, 0.4, 0.0, &mut lambda, 0.01);
        assert_abs_diff_eq!(b.pose.angle - a.pose.angle, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_body_pair_order() {
        let mut bodies = vec![unit_body(0.0, true), unit_body(1.0, true), unit_body(2.0, true)];
        let (x, y) = body_pair(&mut bodies, 2, 0);
        assert_eq!(x.pose.position.x, 2.0);
        assert_eq!(y.pose.position.x, 0.0);
    }
}
