//! Wheel motors and the traction model.
//!
//! A wheel pushes its host body along the mount's +X axis. The push is an
//! impulse capped by `mu_long * N * dt`, where `N` is a virtual normal load
//! (the world is top-down, so there is no real weight). Side slip at the
//! wheel is driven toward zero by a lateral impulse capped by `mu_lat * N * dt`
//! and softened by `lateral_damping`.
//!
//! Wheels are force-commanded by default. With a [`TorqueDrive`] the command
//! is a motor torque, geared down to a drive force at the wheel rim.

use robosim_math::{perp, Pose2, Tolerance, Vec2};
use robosim_scenario::{ActuatorDesc, TorqueDrive};
use serde::{Deserialize, Serialize};

use crate::body::Body;
use crate::error::{PhysicsError, Result};
use crate::ids::BodyId;

/// What a wheel did during the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TractionReport {
    /// Applied drive force along the wheel axis (N).
    pub longitudinal_force: f64,
    /// Applied anti-slip force across the wheel axis (N).
    pub lateral_force: f64,
    /// Virtual normal load used for the friction caps (N).
    pub normal_load: f64,
    /// Side-slip speed at the wheel before correction (m/s).
    pub lateral_slip: f64,
    /// Realized wheel angular speed after the tick (rad/s).
    pub wheel_speed: f64,
}

/// A wheel motor mounted on a body.
#[derive(Debug, Clone)]
pub struct Actuator {
    pub(crate) name: String,
    pub(crate) body: BodyId,
    /// Mount pose in the host's center-of-mass frame.
    pub(crate) mount: Pose2,
    pub(crate) max_force: Option<f64>,
    pub(crate) mu_long: f64,
    pub(crate) mu_lat: f64,
    pub(crate) normal_force: Option<f64>,
    pub(crate) equivalent_weight: f64,
    pub(crate) wheel_count: u32,
    pub(crate) lateral_damping: f64,
    pub(crate) wheel_radius: f64,
    pub(crate) max_wheel_omega: f64,
    pub(crate) torque: Option<TorqueDrive>,
    /// Motor shaft speed under a torque model (rad/s).
    pub(crate) motor_speed: f64,
    pub(crate) command: f64,
    pub(crate) report: TractionReport,
    pub(crate) realized_rotation: f64,
    pub(crate) commanded_rotation: f64,
}

impl Actuator {
    /// Resolve a wheel description. `wheels_on_body` is the number of
    /// actuators sharing the host, used when no explicit count is given.
    pub(crate) fn from_desc(
        desc: &ActuatorDesc,
        body_id: BodyId,
        body: &Body,
        wheels_on_body: u32,
        g_equiv: f64,
    ) -> Result<Self> {
        let invalid = |reason: String| PhysicsError::InvalidParameter {
            owner: desc.name.clone(),
            reason,
        };
        let w = &desc.wheel;
        let mu_long = w.mu_long.unwrap_or(body.material.traction);
        let mu_lat = w.mu_lat.unwrap_or(body.material.friction);
        let equivalent_weight = w.equivalent_weight.unwrap_or(if body.can_move {
            body.mass * g_equiv
        } else {
            0.0
        });

        let non_negative = [
            ("mu_long", Some(mu_long)),
            ("mu_lat", Some(mu_lat)),
            ("normal_force", w.normal_force),
            ("equivalent_weight", Some(equivalent_weight)),
            ("max_wheel_omega", Some(w.max_wheel_omega)),
        ];
        for (field, value) in non_negative {
            if let Some(v) = value {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(invalid(format!("{field} must be finite and non-negative")));
                }
            }
        }
        if let Some(f) = w.max_force {
            if !(f.is_finite() && f > 0.0) {
                return Err(invalid("max_force must be positive".into()));
            }
        }
        if !(0.0..=1.0).contains(&w.lateral_damping) {
            return Err(invalid("lateral_damping must be between 0 and 1".into()));
        }
        if !(w.wheel_radius.is_finite() && w.wheel_radius > 0.0) {
            return Err(invalid("wheel_radius must be positive".into()));
        }
        if let Some(t) = &w.torque {
            for (field, v) in [
                ("max_torque", t.max_torque),
                ("gear_ratio", t.gear_ratio),
                ("motor_inertia", t.motor_inertia),
            ] {
                if !(v.is_finite() && v > 0.0) {
                    return Err(invalid(format!("{field} must be positive")));
                }
            }
        }
        let mount = Pose2::from_array(desc.mount_pose);
        if !mount.is_finite() {
            return Err(invalid("mount_pose must be finite".into()));
        }

        Ok(Self {
            name: desc.name.clone(),
            body: body_id,
            mount: Pose2 {
                position: body.local_from_frame(&mount.position),
                angle: mount.angle,
            },
            max_force: w.max_force,
            mu_long,
            mu_lat,
            normal_force: w.normal_force,
            equivalent_weight,
            wheel_count: w.wheel_count.unwrap_or(wheels_on_body),
            lateral_damping: w.lateral_damping,
            wheel_radius: w.wheel_radius,
            max_wheel_omega: w.max_wheel_omega,
            torque: w.torque,
            motor_speed: 0.0,
            command: 0.0,
            report: TractionReport::default(),
            realized_rotation: 0.0,
            commanded_rotation: 0.0,
        })
    }

    /// Name from the scenario.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host body.
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Current command: a drive force (N), or a motor torque (N·m) when the
    /// wheel has a torque model.
    pub fn command(&self) -> f64 {
        self.command
    }

    /// Motor shaft speed (rad/s); always zero without a torque model.
    pub fn motor_speed(&self) -> f64 {
        self.motor_speed
    }

    /// Report from the last tick.
    pub fn report(&self) -> &TractionReport {
        &self.report
    }

    /// Longitudinal friction coefficient.
    pub fn mu_long(&self) -> f64 {
        self.mu_long
    }

    /// Virtual normal load: the explicit value, or the equivalent weight
    /// shared among the wheels on the host. Zero wheels means zero load.
    pub fn normal_load(&self) -> f64 {
        match self.normal_force {
            Some(n) => n,
            None if self.wheel_count == 0 => 0.0,
            None => self.equivalent_weight / f64::from(self.wheel_count),
        }
    }

    /// Whether the command maps onto a commanded wheel speed.
    pub(crate) fn has_command_scale(&self) -> bool {
        self.max_force.is_some() || self.torque.is_some()
    }

    /// Drive force at the wheel rim after motor saturation, before traction.
    fn drive_force(&self) -> f64 {
        match (&self.torque, self.max_force) {
            (Some(t), _) => {
                self.command.clamp(-t.max_torque, t.max_torque) * t.gear_ratio / self.wheel_radius
            }
            (None, Some(max)) => self.command.clamp(-max, max),
            (None, None) => self.command,
        }
    }

    /// Spin the motor shaft up under the saturated command torque.
    fn update_motor_speed(&mut self, dt: f64) {
        if let Some(t) = &self.torque {
            let torque = self.command.clamp(-t.max_torque, t.max_torque);
            let limit = self.max_wheel_omega * t.gear_ratio;
            self.motor_speed = (self.motor_speed + torque / t.motor_inertia * dt).clamp(-limit, limit);
        }
    }

    /// Offset from the host center and drive direction, in world space.
    fn drive_frame(&self, body: &Body) -> (Vec2, Vec2) {
        let r = body.pose.transform_vector(&self.mount.position);
        let forward = body.pose.compose(&self.mount).heading();
        (r, forward)
    }

    /// Apply this tick's drive and anti-slip impulses to the host.
    pub(crate) fn apply(&mut self, body: &mut Body, dt: f64) {
        let normal_load = self.normal_load();
        let (r, forward) = self.drive_frame(body);
        let lateral = perp(&forward);
        let lateral_slip = body.point_velocity(&r).dot(&lateral);
        self.report = TractionReport {
            normal_load,
            lateral_slip,
            ..TractionReport::default()
        };
        if !body.can_move {
            return;
        }
        self.update_motor_speed(dt);

        let max_long = self.mu_long * normal_load * dt;
        let max_lat = self.mu_lat * normal_load * dt;

        if max_long > 0.0 {
            let j = (self.drive_force() * dt).clamp(-max_long, max_long);
            body.apply_impulse(&(forward * j), &r);
            self.report.longitudinal_force = j / dt;
        }

        if max_lat > 0.0 {
            let v_lat = body.point_velocity(&r).dot(&lateral);
            let w = body.inverse_mass_at(&r, &lateral);
            if !Tolerance::DEFAULT.is_degenerate_divisor(w) {
                let j = (-v_lat / w * (1.0 - self.lateral_damping)).clamp(-max_lat, max_lat);
                body.apply_impulse(&(lateral * j), &r);
                self.report.lateral_force = j / dt;
            }
        }
    }

    /// Integrate wheel rotation from the host's post-tick motion.
    pub(crate) fn update_rotation(&mut self, body: &Body, dt: f64) {
        let (r, forward) = self.drive_frame(body);
        let realized = body.point_velocity(&r).dot(&forward) / self.wheel_radius;
        let commanded = match (&self.torque, self.max_force) {
            (Some(t), _) => self.motor_speed / t.gear_ratio,
            (None, Some(max)) => (self.command / max).clamp(-1.0, 1.0) * self.max_wheel_omega,
            (None, None) => 0.0,
        };
        self.report.wheel_speed = realized;
        self.realized_rotation += realized * dt;
        self.commanded_rotation += commanded * dt;
    }

    /// Zero the command, report and rotation totals.
    pub(crate) fn clear(&mut self) {
        self.command = 0.0;
        self.report = TractionReport::default();
        self.motor_speed = 0.0;
        self.realized_rotation = 0.0;
        self.commanded_rotation = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use robosim_scenario::BodyDesc;

    const DT: f64 = 1.0 / 120.0;

    fn chassis() -> Body {
        let desc = BodyDesc::rectangle("chassis", 0.2, 0.15);
        Body::from_desc(&desc, Pose2::identity(), 1, true).unwrap()
    }

    fn wheel(y: f64) -> ActuatorDesc {
        let mut desc = ActuatorDesc::wheel("m", "chassis", 0.0, y);
        desc.wheel.mu_long = Some(0.5);
        desc
    }

    #[test]
    fn test_normal_load_split() {
        let body = chassis();
        let motor = Actuator::from_desc(&wheel(0.09), BodyId(0), &body, 2, 9.81).unwrap();
        assert_abs_diff_eq!(motor.normal_load(), 9.81 / 2.0, epsilon = 1e-12);

        let mut desc = wheel(0.09);
        desc.wheel.normal_force = Some(3.0);
        let motor = Actuator::from_desc(&desc, BodyId(0), &body, 2, 9.81).unwrap();
        assert_eq!(motor.normal_load(), 3.0);
    }

    #[test]
    fn test_zero_wheel_count_gives_no_force() {
        let mut body = chassis();
        let mut desc = wheel(0.0);
        desc.wheel.wheel_count = Some(0);
        let mut motor = Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 10.0;
        motor.apply(&mut body, DT);
        assert_eq!(motor.normal_load(), 0.0);
        assert_eq!(motor.report().longitudinal_force, 0.0);
        assert_eq!(body.velocity, Vec2::zeros());
    }

    #[test]
    fn test_longitudinal_clamp() {
        let mut body = chassis();
        let mut motor = Actuator::from_desc(&wheel(0.0), BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 100.0;
        motor.apply(&mut body, DT);
        let cap = 0.5 * 9.81;
        assert_abs_diff_eq!(motor.report().longitudinal_force, cap, epsilon = 1e-9);
        assert_abs_diff_eq!(body.velocity.x, cap * DT, epsilon = 1e-12);
    }

    #[test]
    fn test_max_force_saturation() {
        let mut body = chassis();
        let mut desc = wheel(0.0);
        desc.wheel.max_force = Some(1.0);
        let mut motor = Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = -4.0;
        motor.apply(&mut body, DT);
        assert_abs_diff_eq!(motor.report().longitudinal_force, -1.0, epsilon = 1e-9);
    }

    fn torque_wheel() -> ActuatorDesc {
        let mut desc = wheel(0.0);
        desc.wheel.torque = Some(TorqueDrive {
            max_torque: 0.02,
            gear_ratio: 3.0,
            motor_inertia: 1e-3,
        });
        desc
    }

    #[test]
    fn test_torque_drive_force() {
        let mut body = chassis();
        let mut motor = Actuator::from_desc(&torque_wheel(), BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 0.01;
        motor.apply(&mut body, DT);
        // 0.01 N·m through a 3:1 gear on a 3 cm wheel
        assert_abs_diff_eq!(motor.report().longitudinal_force, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(motor.motor_speed(), 0.01 / 1e-3 * DT, epsilon = 1e-12);

        // saturates at max_torque, then at the traction cap
        motor.command = 5.0;
        motor.apply(&mut body, DT);
        assert_abs_diff_eq!(motor.report().longitudinal_force, 2.0, epsilon = 1e-9);
        let mut desc = torque_wheel();
        desc.wheel.mu_long = Some(0.1);
        let mut motor = Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 0.02;
        motor.apply(&mut body, DT);
        assert_abs_diff_eq!(motor.report().longitudinal_force, 0.981, epsilon = 1e-9);
    }

    #[test]
    fn test_torque_motor_speed_response() {
        let mut body = chassis();
        let mut motor = Actuator::from_desc(&torque_wheel(), BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 0.02;
        let mut last = 0.0;
        for _ in 0..10 {
            motor.apply(&mut body, DT);
            assert!(motor.motor_speed() > last);
            last = motor.motor_speed();
        }
        for _ in 0..1000 {
            motor.apply(&mut body, DT);
        }
        // wheel speed limit seen through the gear
        assert_abs_diff_eq!(motor.motor_speed(), 40.0 * 3.0, epsilon = 1e-9);
        motor.update_rotation(&body, 0.5);
        assert_abs_diff_eq!(motor.commanded_rotation, 40.0 * 0.5, epsilon = 1e-9);

        motor.clear();
        assert_eq!(motor.motor_speed(), 0.0);

        let mut bad = torque_wheel();
        if let Some(t) = bad.wheel.torque.as_mut() {
            t.gear_ratio = 0.0;
        }
        assert!(Actuator::from_desc(&bad, BodyId(0), &body, 1, 9.81).is_err());
    }

    #[test]
    fn test_lateral_slip_is_damped() {
        let mut body = chassis();
        body.velocity = Vec2::new(0.0, 0.05);
        let mut motor = Actuator::from_desc(&wheel(0.0), BodyId(0), &body, 1, 9.81).unwrap();
        motor.apply(&mut body, DT);
        assert_abs_diff_eq!(motor.report().lateral_slip, 0.05, epsilon = 1e-12);
        // three quarters of the slip removed, within the cap
        assert_abs_diff_eq!(body.velocity.y, 0.05 * 0.25, epsilon = 1e-12);
        assert!(motor.report().lateral_force < 0.0);
    }

    #[test]
    fn test_rotation_tracking() {
        let mut body = chassis();
        body.velocity = Vec2::new(0.3, 0.0);
        let mut desc = wheel(0.0);
        desc.wheel.max_force = Some(2.0);
        let mut motor = Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).unwrap();
        motor.command = 1.0;
        motor.update_rotation(&body, 0.5);
        assert_abs_diff_eq!(motor.realized_rotation, 0.3 / 0.03 * 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(motor.commanded_rotation, 0.5 * 40.0 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let body = chassis();
        let mut desc = wheel(0.0);
        desc.wheel.lateral_damping = 1.5;
        assert!(Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).is_err());
        let mut desc = wheel(0.0);
        desc.wheel.wheel_radius = 0.0;
        assert!(Actuator::from_desc(&desc, BodyId(0), &body, 1, 9.81).is_err());
    }
}
