//! The fixed-order simulation tick.

use robosim_math::Vec2;
use tracing::trace;

use crate::contact::generate_contacts;
use crate::solver::{solve_positions, solve_velocities};
use crate::world::World;

impl World {
    /// Advance the world by one tick of `dt` seconds.
    ///
    /// The tick applies wheel traction, external forces, damping and speed
    /// limits, predicts new poses, resolves joints and contacts, derives
    /// velocities from the corrected poses, then applies contact friction
    /// and restitution. A non-positive or non-finite `dt` leaves the world
    /// untouched and records a warning.
    pub fn step(&mut self, dt: f64) {
        self.last_warning = None;
        if !(dt.is_finite() && dt > 0.0) {
            self.warn(format!("ignored step with invalid dt {dt}"));
            return;
        }

        for motor in &mut self.actuators {
            motor.apply(&mut self.bodies[motor.body.index()], dt);
        }

        let settings = self.settings.clone();
        let mut warnings = Vec::new();
        for body in self.bodies.iter_mut() {
            if !body.can_move {
                continue;
            }
            body.velocity += body.force * (body.inv_mass * dt);
            body.angular_velocity += body.torque * body.inv_inertia * dt;
            body.force = Vec2::zeros();
            body.torque = 0.0;

            body.velocity *= settings.linear_damping;
            body.angular_velocity *= settings.angular_damping;
            if body.clamp_speed(settings.max_linear_speed, settings.max_angular_speed) {
                warnings.push(format!("{}: speed clamped", body.name));
            }
            if body.sanitize_velocity() {
                warnings.push(format!("{}: non-finite velocity reset", body.name));
            }

            body.prev_pose = body.pose;
            body.pose.position += body.velocity * dt;
            body.pose.angle += body.angular_velocity * dt;
        }

        self.contacts = generate_contacts(&self.bodies, &self.jointed, settings.contact_slop);
        solve_positions(
            &mut self.bodies,
            &self.joints,
            &mut self.contacts,
            &settings,
            dt,
        );

        for body in self.bodies.iter_mut().filter(|b| b.can_move) {
            body.velocity = (body.pose.position - body.prev_pose.position) / dt;
            body.angular_velocity = (body.pose.angle - body.prev_pose.angle) / dt;
        }

        solve_velocities(&mut self.bodies, &self.contacts, &settings, dt);

        for body in self.bodies.iter_mut().filter(|b| b.can_move) {
            if !(body.pose.is_finite() && body.velocity.iter().all(|v| v.is_finite())) {
                body.pose = body.prev_pose;
                body.velocity = Vec2::zeros();
                body.angular_velocity = 0.0;
                warnings.push(format!("{}: non-finite state reverted", body.name));
                continue;
            }
            let travel = body.pose.position - body.prev_pose.position;
            let distance = travel.norm();
            if settings.max_step_translation > 0.0 && distance > settings.max_step_translation {
                let limited = travel * (settings.max_step_translation / distance);
                body.pose.position = body.prev_pose.position + limited;
                body.velocity = limited / dt;
                warnings.push(format!("{}: step translation clamped", body.name));
            }
        }

        for motor in &mut self.actuators {
            motor.update_rotation(&self.bodies[motor.body.index()], dt);
        }

        for message in warnings {
            self.warn(message);
        }
        self.time += dt;
        self.step_index += 1;
        trace!(
            step = self.step_index,
            contacts = self.contacts.len(),
            "tick"
        );
    }

    /// Advance by the configured timestep.
    pub fn step_default(&mut self) {
        self.step(self.settings.timestep);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use robosim_math::{Pose2, Vec2};
    use robosim_scenario::{BodyDesc, Scenario, WorldDesc};

    use crate::world::World;

    fn single_box() -> World {
        let mut scenario = Scenario::new();
        scenario.robot.bodies.push(BodyDesc::rectangle("box", 0.1, 0.1));
        World::from_scenario(&scenario).unwrap()
    }

    #[test]
    fn test_invalid_dt_is_a_noop() {
        let mut world = single_box();
        world.step(0.0);
        world.step(f64::NAN);
        assert_eq!(world.step_index(), 0);
        assert_eq!(world.time(), 0.0);
        assert!(world.last_warning().unwrap().contains("invalid dt"));
    }

    #[test]
    fn test_resting_body_stays_put() {
        let mut world = single_box();
        for _ in 0..50 {
            world.step_default();
        }
        let body = world.body(world.body_id("box").unwrap()).unwrap();
        assert_eq!(body.pose(), Pose2::identity());
        assert!(world.last_warning().is_none());
        assert_eq!(world.step_index(), 50);
    }

    #[test]
    fn test_force_accelerates_body() {
        let mut world = single_box();
        let id = world.body_id("box").unwrap();
        world
            .apply_force(id, Vec2::new(2.0, 0.0), Vec2::zeros())
            .unwrap();
        world.step(0.01);
        let body = world.body(id).unwrap();
        // 1 kg, one tick of 2 N then damping
        let v = 2.0 * 0.01 * world.settings().linear_damping;
        assert_abs_diff_eq!(body.velocity().x, v, epsilon = 1e-9);
        assert_abs_diff_eq!(body.pose().position.x, v * 0.01, epsilon = 1e-9);
        assert_eq!(body.angular_velocity(), 0.0);

        // accumulators were cleared
        world.step(0.01);
        let v2 = world.body(id).unwrap().velocity().x;
        assert_abs_diff_eq!(v2, v * world.settings().linear_damping, epsilon = 1e-9);
    }

    #[test]
    fn test_speed_clamp_warns() {
        let mut world = single_box();
        let id = world.body_id("box").unwrap();
        world
            .apply_force(id, Vec2::new(1.0e5, 0.0), Vec2::zeros())
            .unwrap();
        world.step(0.01);
        let body = world.body(id).unwrap();
        assert!(body.velocity().norm() <= world.settings().max_linear_speed + 1e-9);
        assert!(world.last_warning().is_some());
    }

    #[test]
    fn test_box_stops_at_wall() {
        let mut scenario = Scenario::new();
        scenario.world = WorldDesc {
            terrain: vec![BodyDesc::rectangle("wall", 0.1, 1.0).at(0.5, 0.0, 0.0)],
            ..WorldDesc::default()
        };
        scenario.world.settings.linear_damping = 1.0;
        scenario.robot.bodies.push(BodyDesc::rectangle("box", 0.1, 0.1));
        let mut world = World::from_scenario(&scenario).unwrap();
        let id = world.body_id("box").unwrap();
        for _ in 0..240 {
            world.apply_force(id, Vec2::new(1.0, 0.0), Vec2::zeros()).unwrap();
            world.step_default();
        }
        let x = world.body(id).unwrap().pose().position.x;
        // wall face at 0.45, box half width 0.05
        assert!(x <= 0.4 + 0.005, "box penetrated to {x}");
        assert!(x > 0.3);
    }
}
