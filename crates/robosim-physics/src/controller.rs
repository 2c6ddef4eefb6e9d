//! The boundary between the engine and robot control code.
//!
//! Control code runs synchronously between ticks and only sees sensors and
//! actuators through [`ControlIo`]. A [`Session`] owns the world together
//! with the scenario it came from, so a reset is a full rebuild rather than
//! an in-place patch.
//!
//! A failing controller does not stop the simulation. The session keeps the
//! error, skips the controller until the error is cleared, and the world keeps
//! stepping with the last commands.

use robosim_scenario::Scenario;
use tracing::{debug, warn};

use crate::error::{PhysicsError, Result};
use crate::ids::{ActuatorId, SensorId};
use crate::sensor::SensorValue;
use crate::state::StateDump;
use crate::world::World;

/// What control code may do to a world between ticks.
pub struct ControlIo<'a> {
    world: &'a mut World,
}

impl<'a> ControlIo<'a> {
    /// Wrap a world for one controller update.
    pub fn new(world: &'a mut World) -> Self {
        Self { world }
    }

    /// Read a sensor; encoders report rotation since their previous read.
    pub fn get_sensor(&mut self, id: SensorId) -> Result<SensorValue> {
        self.world.get_sensor(id)
    }

    /// Set a wheel command (N, or N·m for torque-driven wheels).
    pub fn set_actuator(&mut self, id: ActuatorId, command: f64) -> Result<()> {
        self.world.set_actuator(id, command)
    }

    /// Look up a sensor by name.
    pub fn sensor_id(&self, name: &str) -> Option<SensorId> {
        self.world.sensor_id(name)
    }

    /// Look up an actuator by name.
    pub fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.world.actuator_id(name)
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.world.time()
    }
}

/// Robot control code, called once before every tick.
pub trait Controller {
    /// Read sensors and set actuator commands for the coming tick of `dt`.
    fn update(&mut self, io: &mut ControlIo<'_>, dt: f64) -> Result<()>;
}

impl<F> Controller for F
where
    F: FnMut(&mut ControlIo<'_>, f64) -> Result<()>,
{
    fn update(&mut self, io: &mut ControlIo<'_>, dt: f64) -> Result<()> {
        self(io, dt)
    }
}

/// Receives the state after each tick.
pub type Observer = Box<dyn FnMut(&StateDump)>;

/// A world, the scenario it was built from, and an optional observer.
pub struct Session {
    scenario: Scenario,
    world: World,
    observer: Option<Observer>,
    controller_error: Option<PhysicsError>,
}

impl Session {
    /// Build a session; fails if the scenario is invalid.
    pub fn new(scenario: Scenario) -> Result<Self> {
        let world = World::from_scenario(&scenario)?;
        Ok(Self {
            scenario,
            world,
            observer: None,
            controller_error: None,
        })
    }

    /// The scenario the world was built from.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, e.g. for teleporting bodies.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Install an observer called with the state after every tick.
    pub fn set_observer(&mut self, observer: impl FnMut(&StateDump) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// The error that suspended the controller, if any.
    pub fn controller_error(&self) -> Option<&PhysicsError> {
        self.controller_error.as_ref()
    }

    /// Let the controller run again on the next tick.
    pub fn clear_controller_error(&mut self) {
        self.controller_error = None;
    }

    /// Rebuild the world from the stored scenario. Clears any controller error.
    pub fn reset(&mut self) -> Result<()> {
        self.world = World::from_scenario(&self.scenario)?;
        self.controller_error = None;
        debug!("session reset");
        Ok(())
    }

    /// Replace the scenario and rebuild. On failure the current world is kept.
    pub fn reload(&mut self, scenario: Scenario) -> Result<()> {
        self.world = World::from_scenario(&scenario)?;
        self.scenario = scenario;
        self.controller_error = None;
        debug!("session reloaded");
        Ok(())
    }

    /// Run the controller unless it is suspended, then advance one
    /// configured timestep.
    pub fn tick(&mut self, controller: &mut dyn Controller) {
        let dt = self.world.settings().timestep;
        if self.controller_error.is_none() {
            if let Err(err) = controller.update(&mut ControlIo::new(&mut self.world), dt) {
                warn!(step = self.world.step_index(), %err, "controller failed; suspending it");
                self.controller_error = Some(err);
            }
        }
        self.world.step(dt);
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.world.state_dump());
        }
    }

    /// Run `steps` ticks.
    pub fn run(&mut self, controller: &mut dyn Controller, steps: u64) {
        for _ in 0..steps {
            self.tick(controller);
        }
    }
}

/// Two wheels driven as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifferentialDrive {
    /// Left wheel.
    pub left: ActuatorId,
    /// Right wheel.
    pub right: ActuatorId,
}

impl DifferentialDrive {
    /// Resolve both wheels by name.
    pub fn from_names(world: &World, left: &str, right: &str) -> Result<Self> {
        let find = |name: &str| {
            world
                .actuator_id(name)
                .ok_or_else(|| PhysicsError::InvalidParameter {
                    owner: "differential_drive".into(),
                    reason: format!("no actuator named {name}"),
                })
        };
        Ok(Self {
            left: find(left)?,
            right: find(right)?,
        })
    }

    /// Set both wheel commands (N).
    pub fn drive(&self, io: &mut ControlIo<'_>, left: f64, right: f64) -> Result<()> {
        io.set_actuator(self.left, left)?;
        io.set_actuator(self.right, right)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_closure_controller_drives_robot() {
        let mut session = Session::new(Scenario::differential_drive_example()).unwrap();
        let drive = DifferentialDrive::from_names(session.world(), "left_motor", "right_motor").unwrap();
        let mut controller = move |io: &mut ControlIo<'_>, _dt: f64| drive.drive(io, 1.0, 1.0);
        session.run(&mut controller, 60);
        assert!(session.controller_error().is_none());

        let world = session.world();
        let chassis = world.body(world.body_id("chassis").unwrap()).unwrap();
        assert!(chassis.pose().position.x > 0.0);
        assert_eq!(world.step_index(), 60);
    }

    #[test]
    fn test_observer_sees_every_tick() {
        let mut session = Session::new(Scenario::differential_drive_example()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.set_observer(move |dump| sink.borrow_mut().push(dump.step));
        let mut idle = |_: &mut ControlIo<'_>, _: f64| -> Result<()> { Ok(()) };
        session.run(&mut idle, 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_controller_error_suspends_controller() {
        let mut session = Session::new(Scenario::differential_drive_example()).unwrap();
        let calls = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&calls);
        let mut failing = move |io: &mut ControlIo<'_>, _: f64| -> Result<()> {
            *counter.borrow_mut() += 1;
            let left = io.actuator_id("left_motor").unwrap();
            io.set_actuator(left, 1.0)?;
            if io.time() > 0.05 {
                Err(PhysicsError::InvalidParameter {
                    owner: "test".into(),
                    reason: "stop".into(),
                })
            } else {
                Ok(())
            }
        };
        session.run(&mut failing, 100);
        // the world keeps stepping with the last command
        assert_eq!(session.world().step_index(), 100);
        let left = session.world().actuator_id("left_motor").unwrap();
        assert_eq!(session.world().actuator(left).unwrap().command(), 1.0);
        assert!(session.controller_error().is_some());
        let suspended_after = *calls.borrow();
        assert!(suspended_after < 100);

        session.run(&mut failing, 5);
        assert_eq!(*calls.borrow(), suspended_after);

        session.clear_controller_error();
        session.tick(&mut failing);
        assert_eq!(*calls.borrow(), suspended_after + 1);
        assert!(session.controller_error().is_some());

        session.reset().unwrap();
        assert!(session.controller_error().is_none());
    }

    #[test]
    fn test_reset_rebuilds_world() {
        let mut session = Session::new(Scenario::differential_drive_example()).unwrap();
        let mut controller = |io: &mut ControlIo<'_>, _: f64| {
            let left = io.actuator_id("left_motor").unwrap();
            io.set_actuator(left, 2.0)
        };
        session.run(&mut controller, 30);
        session.reset().unwrap();
        assert_eq!(session.world().step_index(), 0);
        let left = session.world().actuator_id("left_motor").unwrap();
        assert_eq!(session.world().actuator(left).unwrap().command(), 0.0);

        let mut broken = Scenario::differential_drive_example();
        broken.robot.bodies.clear();
        assert!(session.reload(broken).is_err());
        assert!(session.world().body_id("chassis").is_some());
    }

    #[test]
    fn test_unknown_wheel_name() {
        let world = World::from_scenario(&Scenario::differential_drive_example()).unwrap();
        assert!(DifferentialDrive::from_names(&world, "left_motor", "nope").is_err());
    }
}
