//! Contracts with the host scene.
//!
//! The core never owns scene objects. It reads and writes controller poses
//! through [`Controller`], resolves controllers and parameters through [`Rig`],
//! and asks [`HostClock`] for wall-clock time. `MemoryRig` and `ManualClock` are
//! in-memory implementations for hosts without a scene graph and for tests.

use hashbrown::HashMap;
use nalgebra::{UnitQuaternion, Vector3};

use crate::target::{ActionEvent, TriggerEvent};

/// A posable scene object exposing its local transform.
pub trait Controller {
    fn position(&self) -> Vector3<f32>;
    fn set_position(&mut self, position: Vector3<f32>);
    fn rotation(&self) -> UnitQuaternion<f32>;
    fn set_rotation(&mut self, rotation: UnitQuaternion<f32>);
}

/// Name-based access to the host's animatable objects.
pub trait Rig {
    fn controller_mut(&mut self, name: &str) -> Option<&mut dyn Controller>;

    fn set_float_param(&mut self, _name: &str, _value: f32) {}

    fn fire_trigger(&mut self, _target: &str, _event: &TriggerEvent) {}

    fn invoke_action(&mut self, _target: &str, _event: &ActionEvent) {}
}

/// Wall-clock source, in seconds.
pub trait HostClock {
    fn now(&self) -> f64;
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryController {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for MemoryController {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Controller for MemoryController {
    fn position(&self) -> Vector3<f32> {
        self.position
    }

    fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = rotation;
    }
}

/// In-memory rig: controllers and float params by name, plus a log of fired events.
#[derive(Debug, Default)]
pub struct MemoryRig {
    pub controllers: HashMap<String, MemoryController>,
    pub params: HashMap<String, f32>,
    pub fired: Vec<String>,
}

impl MemoryRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, name: &str) -> Self {
        self.controllers
            .insert(name.to_string(), MemoryController::default());
        self
    }

    pub fn controller(&self, name: &str) -> Option<&MemoryController> {
        self.controllers.get(name)
    }

    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.get(name).copied()
    }
}

impl Rig for MemoryRig {
    fn controller_mut(&mut self, name: &str) -> Option<&mut dyn Controller> {
        self.controllers
            .get_mut(name)
            .map(|c| c as &mut dyn Controller)
    }

    fn set_float_param(&mut self, name: &str, value: f32) {
        self.params.insert(name.to_string(), value);
    }

    fn fire_trigger(&mut self, target: &str, event: &TriggerEvent) {
        self.fired.push(format!("{target}:{}", event.name));
    }

    fn invoke_action(&mut self, target: &str, event: &ActionEvent) {
        self.fired.push(format!("{target}:{}", event.action));
    }
}

/// Clock advanced by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualClock {
    pub now: f64,
}

impl ManualClock {
    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }
}

/// Clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl HostClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
