//! Gyroscope state and calibration

use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentId, TypedComponent};
use super::config::{Config, ConfigHolder, ConfigRules};

/// Angular velocity in radians per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroState {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl GyroState {
    pub const ZERO: GyroState = GyroState {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Build from degrees per second
    pub fn from_degrees(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self {
            pitch: pitch.to_radians(),
            yaw: yaw.to_radians(),
            roll: roll.to_radians(),
        }
    }

    pub fn sub(self, other: GyroState) -> Self {
        Self {
            pitch: self.pitch - other.pitch,
            yaw: self.yaw - other.yaw,
            roll: self.roll - other.roll,
        }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            pitch: self.pitch * factor,
            yaw: self.yaw * factor,
            roll: self.roll * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GyroConfig {
    pub sensitivity: f32,
    pub invert_x: bool,
    pub invert_y: bool,
    /// Resting drift subtracted from every sample
    pub calibration: GyroState,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            invert_x: false,
            invert_y: false,
            calibration: GyroState::ZERO,
        }
    }
}

impl ConfigRules for GyroConfig {}

pub struct GyroComponent {
    config: Config<GyroConfig>,
    state: GyroState,
}

impl GyroComponent {
    pub fn new() -> Self {
        Self {
            config: Config::new(GyroConfig::default()),
            state: GyroState::ZERO,
        }
    }

    pub fn set_state(&mut self, state: GyroState) {
        self.state = state;
    }

    /// Raw reading as reported by the driver
    pub fn state(&self) -> GyroState {
        self.state
    }

    /// Drift-corrected, sensitivity-scaled reading with inversion applied
    pub fn calibrated_state(&self) -> GyroState {
        let config = &self.config.config;
        let mut state = self.state.sub(config.calibration).scale(config.sensitivity);
        if config.invert_x {
            state.yaw = -state.yaw;
        }
        if config.invert_y {
            state.pitch = -state.pitch;
        }
        state
    }

    /// Average resting samples into the calibration offset
    ///
    /// Returns `false` and leaves the calibration unchanged when `samples` is empty.
    pub fn calibrate(&mut self, samples: &[GyroState]) -> bool {
        if samples.is_empty() {
            return false;
        }

        let count = samples.len() as f32;
        let sum = samples.iter().fold(GyroState::ZERO, |acc, s| GyroState {
            pitch: acc.pitch + s.pitch,
            yaw: acc.yaw + s.yaw,
            roll: acc.roll + s.roll,
        });
        self.config.config.calibration = sum.scale(1.0 / count);
        true
    }

    pub fn settings(&self) -> &GyroConfig {
        &self.config.config
    }

    pub fn settings_mut(&mut self) -> &mut GyroConfig {
        &mut self.config.config
    }
}

impl Default for GyroComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for GyroComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }

    fn config(&self) -> Option<&dyn ConfigHolder> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigHolder> {
        Some(&mut self.config)
    }
}

impl TypedComponent for GyroComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:gyro");
}
