//! Device backends
//!
//! A backend turns a platform device API into hot-plug events plus shared
//! access to per-device reports. Two families exist: polled backends diff the
//! set of occupied slots every frame, queued backends receive native connect
//! and disconnect events through an [`EventQueue`]. The manager behaves
//! identically on top of either.

pub mod normalize;
pub mod polled;
pub mod queued;
pub mod virtual_pad;

#[cfg(feature = "gilrs")]
pub mod gilrs_source;
#[cfg(feature = "xinput")]
pub mod xinput_source;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::{Finger, GyroState, PowerState, RumbleChannel, RumbleState};
use crate::hid::HidDevice;
use crate::manager::id::UniqueControllerId;

pub use polled::PolledBackend;
pub use queued::{EventQueue, EventSender, QueuedBackend};
pub use virtual_pad::VirtualPads;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("device {0} is not connected")]
    Disconnected(UniqueControllerId),

    #[error("device {0} does not belong to this backend")]
    UnknownDevice(UniqueControllerId),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("native error: {0}")]
    Native(String),
}

/// Buttons of the standard gamepad layout, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    South,
    East,
    West,
    North,
    LeftShoulder,
    RightShoulder,
    LeftStick,
    RightStick,
    Back,
    Start,
    Guide,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Misc1,
    LeftPaddle1,
    LeftPaddle2,
    RightPaddle1,
    RightPaddle2,
    Touchpad1,
    Touchpad2,
}

impl GamepadButton {
    pub const ALL: [GamepadButton; 22] = [
        Self::South,
        Self::East,
        Self::West,
        Self::North,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftStick,
        Self::RightStick,
        Self::Back,
        Self::Start,
        Self::Guide,
        Self::DpadUp,
        Self::DpadDown,
        Self::DpadLeft,
        Self::DpadRight,
        Self::Misc1,
        Self::LeftPaddle1,
        Self::LeftPaddle2,
        Self::RightPaddle1,
        Self::RightPaddle2,
        Self::Touchpad1,
        Self::Touchpad2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Axes of the standard gamepad layout
///
/// Sticks are signed in `[-1, 1]` with +Y pointing up; triggers are `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

impl GamepadAxis {
    pub const ALL: [GamepadAxis; 6] = [
        Self::LeftX,
        Self::LeftY,
        Self::RightX,
        Self::RightY,
        Self::LeftTrigger,
        Self::RightTrigger,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Hat switch directions held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HatState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// One frame of raw device data, in backend units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReport {
    pub buttons: Vec<bool>,
    pub axes: Vec<f32>,
    pub hats: Vec<HatState>,
    pub gyro: Option<GyroState>,
    pub battery: Option<PowerState>,
    pub touchpads: Vec<Vec<Finger>>,
}

impl RawReport {
    /// Empty report sized for the standard gamepad layout
    pub fn gamepad() -> Self {
        Self {
            buttons: vec![false; GamepadButton::ALL.len()],
            axes: vec![0.0; GamepadAxis::ALL.len()],
            ..Self::default()
        }
    }

    pub fn joystick(buttons: usize, axes: usize, hats: usize) -> Self {
        Self {
            buttons: vec![false; buttons],
            axes: vec![0.0; axes],
            hats: vec![HatState::default(); hats],
            ..Self::default()
        }
    }

    pub fn button(&self, button: GamepadButton) -> bool {
        self.buttons.get(button.index()).copied().unwrap_or(false)
    }

    pub fn axis(&self, axis: GamepadAxis) -> f32 {
        self.axes.get(axis.index()).copied().unwrap_or(0.0)
    }

    pub fn set_button(&mut self, button: GamepadButton, pressed: bool) {
        let index = button.index();
        if self.buttons.len() <= index {
            self.buttons.resize(index + 1, false);
        }
        self.buttons[index] = pressed;
    }

    pub fn set_axis(&mut self, axis: GamepadAxis, value: f32) {
        let index = axis.index();
        if self.axes.len() <= index {
            self.axes.resize(index + 1, 0.0);
        }
        self.axes[index] = value;
    }

    pub fn with_button(mut self, button: GamepadButton, pressed: bool) -> Self {
        self.set_button(button, pressed);
        self
    }

    pub fn with_axis(mut self, axis: GamepadAxis, value: f32) -> Self {
        self.set_axis(axis, value);
        self
    }
}

/// Input layout a device reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Standard gamepad mapping is known
    Gamepad,
    /// Numbered inputs only
    Joystick { buttons: usize, axes: usize, hats: usize },
}

/// What a backend knows about a device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub guid: Option<String>,
    pub hid: Option<HidDevice>,
    pub kind: DeviceKind,
    pub has_gyro: bool,
    pub has_battery: bool,
    pub rumble: Vec<RumbleChannel>,
    /// Max fingers per touch surface
    pub touchpads: Vec<usize>,
}

impl DeviceDescriptor {
    pub fn gamepad(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: None,
            hid: None,
            kind: DeviceKind::Gamepad,
            has_gyro: false,
            has_battery: false,
            rumble: Vec::new(),
            touchpads: Vec::new(),
        }
    }

    pub fn joystick(name: impl Into<String>, buttons: usize, axes: usize, hats: usize) -> Self {
        Self {
            kind: DeviceKind::Joystick { buttons, axes, hats },
            ..Self::gamepad(name)
        }
    }

    pub fn with_hid(mut self, hid: HidDevice) -> Self {
        self.hid = Some(hid);
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn with_gyro(mut self) -> Self {
        self.has_gyro = true;
        self
    }

    pub fn with_battery(mut self) -> Self {
        self.has_battery = true;
        self
    }

    pub fn with_rumble(mut self, channels: impl IntoIterator<Item = RumbleChannel>) -> Self {
        self.rumble.extend(channels);
        self
    }

    pub fn with_touchpad(mut self, max_fingers: usize) -> Self {
        self.touchpads.push(max_fingers);
        self
    }
}

/// Per-device access shared by backends and drivers
pub trait DeviceSource {
    /// Short backend name, used in ids and logs
    fn name(&self) -> &'static str;

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError>;

    /// Latest report for the device
    fn read(&mut self, id: UniqueControllerId) -> Result<RawReport, BackendError>;

    fn set_rumble(
        &mut self,
        _id: UniqueControllerId,
        _channel: RumbleChannel,
        _state: RumbleState,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    /// Name the platform gives the device, for diagnostics
    fn system_name(&self, id: UniqueControllerId) -> Option<String> {
        self.describe(id).ok().map(|d| d.name)
    }
}

/// A source with fixed slots and no native hot-plug notifications
pub trait PollSource: DeviceSource {
    /// Occupied slots right now
    fn present(&mut self) -> Vec<usize>;
}

/// A source that reports hot-plug through native events
pub trait EventSource: DeviceSource {
    /// Process native events, pushing hot-plug notifications into `queue`
    fn pump(&mut self, queue: &EventQueue);

    /// Devices connected before the first pump
    fn connected(&self) -> Vec<UniqueControllerId>;
}

pub type SharedSource = Arc<Mutex<dyn DeviceSource>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    Connected(UniqueControllerId),
    Disconnected(UniqueControllerId),
}

/// What the manager needs from a backend
pub trait ControllerBackend {
    fn name(&self) -> &'static str;

    /// Devices present right now (used for discovery)
    fn enumerate(&mut self) -> Vec<UniqueControllerId>;

    /// Hot-plug events since the last call, fully drained
    fn pump(&mut self) -> Vec<HotplugEvent>;

    /// Whether any device is present, without affecting hot-plug tracking
    fn has_devices(&self) -> bool;

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError>;

    /// Handle drivers use to read reports and send rumble
    fn source(&self) -> SharedSource;

    fn system_name(&self, id: UniqueControllerId) -> Option<String> {
        self.source().lock().system_name(id)
    }

    /// End-of-tick hook after every entity was updated
    fn finish_frame(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_accessors_grow_vectors() {
        let mut report = RawReport::default();
        report.set_axis(GamepadAxis::RightTrigger, 0.5);
        report.set_button(GamepadButton::Touchpad2, true);

        assert_eq!(report.axes.len(), GamepadAxis::ALL.len());
        assert_eq!(report.axis(GamepadAxis::RightTrigger), 0.5);
        assert!(report.button(GamepadButton::Touchpad2));
        assert!(!report.button(GamepadButton::South));
    }

    #[test]
    fn test_layout_indices_are_dense() {
        for (i, button) in GamepadButton::ALL.iter().enumerate() {
            assert_eq!(button.index(), i);
        }
        for (i, axis) in GamepadAxis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }
}
