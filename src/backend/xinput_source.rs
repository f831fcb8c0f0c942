//! XInput polled source (user indices 0-3)

use rusty_xinput::{XInputHandle, XInputState, XInputUsageError};
use tracing::{debug, warn};

use super::normalize::{stick_from_i16, trigger_from_u8};
use super::{BackendError, DeviceDescriptor, DeviceSource, GamepadAxis, GamepadButton, PollSource, RawReport};
use crate::controller::{RumbleChannel, RumbleState};
use crate::manager::id::UniqueControllerId;

pub const XINPUT_SOURCE: &str = "xinput";
const USER_COUNT: u32 = 4;

/// XInput button bit flags
///
/// rusty_xinput doesn't export individual button constants.
mod button_flags {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

const BUTTON_MAP: [(u16, GamepadButton); 14] = [
    (button_flags::A, GamepadButton::South),
    (button_flags::B, GamepadButton::East),
    (button_flags::X, GamepadButton::West),
    (button_flags::Y, GamepadButton::North),
    (button_flags::LEFT_SHOULDER, GamepadButton::LeftShoulder),
    (button_flags::RIGHT_SHOULDER, GamepadButton::RightShoulder),
    (button_flags::BACK, GamepadButton::Back),
    (button_flags::START, GamepadButton::Start),
    (button_flags::LEFT_THUMB, GamepadButton::LeftStick),
    (button_flags::RIGHT_THUMB, GamepadButton::RightStick),
    (button_flags::DPAD_UP, GamepadButton::DpadUp),
    (button_flags::DPAD_DOWN, GamepadButton::DpadDown),
    (button_flags::DPAD_LEFT, GamepadButton::DpadLeft),
    (button_flags::DPAD_RIGHT, GamepadButton::DpadRight),
];

/// Convert a native XInput state into a gamepad report
pub fn report_from_state(state: &XInputState) -> RawReport {
    let pad = &state.raw.Gamepad;
    let mut report = RawReport::gamepad();

    for (flag, button) in BUTTON_MAP {
        report.set_button(button, pad.wButtons & flag != 0);
    }

    // XInput reports +Y as up, matching the report convention
    let (lx, ly) = stick_from_i16(pad.sThumbLX, pad.sThumbLY);
    let (rx, ry) = stick_from_i16(pad.sThumbRX, pad.sThumbRY);
    report.set_axis(GamepadAxis::LeftX, lx);
    report.set_axis(GamepadAxis::LeftY, ly);
    report.set_axis(GamepadAxis::RightX, rx);
    report.set_axis(GamepadAxis::RightY, ry);
    report.set_axis(GamepadAxis::LeftTrigger, trigger_from_u8(state.left_trigger()));
    report.set_axis(GamepadAxis::RightTrigger, trigger_from_u8(state.right_trigger()));

    report
}

pub struct XInputSource {
    handle: XInputHandle,
}

impl XInputSource {
    pub fn new() -> Result<Self, BackendError> {
        let handle = XInputHandle::load_default()
            .map_err(|e| BackendError::Unavailable(format!("XInput library not available: {:?}", e)))?;
        debug!("XInput initialized successfully");
        Ok(Self { handle })
    }

    fn slot(id: UniqueControllerId) -> Result<u32, BackendError> {
        match id {
            UniqueControllerId::Polled { source, slot } if source == XINPUT_SOURCE && slot < USER_COUNT as usize => {
                Ok(slot as u32)
            },
            other => Err(BackendError::UnknownDevice(other)),
        }
    }

    fn state(&self, id: UniqueControllerId) -> Result<XInputState, BackendError> {
        let slot = Self::slot(id)?;
        match self.handle.get_state(slot) {
            Ok(state) => Ok(state),
            Err(XInputUsageError::DeviceNotConnected) => Err(BackendError::Disconnected(id)),
            Err(e) => Err(BackendError::Native(format!("{:?}", e))),
        }
    }
}

impl DeviceSource for XInputSource {
    fn name(&self) -> &'static str {
        XINPUT_SOURCE
    }

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError> {
        let slot = Self::slot(id)?;
        self.state(id)?;
        Ok(DeviceDescriptor::gamepad(format!("XInput Controller {}", slot + 1))
            .with_rumble([RumbleChannel::Main]))
    }

    fn read(&mut self, id: UniqueControllerId) -> Result<RawReport, BackendError> {
        self.state(id).map(|state| report_from_state(&state))
    }

    fn set_rumble(
        &mut self,
        id: UniqueControllerId,
        channel: RumbleChannel,
        state: RumbleState,
    ) -> Result<(), BackendError> {
        if channel != RumbleChannel::Main {
            return Ok(());
        }
        let slot = Self::slot(id)?;
        let strong = (state.strong.clamp(0.0, 1.0) * u16::MAX as f32) as u16;
        let weak = (state.weak.clamp(0.0, 1.0) * u16::MAX as f32) as u16;
        self.handle
            .set_state(slot, strong, weak)
            .map_err(|e| BackendError::Native(format!("{:?}", e)))
    }
}

impl PollSource for XInputSource {
    fn present(&mut self) -> Vec<usize> {
        (0..USER_COUNT)
            .filter(|index| match self.handle.get_state(*index) {
                Ok(_) => true,
                Err(XInputUsageError::DeviceNotConnected) => false,
                Err(e) => {
                    warn!("XInput error for user {}: {:?}", index, e);
                    false
                },
            })
            .map(|index| index as usize)
            .collect()
    }
}
