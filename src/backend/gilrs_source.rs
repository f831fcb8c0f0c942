//! gilrs event source
//!
//! gilrs reports connect/disconnect as events and keeps a cached state per
//! gamepad, which `read` snapshots. Button positions are physical
//! (south/east/west/north), matching the report layout directly.

use std::collections::HashMap;

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs, PowerInfo};
use tracing::{debug, trace};

use super::normalize::StickShape;
use super::{
    BackendError, DeviceDescriptor, DeviceSource, EventQueue, EventSource, GamepadAxis, GamepadButton,
    HotplugEvent, RawReport,
};
use crate::controller::PowerState;
use crate::hid::{HidDevice, HidIdentifier};
use crate::manager::id::UniqueControllerId;

pub const GILRS_SOURCE: &str = "gilrs";

const BUTTON_MAP: [(Button, GamepadButton); 15] = [
    (Button::South, GamepadButton::South),
    (Button::East, GamepadButton::East),
    (Button::West, GamepadButton::West),
    (Button::North, GamepadButton::North),
    (Button::LeftTrigger, GamepadButton::LeftShoulder),
    (Button::RightTrigger, GamepadButton::RightShoulder),
    (Button::LeftThumb, GamepadButton::LeftStick),
    (Button::RightThumb, GamepadButton::RightStick),
    (Button::Select, GamepadButton::Back),
    (Button::Start, GamepadButton::Start),
    (Button::Mode, GamepadButton::Guide),
    (Button::DPadUp, GamepadButton::DpadUp),
    (Button::DPadDown, GamepadButton::DpadDown),
    (Button::DPadLeft, GamepadButton::DpadLeft),
    (Button::DPadRight, GamepadButton::DpadRight),
];

fn power_state(info: PowerInfo) -> PowerState {
    match info {
        PowerInfo::Unknown => PowerState::Unknown,
        PowerInfo::Wired => PowerState::Wired,
        PowerInfo::Discharging(p) => PowerState::Depleting(p),
        PowerInfo::Charging(p) => PowerState::Charging(p),
        PowerInfo::Charged => PowerState::Full,
    }
}

pub struct GilrsSource {
    gilrs: Gilrs,
    stick_shape: StickShape,
    instances: HashMap<u64, GamepadId>,
}

impl GilrsSource {
    pub fn new() -> Result<Self, BackendError> {
        let gilrs = Gilrs::new().map_err(|e| BackendError::Unavailable(format!("gilrs initialization failed: {}", e)))?;
        debug!("gilrs initialized");

        let instances = gilrs
            .gamepads()
            .map(|(id, _)| (usize::from(id) as u64, id))
            .collect();

        Ok(Self {
            gilrs,
            stick_shape: StickShape::Square,
            instances,
        })
    }

    pub fn with_stick_shape(mut self, shape: StickShape) -> Self {
        self.stick_shape = shape;
        self
    }

    fn gamepad_id(&self, id: UniqueControllerId) -> Result<GamepadId, BackendError> {
        match id {
            UniqueControllerId::Queued { source, instance } if source == GILRS_SOURCE => {
                self.instances.get(&instance).copied().ok_or(BackendError::Disconnected(id))
            },
            other => Err(BackendError::UnknownDevice(other)),
        }
    }

    fn id(gamepad: GamepadId) -> UniqueControllerId {
        UniqueControllerId::queued(GILRS_SOURCE, usize::from(gamepad) as u64)
    }
}

impl DeviceSource for GilrsSource {
    fn name(&self) -> &'static str {
        GILRS_SOURCE
    }

    fn describe(&self, id: UniqueControllerId) -> Result<DeviceDescriptor, BackendError> {
        let gamepad = self
            .gilrs
            .connected_gamepad(self.gamepad_id(id)?)
            .ok_or(BackendError::Disconnected(id))?;

        let mut descriptor = DeviceDescriptor::gamepad(gamepad.name())
            .with_guid(hex::encode(gamepad.uuid()))
            .with_battery();
        if let (Some(vendor), Some(product)) = (gamepad.vendor_id(), gamepad.product_id()) {
            descriptor = descriptor.with_hid(HidDevice::new(HidIdentifier::new(vendor, product)));
        }
        Ok(descriptor)
    }

    fn read(&mut self, id: UniqueControllerId) -> Result<RawReport, BackendError> {
        let gamepad = self
            .gilrs
            .connected_gamepad(self.gamepad_id(id)?)
            .ok_or(BackendError::Disconnected(id))?;

        let mut report = RawReport::gamepad();
        for (native, button) in BUTTON_MAP {
            report.set_button(button, gamepad.is_pressed(native));
        }

        let (lx, ly) = self
            .stick_shape
            .to_circle(gamepad.value(Axis::LeftStickX), gamepad.value(Axis::LeftStickY));
        let (rx, ry) = self
            .stick_shape
            .to_circle(gamepad.value(Axis::RightStickX), gamepad.value(Axis::RightStickY));
        report.set_axis(GamepadAxis::LeftX, lx);
        report.set_axis(GamepadAxis::LeftY, ly);
        report.set_axis(GamepadAxis::RightX, rx);
        report.set_axis(GamepadAxis::RightY, ry);

        let trigger = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or(0.0)
        };
        report.set_axis(GamepadAxis::LeftTrigger, trigger(Button::LeftTrigger2));
        report.set_axis(GamepadAxis::RightTrigger, trigger(Button::RightTrigger2));

        report.battery = Some(power_state(gamepad.power_info()));
        Ok(report)
    }
}

impl EventSource for GilrsSource {
    fn pump(&mut self, queue: &EventQueue) {
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    debug!("gilrs gamepad connected: {:?}", event.id);
                    self.instances.insert(usize::from(event.id) as u64, event.id);
                    queue.push(HotplugEvent::Connected(Self::id(event.id)));
                },
                EventType::Disconnected => {
                    debug!("gilrs gamepad disconnected: {:?}", event.id);
                    self.instances.remove(&(usize::from(event.id) as u64));
                    queue.push(HotplugEvent::Disconnected(Self::id(event.id)));
                },
                other => trace!("gilrs event: {:?}", other),
            }
        }
    }

    fn connected(&self) -> Vec<UniqueControllerId> {
        self.gilrs.gamepads().map(|(id, _)| Self::id(id)).collect()
    }
}
