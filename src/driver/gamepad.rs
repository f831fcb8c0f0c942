//! Driver for devices with a known standard gamepad layout

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Driver, DriverError, DriverId, ReadFailures};
use crate::backend::{DeviceDescriptor, GamepadAxis, GamepadButton, RawReport, SharedSource};
use crate::controller::input::state::{negative_axis, positive_axis};
use crate::controller::input::GamepadInputs;
use crate::controller::{
    BatteryComponent, ControllerEntity, ControllerState, DriverNameComponent, GuidComponent, GyroComponent,
    InputComponent, InputId, RumbleChannel, RumbleComponent, RumbleState, Touchpad, Touchpads,
};
use crate::manager::id::UniqueControllerId;

fn button_input(button: GamepadButton) -> InputId {
    match button {
        GamepadButton::South => GamepadInputs::SOUTH_BUTTON,
        GamepadButton::East => GamepadInputs::EAST_BUTTON,
        GamepadButton::West => GamepadInputs::WEST_BUTTON,
        GamepadButton::North => GamepadInputs::NORTH_BUTTON,
        GamepadButton::LeftShoulder => GamepadInputs::LEFT_SHOULDER_BUTTON,
        GamepadButton::RightShoulder => GamepadInputs::RIGHT_SHOULDER_BUTTON,
        GamepadButton::LeftStick => GamepadInputs::LEFT_STICK_BUTTON,
        GamepadButton::RightStick => GamepadInputs::RIGHT_STICK_BUTTON,
        GamepadButton::Back => GamepadInputs::BACK_BUTTON,
        GamepadButton::Start => GamepadInputs::START_BUTTON,
        GamepadButton::Guide => GamepadInputs::GUIDE_BUTTON,
        GamepadButton::DpadUp => GamepadInputs::DPAD_UP_BUTTON,
        GamepadButton::DpadDown => GamepadInputs::DPAD_DOWN_BUTTON,
        GamepadButton::DpadLeft => GamepadInputs::DPAD_LEFT_BUTTON,
        GamepadButton::DpadRight => GamepadInputs::DPAD_RIGHT_BUTTON,
        GamepadButton::Misc1 => GamepadInputs::MISC_1_BUTTON,
        GamepadButton::LeftPaddle1 => GamepadInputs::LEFT_PADDLE_1_BUTTON,
        GamepadButton::LeftPaddle2 => GamepadInputs::LEFT_PADDLE_2_BUTTON,
        GamepadButton::RightPaddle1 => GamepadInputs::RIGHT_PADDLE_1_BUTTON,
        GamepadButton::RightPaddle2 => GamepadInputs::RIGHT_PADDLE_2_BUTTON,
        GamepadButton::Touchpad1 => GamepadInputs::TOUCHPAD_1_BUTTON,
        GamepadButton::Touchpad2 => GamepadInputs::TOUCHPAD_2_BUTTON,
    }
}

/// Map a gamepad report to logical half-axes and buttons
pub fn gamepad_state(report: &RawReport) -> ControllerState {
    let mut state = ControllerState::new();

    for button in GamepadButton::ALL {
        state.set_button(button_input(button), report.button(button));
    }

    let sticks = [
        (
            GamepadAxis::LeftX,
            GamepadAxis::LeftY,
            [
                GamepadInputs::LEFT_STICK_AXIS_RIGHT,
                GamepadInputs::LEFT_STICK_AXIS_LEFT,
                GamepadInputs::LEFT_STICK_AXIS_UP,
                GamepadInputs::LEFT_STICK_AXIS_DOWN,
            ],
        ),
        (
            GamepadAxis::RightX,
            GamepadAxis::RightY,
            [
                GamepadInputs::RIGHT_STICK_AXIS_RIGHT,
                GamepadInputs::RIGHT_STICK_AXIS_LEFT,
                GamepadInputs::RIGHT_STICK_AXIS_UP,
                GamepadInputs::RIGHT_STICK_AXIS_DOWN,
            ],
        ),
    ];
    for (x_axis, y_axis, [right, left, up, down]) in sticks {
        let x = report.axis(x_axis);
        let y = report.axis(y_axis);
        state
            .set_axis(right, positive_axis(x))
            .set_axis(left, negative_axis(x))
            .set_axis(up, positive_axis(y))
            .set_axis(down, negative_axis(y));
    }

    state
        .set_axis(GamepadInputs::LEFT_TRIGGER_AXIS, report.axis(GamepadAxis::LeftTrigger))
        .set_axis(GamepadInputs::RIGHT_TRIGGER_AXIS, report.axis(GamepadAxis::RightTrigger));

    state
}

pub struct GamepadDriver {
    id: DriverId,
    device: UniqueControllerId,
    source: SharedSource,
    descriptor: DeviceDescriptor,
    mapping_id: Option<String>,
    last_rumble: HashMap<RumbleChannel, RumbleState>,
    read_failures: ReadFailures,
}

impl GamepadDriver {
    pub fn new(
        device: UniqueControllerId,
        source: SharedSource,
        descriptor: DeviceDescriptor,
        mapping_id: Option<String>,
    ) -> Self {
        Self {
            id: DriverId::next(),
            device,
            source,
            descriptor,
            mapping_id,
            last_rumble: HashMap::new(),
            read_failures: ReadFailures::default(),
        }
    }

    fn read(&mut self) -> Option<RawReport> {
        self.read_failures
            .observe(self.device, self.source.lock().read(self.device))
    }

    fn forward_rumble(&mut self, entity: &ControllerEntity) {
        let Some(rumble) = entity.rumble() else {
            return;
        };

        for channel in &self.descriptor.rumble {
            let state = rumble.current(*channel);
            if self.last_rumble.get(channel) == Some(&state) {
                continue;
            }
            match self.source.lock().set_rumble(self.device, *channel, state) {
                Ok(()) => {
                    self.last_rumble.insert(*channel, state);
                },
                Err(e) => debug!("Rumble failed on {}: {}", self.device, e),
            }
        }
    }
}

impl Driver for GamepadDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    fn name(&self) -> String {
        "GamepadDriver".to_string()
    }

    fn add_components(&mut self, entity: &mut ControllerEntity) -> Result<(), DriverError> {
        let id = self.id;
        entity.set_component_from(id, DriverNameComponent(self.descriptor.name.clone()));
        if let Some(guid) = &self.descriptor.guid {
            entity.set_component_from(id, GuidComponent(guid.clone()));
        }

        entity.set_component_from(id, InputComponent::gamepad(self.mapping_id.clone()));

        if self.descriptor.has_gyro {
            entity.set_component_from(id, GyroComponent::new());
        }
        if self.descriptor.has_battery {
            entity.set_component_from(id, BatteryComponent::new());
        }
        if !self.descriptor.touchpads.is_empty() {
            let pads = self.descriptor.touchpads.iter().map(|max| Touchpad::new(*max)).collect();
            entity.set_component_from(id, Touchpads::new(pads));
        }

        if !self.descriptor.rumble.is_empty() {
            // Channels are appended when another driver already installed rumble
            match entity.rumble_mut() {
                Some(rumble) => {
                    for channel in &self.descriptor.rumble {
                        rumble.add_channel(*channel);
                    }
                },
                None => entity.set_component_from(id, RumbleComponent::new(self.descriptor.rumble.clone())),
            }
        }

        Ok(())
    }

    fn update(&mut self, entity: &mut ControllerEntity, _out_of_focus: bool) {
        if let Some(report) = self.read() {
            if let Some(input) = entity.owned_component_mut::<InputComponent>(self.id) {
                input.push_state(gamepad_state(&report));
            }

            if let (Some(sample), Some(gyro)) = (report.gyro, entity.owned_component_mut::<GyroComponent>(self.id)) {
                gyro.set_state(sample);
            }

            if let (Some(power), Some(battery)) =
                (report.battery, entity.owned_component_mut::<BatteryComponent>(self.id))
            {
                battery.set_state(power);
            }

            if let Some(touchpads) = entity.owned_component_mut::<Touchpads>(self.id) {
                for (index, fingers) in report.touchpads.into_iter().enumerate() {
                    if let Some(pad) = touchpads.pad_mut(index) {
                        pad.push_fingers(fingers);
                    }
                }
            }
        }

        self.forward_rumble(entity);
    }

    fn close(&mut self) -> Result<(), DriverError> {
        // Leave no motor running after the controller goes away
        let mut source = self.source.lock();
        let mut first_error = None;
        for (channel, state) in &self.last_rumble {
            if state.is_off() {
                continue;
            }
            if let Err(e) = source.set_rumble(self.device, *channel, RumbleState::OFF) {
                warn!("Failed to stop {:?} rumble on {}: {}", channel, self.device, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
