//! Driver for devices without a standard layout
//!
//! Inputs are numbered as the backend reports them. Every axis is split into
//! two half-axes sharing an independent deadzone, hats become four buttons.

use tracing::debug;

use super::{Driver, DriverError, DriverId, ReadFailures};
use crate::backend::{DeviceDescriptor, DeviceKind, HatState, RawReport, SharedSource};
use crate::controller::input::state::{negative_axis, positive_axis};
use crate::controller::input::{HatDirection, JoystickInputs};
use crate::controller::{
    BatteryComponent, ControllerEntity, ControllerState, DriverNameComponent, GuidComponent, InputComponent,
};
use crate::manager::id::UniqueControllerId;

/// Deadzone applied to every joystick axis until configured otherwise
pub const DEFAULT_JOYSTICK_DEADZONE: f32 = 0.1;

fn hat_pressed(hat: HatState, direction: HatDirection) -> bool {
    match direction {
        HatDirection::Up => hat.up,
        HatDirection::Down => hat.down,
        HatDirection::Left => hat.left,
        HatDirection::Right => hat.right,
    }
}

/// Map a joystick report onto numbered inputs, ignoring anything beyond the declared counts
pub fn joystick_state(report: &RawReport, buttons: usize, axes: usize, hats: usize) -> ControllerState {
    let mut state = ControllerState::new();

    for index in 0..buttons {
        let pressed = report.buttons.get(index).copied().unwrap_or(false);
        state.set_button(JoystickInputs::button(index), pressed);
    }

    for index in 0..axes {
        let value = report.axes.get(index).copied().unwrap_or(0.0);
        state
            .set_axis(JoystickInputs::axis_positive(index), positive_axis(value))
            .set_axis(JoystickInputs::axis_negative(index), negative_axis(value));
    }

    for index in 0..hats {
        let hat = report.hats.get(index).copied().unwrap_or_default();
        for direction in HatDirection::ALL {
            state.set_button(JoystickInputs::hat(index, direction), hat_pressed(hat, direction));
        }
    }

    state
}

pub struct JoystickDriver {
    id: DriverId,
    device: UniqueControllerId,
    source: SharedSource,
    descriptor: DeviceDescriptor,
    counts: (usize, usize, usize),
    default_deadzone: f32,
    read_failures: ReadFailures,
}

impl JoystickDriver {
    /// A gamepad-kind descriptor is treated as a joystick of the same size
    pub fn new(device: UniqueControllerId, source: SharedSource, descriptor: DeviceDescriptor) -> Self {
        let counts = match descriptor.kind {
            DeviceKind::Joystick { buttons, axes, hats } => (buttons, axes, hats),
            DeviceKind::Gamepad => {
                let report = RawReport::gamepad();
                (report.buttons.len(), report.axes.len(), 0)
            },
        };

        Self {
            id: DriverId::next(),
            device,
            source,
            descriptor,
            counts,
            default_deadzone: DEFAULT_JOYSTICK_DEADZONE,
            read_failures: ReadFailures::default(),
        }
    }

    pub fn with_default_deadzone(mut self, deadzone: f32) -> Self {
        self.default_deadzone = deadzone;
        self
    }
}

impl Driver for JoystickDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    fn name(&self) -> String {
        "JoystickDriver".to_string()
    }

    fn add_components(&mut self, entity: &mut ControllerEntity) -> Result<(), DriverError> {
        let (buttons, axes, hats) = self.counts;
        debug!(
            "{} exposes {} buttons, {} axes, {} hats",
            self.device, buttons, axes, hats
        );

        entity.set_component_from(self.id, DriverNameComponent(self.descriptor.name.clone()));
        if let Some(guid) = &self.descriptor.guid {
            entity.set_component_from(self.id, GuidComponent(guid.clone()));
        }
        if self.descriptor.has_battery {
            entity.set_component_from(self.id, BatteryComponent::new());
        }

        let input = InputComponent::new(
            JoystickInputs::all(buttons, axes, hats),
            false,
            JoystickInputs::deadzone_groups(axes, self.default_deadzone),
            None,
        );
        entity.set_component_from(self.id, input);
        Ok(())
    }

    fn update(&mut self, entity: &mut ControllerEntity, _out_of_focus: bool) {
        let Some(report) = self
            .read_failures
            .observe(self.device, self.source.lock().read(self.device))
        else {
            return;
        };

        let (buttons, axes, hats) = self.counts;
        if let Some(input) = entity.owned_component_mut::<InputComponent>(self.id) {
            input.push_state(joystick_state(&report, buttons, axes, hats));
        }
        if let (Some(power), Some(battery)) = (report.battery, entity.owned_component_mut::<BatteryComponent>(self.id))
        {
            battery.set_state(power);
        }
    }
}
