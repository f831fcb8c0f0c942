//! Canonical input ids for gamepads and generic joysticks

use once_cell::sync::Lazy;

use super::deadzone::DeadzoneGroup;
use super::state::InputId;

/// Standard gamepad layout
pub struct GamepadInputs;

impl GamepadInputs {
    pub const SOUTH_BUTTON: InputId = InputId::from_static("gamepad:button/south");
    pub const EAST_BUTTON: InputId = InputId::from_static("gamepad:button/east");
    pub const WEST_BUTTON: InputId = InputId::from_static("gamepad:button/west");
    pub const NORTH_BUTTON: InputId = InputId::from_static("gamepad:button/north");
    pub const LEFT_SHOULDER_BUTTON: InputId = InputId::from_static("gamepad:button/left_shoulder");
    pub const RIGHT_SHOULDER_BUTTON: InputId = InputId::from_static("gamepad:button/right_shoulder");
    pub const LEFT_STICK_BUTTON: InputId = InputId::from_static("gamepad:button/left_stick");
    pub const RIGHT_STICK_BUTTON: InputId = InputId::from_static("gamepad:button/right_stick");
    pub const BACK_BUTTON: InputId = InputId::from_static("gamepad:button/back");
    pub const START_BUTTON: InputId = InputId::from_static("gamepad:button/start");
    pub const GUIDE_BUTTON: InputId = InputId::from_static("gamepad:button/guide");
    pub const DPAD_UP_BUTTON: InputId = InputId::from_static("gamepad:button/dpad_up");
    pub const DPAD_DOWN_BUTTON: InputId = InputId::from_static("gamepad:button/dpad_down");
    pub const DPAD_LEFT_BUTTON: InputId = InputId::from_static("gamepad:button/dpad_left");
    pub const DPAD_RIGHT_BUTTON: InputId = InputId::from_static("gamepad:button/dpad_right");
    pub const MISC_1_BUTTON: InputId = InputId::from_static("gamepad:button/misc_1");
    pub const LEFT_PADDLE_1_BUTTON: InputId = InputId::from_static("gamepad:button/left_paddle_1");
    pub const LEFT_PADDLE_2_BUTTON: InputId = InputId::from_static("gamepad:button/left_paddle_2");
    pub const RIGHT_PADDLE_1_BUTTON: InputId = InputId::from_static("gamepad:button/right_paddle_1");
    pub const RIGHT_PADDLE_2_BUTTON: InputId = InputId::from_static("gamepad:button/right_paddle_2");
    pub const TOUCHPAD_1_BUTTON: InputId = InputId::from_static("gamepad:button/touchpad_1");
    pub const TOUCHPAD_2_BUTTON: InputId = InputId::from_static("gamepad:button/touchpad_2");

    pub const LEFT_STICK_AXIS_UP: InputId = InputId::from_static("gamepad:axis/left_stick_up");
    pub const LEFT_STICK_AXIS_DOWN: InputId = InputId::from_static("gamepad:axis/left_stick_down");
    pub const LEFT_STICK_AXIS_LEFT: InputId = InputId::from_static("gamepad:axis/left_stick_left");
    pub const LEFT_STICK_AXIS_RIGHT: InputId = InputId::from_static("gamepad:axis/left_stick_right");
    pub const RIGHT_STICK_AXIS_UP: InputId = InputId::from_static("gamepad:axis/right_stick_up");
    pub const RIGHT_STICK_AXIS_DOWN: InputId = InputId::from_static("gamepad:axis/right_stick_down");
    pub const RIGHT_STICK_AXIS_LEFT: InputId = InputId::from_static("gamepad:axis/right_stick_left");
    pub const RIGHT_STICK_AXIS_RIGHT: InputId = InputId::from_static("gamepad:axis/right_stick_right");
    pub const LEFT_TRIGGER_AXIS: InputId = InputId::from_static("gamepad:axis/left_trigger");
    pub const RIGHT_TRIGGER_AXIS: InputId = InputId::from_static("gamepad:axis/right_trigger");

    pub const LEFT_STICK_GROUP: &'static str = "left_stick";
    pub const RIGHT_STICK_GROUP: &'static str = "right_stick";
    pub const TRIGGERS_GROUP: &'static str = "triggers";

    /// Every button of the layout
    pub fn buttons() -> Vec<InputId> {
        vec![
            Self::SOUTH_BUTTON,
            Self::EAST_BUTTON,
            Self::WEST_BUTTON,
            Self::NORTH_BUTTON,
            Self::LEFT_SHOULDER_BUTTON,
            Self::RIGHT_SHOULDER_BUTTON,
            Self::LEFT_STICK_BUTTON,
            Self::RIGHT_STICK_BUTTON,
            Self::BACK_BUTTON,
            Self::START_BUTTON,
            Self::GUIDE_BUTTON,
            Self::DPAD_UP_BUTTON,
            Self::DPAD_DOWN_BUTTON,
            Self::DPAD_LEFT_BUTTON,
            Self::DPAD_RIGHT_BUTTON,
            Self::MISC_1_BUTTON,
            Self::LEFT_PADDLE_1_BUTTON,
            Self::LEFT_PADDLE_2_BUTTON,
            Self::RIGHT_PADDLE_1_BUTTON,
            Self::RIGHT_PADDLE_2_BUTTON,
            Self::TOUCHPAD_1_BUTTON,
            Self::TOUCHPAD_2_BUTTON,
        ]
    }

    /// Every axis of the layout
    pub fn axes() -> Vec<InputId> {
        vec![
            Self::LEFT_STICK_AXIS_UP,
            Self::LEFT_STICK_AXIS_DOWN,
            Self::LEFT_STICK_AXIS_LEFT,
            Self::LEFT_STICK_AXIS_RIGHT,
            Self::RIGHT_STICK_AXIS_UP,
            Self::RIGHT_STICK_AXIS_DOWN,
            Self::RIGHT_STICK_AXIS_LEFT,
            Self::RIGHT_STICK_AXIS_RIGHT,
            Self::LEFT_TRIGGER_AXIS,
            Self::RIGHT_TRIGGER_AXIS,
        ]
    }

    /// Sticks are radial; triggers are gated independently with no deadzone by default
    pub fn deadzone_groups() -> Vec<DeadzoneGroup> {
        DEADZONE_GROUPS.clone()
    }
}

static DEADZONE_GROUPS: Lazy<Vec<DeadzoneGroup>> = Lazy::new(|| {
    vec![
        DeadzoneGroup::radial(
            GamepadInputs::LEFT_STICK_GROUP,
            [
                GamepadInputs::LEFT_STICK_AXIS_UP,
                GamepadInputs::LEFT_STICK_AXIS_DOWN,
                GamepadInputs::LEFT_STICK_AXIS_LEFT,
                GamepadInputs::LEFT_STICK_AXIS_RIGHT,
            ],
            0.2,
        ),
        DeadzoneGroup::radial(
            GamepadInputs::RIGHT_STICK_GROUP,
            [
                GamepadInputs::RIGHT_STICK_AXIS_UP,
                GamepadInputs::RIGHT_STICK_AXIS_DOWN,
                GamepadInputs::RIGHT_STICK_AXIS_LEFT,
                GamepadInputs::RIGHT_STICK_AXIS_RIGHT,
            ],
            0.2,
        ),
        DeadzoneGroup::independent(
            GamepadInputs::TRIGGERS_GROUP,
            vec![GamepadInputs::LEFT_TRIGGER_AXIS, GamepadInputs::RIGHT_TRIGGER_AXIS],
            0.0,
        ),
    ]
});

/// Generic joystick inputs, numbered as the backend reports them
pub struct JoystickInputs;

impl JoystickInputs {
    pub fn button(index: usize) -> InputId {
        InputId::new(format!("joystick:button/{index}"))
    }

    pub fn axis_positive(index: usize) -> InputId {
        InputId::new(format!("joystick:axis/{index}+"))
    }

    pub fn axis_negative(index: usize) -> InputId {
        InputId::new(format!("joystick:axis/{index}-"))
    }

    pub fn hat(index: usize, direction: HatDirection) -> InputId {
        InputId::new(format!("joystick:hat/{index}/{}", direction.as_str()))
    }

    /// One independent group per physical axis (both halves share a deadzone)
    pub fn deadzone_groups(axis_count: usize, default_deadzone: f32) -> Vec<DeadzoneGroup> {
        (0..axis_count)
            .map(|index| {
                DeadzoneGroup::independent(
                    format!("axis_{index}"),
                    vec![Self::axis_positive(index), Self::axis_negative(index)],
                    default_deadzone,
                )
            })
            .collect()
    }

    pub fn all(button_count: usize, axis_count: usize, hat_count: usize) -> Vec<InputId> {
        let mut inputs: Vec<InputId> = (0..button_count).map(Self::button).collect();
        for index in 0..axis_count {
            inputs.push(Self::axis_positive(index));
            inputs.push(Self::axis_negative(index));
        }
        for index in 0..hat_count {
            inputs.extend(HatDirection::ALL.iter().map(|dir| Self::hat(index, *dir)));
        }
        inputs
    }
}

/// Cardinal direction of a joystick hat switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HatDirection {
    Up,
    Down,
    Left,
    Right,
}

impl HatDirection {
    pub const ALL: [HatDirection; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}
