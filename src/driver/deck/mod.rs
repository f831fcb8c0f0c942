//! Enhanced driver for the handheld's built-in controls
//!
//! Input comes from the platform daemon rather than the generic backends: it
//! exposes paddles, both touchpads and software gyro, and tells us whether
//! the game has focus. The daemon is polled on a background thread (see
//! [`poller`]); `update` only reads the latest published report.

pub mod poller;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tracing::{debug, error};

use super::{Driver, DriverError, DriverId};
use crate::controller::input::state::{map_short_to_float, negative_axis, positive_axis};
use crate::controller::input::GamepadInputs;
use crate::controller::{
    ControllerEntity, ControllerState, DriverNameComponent, Finger, GuidComponent, GyroComponent, GyroState,
    InputComponent, NativeKeyboardComponent, Touchpad, Touchpads, UidComponent,
};
pub use poller::{DeckPoller, PollerSettings};

pub const DECK_DRIVER_NAME: &str = "Steam Deck";
pub const DECK_GUID: &str = "steamdeck";
const KEYBOARD_HEIGHT: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("deck poll timed out")]
    Timeout,

    #[error("deck daemon unavailable: {0}")]
    Unavailable(String),

    #[error("deck api error: {0}")]
    Api(String),

    #[error("failed to start deck poller: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Client of the platform daemon that serves the built-in controls
pub trait DeckApi: Send {
    /// Block until the daemon sends a fresh report, at most `timeout`
    fn poll(&mut self, timeout: Duration) -> Result<DeckReport, DeckError>;

    /// Show the platform's on-screen keyboard
    fn open_keyboard(&mut self) -> Result<(), DeckError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeckError> {
        Ok(())
    }
}

/// Builds a daemon client on demand; fails on hosts without the daemon
pub type DeckApiFactory = Box<dyn FnMut() -> Result<Box<dyn DeckApi>, DeckError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeckButton {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    L3,
    R3,
    L4,
    L5,
    R4,
    R5,
    Start,
    Select,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    LeftPadClick,
    RightPadClick,
    LeftPadTouch,
    RightPadTouch,
}

/// One trackpad sample, raw signed 16-bit units with the origin in the middle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeckPad {
    pub x: i16,
    pub y: i16,
    pub pressure: i16,
}

/// Snapshot of the built-in controls as the daemon reports them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckReport {
    pub game_focused: bool,
    pub pressed: Vec<DeckButton>,
    pub left_stick: (i16, i16),
    pub right_stick: (i16, i16),
    pub left_trigger: i16,
    pub right_trigger: i16,
    /// Software gyro, degrees per second
    pub gyro_pitch: f32,
    pub gyro_yaw: f32,
    pub gyro_roll: f32,
    pub left_pad: DeckPad,
    pub right_pad: DeckPad,
}

impl DeckReport {
    pub fn is_pressed(&self, button: DeckButton) -> bool {
        self.pressed.contains(&button)
    }

    pub fn with_pressed(mut self, button: DeckButton) -> Self {
        self.pressed.push(button);
        self
    }
}

const BUTTON_MAP: [(DeckButton, crate::controller::InputId); 20] = [
    (DeckButton::Y, GamepadInputs::NORTH_BUTTON),
    (DeckButton::B, GamepadInputs::EAST_BUTTON),
    (DeckButton::A, GamepadInputs::SOUTH_BUTTON),
    (DeckButton::X, GamepadInputs::WEST_BUTTON),
    (DeckButton::L1, GamepadInputs::LEFT_SHOULDER_BUTTON),
    (DeckButton::R1, GamepadInputs::RIGHT_SHOULDER_BUTTON),
    (DeckButton::Start, GamepadInputs::START_BUTTON),
    (DeckButton::Select, GamepadInputs::BACK_BUTTON),
    (DeckButton::L3, GamepadInputs::LEFT_STICK_BUTTON),
    (DeckButton::R3, GamepadInputs::RIGHT_STICK_BUTTON),
    (DeckButton::DpadUp, GamepadInputs::DPAD_UP_BUTTON),
    (DeckButton::DpadDown, GamepadInputs::DPAD_DOWN_BUTTON),
    (DeckButton::DpadLeft, GamepadInputs::DPAD_LEFT_BUTTON),
    (DeckButton::DpadRight, GamepadInputs::DPAD_RIGHT_BUTTON),
    (DeckButton::L4, GamepadInputs::LEFT_PADDLE_1_BUTTON),
    (DeckButton::L5, GamepadInputs::LEFT_PADDLE_2_BUTTON),
    (DeckButton::R4, GamepadInputs::RIGHT_PADDLE_1_BUTTON),
    (DeckButton::R5, GamepadInputs::RIGHT_PADDLE_2_BUTTON),
    (DeckButton::LeftPadClick, GamepadInputs::TOUCHPAD_1_BUTTON),
    (DeckButton::RightPadClick, GamepadInputs::TOUCHPAD_2_BUTTON),
];

/// Map a daemon report to gamepad inputs
///
/// The guide button is left out: pressing it always opens the platform menu.
pub fn deck_state(report: &DeckReport) -> ControllerState {
    let mut state = ControllerState::new();
    for (button, input) in BUTTON_MAP {
        state.set_button(input, report.is_pressed(button));
    }

    let (lx, ly) = (
        map_short_to_float(report.left_stick.0),
        map_short_to_float(report.left_stick.1),
    );
    let (rx, ry) = (
        map_short_to_float(report.right_stick.0),
        map_short_to_float(report.right_stick.1),
    );
    state
        .set_axis(GamepadInputs::LEFT_STICK_AXIS_UP, positive_axis(ly))
        .set_axis(GamepadInputs::LEFT_STICK_AXIS_DOWN, negative_axis(ly))
        .set_axis(GamepadInputs::LEFT_STICK_AXIS_LEFT, negative_axis(lx))
        .set_axis(GamepadInputs::LEFT_STICK_AXIS_RIGHT, positive_axis(lx))
        .set_axis(GamepadInputs::RIGHT_STICK_AXIS_UP, positive_axis(ry))
        .set_axis(GamepadInputs::RIGHT_STICK_AXIS_DOWN, negative_axis(ry))
        .set_axis(GamepadInputs::RIGHT_STICK_AXIS_LEFT, negative_axis(rx))
        .set_axis(GamepadInputs::RIGHT_STICK_AXIS_RIGHT, positive_axis(rx))
        .set_axis(GamepadInputs::LEFT_TRIGGER_AXIS, map_short_to_float(report.left_trigger))
        .set_axis(GamepadInputs::RIGHT_TRIGGER_AXIS, map_short_to_float(report.right_trigger));

    if report.game_focused {
        state
    } else {
        state.zeroed()
    }
}

/// Single finger on a trackpad, mapped to `[0, 1]` with the origin top left
fn pad_fingers(pad: DeckPad, touching: bool) -> Vec<Finger> {
    if !touching {
        return Vec::new();
    }
    let x = (map_short_to_float(pad.x) + 1.0) / 2.0;
    let y = 1.0 - (map_short_to_float(pad.y) + 1.0) / 2.0;
    // Pressure stays at 0 until the pad clicks
    let pressure = map_short_to_float(pad.pressure);
    vec![Finger::new(0, x, y, pressure)]
}

/// UID for the built-in controls; there is only ever one
pub fn deck_uid() -> String {
    let mut uid = hex::encode(Sha1::digest(DECK_GUID.as_bytes()));
    uid.truncate(32);
    uid
}

pub struct DeckDriver {
    id: DriverId,
    api: Option<Box<dyn DeckApi>>,
    settings: PollerSettings,
    poller: Option<DeckPoller>,
    keyboard_requested: Arc<AtomicBool>,
    mapping_id: Option<String>,
}

impl DeckDriver {
    pub fn new(api: Box<dyn DeckApi>, mapping_id: Option<String>) -> Self {
        Self {
            id: DriverId::next(),
            api: Some(api),
            settings: PollerSettings::default(),
            poller: None,
            keyboard_requested: Arc::new(AtomicBool::new(false)),
            mapping_id,
        }
    }

    pub fn with_settings(mut self, settings: PollerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start the poller on first use
    fn ensure_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let Some(api) = self.api.take() else {
            return;
        };

        debug!("Spinning up deck poller");
        match DeckPoller::spawn(api, self.settings, self.keyboard_requested.clone()) {
            Ok(poller) => self.poller = Some(poller),
            Err(e) => error!("Deck input unavailable: {}", e),
        }
    }
}

impl Driver for DeckDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    fn name(&self) -> String {
        "DeckDriver".to_string()
    }

    fn add_components(&mut self, entity: &mut ControllerEntity) -> Result<(), DriverError> {
        let id = self.id;
        entity.set_component_from(id, DriverNameComponent(DECK_DRIVER_NAME.to_string()));
        entity.set_component_from(id, GuidComponent(DECK_GUID.to_string()));
        entity.set_component_from(id, UidComponent(deck_uid()));

        entity.set_component_from(id, InputComponent::gamepad(self.mapping_id.clone()));
        entity.set_component_from(id, GyroComponent::new());
        // No battery component: the daemon's battery readings are wrong
        entity.set_component_from(id, Touchpads::new(vec![Touchpad::new(1), Touchpad::new(1)]));

        let requested = self.keyboard_requested.clone();
        entity.set_component_from(
            id,
            NativeKeyboardComponent::new(
                Box::new(move || requested.store(true, Ordering::SeqCst)),
                KEYBOARD_HEIGHT,
            ),
        );
        Ok(())
    }

    fn update(&mut self, entity: &mut ControllerEntity, _out_of_focus: bool) {
        self.ensure_polling();

        let Some(report) = self.poller.as_ref().and_then(DeckPoller::latest) else {
            return;
        };

        if let Some(input) = entity.owned_component_mut::<InputComponent>(self.id) {
            input.push_state(deck_state(&report));
        }

        if let Some(gyro) = entity.owned_component_mut::<GyroComponent>(self.id) {
            gyro.set_state(GyroState::from_degrees(
                report.gyro_pitch,
                -report.gyro_yaw,
                -report.gyro_roll,
            ));
        }

        if let Some(touchpads) = entity.owned_component_mut::<Touchpads>(self.id) {
            let pads = [
                (report.left_pad, report.is_pressed(DeckButton::LeftPadTouch)),
                (report.right_pad, report.is_pressed(DeckButton::RightPadTouch)),
            ];
            for (index, (pad, touching)) in pads.into_iter().enumerate() {
                if let Some(touchpad) = touchpads.pad_mut(index) {
                    touchpad.push_fingers(pad_fingers(pad, touching));
                }
            }
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        debug!("Closing deck driver");
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        // Never started: close the client directly
        if let Some(mut api) = self.api.take() {
            api.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerInfo;
    use crate::hid::ControllerType;
    use crate::manager::id::UniqueControllerId;
    use crossbeam::channel::{self, Receiver, Sender};
    use std::time::Instant;

    /// Reports pushed by the test, timeouts otherwise
    struct ChannelDeck {
        reports: Receiver<DeckReport>,
        closed: Sender<()>,
    }

    impl DeckApi for ChannelDeck {
        fn poll(&mut self, timeout: Duration) -> Result<DeckReport, DeckError> {
            self.reports.recv_timeout(timeout).map_err(|_| DeckError::Timeout)
        }

        fn close(&mut self) -> Result<(), DeckError> {
            let _ = self.closed.send(());
            Ok(())
        }
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            poll_timeout: Duration::from_millis(5),
            timeout_backoff: Duration::from_millis(1),
            close_timeout: Duration::from_secs(2),
        }
    }

    fn deck_entity() -> (ControllerEntity, Sender<DeckReport>, Receiver<()>) {
        let (report_tx, reports) = channel::unbounded();
        let (closed, closed_rx) = channel::unbounded();
        let driver = DeckDriver::new(Box::new(ChannelDeck { reports, closed }), None).with_settings(settings());
        let info = ControllerInfo::new(UniqueControllerId::polled("virtual", 0), ControllerType::unknown(), None);
        (ControllerEntity::create(info, Box::new(driver)).unwrap(), report_tx, closed_rx)
    }

    /// Tick until `check` passes or a second elapses
    fn tick_until(entity: &mut ControllerEntity, check: impl Fn(&ControllerEntity) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            entity.update(false);
            if check(entity) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_components_without_battery() {
        let (mut entity, _tx, _closed) = deck_entity();
        assert_eq!(entity.driver_name(), Some(DECK_DRIVER_NAME));
        assert_eq!(entity.guid(), Some(DECK_GUID));
        assert_eq!(entity.uid(), Some(deck_uid().as_str()));
        assert_eq!(entity.uid().map(str::len), Some(32));
        assert!(entity.input().unwrap().is_definitely_gamepad());
        assert!(entity.gyro().is_some());
        assert_eq!(entity.touchpad().unwrap().len(), 2);
        assert_eq!(entity.keyboard().unwrap().height(), 0.5);
        assert!(entity.battery().is_none());
        entity.close().unwrap();
    }

    #[test]
    fn test_focused_report_reaches_input() {
        let (mut entity, tx, _closed) = deck_entity();
        let mut report = DeckReport {
            game_focused: true,
            left_stick: (0, i16::MAX),
            gyro_yaw: 90.0,
            ..DeckReport::default()
        }
        .with_pressed(DeckButton::A)
        .with_pressed(DeckButton::RightPadTouch);
        report.right_pad = DeckPad {
            x: i16::MAX,
            y: i16::MAX,
            pressure: 0,
        };
        tx.send(report).unwrap();

        let pressed = |e: &ControllerEntity| {
            e.input()
                .is_some_and(|input| input.digital_now(&GamepadInputs::SOUTH_BUTTON))
        };
        assert!(tick_until(&mut entity, pressed));

        let input = entity.input().unwrap();
        assert!(input.analogue_now(&GamepadInputs::LEFT_STICK_AXIS_UP) > 0.99);

        let yaw = entity.gyro().unwrap().state().yaw;
        assert!((yaw + std::f32::consts::FRAC_PI_2).abs() < 1e-4);

        let pads = entity.touchpad().unwrap().pads();
        assert!(!pads[0].is_touched());
        let finger = pads[1].fingers()[0];
        assert!((finger.x - 1.0).abs() < 1e-4);
        assert!(finger.y.abs() < 1e-4);

        entity.close().unwrap();
    }

    #[test]
    fn test_unfocused_report_zeroes_inputs() {
        let (mut entity, tx, _closed) = deck_entity();
        let report = DeckReport {
            game_focused: false,
            left_trigger: i16::MAX,
            ..DeckReport::default()
        }
        .with_pressed(DeckButton::B);
        tx.send(report).unwrap();

        let received = |e: &ControllerEntity| {
            e.input()
                .is_some_and(|input| input.state().has_button(&GamepadInputs::EAST_BUTTON))
        };
        assert!(tick_until(&mut entity, received));

        let input = entity.input().unwrap();
        assert!(!input.digital_now(&GamepadInputs::EAST_BUTTON));
        assert_eq!(input.analogue_now(&GamepadInputs::LEFT_TRIGGER_AXIS), 0.0);
        entity.close().unwrap();
    }

    #[test]
    fn test_close_stops_poller_and_closes_api() {
        let (mut entity, _tx, closed) = deck_entity();
        entity.update(false);
        entity.close().unwrap();
        assert!(closed.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_close_without_update_closes_api() {
        let (mut entity, _tx, closed) = deck_entity();
        entity.close().unwrap();
        assert!(closed.try_recv().is_ok());
    }
}
