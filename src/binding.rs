//! Resolving controller inputs into host actions
//!
//! A [`Binding`] names one input or a chord of inputs and evaluates against a
//! controller's [`InputComponent`]. A [`KeyMapping`] is the host side: a
//! pressed flag driven by bindings, with optional toggle behaviour.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::controller::input::ToggleCondition;
use crate::controller::{InputComponent, InputId};

/// One input, or several that must all be held
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    Input(InputId),
    Chord(Vec<InputId>),
}

/// A binding's value this tick and the tick before
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BindingState {
    pub now: bool,
    pub prev: bool,
    pub analogue_now: f32,
    pub analogue_prev: f32,
}

impl BindingState {
    pub fn just_pressed(&self) -> bool {
        self.now && !self.prev
    }

    pub fn just_released(&self) -> bool {
        !self.now && self.prev
    }
}

impl Binding {
    pub fn chord(inputs: impl IntoIterator<Item = InputId>) -> Self {
        Self::Chord(inputs.into_iter().collect())
    }

    pub fn inputs(&self) -> &[InputId] {
        match self {
            Self::Input(id) => std::slice::from_ref(id),
            Self::Chord(ids) => ids,
        }
    }

    /// Whether every input of the binding exists on the controller
    pub fn is_supported(&self, input: &InputComponent) -> bool {
        !self.inputs().is_empty() && self.inputs().iter().all(|id| input.supports(id))
    }

    /// Evaluate against a controller
    ///
    /// A chord is held only while all of its inputs are; its analogue value is
    /// the weakest member's. An empty chord is never held.
    pub fn evaluate(&self, input: &InputComponent) -> BindingState {
        let ids = self.inputs();
        if ids.is_empty() {
            return BindingState::default();
        }

        BindingState {
            now: ids.iter().all(|id| input.digital_now(id)),
            prev: ids.iter().all(|id| input.digital_prev(id)),
            analogue_now: weakest(ids, |id| input.analogue_now(id)),
            analogue_prev: weakest(ids, |id| input.analogue_prev(id)),
        }
    }
}

fn weakest(ids: &[InputId], value: impl Fn(&InputId) -> f32) -> f32 {
    ids.iter().map(value).fold(f32::INFINITY, f32::min)
}

impl From<InputId> for Binding {
    fn from(id: InputId) -> Self {
        Self::Input(id)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in self.inputs() {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}

/// Pressed state of one host action
pub struct KeyMapping {
    name: String,
    down: bool,
    clicks: u32,
    /// Toggle behaviour chosen by the host when no controller is driving
    host_toggle: bool,
    toggle_conditions: Vec<(String, ToggleCondition)>,
}

impl KeyMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            down: false,
            clicks: 0,
            host_toggle: false,
            toggle_conditions: Vec::new(),
        }
    }

    pub fn with_host_toggle(mut self, toggle: bool) -> Self {
        self.host_toggle = toggle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    /// Make `controller_uid` put this mapping in toggle mode while `condition` holds
    ///
    /// Conditions accumulate; any one holding is enough.
    pub fn add_toggle_condition(&mut self, controller_uid: impl Into<String>, condition: ToggleCondition) {
        self.toggle_conditions.push((controller_uid.into(), condition));
    }

    /// Forget a controller's conditions, e.g. when it disconnects
    pub fn remove_toggle_conditions(&mut self, controller_uid: &str) -> usize {
        let before = self.toggle_conditions.len();
        self.toggle_conditions.retain(|(uid, _)| uid != controller_uid);
        before - self.toggle_conditions.len()
    }

    /// Whether presses toggle instead of hold
    ///
    /// With a controller driving, only that controller's conditions count.
    pub fn is_toggle(&self, current_controller: Option<&str>) -> bool {
        match current_controller {
            Some(current) => self
                .toggle_conditions
                .iter()
                .any(|(uid, condition)| uid == current && condition()),
            None => self.host_toggle,
        }
    }

    /// Feed the mapping from a binding
    ///
    /// Every press counts as a click. In toggle mode a press flips the state
    /// and a release is ignored.
    pub fn set_pressed(&mut self, down: bool, current_controller: Option<&str>) {
        if down {
            self.clicks += 1;
        }

        if self.is_toggle(current_controller) {
            if down {
                self.down = !self.down;
            }
        } else {
            self.down = down;
        }
        trace!("{} down: {}", self.name, self.down);
    }

    /// Drive from a binding's edges; holding the binding does not re-click
    pub fn apply(&mut self, state: BindingState, current_controller: Option<&str>) {
        if state.just_pressed() {
            self.set_pressed(true, current_controller);
        } else if state.just_released() {
            self.set_pressed(false, current_controller);
        }
    }

    /// Take one pending click
    pub fn consume_click(&mut self) -> bool {
        if self.clicks == 0 {
            return false;
        }
        self.clicks -= 1;
        true
    }

    pub fn release(&mut self) {
        self.down = false;
        self.clicks = 0;
    }
}

impl fmt::Debug for KeyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMapping")
            .field("name", &self.name)
            .field("down", &self.down)
            .field("clicks", &self.clicks)
            .field("toggle_conditions", &self.toggle_conditions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::GamepadInputs;
    use crate::controller::{Component, ControllerState};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn tick(input: &mut InputComponent, state: ControllerState) {
        input.push_state(state);
        input.tick_finished();
    }

    #[test]
    fn test_single_input_binding() {
        let mut input = InputComponent::gamepad(None);
        let binding = Binding::from(GamepadInputs::RIGHT_TRIGGER_AXIS);

        tick(&mut input, ControllerState::new().with_axis(GamepadInputs::RIGHT_TRIGGER_AXIS, 0.0));
        tick(&mut input, ControllerState::new().with_axis(GamepadInputs::RIGHT_TRIGGER_AXIS, 1.0));

        let state = binding.evaluate(&input);
        assert!(state.now);
        assert!(!state.prev);
        assert!(state.just_pressed());
        assert_eq!(state.analogue_now, 1.0);
        assert_eq!(state.analogue_prev, 0.0);
    }

    #[test]
    fn test_chord_needs_every_input() {
        let mut input = InputComponent::gamepad(None);
        let binding = Binding::chord([GamepadInputs::LEFT_SHOULDER_BUTTON, GamepadInputs::SOUTH_BUTTON]);
        assert!(binding.is_supported(&input));

        tick(&mut input, ControllerState::new().with_button(GamepadInputs::SOUTH_BUTTON, true));
        assert!(!binding.evaluate(&input).now);

        tick(
            &mut input,
            ControllerState::new()
                .with_button(GamepadInputs::SOUTH_BUTTON, true)
                .with_button(GamepadInputs::LEFT_SHOULDER_BUTTON, true),
        );
        let state = binding.evaluate(&input);
        assert!(state.just_pressed());
        assert_eq!(state.analogue_now, 1.0);
        assert_eq!(binding.to_string(), "gamepad:button/left_shoulder + gamepad:button/south");
    }

    #[test]
    fn test_empty_chord_never_held() {
        let input = InputComponent::gamepad(None);
        let binding = Binding::Chord(Vec::new());
        assert!(!binding.is_supported(&input));
        assert_eq!(binding.evaluate(&input), BindingState::default());
    }

    #[test]
    fn test_unsupported_input() {
        let input = InputComponent::gamepad(None);
        assert!(!Binding::from(InputId::new("joystick:button/40")).is_supported(&input));
    }

    #[test]
    fn test_hold_mapping_follows_binding() {
        let mut mapping = KeyMapping::new("jump");
        mapping.set_pressed(true, Some("pad"));
        assert!(mapping.is_down());
        mapping.set_pressed(false, Some("pad"));
        assert!(!mapping.is_down());

        assert!(mapping.consume_click());
        assert!(!mapping.consume_click());
    }

    #[test]
    fn test_toggle_condition_scoped_to_controller() {
        let flag = Arc::new(AtomicBool::new(true));
        let condition_flag = flag.clone();

        let mut mapping = KeyMapping::new("sneak");
        mapping.add_toggle_condition("pad-a", Arc::new(move || condition_flag.load(Ordering::SeqCst)));

        // Another controller driving: plain hold
        assert!(!mapping.is_toggle(Some("pad-b")));

        mapping.set_pressed(true, Some("pad-a"));
        mapping.set_pressed(false, Some("pad-a"));
        assert!(mapping.is_down(), "release ignored in toggle mode");
        mapping.set_pressed(true, Some("pad-a"));
        assert!(!mapping.is_down());

        flag.store(false, Ordering::SeqCst);
        assert!(!mapping.is_toggle(Some("pad-a")));
    }

    #[test]
    fn test_toggle_conditions_or_and_removal() {
        let mut mapping = KeyMapping::new("sprint").with_host_toggle(true);
        mapping.add_toggle_condition("pad", Arc::new(|| false));
        mapping.add_toggle_condition("pad", Arc::new(|| true));
        assert!(mapping.is_toggle(Some("pad")));
        assert!(mapping.is_toggle(None), "host setting applies without a controller");

        assert_eq!(mapping.remove_toggle_conditions("pad"), 2);
        assert!(!mapping.is_toggle(Some("pad")));
    }

    #[test]
    fn test_apply_uses_edges() {
        let mut mapping = KeyMapping::new("attack");
        let held = BindingState {
            now: true,
            prev: true,
            analogue_now: 1.0,
            analogue_prev: 1.0,
        };
        mapping.apply(held, None);
        assert!(!mapping.is_down());

        let pressed = BindingState { prev: false, ..held };
        mapping.apply(pressed, None);
        assert!(mapping.is_down());

        mapping.release();
        assert!(!mapping.is_down());
        assert!(!mapping.consume_click());
    }
}
