//! Logical button/axis state for one controller
//!
//! Drivers push raw [`ControllerState`] snapshots; the component sanitizes
//! them, applies deadzones, and keeps the previous tick's logical state so
//! that edges (just pressed / just released) are stable for the whole tick.

pub mod deadzone;
pub mod inputs;
pub mod state;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::component::{Component, ComponentError, ComponentId, TypedComponent};
use super::config::{Config, ConfigHolder, ConfigRules};

pub use deadzone::{DeadzoneGroup, DeadzoneKind, DeadzoneMode};
pub use inputs::{GamepadInputs, HatDirection, JoystickInputs};
pub use state::{ControllerState, InputId};

/// Extra activation predicate ORed into an input's digital state
pub type ToggleCondition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Input settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Deadzone per group name
    pub deadzones: BTreeMap<String, f32>,
    /// Analog value at or above which an axis counts as pressed
    pub button_activation_threshold: f32,
    /// Sensitivity multipliers consumed by gameplay (look, scroll, ...)
    pub h_look_sensitivity: f32,
    pub v_look_sensitivity: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            deadzones: BTreeMap::new(),
            button_activation_threshold: 0.5,
            h_look_sensitivity: 1.0,
            v_look_sensitivity: 1.0,
        }
    }
}

impl ConfigRules for InputConfig {
    fn validate(&self) -> Result<(), String> {
        let threshold = self.button_activation_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!("button activation threshold {threshold} outside [0, 1]"));
        }
        if let Some((group, value)) = self.deadzones.iter().find(|(_, v)| !(0.0..1.0).contains(*v)) {
            return Err(format!("deadzone {value} for group '{group}' outside [0, 1)"));
        }
        Ok(())
    }
}

/// Buttons and axes of one controller
pub struct InputComponent {
    config: Config<InputConfig>,
    deadzone_groups: Vec<DeadzoneGroup>,
    inputs: HashSet<InputId>,
    definitely_gamepad: bool,
    mapping_id: Option<String>,

    raw: ControllerState,
    current: ControllerState,
    prev: ControllerState,
    just_pressed: HashSet<InputId>,
    just_released: HashSet<InputId>,
    pushed_this_tick: bool,

    toggle_conditions: HashMap<InputId, Vec<ToggleCondition>>,
}

impl InputComponent {
    /// Create an input component
    ///
    /// # Arguments
    /// * `inputs` - Inputs this controller can report
    /// * `definitely_gamepad` - The controller follows the standard gamepad layout
    /// * `deadzone_groups` - Axis groups and their default deadzones
    /// * `mapping_id` - Optional identifier of the layout mapping for UI glyphs
    pub fn new(
        inputs: impl IntoIterator<Item = InputId>,
        definitely_gamepad: bool,
        deadzone_groups: Vec<DeadzoneGroup>,
        mapping_id: Option<String>,
    ) -> Self {
        let mut default_config = InputConfig::default();
        for group in &deadzone_groups {
            default_config
                .deadzones
                .insert(group.name.clone(), group.default_deadzone);
        }

        Self {
            config: Config::new(default_config),
            deadzone_groups,
            inputs: inputs.into_iter().collect(),
            definitely_gamepad,
            mapping_id,
            raw: ControllerState::default(),
            current: ControllerState::default(),
            prev: ControllerState::default(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
            pushed_this_tick: false,
            toggle_conditions: HashMap::new(),
        }
    }

    /// Standard gamepad input component
    pub fn gamepad(mapping_id: Option<String>) -> Self {
        let inputs = GamepadInputs::buttons()
            .into_iter()
            .chain(GamepadInputs::axes());
        Self::new(inputs, true, GamepadInputs::deadzone_groups(), mapping_id)
    }

    /// Accept a new raw snapshot
    ///
    /// The first push of a tick rotates current → previous. Later pushes in
    /// the same tick merge into the current snapshot, last write per input wins.
    pub fn push_state(&mut self, sample: ControllerState) {
        if self.pushed_this_tick {
            self.raw.merge(&sample);
        } else {
            self.prev = std::mem::take(&mut self.current);
            self.raw = sample;
            self.pushed_this_tick = true;
        }

        self.current = self.process(&self.raw);
        self.compute_edges();
    }

    fn process(&self, raw: &ControllerState) -> ControllerState {
        let mut state = raw.clone();

        for (_, value) in state.axes_mut() {
            *value = deadzone::sanitize_axis(*value);
        }

        for group in &self.deadzone_groups {
            let dz = self.deadzone(&group.name);
            match &group.mode {
                DeadzoneMode::Radial {
                    up,
                    down,
                    left,
                    right,
                } => {
                    let x = state.axis(right) - state.axis(left);
                    let y = state.axis(up) - state.axis(down);
                    let (x, y) = deadzone::radial_deadzone(x, y, dz);

                    let mut write = |id: &InputId, value: f32| {
                        if state.has_axis(id) || value != 0.0 {
                            state.set_axis(id.clone(), value);
                        }
                    };
                    write(right, state::positive_axis(x));
                    write(left, state::negative_axis(x));
                    write(up, state::positive_axis(y));
                    write(down, state::negative_axis(y));
                },
                DeadzoneMode::Independent { axes } => {
                    for id in axes {
                        if state.has_axis(id) {
                            let value = deadzone::independent_deadzone(state.axis(id), dz);
                            state.set_axis(id.clone(), value);
                        }
                    }
                },
            }
        }

        state
    }

    fn compute_edges(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();

        let ids: HashSet<InputId> = self.current.ids().chain(self.prev.ids()).cloned().collect();
        for id in ids {
            let now = self.literal_digital(&self.current, &id);
            let before = self.literal_digital(&self.prev, &id);
            if now && !before {
                trace!("{} pressed", id);
                self.just_pressed.insert(id);
            } else if !now && before {
                trace!("{} released", id);
                self.just_released.insert(id);
            }
        }
    }

    fn literal_digital(&self, state: &ControllerState, id: &InputId) -> bool {
        if state.has_button(id) {
            state.button(id)
        } else if state.has_axis(id) {
            state.axis(id) >= self.config.config.button_activation_threshold
        } else {
            false
        }
    }

    fn condition_active(&self, id: &InputId) -> bool {
        self.toggle_conditions
            .get(id)
            .is_some_and(|conditions| conditions.iter().any(|condition| condition()))
    }

    /// Pressed this tick (literal state ORed with registered toggle conditions)
    pub fn digital_now(&self, id: &InputId) -> bool {
        self.literal_digital(&self.current, id) || self.condition_active(id)
    }

    /// Pressed on the previous tick (literal state only)
    pub fn digital_prev(&self, id: &InputId) -> bool {
        self.literal_digital(&self.prev, id)
    }

    /// Deadzone-corrected analog value; buttons read as 0 or 1
    pub fn analogue_now(&self, id: &InputId) -> f32 {
        Self::analogue(&self.current, id)
    }

    pub fn analogue_prev(&self, id: &InputId) -> f32 {
        Self::analogue(&self.prev, id)
    }

    fn analogue(state: &ControllerState, id: &InputId) -> f32 {
        if state.has_axis(id) {
            state.axis(id)
        } else if state.button(id) {
            1.0
        } else {
            0.0
        }
    }

    /// Went from released to pressed between the previous and current tick
    pub fn just_pressed(&self, id: &InputId) -> bool {
        self.just_pressed.contains(id)
    }

    /// Went from pressed to released between the previous and current tick
    pub fn just_released(&self, id: &InputId) -> bool {
        self.just_released.contains(id)
    }

    /// Signed deadzone-corrected vector of a radial group (`x` right, `y` up)
    pub fn stick(&self, group: &str) -> Option<(f32, f32)> {
        self.deadzone_groups
            .iter()
            .find(|g| g.name == group)
            .and_then(|g| match &g.mode {
                DeadzoneMode::Radial {
                    up,
                    down,
                    left,
                    right,
                } => Some((
                    self.current.axis(right) - self.current.axis(left),
                    self.current.axis(up) - self.current.axis(down),
                )),
                DeadzoneMode::Independent { .. } => None,
            })
    }

    /// Register an extra activation predicate for `id`
    pub fn add_toggle_condition(&mut self, id: InputId, condition: ToggleCondition) {
        self.toggle_conditions.entry(id).or_default().push(condition);
    }

    pub fn clear_toggle_conditions(&mut self, id: &InputId) {
        self.toggle_conditions.remove(id);
    }

    /// Whether the controller can report this input
    pub fn supports(&self, id: &InputId) -> bool {
        self.inputs.contains(id)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &InputId> {
        self.inputs.iter()
    }

    pub fn is_definitely_gamepad(&self) -> bool {
        self.definitely_gamepad
    }

    pub fn mapping_id(&self) -> Option<&str> {
        self.mapping_id.as_deref()
    }

    pub fn deadzone_groups(&self) -> &[DeadzoneGroup] {
        &self.deadzone_groups
    }

    /// Configured deadzone for a group, falling back to the group default
    pub fn deadzone(&self, group: &str) -> f32 {
        self.config
            .config
            .deadzones
            .get(group)
            .or_else(|| self.config.default.deadzones.get(group))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> &ControllerState {
        &self.current
    }

    pub fn prev_state(&self) -> &ControllerState {
        &self.prev
    }

    pub fn settings(&self) -> &InputConfig {
        &self.config.config
    }

    pub fn settings_mut(&mut self) -> &mut InputConfig {
        &mut self.config.config
    }

    pub fn default_settings(&self) -> &InputConfig {
        &self.config.default
    }
}

impl Component for InputComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }

    fn finalise(&mut self) -> Result<(), ComponentError> {
        for group in &self.deadzone_groups {
            if !self.config.default.deadzones.contains_key(&group.name) {
                return Err(ComponentError::MissingDeadzone {
                    component: Self::ID,
                    group: group.name.clone(),
                });
            }
        }

        self.config
            .config
            .validate()
            .map_err(|message| ComponentError::Invalid {
                component: Self::ID,
                message,
            })
    }

    fn tick_finished(&mut self) {
        if !self.pushed_this_tick {
            // No fresh sample: hold the last state so edges last exactly one tick
            self.prev = self.current.clone();
            self.compute_edges();
        }
        self.pushed_this_tick = false;
    }

    fn config(&self) -> Option<&dyn ConfigHolder> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigHolder> {
        Some(&mut self.config)
    }
}

impl TypedComponent for InputComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:input");
}
