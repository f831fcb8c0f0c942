//! Raw per-tick input snapshots

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical input identifier, e.g. `gamepad:button/south`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(Cow<'static, str>);

impl InputId {
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tick's button and axis values
///
/// Axes are unipolar half-axes in `[0, 1]`; signed backend values are split
/// with [`positive_axis`] and [`negative_axis`] before they get here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    buttons: HashMap<InputId, bool>,
    axes: HashMap<InputId, f32>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, id: InputId, pressed: bool) -> &mut Self {
        self.buttons.insert(id, pressed);
        self
    }

    pub fn set_axis(&mut self, id: InputId, value: f32) -> &mut Self {
        self.axes.insert(id, value);
        self
    }

    pub fn with_button(mut self, id: InputId, pressed: bool) -> Self {
        self.set_button(id, pressed);
        self
    }

    pub fn with_axis(mut self, id: InputId, value: f32) -> Self {
        self.set_axis(id, value);
        self
    }

    /// Whether the button is held; unknown buttons read as released
    pub fn button(&self, id: &InputId) -> bool {
        self.buttons.get(id).copied().unwrap_or(false)
    }

    /// Axis value; unknown axes read as 0
    pub fn axis(&self, id: &InputId) -> f32 {
        self.axes.get(id).copied().unwrap_or(0.0)
    }

    pub fn has_button(&self, id: &InputId) -> bool {
        self.buttons.contains_key(id)
    }

    pub fn has_axis(&self, id: &InputId) -> bool {
        self.axes.contains_key(id)
    }

    pub fn buttons(&self) -> impl Iterator<Item = (&InputId, bool)> {
        self.buttons.iter().map(|(id, pressed)| (id, *pressed))
    }

    pub fn axes(&self) -> impl Iterator<Item = (&InputId, f32)> {
        self.axes.iter().map(|(id, value)| (id, *value))
    }

    pub(crate) fn axes_mut(&mut self) -> impl Iterator<Item = (&InputId, &mut f32)> {
        self.axes.iter_mut()
    }

    /// Overwrite entries with those from `other` (last write wins per input)
    pub fn merge(&mut self, other: &ControllerState) {
        for (id, pressed) in &other.buttons {
            self.buttons.insert(id.clone(), *pressed);
        }
        for (id, value) in &other.axes {
            self.axes.insert(id.clone(), *value);
        }
    }

    /// All input ids present in this snapshot
    pub fn ids(&self) -> impl Iterator<Item = &InputId> {
        self.buttons.keys().chain(self.axes.keys())
    }

    /// Set every button to released and every axis to 0, keeping the ids
    pub fn zeroed(&self) -> Self {
        Self {
            buttons: self.buttons.keys().map(|id| (id.clone(), false)).collect(),
            axes: self.axes.keys().map(|id| (id.clone(), 0.0)).collect(),
        }
    }
}

/// Positive half of a signed axis (`[-1, 1]` → `[0, 1]`)
pub fn positive_axis(value: f32) -> f32 {
    value.max(0.0)
}

/// Negative half of a signed axis, as a positive magnitude
pub fn negative_axis(value: f32) -> f32 {
    (-value).max(0.0)
}

/// Map a signed 16-bit raw value to `[-1, 1]`
pub fn map_short_to_float(value: i16) -> f32 {
    if value < 0 {
        value as f32 / 32768.0
    } else {
        value as f32 / 32767.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_last_write_wins() {
        let a = InputId::from_static("test:a");
        let b = InputId::from_static("test:b");

        let mut state = ControllerState::new().with_button(a.clone(), true).with_axis(b.clone(), 0.2);
        state.merge(&ControllerState::new().with_axis(b.clone(), 0.7));

        assert!(state.button(&a));
        assert_eq!(state.axis(&b), 0.7);
    }

    #[test]
    fn test_axis_halves() {
        assert_eq!(positive_axis(0.5), 0.5);
        assert_eq!(positive_axis(-0.5), 0.0);
        assert_eq!(negative_axis(-0.5), 0.5);
        assert_eq!(negative_axis(0.5), 0.0);
    }

    #[test]
    fn test_map_short_extremes() {
        assert_eq!(map_short_to_float(i16::MAX), 1.0);
        assert_eq!(map_short_to_float(i16::MIN), -1.0);
        assert_eq!(map_short_to_float(0), 0.0);
    }

    #[test]
    fn test_zeroed_keeps_ids() {
        let a = InputId::from_static("test:a");
        let state = ControllerState::new().with_button(a.clone(), true).zeroed();
        assert!(state.has_button(&a));
        assert!(!state.button(&a));
    }
}
