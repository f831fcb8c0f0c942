//! Deadzone application for analog inputs
//!
//! Sticks use a radial (circular) deadzone: the X/Y pair is gated on its
//! combined magnitude and the remaining range is rescaled so the deadzone edge
//! maps to 0 and full deflection maps to 1, keeping the direction. Axes that
//! are not geometrically coupled are gated one by one.

use serde::{Deserialize, Serialize};

use super::state::InputId;

/// How the axes of a group are deadzone-corrected
#[derive(Debug, Clone, PartialEq)]
pub enum DeadzoneMode {
    /// Four half-axes forming one stick, corrected as a vector
    Radial {
        up: InputId,
        down: InputId,
        left: InputId,
        right: InputId,
    },
    /// Every axis gated on its own
    Independent { axes: Vec<InputId> },
}

/// A named set of axes sharing one deadzone setting
#[derive(Debug, Clone, PartialEq)]
pub struct DeadzoneGroup {
    pub name: String,
    pub mode: DeadzoneMode,
    pub default_deadzone: f32,
}

impl DeadzoneGroup {
    pub fn radial(
        name: impl Into<String>,
        [up, down, left, right]: [InputId; 4],
        default_deadzone: f32,
    ) -> Self {
        Self {
            name: name.into(),
            mode: DeadzoneMode::Radial {
                up,
                down,
                left,
                right,
            },
            default_deadzone,
        }
    }

    pub fn independent(name: impl Into<String>, axes: Vec<InputId>, default_deadzone: f32) -> Self {
        Self {
            name: name.into(),
            mode: DeadzoneMode::Independent { axes },
            default_deadzone,
        }
    }

    /// Whether the axis belongs to this group
    pub fn contains(&self, id: &InputId) -> bool {
        match &self.mode {
            DeadzoneMode::Radial {
                up,
                down,
                left,
                right,
            } => [up, down, left, right].contains(&id),
            DeadzoneMode::Independent { axes } => axes.contains(id),
        }
    }
}

/// Serializable description of a group's mode (used in diagnostics output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadzoneKind {
    Radial,
    Independent,
}

impl From<&DeadzoneMode> for DeadzoneKind {
    fn from(mode: &DeadzoneMode) -> Self {
        match mode {
            DeadzoneMode::Radial { .. } => DeadzoneKind::Radial,
            DeadzoneMode::Independent { .. } => DeadzoneKind::Independent,
        }
    }
}

/// Radial deadzone with radial rescaling.
///
/// # Arguments
/// * `x`, `y` - Signed stick values in `[-1.0, 1.0]`
/// * `deadzone` - Circular deadzone radius in `[0.0, 1.0)`
///
/// # Returns
/// * `(x, y)` with magnitude in `[0.0, 1.0]`, same direction as the input
pub fn radial_deadzone(x: f32, y: f32, deadzone: f32) -> (f32, f32) {
    let magnitude = (x * x + y * y).sqrt();

    if !magnitude.is_finite() || magnitude <= deadzone || magnitude == 0.0 {
        return (0.0, 0.0);
    }

    if deadzone >= 1.0 {
        return (0.0, 0.0);
    }

    // Map [deadzone, 1] -> [0, 1]; diagonals past the unit circle clamp to 1
    let normalized_magnitude = ((magnitude - deadzone) / (1.0 - deadzone)).min(1.0);
    let scale = normalized_magnitude / magnitude;

    (x * scale, y * scale)
}

/// Per-axis deadzone for a unipolar value in `[0, 1]`
pub fn independent_deadzone(value: f32, deadzone: f32) -> f32 {
    if value <= deadzone || deadzone >= 1.0 {
        return 0.0;
    }

    ((value - deadzone) / (1.0 - deadzone)).clamp(0.0, 1.0)
}

/// Replace NaN/infinite values with 0 and clamp into `[0, 1]`
pub fn sanitize_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
