//! Battery level reporting

use std::fmt;

use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentId, TypedComponent};

/// Power source and charge percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "percent", rename_all = "snake_case")]
pub enum PowerState {
    #[default]
    Unknown,
    Wired,
    Depleting(u8),
    Charging(u8),
    Full,
}

impl PowerState {
    /// Charge level when known
    pub fn percent(&self) -> Option<u8> {
        match self {
            PowerState::Depleting(p) | PowerState::Charging(p) => Some(*p),
            PowerState::Full => Some(100),
            PowerState::Unknown | PowerState::Wired => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Unknown => write!(f, "unknown"),
            PowerState::Wired => write!(f, "wired"),
            PowerState::Depleting(p) => write!(f, "{p}%"),
            PowerState::Charging(p) => write!(f, "{p}% (charging)"),
            PowerState::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatteryComponent {
    state: PowerState,
}

impl BatteryComponent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentages above 100 are clamped
    pub fn set_state(&mut self, state: PowerState) {
        self.state = match state {
            PowerState::Depleting(p) => PowerState::Depleting(p.min(100)),
            PowerState::Charging(p) => PowerState::Charging(p.min(100)),
            other => other,
        };
    }

    pub fn state(&self) -> PowerState {
        self.state
    }
}

impl Component for BatteryComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for BatteryComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:battery");
}
