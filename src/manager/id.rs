//! Backend-independent controller identification
//!
//! Polled backends address devices by slot (a fixed user index that may be
//! empty or occupied), event-driven backends by the instance id the native
//! library assigns on connect. Ids from different families never compare equal.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UniqueControllerId {
    /// Device found by polling a fixed slot
    Polled { source: &'static str, slot: usize },

    /// Device announced by a native connect event
    Queued { source: &'static str, instance: u64 },
}

impl UniqueControllerId {
    pub fn polled(source: &'static str, slot: usize) -> Self {
        Self::Polled { source, slot }
    }

    pub fn queued(source: &'static str, instance: u64) -> Self {
        Self::Queued { source, instance }
    }

    /// Name of the source that reported the device
    pub fn source(&self) -> &'static str {
        match self {
            Self::Polled { source, .. } | Self::Queued { source, .. } => source,
        }
    }
}

impl fmt::Display for UniqueControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polled { source, slot } => write!(f, "polled:{source}/{slot}"),
            Self::Queued { source, instance } => write!(f, "queued:{source}/{instance}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(UniqueControllerId::polled("xinput", 2).to_string(), "polled:xinput/2");
        assert_eq!(UniqueControllerId::queued("gilrs", 7).to_string(), "queued:gilrs/7");
    }

    #[test]
    fn test_families_never_equal() {
        let polled = UniqueControllerId::polled("virtual", 0);
        let queued = UniqueControllerId::queued("virtual", 0);
        assert_ne!(polled, queued);
        assert_eq!(polled, UniqueControllerId::polled("virtual", 0));
        assert_ne!(polled, UniqueControllerId::polled("virtual", 1));
    }
}
